use crate::options::{Options, notify};
use crate::value::{AvgWindow, BusValue};
use crate::{Handler, SubscriptionId};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub type BoolBus = Bus<bool>;
pub type IntBus = Bus<i64>;
pub type FloatBus = Bus<f64>;
pub type StringBus = Bus<String>;
pub type JsonBus = Bus<Value>;

/// A mutex-protected holder of one value, broadcasting changes to
/// subscribed handlers. Clones share the same underlying bus.
pub struct Bus<T: BusValue> {
	inner: Arc<Inner<T>>,
}

impl<T: BusValue> Clone for Bus<T> {
	fn clone(&self) -> Self {
		Bus {
			inner: self.inner.clone(),
		}
	}
}

struct Inner<T> {
	opts: Options,
	state: Mutex<State<T>>,
}

struct State<T> {
	value: T,
	handlers: Vec<(SubscriptionId, Handler)>,
	next_id: SubscriptionId,
	throttled: bool,
	pending: Option<T>,
	last_sent: Option<T>,
	window: AvgWindow,
}

static_assertions::assert_impl_all!(Bus<Value>: Send, Sync);

impl<T: BusValue> Bus<T> {
	pub fn new(initial: T) -> Self {
		Self::with_opts(initial, Options::default())
	}

	pub fn with_opts(initial: T, opts: Options) -> Self {
		Bus {
			inner: Arc::new(Inner {
				opts,
				state: Mutex::new(State {
					value: initial,
					handlers: Vec::new(),
					next_id: 0,
					throttled: false,
					pending: None,
					last_sent: None,
					window: AvgWindow::default(),
				}),
			}),
		}
	}

	/// Current value in its JSON encoding.
	pub fn get(&self) -> Value {
		self.lock().value.to_json()
	}

	/// Current value in native form.
	pub fn get_v(&self) -> T {
		self.lock().value.clone()
	}

	/// Updates from a JSON value.
	///
	/// Panics if the value is not of this bus's kind; sending the wrong
	/// kind is a bug in the caller, not an input error.
	pub fn send(&self, value: &Value) {
		match T::from_json(value) {
			Some(v) => self.send_v(v),
			None => panic!(
				"trying to send a non-{} value to a {} bus: {}",
				T::KIND,
				T::KIND,
				value
			),
		}
	}

	/// Updates from a native value: preprocess, deduplicate, commit,
	/// broadcast.
	pub fn send_v(&self, value: T) {
		let mut state = self.lock();
		let value = value.preprocess(&self.inner.opts, &mut state.window);
		if self.inner.opts.deduplicate && value.same(&state.value) {
			return;
		}
		state.value = value.clone();
		self.broadcast(&mut state, value);
	}

	pub fn subscribe(&self, handler: Handler) -> SubscriptionId {
		let mut state = self.lock();
		if state.handlers.is_empty() {
			notify(&self.inner.opts.on_first_subscribed);
		}
		notify(&self.inner.opts.on_subscribed);
		let id = state.next_id;
		state.next_id += 1;
		state.handlers.push((id, handler));
		id
	}

	/// After this returns the handler is never invoked again. Unknown ids
	/// are ignored.
	pub fn unsubscribe(&self, id: SubscriptionId) {
		let mut state = self.lock();
		let Some(pos) = state.handlers.iter().position(|(hid, _)| *hid == id) else {
			return;
		};
		state.handlers.remove(pos);
		notify(&self.inner.opts.on_unsubscribed);
		if state.handlers.is_empty() {
			notify(&self.inner.opts.on_last_unsubscribed);
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, State<T>> {
		self.inner.state.lock().unwrap()
	}

	fn broadcast(&self, state: &mut State<T>, value: T) {
		let Some(interval) = self.inner.opts.throttle else {
			Self::fire(state, &value);
			return;
		};
		if state.throttled {
			state.pending = Some(value);
			return;
		}
		state.throttled = true;
		if self.inner.opts.deduplicate {
			state.last_sent = Some(value.clone());
		}
		Self::fire(state, &value);
		self.spawn_ticker(interval);
	}

	fn fire(state: &mut State<T>, value: &T) {
		let json = value.to_json();
		for (_, handler) in state.handlers.iter_mut() {
			handler(&json);
		}
	}

	fn spawn_ticker(&self, interval: Duration) {
		let bus = self.clone();
		thread::Builder::new()
			.name("arbor-bus-throttle".into())
			.spawn(move || bus.tick(interval))
			.expect("failed to spawn bus throttle ticker");
	}

	// One ticker per bus: spawned on the transition into throttled mode,
	// exits on the first idle interval.
	fn tick(self, interval: Duration) {
		loop {
			thread::sleep(interval);
			let mut state = self.lock();
			match state.pending.take() {
				Some(value) => {
					let skip = self.inner.opts.deduplicate
						&& state
							.last_sent
							.as_ref()
							.is_some_and(|last| value.same(last));
					if !skip {
						if self.inner.opts.deduplicate {
							state.last_sent = Some(value.clone());
						}
						Self::fire(&mut state, &value);
					}
				}
				None => {
					state.throttled = false;
					return;
				}
			}
		}
	}
}

/// Object-safe view of a bus, used where the value kind is erased (contract
/// value nodes bind any bus kind).
pub trait AnyBus: Send + Sync {
	fn get(&self) -> Value;
	fn send(&self, value: &Value);
	fn subscribe(&self, handler: Handler) -> SubscriptionId;
	fn unsubscribe(&self, id: SubscriptionId);
}

impl<T: BusValue> AnyBus for Bus<T> {
	fn get(&self) -> Value {
		Bus::get(self)
	}

	fn send(&self, value: &Value) {
		Bus::send(self, value)
	}

	fn subscribe(&self, handler: Handler) -> SubscriptionId {
		Bus::subscribe(self, handler)
	}

	fn unsubscribe(&self, id: SubscriptionId) {
		Bus::unsubscribe(self, id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn counted(
		log: &Arc<Mutex<Vec<Value>>>,
	) -> Handler {
		let log = log.clone();
		Box::new(move |v| log.lock().unwrap().push(v.clone()))
	}

	fn seen(log: &Arc<Mutex<Vec<Value>>>) -> Vec<Value> {
		log.lock().unwrap().clone()
	}

	#[test]
	fn send_broadcasts_to_all_subscribers() {
		let bus = IntBus::new(0);
		let a = Arc::new(Mutex::new(Vec::new()));
		let b = Arc::new(Mutex::new(Vec::new()));
		bus.subscribe(counted(&a));
		bus.subscribe(counted(&b));

		bus.send_v(42);

		assert_eq!(seen(&a), vec![json!(42)]);
		assert_eq!(seen(&b), vec![json!(42)]);
		assert_eq!(bus.get_v(), 42);
		assert_eq!(bus.get(), json!(42));
	}

	#[test]
	fn unsubscribed_handler_is_never_called_again() {
		let bus = StringBus::new(String::new());
		let log = Arc::new(Mutex::new(Vec::new()));
		let id = bus.subscribe(counted(&log));
		bus.send_v("one".to_owned());
		bus.unsubscribe(id);
		bus.send_v("two".to_owned());

		assert_eq!(seen(&log), vec![json!("one")]);
	}

	#[test]
	fn subscription_ids_increase_and_are_unique() {
		let bus = BoolBus::new(false);
		let a = bus.subscribe(Box::new(|_| {}));
		let b = bus.subscribe(Box::new(|_| {}));
		bus.unsubscribe(a);
		let c = bus.subscribe(Box::new(|_| {}));
		assert!(a < b && b < c);
	}

	#[test]
	fn deduplicate_drops_equal_sends() {
		let bus = IntBus::with_opts(0, Options::new().deduplicate(true));
		let log = Arc::new(Mutex::new(Vec::new()));
		bus.subscribe(counted(&log));

		bus.send_v(5);
		bus.send_v(5);
		bus.send_v(6);

		assert_eq!(seen(&log), vec![json!(5), json!(6)]);
	}

	#[test]
	fn json_bus_deduplicates_structurally() {
		let bus = JsonBus::with_opts(json!(null), Options::new().deduplicate(true));
		let log = Arc::new(Mutex::new(Vec::new()));
		bus.subscribe(counted(&log));

		bus.send_v(json!({"a": 1, "b": 2}));
		bus.send_v(json!({"b": 2.0, "a": 1}));

		assert_eq!(seen(&log).len(), 1);
	}

	#[test]
	fn lifecycle_callbacks_fire_on_transitions() {
		let first = Arc::new(AtomicUsize::new(0));
		let last = Arc::new(AtomicUsize::new(0));
		let each = Arc::new(AtomicUsize::new(0));
		let opts = {
			let (first, last, each) = (first.clone(), last.clone(), each.clone());
			let each2 = each.clone();
			Options::new()
				.on_first_subscribed(move || {
					first.fetch_add(1, Ordering::SeqCst);
				})
				.on_last_unsubscribed(move || {
					last.fetch_add(1, Ordering::SeqCst);
				})
				.on_subscribed(move || {
					each.fetch_add(1, Ordering::SeqCst);
				})
				.on_unsubscribed(move || {
					each2.fetch_sub(1, Ordering::SeqCst);
				})
		};
		let bus = FloatBus::with_opts(0.0, opts);

		let a = bus.subscribe(Box::new(|_| {}));
		let b = bus.subscribe(Box::new(|_| {}));
		assert_eq!(first.load(Ordering::SeqCst), 1);
		assert_eq!(each.load(Ordering::SeqCst), 2);

		bus.unsubscribe(a);
		assert_eq!(last.load(Ordering::SeqCst), 0);
		bus.unsubscribe(b);
		assert_eq!(last.load(Ordering::SeqCst), 1);
		assert_eq!(each.load(Ordering::SeqCst), 0);

		bus.subscribe(Box::new(|_| {}));
		assert_eq!(first.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn small_floats_clamp_to_zero_and_reset_averaging() {
		let bus = FloatBus::with_opts(
			1.0,
			Options::new().min_abs_value(0.5).averaging_window(2),
		);
		let log = Arc::new(Mutex::new(Vec::new()));
		bus.subscribe(counted(&log));

		bus.send_v(2.0); // window [2]
		bus.send_v(4.0); // window [2, 4] -> 3
		bus.send_v(0.1); // clamped, window reset
		bus.send_v(8.0); // fresh window [8]

		assert_eq!(
			seen(&log),
			vec![json!(2.0), json!(3.0), json!(0.0), json!(8.0)]
		);
	}

	#[test]
	fn averaging_window_converges_to_mean() {
		let bus = FloatBus::with_opts(0.0, Options::new().averaging_window(3));
		let log = Arc::new(Mutex::new(Vec::new()));
		bus.subscribe(counted(&log));

		bus.send_v(1.0);
		bus.send_v(2.0);
		bus.send_v(6.0);
		bus.send_v(7.0); // window [2, 6, 7]

		let values = seen(&log);
		assert_eq!(values[2], json!(3.0));
		assert_eq!(values[3], json!(5.0));
	}

	#[test]
	fn throttle_coalesces_to_latest_value() {
		let interval = Duration::from_millis(150);
		let bus = IntBus::with_opts(0, Options::new().throttle(interval));
		let log = Arc::new(Mutex::new(Vec::new()));
		bus.subscribe(counted(&log));

		bus.send_v(1);
		bus.send_v(2);
		bus.send_v(3);

		// The leading edge fires immediately; the rest coalesce.
		assert_eq!(seen(&log), vec![json!(1)]);

		thread::sleep(interval * 3);
		assert_eq!(seen(&log), vec![json!(1), json!(3)]);

		// The ticker has exited; the next send fires immediately again.
		bus.send_v(4);
		assert_eq!(seen(&log), vec![json!(1), json!(3), json!(4)]);
	}

	#[test]
	fn throttle_with_dedup_skips_an_unchanged_pending_value() {
		let interval = Duration::from_millis(150);
		let bus = IntBus::with_opts(
			0,
			Options::new().throttle(interval).deduplicate(true),
		);
		let log = Arc::new(Mutex::new(Vec::new()));
		bus.subscribe(counted(&log));

		bus.send_v(1);
		bus.send_v(2);
		bus.send_v(1);

		thread::sleep(interval * 3);
		assert_eq!(seen(&log), vec![json!(1)]);
	}

	#[test]
	#[should_panic(expected = "non-int value")]
	fn wrong_kind_send_is_a_bug() {
		let bus = IntBus::new(0);
		bus.send(&json!("not a number"));
	}
}
