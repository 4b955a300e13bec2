use std::time::Duration;

pub(crate) type Callback = Box<dyn Fn() + Send + Sync>;

/// Per-bus behavior knobs. All default to off.
#[derive(Default)]
pub struct Options {
	pub(crate) deduplicate: bool,
	pub(crate) throttle: Option<Duration>,
	pub(crate) averaging_window: usize,
	pub(crate) min_abs_value: f64,
	pub(crate) on_first_subscribed: Option<Callback>,
	pub(crate) on_last_unsubscribed: Option<Callback>,
	pub(crate) on_subscribed: Option<Callback>,
	pub(crate) on_unsubscribed: Option<Callback>,
}

impl Options {
	pub fn new() -> Self {
		Options::default()
	}

	/// Drop a send whose value equals the current one.
	pub fn deduplicate(mut self, on: bool) -> Self {
		self.deduplicate = on;
		self
	}

	/// Rate-limit broadcasts to one per `interval`, coalescing intermediate
	/// sends into the latest value.
	pub fn throttle(mut self, interval: Duration) -> Self {
		self.throttle = Some(interval);
		self
	}

	/// Replace each sent float with the moving average over the last
	/// `samples` sends. Only meaningful on a float bus.
	pub fn averaging_window(mut self, samples: usize) -> Self {
		self.averaging_window = samples;
		self
	}

	/// Treat floats with `|v| < epsilon` as zero and reset the averaging
	/// window when one arrives. Only meaningful on a float bus.
	pub fn min_abs_value(mut self, epsilon: f64) -> Self {
		self.min_abs_value = epsilon;
		self
	}

	/// Fires when the subscriber count goes from zero to one.
	pub fn on_first_subscribed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_first_subscribed = Some(Box::new(f));
		self
	}

	/// Fires when the subscriber count goes from one to zero.
	pub fn on_last_unsubscribed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_last_unsubscribed = Some(Box::new(f));
		self
	}

	/// Fires on every subscribe.
	pub fn on_subscribed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_subscribed = Some(Box::new(f));
		self
	}

	/// Fires on every unsubscribe.
	pub fn on_unsubscribed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_unsubscribed = Some(Box::new(f));
		self
	}
}

pub(crate) fn notify(callback: &Option<Callback>) {
	if let Some(f) = callback {
		f();
	}
}
