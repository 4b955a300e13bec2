mod calls;

use crate::error::{ConnectError, ConnectionDead, LoopError};
use crate::liveness::Liveness;
use crate::options::{ConnectionOptions, ContractCallback};
use crate::topics::ServiceTopics;
use arbor_bus::{AnyBus, SubscriptionId};
use arbor_contract::{CallHandler, Contract, Type, traverse, type_check};
use arbor_mqtt_provider::{ConnectConfig, Disconnect, Message, MqttClient, Topic};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A service's attachment to the broker.
///
/// The connection is inert until [`connect`](Connection::connect) wires the
/// MQTT client (registering the empty contract as the will), after which
/// [`run`](Connection::run) serializes everything: MQTT ingress, contract
/// updates, value changes, and call completions all pass through its loop,
/// one event per iteration.
pub struct Connection<C: MqttClient> {
	client: C,
	topics: ServiceTopics,
	on_contract: Option<ContractCallback>,
	call_timeout: Duration,
	channels: Channels,
	liveness: Arc<Liveness>,
	connected: bool,
	callables: HashMap<Topic, CallableEntry>,
	subscriptions: Vec<ValueSubscription>,
}

/// Clonable front end for tasks that talk to a running loop.
#[derive(Clone)]
pub struct ConnectionHandle {
	contract: flume::Sender<Option<Contract>>,
	exit: flume::Sender<()>,
	liveness: Arc<Liveness>,
}

impl ConnectionHandle {
	/// Replaces the published contract. `None` publishes the empty
	/// contract, withdrawing the service.
	pub fn update_contract(&self, contract: Option<Contract>) -> Result<(), ConnectionDead> {
		if self.liveness.send(&self.contract, contract) {
			Ok(())
		} else {
			Err(ConnectionDead)
		}
	}

	/// Asks the loop to exit cleanly.
	pub fn shutdown(&self) -> Result<(), ConnectionDead> {
		if self.liveness.send(&self.exit, ()) {
			Ok(())
		} else {
			Err(ConnectionDead)
		}
	}
}

struct Channels {
	disconnect: (flume::Sender<Disconnect>, flume::Receiver<Disconnect>),
	message: (flume::Sender<Message>, flume::Receiver<Message>),
	exit: (flume::Sender<()>, flume::Receiver<()>),
	contract: (
		flume::Sender<Option<Contract>>,
		flume::Receiver<Option<Contract>>,
	),
	outgoing: (flume::Sender<Outgoing>, flume::Receiver<Outgoing>),
	completion: (flume::Sender<Completion>, flume::Receiver<Completion>),
}

impl Channels {
	fn new() -> Self {
		Channels {
			disconnect: flume::unbounded(),
			message: flume::unbounded(),
			exit: flume::unbounded(),
			contract: flume::unbounded(),
			outgoing: flume::unbounded(),
			completion: flume::unbounded(),
		}
	}
}

/// A value change waiting to be marshaled and published. Dropping it
/// drops `done`, which releases the emitting producer.
pub(crate) struct Outgoing {
	topic: Topic,
	ty: Type,
	value: Value,
	done: flume::Sender<()>,
}

/// A finished asynchronous call: the reply, ready to publish.
pub(crate) struct Completion {
	pub(crate) message: Message,
}

#[derive(Clone)]
pub(crate) struct CallableEntry {
	pub(crate) argument: Type,
	pub(crate) retval: Type,
	pub(crate) handler: CallHandler,
	pub(crate) asynchronous: bool,
}

struct ValueSubscription {
	bus: Arc<dyn AnyBus>,
	id: SubscriptionId,
	cancelled: Arc<AtomicBool>,
}

enum Event {
	Disconnect(Disconnect),
	Exit,
	Message(Message),
	Contract(Option<Contract>),
	Outgoing(Outgoing),
	Completion(Completion),
	Closed,
}

impl<C: MqttClient> Connection<C> {
	pub fn new(options: ConnectionOptions<C>) -> Self {
		Connection {
			client: options.mqtt_client,
			topics: ServiceTopics::new(options.root, options.service_root),
			on_contract: options.on_contract,
			call_timeout: options.call_timeout,
			channels: Channels::new(),
			liveness: Arc::new(Liveness::new()),
			connected: false,
			callables: HashMap::new(),
			subscriptions: Vec::new(),
		}
	}

	pub fn handle(&self) -> ConnectionHandle {
		ConnectionHandle {
			contract: self.channels.contract.0.clone(),
			exit: self.channels.exit.0.clone(),
			liveness: self.liveness.clone(),
		}
	}

	/// Advisory call deadline carried in the options.
	pub fn call_timeout(&self) -> Duration {
		self.call_timeout
	}

	/// One-shot: attaches to the MQTT client. The will is the empty
	/// contract on the contract topic, so the broker withdraws the service
	/// if it dies ungracefully.
	pub async fn connect(&mut self) -> Result<(), ConnectError> {
		if self.connected {
			return Err(ConnectError::AlreadyConnected);
		}
		let config = ConnectConfig {
			on_disconnect: self.channels.disconnect.0.clone(),
			on_message: self.channels.message.0.clone(),
			will: Message::new(self.topics.contract(), "null", true),
		};
		self.client
			.connect(config)
			.await
			.map_err(|source| ConnectError::Connect { source })?;
		self.connected = true;
		Ok(())
	}

	/// Runs until an exit request, a disconnect, or a transport failure.
	/// Clean exits and clean disconnects return `Ok`.
	pub async fn run(mut self) -> Result<(), LoopError> {
		if !self.connected {
			return Err(LoopError::NotConnected);
		}
		tracing::debug!(contract = %self.topics.contract(), "connection loop started");
		let result = self.serve().await;
		self.shutdown_cleanup().await;
		tracing::debug!("connection loop stopped");
		result
	}

	/// [`run`](Connection::run), elevating any failure to process exit.
	pub async fn run_or_die(self) {
		if let Err(error) = self.run().await {
			tracing::error!(%error, "connection loop failed");
			std::process::exit(1);
		}
	}

	async fn serve(&mut self) -> Result<(), LoopError> {
		loop {
			let event = {
				let ch = &self.channels;
				tokio::select! {
					d = ch.disconnect.1.recv_async() => match d {
						Ok(d) => Event::Disconnect(d),
						Err(_) => Event::Closed,
					},
					e = ch.exit.1.recv_async() => match e {
						Ok(()) => Event::Exit,
						Err(_) => Event::Closed,
					},
					m = ch.message.1.recv_async() => match m {
						Ok(m) => Event::Message(m),
						Err(_) => Event::Closed,
					},
					c = ch.contract.1.recv_async() => match c {
						Ok(c) => Event::Contract(c),
						Err(_) => Event::Closed,
					},
					o = ch.outgoing.1.recv_async() => match o {
						Ok(o) => Event::Outgoing(o),
						Err(_) => Event::Closed,
					},
					c = ch.completion.1.recv_async() => match c {
						Ok(c) => Event::Completion(c),
						Err(_) => Event::Closed,
					},
				}
			};

			match event {
				Event::Disconnect(Disconnect::Clean) => return Ok(()),
				Event::Disconnect(Disconnect::Lost(source)) => {
					return Err(LoopError::Transport { source });
				}
				Event::Exit => return Ok(()),
				Event::Message(message) => self.handle_message(message),
				Event::Contract(contract) => self.install_contract(contract).await?,
				Event::Outgoing(outgoing) => self.handle_outgoing(outgoing),
				Event::Completion(completion) => self.client.publish(completion.message),
				Event::Closed => return Err(LoopError::ChannelsClosed),
			}
		}
	}

	fn handle_message(&mut self, message: Message) {
		let Some(entry) = self.callables.get(&message.topic) else {
			tracing::error!(topic = %message.topic, "received message on unknown topic");
			return;
		};
		let entry = entry.clone();
		self.dispatch_call(&entry, &message);
	}

	/// Swaps the published contract: tear down the previous bindings,
	/// index and subscribe the new callables, bind the new value nodes,
	/// publish their current values, then publish the contract itself.
	async fn install_contract(&mut self, contract: Option<Contract>) -> Result<(), LoopError> {
		self.teardown_bindings().await;

		let mut calls = Vec::new();
		let mut values = Vec::new();
		if let Some(contract) = &contract {
			traverse(contract, |node, path| match node {
				Contract::Callable(callable) => {
					let Some(handler) = &callable.handler else {
						tracing::warn!(path = %path, "callable without a handler is not served");
						return;
					};
					calls.push((
						self.topics.call(path),
						CallableEntry {
							argument: callable.argument.clone(),
							retval: callable.retval.clone(),
							handler: handler.clone(),
							asynchronous: callable.asynchronous,
						},
					));
				}
				Contract::Value(value) => {
					let Some(bus) = &value.bus else {
						tracing::warn!(path = %path, "value node without a bus is not served");
						return;
					};
					values.push((self.topics.value(path), value.ty.clone(), bus.clone()));
				}
				_ => {}
			});
		}

		for (topic, entry) in calls {
			self.client
				.subscribe(&topic)
				.await
				.map_err(|source| LoopError::Transport { source })?;
			self.callables.insert(topic, entry);
		}

		for (topic, ty, bus) in values {
			let cancelled = Arc::new(AtomicBool::new(false));
			let id = bus.subscribe(self.value_handler(
				topic.clone(),
				ty.clone(),
				cancelled.clone(),
			));
			self.subscriptions.push(ValueSubscription {
				bus: bus.clone(),
				id,
				cancelled,
			});
			let initial = bus.get();
			self.publish_value(&topic, &ty, &initial);
		}

		let contract_topic = self.topics.contract();
		let payload = Contract::encode_opt(contract.as_ref()).to_string();
		self.client
			.publish(Message::new(contract_topic.clone(), payload, true));
		tracing::debug!(topic = %contract_topic, "contract installed");

		if let Some(callback) = &mut self.on_contract {
			callback(&contract_topic, contract.as_ref());
		}
		Ok(())
	}

	/// Handler installed on a bound bus. Emissions enqueue the value and
	/// then hold the producer on the barrier until the loop has published
	/// it, so a slow broker slows producers instead of growing the queue.
	fn value_handler(
		&self,
		topic: Topic,
		ty: Type,
		cancelled: Arc<AtomicBool>,
	) -> arbor_bus::Handler {
		let liveness = self.liveness.clone();
		let tx = self.channels.outgoing.0.clone();
		Box::new(move |value| {
			if cancelled.load(Ordering::SeqCst) {
				return;
			}
			let (done, done_rx) = flume::bounded(1);
			let outgoing = Outgoing {
				topic: topic.clone(),
				ty: ty.clone(),
				value: value.clone(),
				done,
			};
			if !liveness.send(&tx, outgoing) {
				return;
			}
			if cancelled.load(Ordering::SeqCst) {
				// Teardown is draining the queue; it will complete the
				// barrier, and waiting here would hold the bus lock it
				// needs next.
				return;
			}
			let _ = done_rx.recv();
		})
	}

	fn handle_outgoing(&mut self, outgoing: Outgoing) {
		self.publish_value(&outgoing.topic, &outgoing.ty, &outgoing.value);
		let _ = outgoing.done.send(());
	}

	fn publish_value(&mut self, topic: &Topic, ty: &Type, value: &Value) {
		if let Err(mismatch) = type_check(value, ty) {
			tracing::warn!(topic = %topic, %mismatch, "outgoing value fails its declared type");
			return;
		}
		self.client
			.publish(Message::new(topic.clone(), value.to_string(), true));
	}

	fn drain_outgoing(&mut self) {
		while let Ok(outgoing) = self.channels.outgoing.1.try_recv() {
			self.handle_outgoing(outgoing);
		}
	}

	/// Removes the previous contract's bindings. Flag flips come first and
	/// the outgoing drain second, so an emitter blocked on its barrier
	/// (holding its bus lock) is released before `unsubscribe` needs that
	/// lock; emitters re-check the flag after enqueueing, which makes any
	/// message a producer still waits on visible to the drain.
	async fn teardown_bindings(&mut self) {
		let subscriptions = std::mem::take(&mut self.subscriptions);
		for subscription in &subscriptions {
			subscription.cancelled.store(true, Ordering::SeqCst);
		}
		self.drain_outgoing();
		for subscription in subscriptions {
			subscription.bus.unsubscribe(subscription.id);
		}

		let topics: Vec<Topic> = self.callables.keys().cloned().collect();
		self.callables.clear();
		for topic in topics {
			if let Err(error) = self.client.unsubscribe(&topic).await {
				tracing::warn!(topic = %topic, %error, "failed to unsubscribe call topic");
			}
		}
	}

	async fn shutdown_cleanup(&mut self) {
		self.liveness.kill();
		// Release producers that slipped past the gate: dropping a queued
		// outgoing message drops its barrier sender.
		while self.channels.outgoing.1.try_recv().is_ok() {}
		while self.channels.contract.1.try_recv().is_ok() {}
		while self.channels.completion.1.try_recv().is_ok() {}

		self.client.disconnect_with_will().await;

		let subscriptions = std::mem::take(&mut self.subscriptions);
		for subscription in &subscriptions {
			subscription.cancelled.store(true, Ordering::SeqCst);
		}
		for subscription in subscriptions {
			subscription.bus.unsubscribe(subscription.id);
		}
	}
}
