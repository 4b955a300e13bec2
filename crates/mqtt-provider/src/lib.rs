//! The transport seam between an arbor service and a concrete MQTT client.
//!
//! The core never talks to a broker library directly; it consumes the
//! [`MqttClient`] capability defined here. Wrappers around real clients
//! (paho, rumqttc, …) live outside this workspace.

mod topic;

use async_trait::async_trait;
use bytes::Bytes;
use std::error::Error as StdError;
use thiserror::Error;

pub use topic::Topic;

/// A single MQTT message, either direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
	pub topic: Topic,
	pub payload: Bytes,
	pub retain: bool,
}

impl Message {
	pub fn new(topic: Topic, payload: impl Into<Bytes>, retain: bool) -> Self {
		Message {
			topic,
			payload: payload.into(),
			retain,
		}
	}

	pub fn payload_str(&self) -> Result<&str, std::str::Utf8Error> {
		std::str::from_utf8(&self.payload)
	}
}

/// Why the transport went away.
#[derive(Debug)]
pub enum Disconnect {
	/// Orderly close, requested by the service.
	Clean,
	/// The connection was lost or the client failed.
	Lost(MqttError),
}

/// Transport-level failure reported by an [`MqttClient`] implementation.
#[derive(Debug, Error)]
#[error("{context}")]
pub struct MqttError {
	context: String,
	#[source]
	source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl MqttError {
	pub fn new(context: impl Into<String>) -> Self {
		MqttError {
			context: context.into(),
			source: None,
		}
	}

	pub fn with_source(
		context: impl Into<String>,
		source: impl StdError + Send + Sync + 'static,
	) -> Self {
		MqttError {
			context: context.into(),
			source: Some(Box::new(source)),
		}
	}
}

/// Everything a client needs to start delivering events to the service.
///
/// Both senders feed the connection loop; the will message is registered
/// with the broker and published by it if the service dies ungracefully.
#[derive(Clone)]
pub struct ConnectConfig {
	pub on_disconnect: flume::Sender<Disconnect>,
	pub on_message: flume::Sender<Message>,
	pub will: Message,
}

/// The narrow client capability the service core consumes.
///
/// `publish` is fire-and-forget: implementations may queue internally and
/// surface delivery failures through `on_disconnect`. `subscribe` must not
/// return before the subscription is active on the broker.
#[async_trait]
pub trait MqttClient: Send + 'static {
	async fn connect(&mut self, config: ConnectConfig) -> Result<(), MqttError>;

	fn publish(&mut self, message: Message);

	async fn subscribe(&mut self, filter: &Topic) -> Result<(), MqttError>;

	async fn unsubscribe(&mut self, filter: &Topic) -> Result<(), MqttError>;

	/// Disconnect, asking the broker to publish the registered will.
	async fn disconnect_with_will(&mut self);

	async fn disconnect(&mut self);
}
