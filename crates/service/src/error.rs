use arbor_mqtt_provider::MqttError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectError {
	#[error("already connected")]
	AlreadyConnected,

	#[error("failed to connect to MQTT broker")]
	Connect {
		#[source]
		source: MqttError,
	},
}

#[derive(Debug, Error)]
pub enum LoopError {
	#[error("loop started before connect")]
	NotConnected,

	#[error("mqtt transport failed")]
	Transport {
		#[source]
		source: MqttError,
	},

	#[error("event channels closed unexpectedly")]
	ChannelsClosed,
}

/// The loop has exited; nothing sent through a handle will be seen.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("the connection loop has terminated")]
pub struct ConnectionDead;
