//! The service side of an arbor mesh.
//!
//! A [`Connection`] publishes a contract to its well-known retained topic,
//! streams bus values to per-endpoint retained topics, and dispatches
//! incoming calls to contract handlers. One task runs the whole show: the
//! connection loop owns every piece of mutable service state and talks to
//! the rest of the process through channels.
//!
//! ```no_run
//! # use arbor_service::{Connection, ConnectionOptions};
//! # use arbor_service::contract::{int_const, map};
//! # async fn example(client: impl arbor_service::mqtt::MqttClient) {
//! let options = ConnectionOptions::new(client, "/things/fidget", "/");
//! let mut connection = Connection::new(options);
//! let handle = connection.handle();
//! connection.connect().await.unwrap();
//!
//! let _ = handle.update_contract(Some(map([("answer", int_const(42))])));
//! connection.run().await.unwrap();
//! # }
//! ```

mod connection;
mod error;
mod liveness;
mod options;
mod topics;

pub use connection::{Connection, ConnectionHandle};
pub use error::{ConnectError, ConnectionDead, LoopError};
pub use options::{ConnectionOptions, ContractCallback};

pub use arbor_bus as bus;
pub use arbor_contract as contract;
pub use arbor_mqtt_provider as mqtt;
