//! Reactive value holders.
//!
//! A bus owns one value of a fixed kind and broadcasts changes to its
//! subscribers. Buses are the only source of value-change events in an
//! arbor service: every live contract node is bound to one.

mod bus;
mod options;
mod value;

pub use bus::{AnyBus, BoolBus, Bus, FloatBus, IntBus, JsonBus, StringBus};
pub use options::Options;
pub use value::{AvgWindow, BusValue, same_value};

/// Identifies one subscription on one bus. Never reused while active.
pub type SubscriptionId = u64;

/// Change callback. Receives the new value in its JSON encoding.
///
/// Handlers run while the bus lock is held: a handler must not call back
/// into the bus that invoked it.
pub type Handler = Box<dyn FnMut(&serde_json::Value) + Send>;
