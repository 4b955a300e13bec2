//! Convenience constructors for common contract shapes.

use crate::contract::{Callable, CallHandler, Constant, Contract, ValueNode};
use crate::types::Type;
use arbor_bus::AnyBus;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a map node from `(name, child)` pairs.
pub fn map<K, I>(children: I) -> Contract
where
	K: Into<String>,
	I: IntoIterator<Item = (K, Contract)>,
{
	Contract::Map(
		children
			.into_iter()
			.map(|(name, child)| (name.into(), child))
			.collect(),
	)
}

/// A settable live value: a typed `Value` node bound to `bus`, whose
/// subcontract carries a void `set` callable running `handler`.
pub fn property(
	ty: Type,
	bus: Arc<dyn AnyBus>,
	handler: CallHandler,
	asynchronous: bool,
) -> Contract {
	property_with::<String, _>(ty, bus, handler, asynchronous, [])
}

/// [`property`], with extra children merged into the subcontract next to
/// `set`.
pub fn property_with<K, I>(
	ty: Type,
	bus: Arc<dyn AnyBus>,
	handler: CallHandler,
	asynchronous: bool,
	children: I,
) -> Contract
where
	K: Into<String>,
	I: IntoIterator<Item = (K, Contract)>,
{
	let mut subcontract = BTreeMap::from([(
		"set".to_owned(),
		Contract::Callable(Callable {
			argument: ty.clone(),
			retval: Type::void(),
			subcontract: Some(Box::new(Contract::Map(BTreeMap::new()))),
			handler: Some(handler),
			asynchronous,
		}),
	)]);
	for (name, child) in children {
		subcontract.insert(name.into(), child);
	}

	Contract::Value(ValueNode {
		ty,
		subcontract: Some(Box::new(Contract::Map(subcontract))),
		bus: Some(bus),
	})
}

pub fn json_const(value: Value) -> Contract {
	Contract::Constant(Constant {
		value,
		subcontract: None,
	})
}

pub fn string_const(value: impl Into<String>) -> Contract {
	json_const(Value::from(value.into()))
}

pub fn int_const(value: i64) -> Contract {
	json_const(Value::from(value))
}

pub fn float_const(value: f64) -> Contract {
	json_const(Value::from(value))
}
