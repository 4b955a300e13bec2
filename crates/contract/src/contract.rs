use crate::error::DecodeError;
use crate::types::Type;
use arbor_bus::AnyBus;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callable implementation. Receives the (already type-checked) argument
/// and returns the result value; a void callable returns `Value::Null`.
pub type CallHandler = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A service capability tree.
///
/// Equality and the codec cover the declarative part only: the `bus` and
/// `handler` bindings exist in-process and never travel. A decoded
/// contract therefore comes back with unbound value and callable nodes.
#[derive(Clone)]
pub enum Contract {
	Map(BTreeMap<String, Contract>),
	Constant(Constant),
	Value(ValueNode),
	Callable(Callable),
}

/// A static advertised value.
#[derive(Clone)]
pub struct Constant {
	pub value: Value,
	pub subcontract: Option<Box<Contract>>,
}

/// A live, typed variable backed by a bus.
#[derive(Clone)]
pub struct ValueNode {
	pub ty: Type,
	pub subcontract: Option<Box<Contract>>,
	pub bus: Option<Arc<dyn AnyBus>>,
}

/// An invokable method.
#[derive(Clone)]
pub struct Callable {
	pub argument: Type,
	pub retval: Type,
	pub subcontract: Option<Box<Contract>>,
	pub handler: Option<CallHandler>,
	/// Run the handler on a worker instead of inline in the service loop.
	pub asynchronous: bool,
}

impl Contract {
	pub fn encode(&self) -> Value {
		match self {
			Contract::Map(children) => {
				let children = children
					.iter()
					.map(|(name, child)| (name.clone(), child.encode()))
					.collect();
				Value::Object(children)
			}
			Contract::Constant(constant) => {
				let mut obj = serde_json::Map::new();
				obj.insert("_t".to_owned(), Value::from("constant"));
				obj.insert("value".to_owned(), constant.value.clone());
				obj.insert(
					"subcontract".to_owned(),
					Self::encode_opt(constant.subcontract.as_deref()),
				);
				Value::Object(obj)
			}
			Contract::Value(value) => {
				let mut obj = serde_json::Map::new();
				obj.insert("_t".to_owned(), Value::from("value"));
				obj.insert("type".to_owned(), value.ty.encode());
				obj.insert(
					"subcontract".to_owned(),
					Self::encode_opt(value.subcontract.as_deref()),
				);
				Value::Object(obj)
			}
			Contract::Callable(callable) => {
				let mut obj = serde_json::Map::new();
				obj.insert("_t".to_owned(), Value::from("callable"));
				obj.insert("argument".to_owned(), callable.argument.encode());
				obj.insert("retval".to_owned(), callable.retval.encode());
				obj.insert(
					"subcontract".to_owned(),
					Self::encode_opt(callable.subcontract.as_deref()),
				);
				Value::Object(obj)
			}
		}
	}

	/// The absent contract encodes as JSON null; this is also the will
	/// payload that removes a dead service's contract.
	pub fn encode_opt(contract: Option<&Contract>) -> Value {
		match contract {
			None => Value::Null,
			Some(contract) => contract.encode(),
		}
	}

	pub fn decode(value: &Value) -> Result<Option<Contract>, DecodeError> {
		match value {
			Value::Null => Ok(None),
			Value::Object(obj) => {
				if let Some(tag) = obj.get("_t") {
					let tag = tag.as_str().ok_or(DecodeError::TagNotString)?;
					match tag {
						"value" => return Ok(Some(Self::decode_value(obj)?)),
						"callable" => return Ok(Some(Self::decode_callable(obj)?)),
						"constant" => return Ok(Some(Self::decode_constant(obj)?)),
						other => {
							return Err(DecodeError::UnknownContractNode(other.to_owned()));
						}
					}
				}
				Ok(Some(Self::decode_map(obj)?))
			}
			_ => Err(DecodeError::ContractNotObject),
		}
	}

	fn decode_subcontract(
		obj: &serde_json::Map<String, Value>,
		on: &'static str,
	) -> Result<Option<Box<Contract>>, DecodeError> {
		let sub = match obj.get("subcontract") {
			None => None,
			Some(sub) => {
				Self::decode(sub).map_err(DecodeError::of(format!("subcontract on {on}")))?
			}
		};
		Ok(sub.map(Box::new))
	}

	fn decode_value(obj: &serde_json::Map<String, Value>) -> Result<Contract, DecodeError> {
		let ty = obj.get("type").ok_or(DecodeError::MissingField {
			kind: "value",
			field: "type",
		})?;
		let ty = Type::decode(ty).map_err(DecodeError::of("type on value"))?;
		Ok(Contract::Value(ValueNode {
			ty,
			subcontract: Self::decode_subcontract(obj, "value")?,
			bus: None,
		}))
	}

	fn decode_callable(obj: &serde_json::Map<String, Value>) -> Result<Contract, DecodeError> {
		let argument = obj.get("argument").ok_or(DecodeError::MissingField {
			kind: "callable",
			field: "argument",
		})?;
		let argument = Type::decode(argument).map_err(DecodeError::of("argument on callable"))?;
		let retval = obj.get("retval").ok_or(DecodeError::MissingField {
			kind: "callable",
			field: "retval",
		})?;
		let retval = Type::decode(retval).map_err(DecodeError::of("retval on callable"))?;
		Ok(Contract::Callable(Callable {
			argument,
			retval,
			subcontract: Self::decode_subcontract(obj, "callable")?,
			handler: None,
			asynchronous: false,
		}))
	}

	fn decode_constant(obj: &serde_json::Map<String, Value>) -> Result<Contract, DecodeError> {
		let value = obj
			.get("value")
			.ok_or(DecodeError::MissingField {
				kind: "constant",
				field: "value",
			})?
			.clone();
		Ok(Contract::Constant(Constant {
			value,
			subcontract: Self::decode_subcontract(obj, "constant")?,
		}))
	}

	fn decode_map(obj: &serde_json::Map<String, Value>) -> Result<Contract, DecodeError> {
		let mut children = BTreeMap::new();
		for (name, child) in obj {
			let child =
				Self::decode(child).map_err(DecodeError::of(format!("field {name}")))?;
			// An explicitly null child is the same as no child at all.
			if let Some(child) = child {
				children.insert(name.clone(), child);
			}
		}
		Ok(Contract::Map(children))
	}
}

impl PartialEq for Contract {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Contract::Map(a), Contract::Map(b)) => a == b,
			(Contract::Constant(a), Contract::Constant(b)) => {
				a.value == b.value && a.subcontract == b.subcontract
			}
			(Contract::Value(a), Contract::Value(b)) => {
				a.ty == b.ty && a.subcontract == b.subcontract
			}
			(Contract::Callable(a), Contract::Callable(b)) => {
				a.argument == b.argument
					&& a.retval == b.retval
					&& a.subcontract == b.subcontract
					&& a.asynchronous == b.asynchronous
			}
			_ => false,
		}
	}
}

impl fmt::Debug for Contract {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Contract::Map(children) => f.debug_map().entries(children.iter()).finish(),
			Contract::Constant(constant) => f
				.debug_struct("Constant")
				.field("value", &constant.value)
				.field("subcontract", &constant.subcontract)
				.finish(),
			Contract::Value(value) => f
				.debug_struct("Value")
				.field("ty", &value.ty)
				.field("subcontract", &value.subcontract)
				.field("bound", &value.bus.is_some())
				.finish(),
			Contract::Callable(callable) => f
				.debug_struct("Callable")
				.field("argument", &callable.argument)
				.field("retval", &callable.retval)
				.field("subcontract", &callable.subcontract)
				.field("asynchronous", &callable.asynchronous)
				.field("bound", &callable.handler.is_some())
				.finish(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_matches::assert_matches;
	use serde_json::json;

	fn unbound_value(ty: Type) -> Contract {
		Contract::Value(ValueNode {
			ty,
			subcontract: None,
			bus: None,
		})
	}

	#[test]
	fn null_is_the_absent_contract() {
		assert_matches!(Contract::decode(&json!(null)), Ok(None));
		assert_eq!(Contract::encode_opt(None), json!(null));
	}

	#[test]
	fn tagless_objects_decode_as_maps() {
		let decoded = Contract::decode(&json!({
			"a": {"_t": "constant", "value": 3, "subcontract": null},
			"b": {},
		}))
		.unwrap()
		.unwrap();

		assert_eq!(
			decoded,
			Contract::Map(BTreeMap::from([
				(
					"a".to_owned(),
					Contract::Constant(Constant {
						value: json!(3),
						subcontract: None,
					})
				),
				("b".to_owned(), Contract::Map(BTreeMap::new())),
			]))
		);
	}

	#[test]
	fn declarative_trees_roundtrip() {
		let contract = Contract::Map(BTreeMap::from([
			(
				"status".to_owned(),
				Contract::Value(ValueNode {
					ty: Type::string(),
					subcontract: Some(Box::new(Contract::Map(BTreeMap::from([(
						"description".to_owned(),
						Contract::Constant(Constant {
							value: json!("current status"),
							subcontract: None,
						}),
					)])))),
					bus: None,
				}),
			),
			(
				"reset".to_owned(),
				Contract::Callable(Callable {
					argument: Type::null(),
					retval: Type::void(),
					subcontract: None,
					handler: None,
					asynchronous: false,
				}),
			),
			("version".to_owned(), Contract::Constant(Constant {
				value: json!([1, 4]),
				subcontract: None,
			})),
		]));

		let decoded = Contract::decode(&contract.encode()).unwrap().unwrap();
		assert_eq!(decoded, contract);
	}

	#[test]
	fn busses_and_handlers_stay_off_the_wire() {
		let bound = Contract::Value(ValueNode {
			ty: Type::int(),
			subcontract: None,
			bus: Some(Arc::new(arbor_bus::IntBus::new(7))),
		});
		let unbound = unbound_value(Type::int());
		assert_eq!(bound.encode(), unbound.encode());

		let decoded = Contract::decode(&bound.encode()).unwrap().unwrap();
		assert_matches!(&decoded, Contract::Value(v) if v.bus.is_none());
	}

	#[test]
	fn unknown_node_tags_are_rejected() {
		assert_matches!(
			Contract::decode(&json!({"_t": "gadget"})),
			Err(DecodeError::UnknownContractNode(tag)) if tag == "gadget"
		);
	}

	#[test]
	fn scalar_contracts_are_rejected() {
		assert_matches!(
			Contract::decode(&json!(42)),
			Err(DecodeError::ContractNotObject)
		);
	}
}
