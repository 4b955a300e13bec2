use crate::contract::Contract;
use arbor_mqtt_provider::Topic;

/// Visits every node exactly once, passing the topic path accumulated from
/// the root. Map keys become path components verbatim; constants, values,
/// and callables descend into their subcontract at the same path.
pub fn traverse<F>(contract: &Contract, mut visit: F)
where
	F: FnMut(&Contract, &Topic),
{
	walk(contract, &mut visit, Topic::empty());
}

fn walk<F>(contract: &Contract, visit: &mut F, topic: Topic)
where
	F: FnMut(&Contract, &Topic),
{
	visit(contract, &topic);

	match contract {
		Contract::Map(children) => {
			for (name, child) in children {
				walk(child, visit, Topic::join([topic.as_str(), name.as_str()]));
			}
		}
		Contract::Constant(constant) => {
			if let Some(sub) = &constant.subcontract {
				walk(sub, visit, topic);
			}
		}
		Contract::Value(value) => {
			if let Some(sub) = &value.subcontract {
				walk(sub, visit, topic);
			}
		}
		Contract::Callable(callable) => {
			if let Some(sub) = &callable.subcontract {
				walk(sub, visit, topic);
			}
		}
	}
}
