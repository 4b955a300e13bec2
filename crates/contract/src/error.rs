use thiserror::Error;

/// Failure to decode a type schema or contract from its wire form.
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("type is not an object")]
	TypeNotObject,

	#[error("no _t field in type")]
	MissingTypeTag,

	#[error("_t is not a string")]
	TagNotString,

	#[error("no such type: {0}")]
	UnknownType(String),

	#[error("no such contract node: {0}")]
	UnknownContractNode(String),

	#[error("contract is neither an object nor null")]
	ContractNotObject,

	#[error("{kind} has no {field}")]
	MissingField {
		kind: &'static str,
		field: &'static str,
	},

	#[error("{field} of {kind} has the wrong shape")]
	MalformedField {
		kind: &'static str,
		field: &'static str,
	},

	#[error("cannot decode {what}: {source}")]
	In {
		what: String,
		#[source]
		source: Box<DecodeError>,
	},
}

impl DecodeError {
	/// Wraps an error with the path context it occurred under.
	pub(crate) fn of(what: impl Into<String>) -> impl FnOnce(DecodeError) -> DecodeError {
		let what = what.into();
		move |source| DecodeError::In {
			what,
			source: Box::new(source),
		}
	}
}
