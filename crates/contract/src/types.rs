use crate::error::DecodeError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Untyped annotations attached to a type (`min`, `max`, `description`,
/// `ui_tags`, …). Restored verbatim by the codec.
pub type Meta = serde_json::Map<String, Value>;

/// A self-describing type: a descriptor plus optional metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Type {
	pub meta: Meta,
	pub descr: TypeDescr,
}

/// The closed sum of type shapes.
///
/// `Map` keys are always strings on the wire; the key type is carried for
/// the benefit of consumers only.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDescr {
	Void,
	Null,
	Bool,
	Int,
	Float,
	String,
	Literal(Value),
	List(Box<Type>),
	Map { key: Box<Type>, value: Box<Type> },
	Struct(BTreeMap<String, Type>),
	Tuple(Vec<Type>),
	Union(Vec<Type>),
}

impl Type {
	fn plain(descr: TypeDescr) -> Self {
		Type {
			meta: Meta::new(),
			descr,
		}
	}

	pub fn void() -> Self {
		Self::plain(TypeDescr::Void)
	}

	pub fn null() -> Self {
		Self::plain(TypeDescr::Null)
	}

	pub fn bool() -> Self {
		Self::plain(TypeDescr::Bool)
	}

	pub fn int() -> Self {
		Self::plain(TypeDescr::Int)
	}

	pub fn float() -> Self {
		Self::plain(TypeDescr::Float)
	}

	pub fn string() -> Self {
		Self::plain(TypeDescr::String)
	}

	pub fn literal(value: Value) -> Self {
		Self::plain(TypeDescr::Literal(value))
	}

	pub fn list(element: Type) -> Self {
		Self::plain(TypeDescr::List(Box::new(element)))
	}

	pub fn map(key: Type, value: Type) -> Self {
		Self::plain(TypeDescr::Map {
			key: Box::new(key),
			value: Box::new(value),
		})
	}

	pub fn struct_of<K, I>(fields: I) -> Self
	where
		K: Into<std::string::String>,
		I: IntoIterator<Item = (K, Type)>,
	{
		Self::plain(TypeDescr::Struct(
			fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
		))
	}

	pub fn tuple(items: impl IntoIterator<Item = Type>) -> Self {
		Self::plain(TypeDescr::Tuple(items.into_iter().collect()))
	}

	pub fn union(alternatives: impl IntoIterator<Item = Type>) -> Self {
		Self::plain(TypeDescr::Union(alternatives.into_iter().collect()))
	}

	/// Attaches metadata, replacing any present.
	pub fn with_meta(mut self, meta: Meta) -> Self {
		self.meta = meta;
		self
	}

	/// Adds one metadata entry.
	pub fn meta_entry(mut self, key: impl Into<std::string::String>, value: Value) -> Self {
		self.meta.insert(key.into(), value);
		self
	}
}

impl TypeDescr {
	fn name(&self) -> &'static str {
		match self {
			TypeDescr::Void => "void",
			TypeDescr::Null => "null",
			TypeDescr::Bool => "bool",
			TypeDescr::Int => "int",
			TypeDescr::Float => "float",
			TypeDescr::String => "string",
			TypeDescr::Literal(_) => "literal",
			TypeDescr::List(_) => "list",
			TypeDescr::Map { .. } => "map",
			TypeDescr::Struct(_) => "struct",
			TypeDescr::Tuple(_) => "tuple",
			TypeDescr::Union(_) => "union",
		}
	}
}

impl Type {
	/// Wire form: an object tagged `_t: "type-<name>"`, shape fields per
	/// descriptor, `meta` only when non-empty.
	pub fn encode(&self) -> Value {
		let mut obj = Meta::new();
		obj.insert(
			"_t".to_owned(),
			Value::String(format!("type-{}", self.descr.name())),
		);
		if !self.meta.is_empty() {
			obj.insert("meta".to_owned(), Value::Object(self.meta.clone()));
		}
		match &self.descr {
			TypeDescr::Void
			| TypeDescr::Null
			| TypeDescr::Bool
			| TypeDescr::Int
			| TypeDescr::Float
			| TypeDescr::String => {}
			TypeDescr::Literal(value) => {
				obj.insert("value".to_owned(), value.clone());
			}
			TypeDescr::List(element) => {
				obj.insert("value".to_owned(), element.encode());
			}
			TypeDescr::Map { key, value } => {
				obj.insert("key".to_owned(), key.encode());
				obj.insert("value".to_owned(), value.encode());
			}
			TypeDescr::Struct(fields) => {
				let fields = fields
					.iter()
					.map(|(name, ty)| (name.clone(), ty.encode()))
					.collect();
				obj.insert("fields".to_owned(), Value::Object(fields));
			}
			TypeDescr::Tuple(items) => {
				let items = items.iter().map(Type::encode).collect();
				obj.insert("fields".to_owned(), Value::Array(items));
			}
			TypeDescr::Union(alternatives) => {
				let alternatives = alternatives.iter().map(Type::encode).collect();
				obj.insert("alts".to_owned(), Value::Array(alternatives));
			}
		}
		Value::Object(obj)
	}

	pub fn decode(value: &Value) -> Result<Type, DecodeError> {
		let obj = value.as_object().ok_or(DecodeError::TypeNotObject)?;
		let tag = obj.get("_t").ok_or(DecodeError::MissingTypeTag)?;
		let tag = tag.as_str().ok_or(DecodeError::TagNotString)?;
		let name = tag
			.strip_prefix("type-")
			.ok_or_else(|| DecodeError::UnknownType(tag.to_owned()))?;

		let descr = match name {
			"void" => TypeDescr::Void,
			"null" => TypeDescr::Null,
			"bool" => TypeDescr::Bool,
			"int" => TypeDescr::Int,
			"float" => TypeDescr::Float,
			"string" => TypeDescr::String,
			"literal" => {
				let value = obj
					.get("value")
					.ok_or(DecodeError::MissingField {
						kind: "literal",
						field: "value",
					})?
					.clone();
				TypeDescr::Literal(value)
			}
			"list" => {
				let element = obj.get("value").ok_or(DecodeError::MissingField {
					kind: "list",
					field: "value",
				})?;
				TypeDescr::List(Box::new(
					Type::decode(element).map_err(DecodeError::of("list element type"))?,
				))
			}
			"map" => {
				let key = obj.get("key").ok_or(DecodeError::MissingField {
					kind: "map",
					field: "key",
				})?;
				let value = obj.get("value").ok_or(DecodeError::MissingField {
					kind: "map",
					field: "value",
				})?;
				TypeDescr::Map {
					key: Box::new(Type::decode(key).map_err(DecodeError::of("map key type"))?),
					value: Box::new(
						Type::decode(value).map_err(DecodeError::of("map value type"))?,
					),
				}
			}
			"struct" => {
				let fields = obj
					.get("fields")
					.ok_or(DecodeError::MissingField {
						kind: "struct",
						field: "fields",
					})?
					.as_object()
					.ok_or(DecodeError::MalformedField {
						kind: "struct",
						field: "fields",
					})?;
				let mut decoded = BTreeMap::new();
				for (field, ty) in fields {
					decoded.insert(
						field.clone(),
						Type::decode(ty).map_err(DecodeError::of(format!("field {field}")))?,
					);
				}
				TypeDescr::Struct(decoded)
			}
			"tuple" => {
				let items = obj
					.get("fields")
					.ok_or(DecodeError::MissingField {
						kind: "tuple",
						field: "fields",
					})?
					.as_array()
					.ok_or(DecodeError::MalformedField {
						kind: "tuple",
						field: "fields",
					})?;
				let items = items
					.iter()
					.enumerate()
					.map(|(i, ty)| Type::decode(ty).map_err(DecodeError::of(format!("field {i}"))))
					.collect::<Result<_, _>>()?;
				TypeDescr::Tuple(items)
			}
			"union" => {
				let alternatives = obj
					.get("alts")
					.ok_or(DecodeError::MissingField {
						kind: "union",
						field: "alts",
					})?
					.as_array()
					.ok_or(DecodeError::MalformedField {
						kind: "union",
						field: "alts",
					})?;
				let alternatives = alternatives
					.iter()
					.map(|ty| Type::decode(ty).map_err(DecodeError::of("alt")))
					.collect::<Result<_, _>>()?;
				TypeDescr::Union(alternatives)
			}
			_ => return Err(DecodeError::UnknownType(tag.to_owned())),
		};

		let meta = match obj.get("meta") {
			Some(Value::Object(meta)) => meta.clone(),
			_ => Meta::new(),
		};

		Ok(Type { meta, descr })
	}
}

impl fmt::Display for Type {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.descr, f)?;
		if !self.meta.is_empty() {
			let entries: Vec<_> = self
				.meta
				.iter()
				.map(|(k, v)| format!("{k}: {v}"))
				.collect();
			write!(f, " <{}>", entries.join(", "))?;
		}
		Ok(())
	}
}

// Display is only used in mismatch and log messages, so it favors
// readability over being parseable.
impl fmt::Display for TypeDescr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TypeDescr::Literal(value) => write!(f, "literal {value}"),
			TypeDescr::List(element) => write!(f, "list [{element}]"),
			TypeDescr::Map { key, value } => write!(f, "map [{key} -> {value}]"),
			TypeDescr::Struct(fields) => {
				let fields: Vec<_> = fields
					.iter()
					.map(|(name, ty)| format!("{name}: {ty}"))
					.collect();
				write!(f, "struct {{{}}}", fields.join(", "))
			}
			TypeDescr::Tuple(items) => {
				let items: Vec<_> = items.iter().map(Type::to_string).collect();
				write!(f, "tuple ({})", items.join(", "))
			}
			TypeDescr::Union(alternatives) => {
				let alternatives: Vec<_> = alternatives.iter().map(Type::to_string).collect();
				write!(f, "union ({})", alternatives.join(" | "))
			}
			other => f.write_str(other.name()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_matches::assert_matches;
	use serde_json::json;

	fn meta(entries: Value) -> Meta {
		match entries {
			Value::Object(m) => m,
			_ => unreachable!(),
		}
	}

	#[test]
	fn primitives_roundtrip() {
		for ty in [
			Type::void(),
			Type::null(),
			Type::bool(),
			Type::int(),
			Type::float(),
			Type::string(),
		] {
			let decoded = Type::decode(&ty.encode()).unwrap();
			assert_eq!(decoded, ty);
		}
	}

	#[test]
	fn nested_type_roundtrips_with_meta() {
		let ty = Type::map(
			Type::string(),
			Type::union([
				Type::float().with_meta(meta(json!({"min": 0, "max": 20}))),
				Type::struct_of([
					("foo", Type::int()),
					("bar", Type::list(Type::literal(json!("ok")))),
				]),
				Type::tuple([Type::bool(), Type::null()]),
			]),
		)
		.meta_entry("description", json!("a contrived schema"));

		let decoded = Type::decode(&ty.encode()).unwrap();
		assert_eq!(decoded, ty);
	}

	#[test]
	fn wire_shape_uses_prefixed_tags() {
		let encoded = Type::float()
			.with_meta(meta(json!({"min": 0, "max": 20})))
			.encode();
		assert_eq!(
			encoded,
			json!({"_t": "type-float", "meta": {"min": 0, "max": 20}})
		);
	}

	#[test]
	fn empty_meta_is_omitted() {
		assert_eq!(Type::int().encode(), json!({"_t": "type-int"}));
	}

	#[test]
	fn unknown_tags_are_rejected() {
		assert_matches!(
			Type::decode(&json!({"_t": "type-quux"})),
			Err(DecodeError::UnknownType(tag)) if tag == "type-quux"
		);
		assert_matches!(
			Type::decode(&json!({"_t": "float"})),
			Err(DecodeError::UnknownType(_))
		);
	}

	#[test]
	fn literal_without_value_is_rejected() {
		assert_matches!(
			Type::decode(&json!({"_t": "type-literal"})),
			Err(DecodeError::MissingField {
				kind: "literal",
				field: "value",
			})
		);
	}

	#[test]
	fn display_is_readable() {
		let ty = Type::struct_of([("foo", Type::int()), ("bar", Type::string())]);
		assert_eq!(ty.to_string(), "struct {bar: string, foo: int}");
		assert_eq!(
			Type::union([Type::float(), Type::null()]).to_string(),
			"union (float | null)"
		);
	}
}
