use crate::types::{Type, TypeDescr};
use arbor_bus::same_value;
use serde_json::Value;
use thiserror::Error;

/// Why a value failed to match a type. The chain of `Field`/`Element`
/// wrappers points at the first offending spot.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TypeMismatch {
	#[error("no value can inhabit void")]
	Void,

	#[error("expected {expected}, got {got}")]
	Kind {
		expected: &'static str,
		got: &'static str,
	},

	#[error("value is not the literal {expected}")]
	Literal { expected: String },

	#[error("number of fields differs: expected {expected}, got {got}")]
	FieldCount { expected: usize, got: usize },

	#[error("unexpected field {name:?}")]
	UnknownField { name: String },

	#[error("field {name:?}: {source}")]
	Field {
		name: String,
		source: Box<TypeMismatch>,
	},

	#[error("element {index}: {source}")]
	Element {
		index: usize,
		source: Box<TypeMismatch>,
	},

	#[error("empty union admits no value")]
	EmptyUnion,

	#[error("no union alternative matched: {causes}")]
	NoAlternative { causes: String },
}

fn kind_of(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

fn expect_kind(value: &Value, expected: &'static str, ok: bool) -> Result<(), TypeMismatch> {
	if ok {
		Ok(())
	} else {
		Err(TypeMismatch::Kind {
			expected,
			got: kind_of(value),
		})
	}
}

/// Structural check of a dynamic value against a type.
///
/// Total and deterministic; stops at the first mismatch and reports its
/// location. `Int` and `Float` both accept any number, since the wire has
/// a single number kind.
pub fn type_check(value: &Value, ty: &Type) -> Result<(), TypeMismatch> {
	match &ty.descr {
		TypeDescr::Void => Err(TypeMismatch::Void),
		TypeDescr::Null => expect_kind(value, "null", value.is_null()),
		TypeDescr::Bool => expect_kind(value, "bool", value.is_boolean()),
		TypeDescr::Int | TypeDescr::Float => expect_kind(value, "number", value.is_number()),
		TypeDescr::String => expect_kind(value, "string", value.is_string()),
		TypeDescr::Literal(expected) => {
			if same_value(value, expected) {
				Ok(())
			} else {
				Err(TypeMismatch::Literal {
					expected: expected.to_string(),
				})
			}
		}
		TypeDescr::List(element) => {
			let items = value.as_array().ok_or(TypeMismatch::Kind {
				expected: "array",
				got: kind_of(value),
			})?;
			for (index, item) in items.iter().enumerate() {
				type_check(item, element).map_err(|source| TypeMismatch::Element {
					index,
					source: Box::new(source),
				})?;
			}
			Ok(())
		}
		TypeDescr::Map { value: value_ty, .. } => {
			let entries = value.as_object().ok_or(TypeMismatch::Kind {
				expected: "object",
				got: kind_of(value),
			})?;
			for (name, entry) in entries {
				type_check(entry, value_ty).map_err(|source| TypeMismatch::Field {
					name: name.clone(),
					source: Box::new(source),
				})?;
			}
			Ok(())
		}
		TypeDescr::Struct(fields) => {
			let entries = value.as_object().ok_or(TypeMismatch::Kind {
				expected: "object",
				got: kind_of(value),
			})?;
			if entries.len() != fields.len() {
				return Err(TypeMismatch::FieldCount {
					expected: fields.len(),
					got: entries.len(),
				});
			}
			for (name, entry) in entries {
				let field_ty = fields.get(name).ok_or_else(|| TypeMismatch::UnknownField {
					name: name.clone(),
				})?;
				type_check(entry, field_ty).map_err(|source| TypeMismatch::Field {
					name: name.clone(),
					source: Box::new(source),
				})?;
			}
			Ok(())
		}
		TypeDescr::Tuple(items) => {
			let entries = value.as_array().ok_or(TypeMismatch::Kind {
				expected: "array",
				got: kind_of(value),
			})?;
			if entries.len() != items.len() {
				return Err(TypeMismatch::FieldCount {
					expected: items.len(),
					got: entries.len(),
				});
			}
			for (index, (entry, item_ty)) in entries.iter().zip(items).enumerate() {
				type_check(entry, item_ty).map_err(|source| TypeMismatch::Element {
					index,
					source: Box::new(source),
				})?;
			}
			Ok(())
		}
		TypeDescr::Union(alternatives) => {
			if alternatives.is_empty() {
				return Err(TypeMismatch::EmptyUnion);
			}
			let mut causes = Vec::with_capacity(alternatives.len());
			for alternative in alternatives {
				match type_check(value, alternative) {
					Ok(()) => return Ok(()),
					Err(cause) => causes.push(format!("{alternative}: {cause}")),
				}
			}
			Err(TypeMismatch::NoAlternative {
				causes: causes.join("; "),
			})
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Meta;
	use assert_matches::assert_matches;
	use serde_json::json;

	fn meta(entries: Value) -> Meta {
		match entries {
			Value::Object(m) => m,
			_ => unreachable!(),
		}
	}

	#[test]
	fn void_rejects_everything() {
		for v in [json!(null), json!(0), json!({})] {
			assert_matches!(type_check(&v, &Type::void()), Err(TypeMismatch::Void));
		}
	}

	#[test]
	fn primitives_accept_their_kind_only() {
		assert!(type_check(&json!(null), &Type::null()).is_ok());
		assert!(type_check(&json!(true), &Type::bool()).is_ok());
		assert!(type_check(&json!("x"), &Type::string()).is_ok());
		assert!(type_check(&json!(1), &Type::int()).is_ok());
		assert!(type_check(&json!(1.5), &Type::int()).is_ok());
		assert!(type_check(&json!(1), &Type::float()).is_ok());

		assert_matches!(
			type_check(&json!("x"), &Type::bool()),
			Err(TypeMismatch::Kind {
				expected: "bool",
				got: "string",
			})
		);
	}

	#[test]
	fn struct_checks_exact_field_set() {
		let ty = Type::struct_of([("foo", Type::int()), ("bar", Type::string())]);

		assert!(type_check(&json!({"foo": 45, "bar": "baz"}), &ty).is_ok());
		assert_matches!(
			type_check(&json!({"foo": 45}), &ty),
			Err(TypeMismatch::FieldCount {
				expected: 2,
				got: 1,
			})
		);
		assert_matches!(
			type_check(&json!({"foo": 45, "bar": "baz", "q": 1}), &ty),
			Err(TypeMismatch::FieldCount { .. })
		);
		assert_matches!(
			type_check(&json!({"foo": 45, "quux": "baz"}), &ty),
			Err(TypeMismatch::UnknownField { name }) if name == "quux"
		);
		assert_matches!(
			type_check(&json!({"foo": "no", "bar": "baz"}), &ty),
			Err(TypeMismatch::Field { name, .. }) if name == "foo"
		);
	}

	#[test]
	fn union_accepts_any_alternative() {
		let ty = Type::union([
			Type::float().with_meta(meta(json!({"min": 0, "max": 1}))),
			Type::struct_of([("foo", Type::int()), ("bar", Type::string())]),
		]);

		assert!(type_check(&json!(0.5), &ty).is_ok());
		assert!(type_check(&json!({"foo": 1, "bar": "x"}), &ty).is_ok());
		assert_matches!(
			type_check(&json!("hello"), &ty),
			Err(TypeMismatch::NoAlternative { .. })
		);
	}

	#[test]
	fn empty_union_rejects() {
		assert_matches!(
			type_check(&json!(1), &Type::union([])),
			Err(TypeMismatch::EmptyUnion)
		);
	}

	#[test]
	fn literal_matches_structurally() {
		let ty = Type::literal(json!("ok"));
		assert!(type_check(&json!("ok"), &ty).is_ok());
		assert_matches!(
			type_check(&json!("OK"), &ty),
			Err(TypeMismatch::Literal { .. })
		);

		// Number literals compare as doubles.
		assert!(type_check(&json!(7.0), &Type::literal(json!(7))).is_ok());
	}

	#[test]
	fn list_reports_the_offending_element() {
		let ty = Type::list(Type::int());
		assert!(type_check(&json!([1, 2, 3]), &ty).is_ok());
		assert!(type_check(&json!([]), &ty).is_ok());
		assert_matches!(
			type_check(&json!([1, "x", 3]), &ty),
			Err(TypeMismatch::Element { index: 1, .. })
		);
	}

	#[test]
	fn map_checks_entry_values() {
		let ty = Type::map(Type::string(), Type::bool());
		assert!(type_check(&json!({"a": true, "b": false}), &ty).is_ok());
		assert_matches!(
			type_check(&json!({"a": true, "b": 3}), &ty),
			Err(TypeMismatch::Field { name, .. }) if name == "b"
		);
	}

	#[test]
	fn tuple_checks_length_and_positions() {
		let ty = Type::tuple([Type::int(), Type::string()]);
		assert!(type_check(&json!([1, "x"]), &ty).is_ok());
		assert_matches!(
			type_check(&json!([1]), &ty),
			Err(TypeMismatch::FieldCount { .. })
		);
		assert_matches!(
			type_check(&json!(["x", 1]), &ty),
			Err(TypeMismatch::Element { index: 0, .. })
		);
	}

	#[test]
	fn checking_is_clone_invariant() {
		let ty = Type::union([
			Type::list(Type::literal(json!({"k": [1, 2.5, null]}))),
			Type::struct_of([("foo", Type::tuple([Type::bool()]))]),
		]);
		for v in [
			json!([{"k": [1, 2.5, null]}]),
			json!({"foo": [true]}),
			json!({"foo": [true, 1]}),
			json!(42),
		] {
			assert_eq!(type_check(&v, &ty), type_check(&v.clone(), &ty));
		}
	}
}
