//! The contract layer: a service's capabilities as a typed tree.
//!
//! A contract is a tree of maps, constants, live values, and callables.
//! Types are self-describing and travel with the contract; every wire
//! boundary re-checks payloads against them structurally.

mod check;
mod contract;
mod error;
mod shorthand;
mod traverse;
mod types;

pub use check::{TypeMismatch, type_check};
pub use contract::{Callable, CallHandler, Constant, Contract, ValueNode};
pub use error::DecodeError;
pub use shorthand::{
	float_const, int_const, json_const, map, property, property_with, string_const,
};
pub use traverse::traverse;
pub use types::{Meta, Type, TypeDescr};
