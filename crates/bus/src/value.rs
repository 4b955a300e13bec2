use crate::options::Options;
use serde_json::Value;
use std::collections::VecDeque;

/// Structural equality over dynamic values.
///
/// Numbers compare as IEEE doubles (`7` equals `7.0`); objects compare as
/// key sets with recursively equal values, ignoring entry order. This is
/// the equality used for deduplication and for literal type checks.
pub fn same_value(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Null, Value::Null) => true,
		(Value::Bool(x), Value::Bool(y)) => x == y,
		(Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
		(Value::String(x), Value::String(y)) => x == y,
		(Value::Array(x), Value::Array(y)) => {
			x.len() == y.len() && x.iter().zip(y).all(|(v, w)| same_value(v, w))
		}
		(Value::Object(x), Value::Object(y)) => {
			x.len() == y.len()
				&& x.iter()
					.all(|(k, v)| y.get(k).is_some_and(|w| same_value(v, w)))
		}
		_ => false,
	}
}

/// Moving-average state for float buses.
#[derive(Default)]
pub struct AvgWindow {
	reset: bool,
	samples: VecDeque<f64>,
}

impl AvgWindow {
	fn mean_with(&mut self, size: usize, value: f64) -> f64 {
		if self.reset {
			self.samples.clear();
			self.reset = false;
		}
		self.samples.push_back(value);
		while self.samples.len() > size {
			self.samples.pop_front();
		}
		self.samples.iter().sum::<f64>() / self.samples.len() as f64
	}
}

/// A value kind a [`Bus`](crate::Bus) can hold.
pub trait BusValue: Clone + Send + Sync + 'static {
	/// Kind name used in wrong-kind panic messages.
	const KIND: &'static str;

	fn to_json(&self) -> Value;

	fn from_json(value: &Value) -> Option<Self>;

	fn same(&self, other: &Self) -> bool;

	/// Hook applied to every send before deduplication. Identity for all
	/// kinds except floats, which get the zero-threshold and averaging
	/// treatment.
	fn preprocess(self, opts: &Options, window: &mut AvgWindow) -> Self {
		let _ = (opts, window);
		self
	}
}

impl BusValue for bool {
	const KIND: &'static str = "bool";

	fn to_json(&self) -> Value {
		Value::from(*self)
	}

	fn from_json(value: &Value) -> Option<Self> {
		value.as_bool()
	}

	fn same(&self, other: &Self) -> bool {
		self == other
	}
}

impl BusValue for i64 {
	const KIND: &'static str = "int";

	fn to_json(&self) -> Value {
		Value::from(*self)
	}

	fn from_json(value: &Value) -> Option<Self> {
		value.as_i64().or_else(|| {
			value
				.as_f64()
				.filter(|f| f.is_finite() && f.fract() == 0.0)
				.map(|f| f as i64)
		})
	}

	fn same(&self, other: &Self) -> bool {
		self == other
	}
}

impl BusValue for f64 {
	const KIND: &'static str = "float";

	fn to_json(&self) -> Value {
		Value::from(*self)
	}

	fn from_json(value: &Value) -> Option<Self> {
		value.as_f64()
	}

	fn same(&self, other: &Self) -> bool {
		self == other
	}

	fn preprocess(self, opts: &Options, window: &mut AvgWindow) -> Self {
		if self.abs() < opts.min_abs_value {
			window.reset = true;
			return 0.0;
		}
		if opts.averaging_window > 0 {
			return window.mean_with(opts.averaging_window, self);
		}
		self
	}
}

impl BusValue for String {
	const KIND: &'static str = "string";

	fn to_json(&self) -> Value {
		Value::from(self.as_str())
	}

	fn from_json(value: &Value) -> Option<Self> {
		value.as_str().map(str::to_owned)
	}

	fn same(&self, other: &Self) -> bool {
		self == other
	}
}

impl BusValue for Value {
	const KIND: &'static str = "json";

	fn to_json(&self) -> Value {
		self.clone()
	}

	fn from_json(value: &Value) -> Option<Self> {
		Some(value.clone())
	}

	fn same(&self, other: &Self) -> bool {
		same_value(self, other)
	}
}
