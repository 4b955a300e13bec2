use std::fmt;
use std::sync::Arc;

/// A slash-separated MQTT routing path.
///
/// Topics are cheap to clone and are only ever constructed verbatim or via
/// [`Topic::join`]; nothing in the workspace glues paths together with raw
/// string concatenation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Topic(Arc<str>);

impl Topic {
	pub fn new(path: impl Into<Arc<str>>) -> Self {
		Topic(path.into())
	}

	pub fn empty() -> Self {
		Topic(Arc::from(""))
	}

	/// Joins path components into a normalized topic: runs of `/` collapse
	/// to one, every component's leading `/` is stripped, components are
	/// separated by exactly one `/`, and the result has no trailing `/`.
	/// Joining nothing (or only separators) yields the empty topic.
	///
	/// Normalization makes `join` associative: `join(join(a, b), c)` equals
	/// `join(a, b, c)`.
	pub fn join<I>(parts: I) -> Self
	where
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		let mut buf = String::new();
		for part in parts {
			for c in part.as_ref().trim_start_matches('/').chars() {
				if c == '/' && buf.ends_with('/') {
					continue;
				}
				buf.push(c);
			}
			if !buf.is_empty() && !buf.ends_with('/') {
				buf.push('/');
			}
		}
		if buf.ends_with('/') {
			buf.truncate(buf.len() - 1);
		}
		Topic(buf.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl AsRef<str> for Topic {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for Topic {
	fn from(path: &str) -> Self {
		Topic::new(path)
	}
}

impl From<String> for Topic {
	fn from(path: String) -> Self {
		Topic::new(path)
	}
}

impl fmt::Display for Topic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl fmt::Debug for Topic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Topic({:?})", &*self.0)
	}
}
