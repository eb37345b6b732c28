//! Process-wide named properties, read by `sys:` certificate sources.
//!
//! This is a key/value bag distinct from environment variables: values can be
//! set at runtime (for example from `-D KEY=VALUE` on the command line) without
//! touching the process environment.

use std::{
	collections::HashMap,
	sync::{Arc, LazyLock, PoisonError, RwLock},
};

static GLOBAL: LazyLock<Arc<Properties>> = LazyLock::new(Default::default);

#[derive(Debug, Default)]
pub struct Properties {
	values: RwLock<HashMap<String, String>>,
}

impl Properties {
	pub fn new() -> Self {
		Self::default()
	}

	/// The process-wide property bag.
	pub fn global() -> Arc<Self> {
		GLOBAL.clone()
	}

	/// Set a property, returning the previous value if there was one.
	pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.values
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key.into(), value.into())
	}

	pub fn get(&self, key: &str) -> Option<String> {
		self.values
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(key)
			.cloned()
	}

	pub fn remove(&self, key: &str) -> Option<String> {
		self.values
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(key)
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			values: RwLock::new(
				iter.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}
}
