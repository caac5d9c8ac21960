//! Keyword arguments passed to components, hooks, methods and interrupts.

use serde_json::{Map, Value};

/// Name-indexed dynamic arguments.
pub type Kwargs = Map<String, Value>;

/// Typed accessors over [`Kwargs`].
pub trait KwargsExt {
    /// Gets a string argument.
    fn get_str(&self, key: &str) -> Option<&str>;
    /// Gets an integer argument.
    fn get_i64(&self, key: &str) -> Option<i64>;
    /// Gets a boolean argument.
    fn get_bool(&self, key: &str) -> Option<bool>;
    /// Returns a copy with `key` set to `value`.
    fn with(self, key: &str, value: impl Into<Value>) -> Self;
}

impl KwargsExt for Kwargs {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key.to_string(), value.into());
        self
    }
}
