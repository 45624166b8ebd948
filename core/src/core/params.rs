// pipeflow/src/core/params.rs

//! Defines `Params`, the heterogeneous bag handed explicitly from one chain
//! link to the next.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A key → value map with typed accessors.
///
/// Accessors return the type's zero value when the key is absent or when the
/// stored value is of a different type. The width-specific accessors do no
/// numeric coercion, so an `i32` stored under a key is not visible through
/// [`Params::int64`]; [`Params::int`] is the lenient one.
#[derive(Clone, Default)]
pub struct Params {
  values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Params {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert. Params are treated as immutable once handed to a
  /// chain, so this is the only way to populate them.
  pub fn with<V>(mut self, key: impl Into<String>, value: V) -> Self
  where
    V: Any + Send + Sync,
  {
    self.values.insert(key.into(), Arc::new(value));
    self
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn exist(&self, key: &str) -> bool {
    self.values.contains_key(key)
  }

  /// The raw stored value.
  pub fn val(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
    self.values.get(key).cloned()
  }

  /// Typed lookup; `None` on a miss or a type mismatch.
  pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
    self.values.get(key).and_then(|v| v.downcast_ref::<V>())
  }

  pub fn string(&self, key: &str) -> String {
    if let Some(s) = self.get::<String>(key) {
      return s.clone();
    }
    self.get::<&'static str>(key).map(|s| s.to_string()).unwrap_or_default()
  }

  /// The platform-sized integer accessor. Unlike the width-specific ones it
  /// accepts `i64`, `isize` or `i32`, so an unsuffixed literal
  /// (`.with("n", 5)`, stored as `i32`) reads back as `5`.
  pub fn int(&self, key: &str) -> i64 {
    if let Some(v) = self.get::<i64>(key) {
      return *v;
    }
    if let Some(v) = self.get::<isize>(key) {
      return *v as i64;
    }
    self.get::<i32>(key).map(|v| i64::from(*v)).unwrap_or_default()
  }

  pub fn int32(&self, key: &str) -> i32 {
    self.get::<i32>(key).copied().unwrap_or_default()
  }

  pub fn int64(&self, key: &str) -> i64 {
    self.get::<i64>(key).copied().unwrap_or_default()
  }

  pub fn float32(&self, key: &str) -> f32 {
    self.get::<f32>(key).copied().unwrap_or_default()
  }

  pub fn float64(&self, key: &str) -> f64 {
    self.get::<f64>(key).copied().unwrap_or_default()
  }

  pub fn duration(&self, key: &str) -> Duration {
    self.get::<Duration>(key).copied().unwrap_or_default()
  }

  pub fn boolean(&self, key: &str) -> bool {
    self.get::<bool>(key).copied().unwrap_or_default()
  }
}

impl fmt::Debug for Params {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut keys: Vec<&String> = self.values.keys().collect();
    keys.sort();
    f.debug_struct("Params").field("keys", &keys).finish()
  }
}
