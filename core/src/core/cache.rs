// pipeflow/src/core/cache.rs

//! The `Cache` capability consumed by handlers, plus an in-process backend.
//!
//! Remote backends live outside this crate and plug in through
//! `Registry::caches`.

use crate::config::Config;
use crate::error::{FlowError, FlowResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

pub trait Cache: Send + Sync {
  fn set(&self, key: &str, value: Value);
  fn get(&self, key: &str) -> Option<Value>;

  /// Adds `delta` to an integer entry, creating it at zero when absent.
  fn increment(&self, key: &str, delta: i64) -> FlowResult<i64>;
  fn decrement(&self, key: &str, delta: i64) -> FlowResult<i64>;

  fn delete(&self, key: &str);
  fn flush(&self);

  /// Whether reads observe only this process.
  fn is_local(&self) -> bool;
  /// Whether values are stored as-is, or must survive serialization.
  fn can_store_interface(&self) -> bool;
}

/// Process-local cache over a mutex-guarded map.
#[derive(Debug, Default)]
pub struct LocalCache {
  entries: Mutex<HashMap<String, Value>>,
}

impl LocalCache {
  pub const NAME: &'static str = "LocalCache";

  pub fn new() -> Self {
    Self::default()
  }

  /// Registry factory; the local backend takes no options.
  pub fn from_config(_conf: &Config) -> Self {
    Self::new()
  }

  fn add(&self, key: &str, delta: i64) -> FlowResult<i64> {
    let mut entries = self.entries.lock();
    let current = match entries.get(key) {
      None => 0,
      Some(value) => value.as_i64().ok_or_else(|| FlowError::Cache {
        key: key.to_string(),
        message: format!("value {} is not an integer", value),
      })?,
    };
    let next = current.checked_add(delta).ok_or_else(|| FlowError::Cache {
      key: key.to_string(),
      message: "integer overflow".to_string(),
    })?;
    entries.insert(key.to_string(), Value::from(next));
    Ok(next)
  }
}

impl Cache for LocalCache {
  fn set(&self, key: &str, value: Value) {
    self.entries.lock().insert(key.to_string(), value);
  }

  fn get(&self, key: &str) -> Option<Value> {
    self.entries.lock().get(key).cloned()
  }

  fn increment(&self, key: &str, delta: i64) -> FlowResult<i64> {
    self.add(key, delta)
  }

  fn decrement(&self, key: &str, delta: i64) -> FlowResult<i64> {
    let negated = delta.checked_neg().ok_or_else(|| FlowError::Cache {
      key: key.to_string(),
      message: "integer overflow".to_string(),
    })?;
    self.add(key, negated)
  }

  fn delete(&self, key: &str) {
    self.entries.lock().remove(key);
  }

  fn flush(&self) {
    self.entries.lock().clear();
  }

  fn is_local(&self) -> bool {
    true
  }

  fn can_store_interface(&self) -> bool {
    true
  }
}
