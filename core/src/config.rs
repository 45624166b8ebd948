// pipeflow/src/config.rs

//! A small hierarchical settings tree backed by `serde_json`.
//!
//! Keys are dotted paths (`"runner.options.singleton"`). Every getter takes a
//! default that is returned when the key is absent or holds a value of another
//! shape. Two sources are layered with [`Config::with_fallback`].

use crate::error::{FlowError, FlowResult};
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
  root: Map<String, Value>,
}

impl Config {
  /// An empty configuration; every lookup yields its default.
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a configuration from a JSON value. Anything other than an object
  /// produces an empty configuration.
  pub fn from_value(value: Value) -> Self {
    match value {
      Value::Object(root) => Self { root },
      _ => Self::default(),
    }
  }

  pub fn from_json_str(text: &str) -> FlowResult<Self> {
    let value: Value = serde_json::from_str(text).map_err(|e| FlowError::Config {
      key: String::new(),
      message: e.to_string(),
    })?;
    match value {
      Value::Object(root) => Ok(Self { root }),
      other => Err(FlowError::Config {
        key: String::new(),
        message: format!("expected a JSON object at the root, found {}", kind_of(&other)),
      }),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.root.is_empty()
  }

  /// Sets `path` to `value`, creating intermediate objects as needed.
  /// Intermediate non-object values are replaced.
  pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
    let segments: Vec<&str> = path.split('.').collect();
    insert_path(&mut self.root, &segments, value.into());
    self
  }

  /// Raw lookup of a dotted path.
  pub fn get(&self, path: &str) -> Option<&Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = self.root.get(first)?;
    for segment in segments {
      current = current.as_object()?.get(segment)?;
    }
    Some(current)
  }

  pub fn has(&self, path: &str) -> bool {
    self.get(path).is_some()
  }

  pub fn get_string(&self, path: &str, default: &str) -> String {
    match self.get(path) {
      Some(Value::String(s)) => s.clone(),
      _ => default.to_string(),
    }
  }

  pub fn get_i64(&self, path: &str, default: i64) -> i64 {
    self.get(path).and_then(Value::as_i64).unwrap_or(default)
  }

  pub fn get_f64(&self, path: &str, default: f64) -> f64 {
    self.get(path).and_then(Value::as_f64).unwrap_or(default)
  }

  pub fn get_bool(&self, path: &str, default: bool) -> bool {
    self.get(path).and_then(Value::as_bool).unwrap_or(default)
  }

  /// Integers are read as milliseconds; strings accept `ms`, `s`, `m` and `h`
  /// suffixes (`"250ms"`, `"2s"`).
  pub fn get_duration(&self, path: &str, default: Duration) -> Duration {
    match self.get(path) {
      Some(Value::Number(n)) => n.as_u64().map(Duration::from_millis).unwrap_or(default),
      Some(Value::String(s)) => parse_duration(s).unwrap_or(default),
      _ => default,
    }
  }

  /// Nested sub-configuration; empty if the path is absent or not an object.
  pub fn get_config(&self, path: &str) -> Config {
    match self.get(path) {
      Some(Value::Object(map)) => Config { root: map.clone() },
      _ => Config::default(),
    }
  }

  /// Sub-configuration stored directly under `key`, without path splitting.
  /// Used for keys that are plugin or step names, which may contain dots.
  pub fn child(&self, key: &str) -> Config {
    match self.root.get(key) {
      Some(Value::Object(map)) => Config { root: map.clone() },
      _ => Config::default(),
    }
  }

  /// String list; non-string elements are skipped.
  pub fn get_string_list(&self, path: &str) -> Vec<String> {
    match self.get(path) {
      Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
      _ => Vec::new(),
    }
  }

  /// Top-level keys in their stored order.
  pub fn keys(&self) -> Vec<String> {
    self.root.keys().cloned().collect()
  }

  /// Returns a configuration in which every key missing from `self` is taken
  /// from `fallback`. Nested objects are merged recursively; `self` wins on
  /// every conflict.
  pub fn with_fallback(&self, fallback: &Config) -> Config {
    let mut merged = fallback.root.clone();
    merge_into(&mut merged, &self.root);
    Config { root: merged }
  }

  pub fn as_value(&self) -> Value {
    Value::Object(self.root.clone())
  }
}

impl From<Value> for Config {
  fn from(value: Value) -> Self {
    Config::from_value(value)
  }
}

fn merge_into(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
  for (key, value) in overlay {
    if let (Some(Value::Object(base_obj)), Value::Object(overlay_obj)) = (base.get_mut(key), value) {
      merge_into(base_obj, overlay_obj);
      continue;
    }
    base.insert(key.clone(), value.clone());
  }
}

fn insert_path(node: &mut Map<String, Value>, segments: &[&str], value: Value) {
  match segments {
    [] => {}
    [last] => {
      node.insert(last.to_string(), value);
    }
    [head, rest @ ..] => {
      let entry = node
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
      if !entry.is_object() {
        *entry = Value::Object(Map::new());
      }
      if let Value::Object(child) = entry {
        insert_path(child, rest, value);
      }
    }
  }
}

fn parse_duration(text: &str) -> Option<Duration> {
  let text = text.trim();
  let split_at = text.find(|c: char| !c.is_ascii_digit())?;
  let (digits, unit) = text.split_at(split_at);
  let amount: u64 = digits.parse().ok()?;
  match unit.trim() {
    "ms" => Some(Duration::from_millis(amount)),
    "s" => Some(Duration::from_secs(amount)),
    "m" => amount.checked_mul(60).map(Duration::from_secs),
    "h" => amount.checked_mul(3600).map(Duration::from_secs),
    _ => None,
  }
}

fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
