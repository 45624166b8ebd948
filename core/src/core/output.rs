// pipeflow/src/core/output.rs

//! The append-only result log accumulated during one execution.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One named, tagged result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameValue {
  pub name: String,
  pub value: Value,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,
}

impl NameValue {
  pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
      tags: Vec::new(),
    }
  }

  pub fn with_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.tags = tags.into_iter().map(Into::into).collect();
    self
  }

  /// True when every tag in `wanted` is present on this entry. Extra tags on
  /// the entry are ignored; an empty `wanted` always matches.
  pub fn has_tags(&self, wanted: &[&str]) -> bool {
    let own: HashSet<&str> = self.tags.iter().map(String::as_str).collect();
    let wanted: HashSet<&str> = wanted.iter().copied().collect();
    wanted.iter().filter(|tag| own.contains(*tag)).count() == wanted.len()
  }
}

/// Thread-safe, append-only sequence of [`NameValue`]s.
///
/// Appends from concurrent callers are serialized; a single `append` call
/// lands as one contiguous run. Reads return a point-in-time copy.
#[derive(Debug, Default)]
pub struct Output {
  entries: Mutex<Vec<NameValue>>,
}

impl Output {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn append<I>(&self, items: I)
  where
    I: IntoIterator<Item = NameValue>,
  {
    self.entries.lock().extend(items);
  }

  /// Snapshot of all entries in append order.
  pub fn list(&self) -> Vec<NameValue> {
    self.entries.lock().clone()
  }

  /// Entries whose name matches exactly and which carry every requested tag.
  pub fn find(&self, name: &str, tags: &[&str]) -> Vec<NameValue> {
    self
      .entries
      .lock()
      .iter()
      .filter(|entry| entry.name == name && entry.has_tags(tags))
      .cloned()
      .collect()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.lock().is_empty()
  }
}
