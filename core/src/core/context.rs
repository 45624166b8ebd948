// pipeflow/src/core/context.rs

//! Defines the `Context` store scoped to one task or chain execution, the
//! typed attachments every context carries, and the `ContextProvider` that
//! creates fresh instances.

use crate::config::Config;
use crate::core::cache::Cache;
use crate::core::output::{NameValue, Output};
use crate::error::FlowError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Reserved per-context state, kept out of the key-value namespace.
///
/// - `output`: the execution's result log. Shared (not cloned) by
///   [`Attachments::duplicate`], so a copied context appends to the same log.
/// - `error`: the outcome attached to a copy handed to subscribers.
/// - named configurations and caches attached by a chain builder.
#[derive(Default)]
pub struct Attachments {
  output: Arc<Output>,
  error: RwLock<Option<FlowError>>,
  configs: RwLock<HashMap<String, Config>>,
  caches: RwLock<HashMap<String, Arc<dyn Cache>>>,
}

impl Attachments {
  pub fn new() -> Self {
    Self::default()
  }

  /// Copy for a derived context: same output log, snapshots of the rest.
  pub fn duplicate(&self) -> Self {
    Self {
      output: Arc::clone(&self.output),
      error: RwLock::new(self.error.read().clone()),
      configs: RwLock::new(self.configs.read().clone()),
      caches: RwLock::new(self.caches.read().clone()),
    }
  }
}

impl fmt::Debug for Attachments {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Attachments")
      .field("output_len", &self.output.len())
      .field("error", &*self.error.read())
      .field("configs", &self.configs.read().keys().collect::<Vec<_>>())
      .field("caches", &self.caches.read().keys().collect::<Vec<_>>())
      .finish()
  }
}

/// A mutable, string-keyed value store with a stable identity.
///
/// All methods take `&self`; implementations provide their own interior
/// locking so a context can be handed to handlers as `Arc<dyn Context>`.
pub trait Context: Send + Sync {
  fn id(&self) -> &str;

  fn get(&self, key: &str) -> Option<Value>;
  /// Inserts or overwrites. An overwritten key keeps its original position.
  fn set(&self, key: &str, value: Value) -> &dyn Context;
  fn delete(&self, key: &str) -> &dyn Context;
  fn flush(&self);

  /// Keys in first-insertion order.
  fn keys(&self) -> Vec<String>;
  /// Snapshot of every entry, in first-insertion order.
  fn get_all(&self) -> IndexMap<String, Value>;

  fn attachments(&self) -> &Attachments;

  /// A new context with a fresh id holding a copy of this context's entries
  /// and attachments. The output log is shared.
  fn copy(&self) -> Arc<dyn Context>;

  fn output(&self) -> &Output {
    &self.attachments().output
  }

  fn append_output(&self, items: Vec<NameValue>) {
    self.output().append(items);
  }

  fn list_output(&self) -> Vec<NameValue> {
    self.output().list()
  }

  fn find_output(&self, name: &str, tags: &[&str]) -> Vec<NameValue> {
    self.output().find(name, tags)
  }

  /// Error attached to this context, if any (set on subscriber copies).
  fn error(&self) -> Option<FlowError> {
    self.attachments().error.read().clone()
  }

  fn set_error(&self, err: FlowError) {
    *self.attachments().error.write() = Some(err);
  }

  fn config(&self, name: &str) -> Option<Config> {
    self.attachments().configs.read().get(name).cloned()
  }

  fn set_config(&self, name: &str, conf: Config) {
    self.attachments().configs.write().insert(name.to_string(), conf);
  }

  fn cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
    self.attachments().caches.read().get(name).cloned()
  }

  fn set_cache(&self, name: &str, cache: Arc<dyn Cache>) {
    self.attachments().caches.write().insert(name.to_string(), cache);
  }
}

impl fmt::Debug for dyn Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context")
      .field("id", &self.id())
      .field("keys", &self.keys())
      .finish()
  }
}

/// Creates fresh, empty contexts.
pub trait ContextProvider: Send + Sync {
  fn new_context(&self, conf: &Config) -> Arc<dyn Context>;
}

/// In-memory context over an insertion-ordered map.
#[derive(Debug)]
pub struct LocalContext {
  id: String,
  data: RwLock<IndexMap<String, Value>>,
  attachments: Attachments,
}

impl LocalContext {
  pub fn new() -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      data: RwLock::new(IndexMap::new()),
      attachments: Attachments::new(),
    }
  }
}

impl Default for LocalContext {
  fn default() -> Self {
    Self::new()
  }
}

impl Context for LocalContext {
  fn id(&self) -> &str {
    &self.id
  }

  fn get(&self, key: &str) -> Option<Value> {
    self.data.read().get(key).cloned()
  }

  fn set(&self, key: &str, value: Value) -> &dyn Context {
    // IndexMap::insert keeps the slot of an existing key.
    self.data.write().insert(key.to_string(), value);
    self
  }

  fn delete(&self, key: &str) -> &dyn Context {
    self.data.write().shift_remove(key);
    self
  }

  fn flush(&self) {
    self.data.write().clear();
  }

  fn keys(&self) -> Vec<String> {
    self.data.read().keys().cloned().collect()
  }

  fn get_all(&self) -> IndexMap<String, Value> {
    self.data.read().clone()
  }

  fn attachments(&self) -> &Attachments {
    &self.attachments
  }

  fn copy(&self) -> Arc<dyn Context> {
    Arc::new(LocalContext {
      id: Uuid::new_v4().to_string(),
      data: RwLock::new(self.data.read().clone()),
      attachments: self.attachments.duplicate(),
    })
  }
}

/// The default provider, registered as [`LocalContextProvider::NAME`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalContextProvider;

impl LocalContextProvider {
  pub const NAME: &'static str = "LocalContextProvider";
}

impl ContextProvider for LocalContextProvider {
  fn new_context(&self, _conf: &Config) -> Arc<dyn Context> {
    Arc::new(LocalContext::new())
  }
}
