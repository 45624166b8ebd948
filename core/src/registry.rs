// pipeflow/src/registry.rs

//! Defines the name → factory registries through which handlers, task
//! runners, context providers and cache backends are plugged in, and the
//! `Registry` value that owns one of each.
//!
//! A `Registry` is built once at process start, populated, then shared by
//! reference with whatever constructs flows. Registration mistakes (empty or
//! duplicate names) are programming errors and panic.

use crate::config::Config;
use crate::core::cache::{Cache, LocalCache};
use crate::core::context::{ContextProvider, LocalContextProvider};
use crate::core::handler::Handler;
use crate::error::{FlowError, FlowResult};
use crate::runner::{PipeTaskRunner, TaskRunner};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Builds a plugin instance from its (already layered) configuration.
pub type Factory<T> = Arc<dyn Fn(&Config) -> anyhow::Result<Arc<T>> + Send + Sync>;

/// One name → factory map, guarded by a mutex.
pub struct PluginRegistry<T: ?Sized> {
  kind: &'static str,
  factories: Mutex<BTreeMap<String, Factory<T>>>,
}

impl<T: ?Sized> PluginRegistry<T> {
  /// `kind` names the plugin family in errors and logs ("handler", "runner", ...).
  pub fn new(kind: &'static str) -> Self {
    Self {
      kind,
      factories: Mutex::new(BTreeMap::new()),
    }
  }

  pub fn kind(&self) -> &'static str {
    self.kind
  }

  /// Registers `factory` under `name`.
  ///
  /// # Panics
  ///
  /// If `name` is empty or already registered.
  pub fn register<F>(&self, name: impl Into<String>, factory: F)
  where
    F: Fn(&Config) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
  {
    let name = name.into();
    if name.is_empty() {
      panic!("pipeflow setup error: register {} name is empty", self.kind);
    }

    let mut factories = self.factories.lock();
    if factories.contains_key(&name) {
      panic!("pipeflow setup error: register called twice for {} '{}'", self.kind, name);
    }
    event!(Level::DEBUG, kind = self.kind, %name, "Registering plugin.");
    factories.insert(name, Arc::new(factory));
  }

  /// All registered names, sorted.
  pub fn list(&self) -> Vec<String> {
    self.factories.lock().keys().cloned().collect()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.factories.lock().contains_key(name)
  }

  /// Looks up `name` and invokes its factory with `conf`.
  ///
  /// The factory runs outside the registry lock, so factories may themselves
  /// resolve other plugins.
  #[instrument(name = "PluginRegistry::create", skip(self, conf), fields(kind = self.kind), err(Display))]
  pub fn create(&self, name: &str, conf: &Config) -> FlowResult<Arc<T>> {
    let factory = self
      .factories
      .lock()
      .get(name)
      .cloned()
      .ok_or_else(|| FlowError::NotRegistered {
        kind: self.kind,
        name: name.to_string(),
      })?;

    factory(conf).map_err(|cause| FlowError::Construction {
      kind: self.kind,
      name: name.to_string(),
      cause: Arc::new(cause),
    })
  }
}

impl<T: ?Sized> fmt::Debug for PluginRegistry<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PluginRegistry")
      .field("kind", &self.kind)
      .field("names", &self.list())
      .finish()
  }
}

/// The four plugin registries used by flows.
///
/// The handler registry sits behind an `Arc` because runners resolve step
/// handlers through it long after construction.
#[derive(Debug)]
pub struct Registry {
  handlers: Arc<PluginRegistry<dyn Handler>>,
  runners: PluginRegistry<dyn TaskRunner>,
  context_providers: PluginRegistry<dyn ContextProvider>,
  caches: PluginRegistry<dyn Cache>,
}

impl Registry {
  /// A registry with nothing registered.
  pub fn empty() -> Self {
    Self {
      handlers: Arc::new(PluginRegistry::new("handler")),
      runners: PluginRegistry::new("runner"),
      context_providers: PluginRegistry::new("context provider"),
      caches: PluginRegistry::new("cache"),
    }
  }

  /// A registry carrying the built-in plugins: `PipeTaskRunner`,
  /// `LocalContextProvider` and `LocalCache`.
  pub fn new() -> Self {
    let registry = Self::empty();

    let handlers = Arc::clone(&registry.handlers);
    registry.runners.register(PipeTaskRunner::NAME, move |conf| {
      Ok(Arc::new(PipeTaskRunner::new(conf.clone(), Arc::clone(&handlers))) as Arc<dyn TaskRunner>)
    });
    registry
      .context_providers
      .register(LocalContextProvider::NAME, |_conf| {
        Ok(Arc::new(LocalContextProvider) as Arc<dyn ContextProvider>)
      });
    registry
      .caches
      .register(LocalCache::NAME, |conf| Ok(Arc::new(LocalCache::from_config(conf)) as Arc<dyn Cache>));

    registry
  }

  pub fn handlers(&self) -> &Arc<PluginRegistry<dyn Handler>> {
    &self.handlers
  }

  pub fn runners(&self) -> &PluginRegistry<dyn TaskRunner> {
    &self.runners
  }

  pub fn context_providers(&self) -> &PluginRegistry<dyn ContextProvider> {
    &self.context_providers
  }

  pub fn caches(&self) -> &PluginRegistry<dyn Cache> {
    &self.caches
  }

  /// Shorthand for `handlers().register(..)`.
  pub fn register_handler<F>(&self, name: impl Into<String>, factory: F)
  where
    F: Fn(&Config) -> anyhow::Result<Arc<dyn Handler>> + Send + Sync + 'static,
  {
    self.handlers.register(name, factory);
  }
}

impl Default for Registry {
  fn default() -> Self {
    Self::new()
  }
}
