// pipeflow/src/chain.rs

//! Dynamic composition: chain handler functions at runtime with
//! [`HandlerFunc::then`], and notify subscribers after a link with
//! [`HandlerFunc::subscribe`].
//!
//! Subscribers are fire-and-forget. They run on a spawned Tokio task against a
//! copy of the context, nothing waits for them, and their outcome never
//! reaches the caller. A host that exits right after a chain returns may exit
//! before its subscribers run.

use crate::config::Config;
use crate::core::cache::Cache;
use crate::core::context::{Context, LocalContext};
use crate::core::handler::Handler;
use crate::core::params::Params;
use crate::core::step::Step;
use crate::error::{FlowError, FlowResult};
use crate::registry::Registry;
use async_trait::async_trait;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{event, instrument, Instrument, Level};

type LinkFn = dyn Fn(Arc<dyn Context>, Params) -> BoxFuture<'static, FlowResult<()>> + Send + Sync;
type NotifyFn = dyn Fn(Arc<dyn Context>, Params) -> BoxFuture<'static, ()> + Send + Sync;

/// A unit of work of the form `(context, params) → result`, cheap to clone.
#[derive(Clone)]
pub struct HandlerFunc {
  f: Arc<LinkFn>,
}

impl HandlerFunc {
  /// Wraps an async closure. Errors returned by the closure surface as
  /// [`FlowError::Chain`] (or unchanged, if the closure returned a `FlowError`).
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: Fn(Arc<dyn Context>, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    Self::from_link(move |ctx, params| {
      let fut = f(ctx, params);
      Box::pin(async move { fut.await.map_err(FlowError::from) })
    })
  }

  fn from_link<F>(f: F) -> Self
  where
    F: Fn(Arc<dyn Context>, Params) -> BoxFuture<'static, FlowResult<()>> + Send + Sync + 'static,
  {
    Self { f: Arc::new(f) }
  }

  pub async fn run(&self, ctx: Arc<dyn Context>, params: Params) -> FlowResult<()> {
    (self.f)(ctx, params).await
  }

  /// Runs `self`, then `next` if `self` succeeded. A failure short-circuits:
  /// its error is returned and `next` never runs.
  ///
  /// `next` receives `params` when they are non-empty, pinning them at
  /// composition time; otherwise it receives whatever the caller passed.
  pub fn then(&self, next: HandlerFunc, params: Params) -> HandlerFunc {
    let first = self.clone();
    HandlerFunc::from_link(move |ctx, caller_params| {
      let first = first.clone();
      let next = next.clone();
      let pinned = params.clone();
      Box::pin(async move {
        first.run(Arc::clone(&ctx), caller_params.clone()).await?;
        let next_params = if pinned.is_empty() { caller_params } else { pinned };
        next.run(ctx, next_params).await
      })
    })
  }

  /// Runs `self` with `params` whenever they are non-empty, ignoring the
  /// caller's.
  pub fn with_params(&self, params: Params) -> HandlerFunc {
    if params.is_empty() {
      return self.clone();
    }
    let inner = self.clone();
    HandlerFunc::from_link(move |ctx, _caller_params| {
      let inner = inner.clone();
      let pinned = params.clone();
      Box::pin(async move { inner.run(ctx, pinned).await })
    })
  }

  /// Runs `self`, then hands a copy of the context (carrying the error, if
  /// any) to every subscriber on a spawned task, in order. Returns `self`'s
  /// result without waiting for them.
  pub fn subscribe(&self, subscribers: Vec<Subscriber>) -> HandlerFunc {
    let inner = self.clone();
    let subscribers: Arc<[Subscriber]> = subscribers.into();
    HandlerFunc::from_link(move |ctx, params| {
      let inner = inner.clone();
      let subscribers = Arc::clone(&subscribers);
      Box::pin(async move {
        let result = inner.run(Arc::clone(&ctx), params.clone()).await;
        if !subscribers.is_empty() {
          let copy = ctx.copy();
          if let Err(err) = &result {
            copy.set_error(err.clone());
          }
          publish(copy, params, subscribers);
        }
        result
      })
    })
  }
}

impl fmt::Debug for HandlerFunc {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("HandlerFunc")
  }
}

/// Lets a handler function be registered as a step handler. A link's own
/// error is handed back as-is so the runner wraps it only once.
#[async_trait]
impl Handler for HandlerFunc {
  async fn handle(&self, _step: &Step, ctx: Arc<dyn Context>) -> anyhow::Result<()> {
    self.run(ctx, Params::new()).await.map_err(|err| match err {
      FlowError::Chain { cause } => {
        Arc::try_unwrap(cause).unwrap_or_else(|shared| anyhow::Error::new(FlowError::Chain { cause: shared }))
      }
      other => anyhow::Error::new(other),
    })
  }
}

/// A notification target for [`HandlerFunc::subscribe`].
#[derive(Clone)]
pub struct Subscriber {
  f: Arc<NotifyFn>,
}

impl Subscriber {
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: Fn(Arc<dyn Context>, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let notify: Arc<NotifyFn> =
      Arc::new(move |ctx: Arc<dyn Context>, params: Params| -> BoxFuture<'static, ()> { Box::pin(f(ctx, params)) });
    Self { f: notify }
  }

  async fn notify(&self, ctx: Arc<dyn Context>, params: Params) {
    (self.f)(ctx, params).await
  }
}

impl fmt::Debug for Subscriber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Subscriber")
  }
}

fn publish(ctx: Arc<dyn Context>, params: Params, subscribers: Arc<[Subscriber]>) {
  let runtime = match tokio::runtime::Handle::try_current() {
    Ok(runtime) => runtime,
    Err(_) => {
      event!(Level::ERROR, "No Tokio runtime available, dropping subscriber notification.");
      return;
    }
  };

  let span = tracing::debug_span!("subscriber_fanout", context_id = %ctx.id(), subscribers = subscribers.len());
  runtime.spawn(
    async move {
      for subscriber in subscribers.iter() {
        subscriber.notify(Arc::clone(&ctx), params.clone()).await;
      }
      event!(Level::TRACE, "Subscribers notified.");
    }
    .instrument(span),
  );
}

/// Named handler functions for building ad-hoc chains.
#[derive(Default)]
pub struct FuncRegistry {
  funcs: RwLock<IndexMap<String, HandlerFunc>>,
}

impl FuncRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, name: impl Into<String>, func: HandlerFunc) -> FlowResult<()> {
    let name = name.into();
    if name.is_empty() {
      return Err(FlowError::InvalidName);
    }
    let mut funcs = self.funcs.write();
    if funcs.contains_key(&name) {
      return Err(FlowError::DuplicateFunc { name });
    }
    event!(Level::DEBUG, %name, "Registering chain handler.");
    funcs.insert(name, func);
    Ok(())
  }

  /// Names in registration order.
  pub fn list(&self) -> Vec<String> {
    self.funcs.read().keys().cloned().collect()
  }

  pub fn get(&self, name: &str) -> Option<HandlerFunc> {
    self.funcs.read().get(name).cloned()
  }

  /// Runs one registered function with empty params.
  pub async fn run(&self, name: &str, ctx: Arc<dyn Context>) -> FlowResult<()> {
    let func = self.get(name).ok_or_else(|| FlowError::ChainHandlerMissing { name: name.to_string() })?;
    func.run(ctx, Params::new()).await
  }

  /// Starts a chain over a fresh local context.
  pub fn begin(&self) -> Chain<'_> {
    self.begin_with(Arc::new(LocalContext::new()))
  }

  pub fn begin_with(&self, ctx: Arc<dyn Context>) -> Chain<'_> {
    Chain {
      funcs: self,
      ctx,
      head: None,
      params: Params::new(),
      err: None,
    }
  }
}

impl fmt::Debug for FuncRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FuncRegistry").field("names", &self.list()).finish()
  }
}

/// Builder for one ad-hoc chain. The first building error (an unknown name,
/// a cache that fails to construct) sticks: later calls are no-ops and
/// [`Chain::commit`] returns it.
pub struct Chain<'a> {
  funcs: &'a FuncRegistry,
  ctx: Arc<dyn Context>,
  head: Option<HandlerFunc>,
  params: Params,
  err: Option<FlowError>,
}

impl<'a> Chain<'a> {
  pub fn context(&self) -> Arc<dyn Context> {
    Arc::clone(&self.ctx)
  }

  /// Attaches a named configuration to the chain's context.
  pub fn with_config(self, name: &str, conf: Config) -> Self {
    self.ctx.set_config(name, conf);
    self
  }

  /// Attaches a cache instance to the chain's context under `name`.
  pub fn with_cache(self, name: &str, cache: Arc<dyn Cache>) -> Self {
    self.ctx.set_cache(name, cache);
    self
  }

  /// Builds the cache backend registered as `backend` and attaches it under
  /// the same name.
  pub fn with_registered_cache(mut self, registry: &Registry, backend: &str, conf: &Config) -> Self {
    if self.err.is_some() {
      return self;
    }
    match registry.caches().create(backend, conf) {
      Ok(cache) => self.ctx.set_cache(backend, cache),
      Err(err) => self.err = Some(err),
    }
    self
  }

  /// Params handed to the first link at commit.
  pub fn with_params(mut self, params: Params) -> Self {
    self.params = params;
    self
  }

  pub fn then(self, name: &str) -> Self {
    self.then_with(name, Params::new())
  }

  /// Appends the function registered as `name`, pinning `params` for it when
  /// non-empty.
  pub fn then_with(mut self, name: &str, params: Params) -> Self {
    if self.err.is_some() {
      return self;
    }
    let Some(func) = self.funcs.get(name) else {
      self.err = Some(FlowError::ChainHandlerMissing { name: name.to_string() });
      return self;
    };
    self.head = Some(match self.head.take() {
      None => func.with_params(params),
      Some(head) => head.then(func, params),
    });
    self
  }

  /// Subscribes to everything chained so far. Ignored on an empty chain.
  pub fn subscribe(mut self, subscribers: Vec<Subscriber>) -> Self {
    if self.err.is_some() {
      return self;
    }
    if let Some(head) = self.head.take() {
      self.head = Some(head.subscribe(subscribers));
    }
    self
  }

  /// Runs the chain. An empty chain succeeds without doing anything.
  #[instrument(name = "Chain::commit", skip_all, fields(context_id = %self.ctx.id()))]
  pub async fn commit(self) -> FlowResult<()> {
    if let Some(err) = self.err {
      event!(Level::WARN, error = %err, "Chain was not built.");
      return Err(err);
    }
    match self.head {
      Some(head) => head.run(self.ctx, self.params).await,
      None => Ok(()),
    }
  }
}
