// pipeflow/src/core/handler.rs

//! Defines the `Handler` trait executed for each step and the `ErrorHandler`
//! policy consulted by runners when a step fails.

use crate::core::context::Context;
use crate::core::step::Step;
use crate::error::FlowError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// The pluggable unit of work bound to a step by name.
///
/// Handlers are built by factories registered in `Registry::handlers`. A
/// handler may be cached and reused across tasks (see the `singleton`
/// option), so any state it holds must tolerate concurrent `handle` calls.
#[async_trait]
pub trait Handler: Send + Sync {
  async fn handle(&self, step: &Step, ctx: Arc<dyn Context>) -> anyhow::Result<()>;
}

/// Decides whether a run continues past a failed step.
///
/// Returning `true` suppresses the failure and moves on to the next step;
/// `false` aborts the remaining steps. The error has already been recorded on
/// the task either way.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
  async fn handle(&self, err: &FlowError, step: &Step, ctx: Arc<dyn Context>) -> bool;
}

/// Adapts an async closure into a [`Handler`].
///
/// ```ignore
/// let h = FnHandler::new(|step: Step, ctx: Arc<dyn Context>| async move {
///   ctx.set(step.name(), serde_json::json!(true));
///   Ok(())
/// });
/// ```
pub struct FnHandler<F> {
  f: F,
}

impl<F, Fut> FnHandler<F>
where
  F: Fn(Step, Arc<dyn Context>) -> Fut + Send + Sync,
  Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
  F: Fn(Step, Arc<dyn Context>) -> Fut + Send + Sync,
  Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
  async fn handle(&self, step: &Step, ctx: Arc<dyn Context>) -> anyhow::Result<()> {
    (self.f)(step.clone(), ctx).await
  }
}

/// Adapts a synchronous predicate into an [`ErrorHandler`].
pub struct FnErrorHandler<F> {
  f: F,
}

impl<F> FnErrorHandler<F>
where
  F: Fn(&FlowError, &Step, &dyn Context) -> bool + Send + Sync,
{
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

#[async_trait]
impl<F> ErrorHandler for FnErrorHandler<F>
where
  F: Fn(&FlowError, &Step, &dyn Context) -> bool + Send + Sync,
{
  async fn handle(&self, err: &FlowError, step: &Step, ctx: Arc<dyn Context>) -> bool {
    (self.f)(err, step, ctx.as_ref())
  }
}
