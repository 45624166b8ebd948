// pipeflow/src/runner.rs

//! Defines the `TaskRunner` execution strategy and the default
//! `PipeTaskRunner`, which drives a task's steps strictly in declared order.

use crate::config::Config;
use crate::core::context::Context;
use crate::core::handler::{ErrorHandler, Handler};
use crate::core::step::Step;
use crate::error::{FlowError, FlowResult};
use crate::flow::Task;
use crate::registry::PluginRegistry;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, info_span, instrument, Instrument, Level};

/// Drives the steps of a task.
///
/// Runners are shared by every task of a flow. A runner records step failures
/// with [`Task::record_error`]; the task itself manages its status.
#[async_trait]
pub trait TaskRunner: Send + Sync {
  async fn run(&self, task: &Task);

  /// Installs the policy consulted when a step fails. Replaces any previous one.
  fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>);
}

/// Outcome of one step under the error-continuation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepControl {
  Continue,
  Abort,
}

/// The default runner, registered as [`PipeTaskRunner::NAME`].
///
/// Its own options are keyed by handler name and act as defaults under each
/// step's options:
///
/// ```json
/// { "Persist": { "singleton": false, "table": "users" } }
/// ```
///
/// With `singleton` (default `true`) one handler instance is built per
/// `flow.step.handler` key and reused by every task this runner executes.
pub struct PipeTaskRunner {
  config: Config,
  handlers: Arc<PluginRegistry<dyn Handler>>,
  error_handler: RwLock<Option<Arc<dyn ErrorHandler>>>,
  instances: Mutex<HashMap<(String, String, String), Arc<dyn Handler>>>,
}

impl PipeTaskRunner {
  pub const NAME: &'static str = "PipeTaskRunner";

  pub fn new(config: Config, handlers: Arc<PluginRegistry<dyn Handler>>) -> Self {
    Self {
      config,
      handlers,
      error_handler: RwLock::new(None),
      instances: Mutex::new(HashMap::new()),
    }
  }

  /// Number of cached singleton handler instances.
  pub fn cached_instances(&self) -> usize {
    self.instances.lock().len()
  }

  /// Step options layered over the runner's options for the step's handler.
  fn effective_config(&self, step: &Step) -> Config {
    step.config().with_fallback(&self.config.child(step.handler_name()))
  }

  fn resolve_handler(&self, step: &Step) -> FlowResult<Arc<dyn Handler>> {
    let conf = self.effective_config(step);
    let singleton = conf.get_bool("singleton", true);
    let key = step.instance_key();

    if singleton {
      if let Some(handler) = self.instances.lock().get(&key) {
        event!(Level::TRACE, key = %step, "Reusing cached handler instance.");
        return Ok(Arc::clone(handler));
      }
    }

    // Built outside the cache lock; a concurrent resolution of the same key
    // may build twice, but only the first instance is ever cached and handed out.
    let handler = self.handlers.create(step.handler_name(), &conf)?;
    if !singleton {
      return Ok(handler);
    }

    event!(Level::DEBUG, key = %step, "Caching handler instance.");
    let mut instances = self.instances.lock();
    Ok(Arc::clone(instances.entry(key).or_insert(handler)))
  }

  async fn on_failure(&self, task: &Task, err: FlowError, step: &Step, ctx: Arc<dyn Context>) -> StepControl {
    event!(Level::ERROR, error = %err, "Step failed.");
    task.record_error(err.clone());

    let error_handler = self.error_handler.read().clone();
    let proceed = match error_handler {
      Some(handler) => handler.handle(&err, step, ctx).await,
      None => false,
    };

    if proceed {
      event!(Level::WARN, "Error handler suppressed the failure, continuing.");
      StepControl::Continue
    } else {
      event!(Level::INFO, "Aborting remaining steps.");
      StepControl::Abort
    }
  }

  async fn run_step(&self, task: &Task, step: &Step) -> StepControl {
    let ctx = task.context();

    let handler = match self.resolve_handler(step) {
      Ok(handler) => handler,
      Err(err) => return self.on_failure(task, err, step, ctx).await,
    };

    match handler.handle(step, Arc::clone(&ctx)).await {
      Ok(()) => {
        event!(Level::DEBUG, "Step finished.");
        StepControl::Continue
      }
      Err(cause) => {
        let err = FlowError::HandlerFailed {
          step: step.name().to_string(),
          handler: step.handler_name().to_string(),
          cause: Arc::new(cause),
        };
        self.on_failure(task, err, step, ctx).await
      }
    }
  }
}

#[async_trait]
impl TaskRunner for PipeTaskRunner {
  #[instrument(
    name = "PipeTaskRunner::run",
    skip_all,
    fields(flow = %task.flow_name(), task_id = %task.id(), num_steps = task.steps().len())
  )]
  async fn run(&self, task: &Task) {
    event!(Level::DEBUG, "Pipe run starting.");

    for (step_idx, step) in task.steps().iter().enumerate() {
      let step_span = info_span!(
        "pipe_step",
        step_name = step.name(),
        handler = step.handler_name(),
        step_index = step_idx
      );
      if self.run_step(task, step).instrument(step_span).await == StepControl::Abort {
        return;
      }
    }

    event!(Level::DEBUG, "Pipe run finished.");
  }

  fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
    *self.error_handler.write() = Some(handler);
  }
}
