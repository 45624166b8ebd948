// pipeflow/src/flow.rs

//! Contains the `Flow` definition, its builder, and `Task`, one single-use
//! execution of a flow.

use crate::config::Config;
use crate::core::context::{Context, ContextProvider, LocalContextProvider};
use crate::core::handler::ErrorHandler;
use crate::core::step::Step;
use crate::error::{FlowError, FlowResult};
use crate::registry::Registry;
use crate::runner::{PipeTaskRunner, TaskRunner};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// Lifecycle of a task. Transitions only move forward:
/// `Ready → Pending → Running → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskStatus {
  Ready,
  Pending,
  Running,
  Done,
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      TaskStatus::Ready => "Ready",
      TaskStatus::Pending => "Pending",
      TaskStatus::Running => "Running",
      TaskStatus::Done => "Done",
    };
    f.write_str(label)
  }
}

/// A named, static pipeline: ordered steps plus the runner and context
/// provider used to execute them.
pub struct Flow {
  name: String,
  steps: Arc<[Step]>,
  runner: Arc<dyn TaskRunner>,
  context_provider: Arc<dyn ContextProvider>,
  context_config: Config,
}

impl Flow {
  pub fn builder(name: impl Into<String>) -> FlowBuilder {
    FlowBuilder::new(name)
  }

  /// Builds a flow from a configuration tree:
  ///
  /// ```json
  /// {
  ///   "context_provider": { "name": "LocalContextProvider", "options": {} },
  ///   "runner": { "name": "PipeTaskRunner", "options": {} },
  ///   "steps": ["validate", "persist"],
  ///   "step": { "validate": { "handler": "Validate", "options": {} } }
  /// }
  /// ```
  ///
  /// Both plugin names default to the built-ins. A step without a `handler`
  /// entry is bound to the handler of the same name.
  pub fn from_config(name: impl Into<String>, conf: &Config, registry: &Registry) -> FlowResult<Flow> {
    let provider = conf.get_config("context_provider");
    let runner = conf.get_config("runner");
    let step_table = conf.get_config("step");

    let mut builder = FlowBuilder::new(name)
      .context_provider(
        provider.get_string("name", LocalContextProvider::NAME),
        provider.get_config("options"),
      )
      .runner(runner.get_string("name", PipeTaskRunner::NAME), runner.get_config("options"));

    for step_name in conf.get_string_list("steps") {
      let step_conf = step_table.child(&step_name);
      let handler = step_conf.get_string("handler", &step_name);
      builder = builder.step_with_config(step_name, handler, step_conf.get_config("options"));
    }

    builder.build(registry)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn runner(&self) -> &Arc<dyn TaskRunner> {
    &self.runner
  }

  /// Installs the error-continuation policy on this flow's runner.
  pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
    self.runner.set_error_handler(handler);
  }

  /// A fresh `Ready` task with its own context.
  pub fn new_task(&self) -> Task {
    let ctx = self.context_provider.new_context(&self.context_config);
    let task = Task {
      id: Uuid::new_v4().to_string(),
      flow_name: self.name.clone(),
      steps: Arc::clone(&self.steps),
      ctx,
      runner: Arc::clone(&self.runner),
      status: RwLock::new(TaskStatus::Ready),
      errors: Mutex::new(Vec::new()),
    };
    event!(Level::DEBUG, flow = %self.name, task_id = %task.id, "Task created.");
    task
  }
}

impl fmt::Debug for Flow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Flow")
      .field("name", &self.name)
      .field("steps", &self.steps)
      .finish()
  }
}

struct StepDecl {
  name: String,
  handler: String,
  config: Config,
}

/// Collects a flow's steps and plugin choices, then resolves them against a
/// [`Registry`].
pub struct FlowBuilder {
  name: String,
  steps: Vec<StepDecl>,
  runner: (String, Config),
  context_provider: (String, Config),
  context_config: Config,
}

impl FlowBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      steps: Vec::new(),
      runner: (PipeTaskRunner::NAME.to_string(), Config::new()),
      context_provider: (LocalContextProvider::NAME.to_string(), Config::new()),
      context_config: Config::new(),
    }
  }

  pub fn runner(mut self, name: impl Into<String>, options: Config) -> Self {
    self.runner = (name.into(), options);
    self
  }

  /// Selects the provider; `options` are handed both to the provider factory
  /// and to every `new_context` call.
  pub fn context_provider(mut self, name: impl Into<String>, options: Config) -> Self {
    self.context_config = options.clone();
    self.context_provider = (name.into(), options);
    self
  }

  pub fn step(self, name: impl Into<String>, handler: impl Into<String>) -> Self {
    self.step_with_config(name, handler, Config::new())
  }

  pub fn step_with_config(mut self, name: impl Into<String>, handler: impl Into<String>, config: Config) -> Self {
    self.steps.push(StepDecl {
      name: name.into(),
      handler: handler.into(),
      config,
    });
    self
  }

  #[instrument(name = "FlowBuilder::build", skip_all, fields(flow = %self.name, num_steps = self.steps.len()), err(Display))]
  pub fn build(self, registry: &Registry) -> FlowResult<Flow> {
    for (idx, decl) in self.steps.iter().enumerate() {
      if decl.name.is_empty() || decl.handler.is_empty() {
        return Err(FlowError::Config {
          key: format!("steps[{}]", idx),
          message: "step and handler names must not be empty".to_string(),
        });
      }
      if self.steps[..idx].iter().any(|prev| prev.name == decl.name) {
        return Err(FlowError::Config {
          key: format!("steps[{}]", idx),
          message: format!("duplicate step name '{}' in flow '{}'", decl.name, self.name),
        });
      }
    }

    let context_provider = registry
      .context_providers()
      .create(&self.context_provider.0, &self.context_provider.1)?;
    let runner = registry.runners().create(&self.runner.0, &self.runner.1)?;

    let steps: Arc<[Step]> = self
      .steps
      .into_iter()
      .map(|decl| Step::new(self.name.clone(), decl.name, decl.handler, decl.config))
      .collect();

    event!(Level::DEBUG, runner = %self.runner.0, context_provider = %self.context_provider.0, "Flow built.");
    Ok(Flow {
      name: self.name,
      steps,
      runner,
      context_provider,
      context_config: self.context_config,
    })
  }
}

/// One execution of a [`Flow`].
///
/// A task runs at most once. Its status can be observed from other threads
/// while `run` is in progress.
pub struct Task {
  id: String,
  flow_name: String,
  steps: Arc<[Step]>,
  ctx: Arc<dyn Context>,
  runner: Arc<dyn TaskRunner>,
  status: RwLock<TaskStatus>,
  errors: Mutex<Vec<FlowError>>,
}

impl Task {
  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn flow_name(&self) -> &str {
    &self.flow_name
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn context(&self) -> Arc<dyn Context> {
    Arc::clone(&self.ctx)
  }

  pub fn status(&self) -> TaskStatus {
    *self.status.read()
  }

  /// Every error recorded during the run, in order.
  pub fn errors(&self) -> Vec<FlowError> {
    self.errors.lock().clone()
  }

  pub fn latest_error(&self) -> Option<FlowError> {
    self.errors.lock().last().cloned()
  }

  /// Appends a step failure. Called by task runners.
  pub fn record_error(&self, err: FlowError) {
    self.errors.lock().push(err);
  }

  fn set_status(&self, status: TaskStatus) {
    *self.status.write() = status;
  }

  /// Executes the flow's steps through the bound runner.
  ///
  /// Fails without side effects if the task is not `Ready` (including a task
  /// that already ran). Otherwise returns the most recently recorded error,
  /// even when the error handler let the run continue past earlier failures;
  /// see [`Task::errors`] for the full history.
  #[instrument(name = "Task::run", skip_all, fields(flow = %self.flow_name, task_id = %self.id))]
  pub async fn run(&self) -> FlowResult<()> {
    if let Some(err) = self.latest_error() {
      return Err(err);
    }

    {
      // Check-and-claim under one write lock so a second caller sees Pending.
      let mut status = self.status.write();
      if *status != TaskStatus::Ready {
        let err = FlowError::TaskNotReady {
          task: self.to_string(),
          status: *status,
        };
        event!(Level::WARN, error = %err, "Refusing to run task.");
        return Err(err);
      }
      *status = TaskStatus::Pending;
    }

    self.set_status(TaskStatus::Running);
    event!(Level::DEBUG, "Task running.");
    self.runner.run(self).await;
    self.set_status(TaskStatus::Done);

    match self.latest_error() {
      Some(err) => {
        event!(Level::DEBUG, errors = self.errors.lock().len(), "Task finished with errors.");
        Err(err)
      }
      None => {
        event!(Level::DEBUG, "Task finished.");
        Ok(())
      }
    }
  }
}

impl fmt::Display for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<{}.{}>", self.flow_name, self.id)
  }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("id", &self.id)
      .field("flow_name", &self.flow_name)
      .field("status", &self.status())
      .field("errors", &self.errors.lock().len())
      .finish()
  }
}
