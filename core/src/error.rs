// pipeflow/src/error.rs
use anyhow::Error as AnyhowError;
use std::sync::Arc;
use thiserror::Error;

use crate::flow::TaskStatus;

/// Errors produced by the engine.
///
/// Causes coming from user code (factories, handlers, chain links) are kept as
/// shared `anyhow::Error`s so the whole enum stays `Clone`: a task records its
/// error history and `Task::run` hands back the latest entry.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
  #[error("{kind} '{name}' not registered")]
  NotRegistered { kind: &'static str, name: String },

  #[error("Failed to construct {kind} '{name}': {cause}")]
  Construction {
    kind: &'static str,
    name: String,
    cause: Arc<AnyhowError>,
  },

  #[error("Step '{step}' (handler '{handler}') failed: {cause}")]
  HandlerFailed {
    step: String,
    handler: String,
    cause: Arc<AnyhowError>,
  },

  #[error("Task {task} is not ready, current status is {status}")]
  TaskNotReady { task: String, status: TaskStatus },

  #[error("Chain handler '{name}' does not exist")]
  ChainHandlerMissing { name: String },

  #[error("Chain handler '{name}' already registered")]
  DuplicateFunc { name: String },

  #[error("Name must not be empty")]
  InvalidName,

  #[error("Configuration error at '{key}': {message}")]
  Config { key: String, message: String },

  #[error("Cache error for key '{key}': {message}")]
  Cache { key: String, message: String },

  #[error("Chain link failed: {cause}")]
  Chain { cause: Arc<AnyhowError> },
}

impl FlowError {
  /// The user-supplied error behind a construction, handler or chain failure.
  ///
  /// A cause that is itself a `FlowError` carrying a cause (a chain bound as
  /// a step handler) is looked through, so the innermost user error is
  /// returned. Use `cause().and_then(|e| e.downcast_ref::<MyError>())` to
  /// recover the concrete type.
  pub fn cause(&self) -> Option<&AnyhowError> {
    let cause = match self {
      FlowError::Construction { cause, .. } | FlowError::HandlerFailed { cause, .. } | FlowError::Chain { cause } => {
        cause.as_ref()
      }
      _ => return None,
    };
    match cause.downcast_ref::<FlowError>().and_then(FlowError::cause) {
      Some(inner) => Some(inner),
      None => Some(cause),
    }
  }

  /// Shorthand for downcasting the user-supplied cause.
  pub fn downcast_ref<E>(&self) -> Option<&E>
  where
    E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
  {
    self.cause().and_then(|cause| cause.downcast_ref::<E>())
  }
}

impl From<AnyhowError> for FlowError {
  fn from(err: AnyhowError) -> Self {
    // Avoid Chain(FlowError(..)) when a link simply forwards an engine error.
    match err.downcast::<FlowError>() {
      Ok(flow_err) => flow_err,
      Err(err) => FlowError::Chain { cause: Arc::new(err) },
    }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
