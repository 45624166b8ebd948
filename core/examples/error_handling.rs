// pipeflow/examples/error_handling.rs

use pipeflow::{Config, Context, Flow, FlowError, FnErrorHandler, FnHandler, Handler, Registry, Step};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
enum SignupError {
  #[error("email address is missing")]
  MissingEmail,
  #[error("mail server unreachable")]
  MailDown,
}

fn register(registry: &Registry, name: &str, fail_with: Option<fn() -> SignupError>) {
  registry.register_handler(name, move |_conf: &Config| -> anyhow::Result<Arc<dyn Handler>> {
    let handler = FnHandler::new(move |step: Step, _ctx: Arc<dyn Context>| async move {
      info!("Executing {}", step);
      match fail_with {
        Some(make) => Err(anyhow::Error::new(make())),
        None => Ok(()),
      }
    });
    Ok(Arc::new(handler) as Arc<dyn Handler>)
  });
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Error Handling Example ---");

  let registry = Registry::new();
  register(&registry, "Validate", Some(|| SignupError::MissingEmail));
  register(&registry, "Persist", None);
  register(&registry, "Notify", Some(|| SignupError::MailDown));

  let flow = match Flow::builder("signup")
    .step("validate", "Validate")
    .step("persist", "Persist")
    .step("notify", "Notify")
    .build(&registry)
  {
    Ok(flow) => flow,
    Err(e) => {
      error!("Could not build flow: {}", e);
      return;
    }
  };

  // Scenario 1: no error handler, the first failure aborts the task.
  info!("\nScenario 1: abort on first failure");
  let task = flow.new_task();
  match task.run().await {
    Ok(_) => error!("Task unexpectedly succeeded"),
    Err(e) => {
      info!("Task failed as expected: {}", e);
      if let Some(SignupError::MissingEmail) = e.downcast_ref::<SignupError>() {
        info!("Recovered the handler's own error type.");
      }
    }
  }

  // Scenario 2: an error handler keeps validation failures non-fatal.
  info!("\nScenario 2: continue past validation failures");
  flow.set_error_handler(Arc::new(FnErrorHandler::new(
    |err: &FlowError, step: &Step, _ctx: &dyn Context| {
      let keep_going = matches!(err.downcast_ref::<SignupError>(), Some(SignupError::MissingEmail));
      info!(step = step.name(), keep_going, "Error handler consulted.");
      keep_going
    },
  )));

  let task = flow.new_task();
  let result = task.run().await;
  info!("Recorded {} error(s).", task.errors().len());
  match result {
    Ok(_) => error!("Task unexpectedly succeeded"),
    Err(e) => info!("Task returned its latest error: {}", e),
  }

  // Scenario 3: a task runs once.
  info!("\nScenario 3: rerunning a finished task");
  if let Err(e @ FlowError::TaskNotReady { .. }) = task.run().await {
    info!("Rejected: {}", e);
  }
}
