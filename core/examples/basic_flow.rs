// pipeflow/examples/basic_flow.rs

use pipeflow::{Config, Context, Flow, FlowError, FnHandler, Handler, NameValue, Registry, Step};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Flow Example ---");

  // 1. Register handler factories under the names steps refer to.
  let registry = Registry::new();

  registry.register_handler("Greeter", |conf: &Config| -> anyhow::Result<Arc<dyn Handler>> {
    let greeting = conf.get_string("greeting", "Hello");
    let handler = FnHandler::new(move |step: Step, ctx: Arc<dyn Context>| {
      let greeting = greeting.clone();
      async move {
        let name = ctx.get("user").and_then(|v| v.as_str().map(String::from)).unwrap_or_default();
        let message = format!("{}, {}!", greeting, name);
        info!(step = step.name(), "{}", message);
        ctx.append_output(vec![NameValue::new("greeting", json!(message)).with_tags(["text"])]);
        Ok(())
      }
    });
    Ok(Arc::new(handler) as Arc<dyn Handler>)
  });

  registry.register_handler("Counter", |_conf: &Config| -> anyhow::Result<Arc<dyn Handler>> {
    let handler = FnHandler::new(|_step: Step, ctx: Arc<dyn Context>| async move {
      let visits = ctx.get("visits").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
      ctx.set("visits", json!(visits));
      ctx.append_output(vec![NameValue::new("visits", json!(visits))]);
      Ok(())
    });
    Ok(Arc::new(handler) as Arc<dyn Handler>)
  });

  // 2. Declare the flow. The runner's options give per-handler defaults,
  //    which a step's own config overrides.
  let flow = Flow::builder("welcome")
    .runner("PipeTaskRunner", Config::new().set("Greeter.greeting", "Hi"))
    .step("count", "Counter")
    .step_with_config("greet", "Greeter", Config::new().set("greeting", "Welcome"))
    .build(&registry)?;

  // 3. Each task gets its own context; seed it before running.
  for user in ["ada", "grace"] {
    let task = flow.new_task();
    task.context().set("user", json!(user));
    task.run().await?;

    info!(task = %task, status = %task.status(), "Task finished.");
    for entry in task.context().list_output() {
      info!("  output {} = {}", entry.name, entry.value);
    }
  }

  Ok(())
}
