// pipeflow/examples/flow_from_config.rs

use pipeflow::{Config, Context, Flow, FnHandler, Handler, NameValue, Registry, Step};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const FLOW_CONFIG: &str = r#"{
  "context_provider": { "name": "LocalContextProvider" },
  "runner": {
    "name": "PipeTaskRunner",
    "options": {
      "Resize": { "width": 640 }
    }
  },
  "steps": ["thumbnail", "preview", "Archive"],
  "step": {
    "thumbnail": { "handler": "Resize", "options": { "width": 128 } },
    "preview": { "handler": "Resize", "options": { "singleton": false } }
  }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Flow From Config Example ---");

  let registry = Registry::new();
  registry.register_handler("Resize", |conf: &Config| -> anyhow::Result<Arc<dyn Handler>> {
    let width = conf.get_i64("width", 0);
    info!(width, "Building Resize handler.");
    let handler = FnHandler::new(move |step: Step, ctx: Arc<dyn Context>| async move {
      ctx.append_output(vec![NameValue::new(step.name(), json!({ "width": width })).with_tags(["image"])]);
      Ok(())
    });
    Ok(Arc::new(handler) as Arc<dyn Handler>)
  });
  registry.register_handler("Archive", |_conf: &Config| -> anyhow::Result<Arc<dyn Handler>> {
    let handler = FnHandler::new(|_step: Step, ctx: Arc<dyn Context>| async move {
      let images = ctx.find_output("thumbnail", &["image"]).len() + ctx.find_output("preview", &["image"]).len();
      ctx.set("archived", json!(images));
      Ok(())
    });
    Ok(Arc::new(handler) as Arc<dyn Handler>)
  });

  info!("Handlers: {:?}", registry.handlers().list());
  info!("Runners: {:?}", registry.runners().list());

  let conf = Config::from_json_str(FLOW_CONFIG)?;
  let flow = Flow::from_config("images", &conf, &registry)?;
  for step in flow.steps() {
    info!("Declared {}", step);
  }

  // "preview" is not a singleton, so its handler is rebuilt for every task.
  for _ in 0..2 {
    let task = flow.new_task();
    task.run().await?;
    info!(task = %task, archived = ?task.context().get("archived"), "Task done.");
  }

  Ok(())
}
