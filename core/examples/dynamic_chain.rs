// pipeflow/examples/dynamic_chain.rs

use pipeflow::{Config, Context, FlowError, FuncRegistry, HandlerFunc, Params, Registry, Subscriber};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Dynamic Chain Example ---");

  let funcs = FuncRegistry::new();

  funcs.register(
    "reserve",
    HandlerFunc::new(|ctx: Arc<dyn Context>, params: Params| async move {
      let sku = params.string("sku");
      info!("Reserving {}", sku);
      ctx.set("reserved", json!(sku));
      Ok(())
    }),
  )?;

  funcs.register(
    "charge",
    HandlerFunc::new(|ctx: Arc<dyn Context>, params: Params| async move {
      let limit = ctx.config("billing").map(|c| c.get_i64("limit", 0)).unwrap_or(0);
      let amount = params.int64("amount");
      if amount > limit {
        anyhow::bail!("amount {} exceeds limit {}", amount, limit);
      }
      if let Some(cache) = ctx.cache("LocalCache") {
        cache.increment("charges", 1)?;
      }
      info!("Charged {}", amount);
      Ok(())
    }),
  )?;

  let audit = Subscriber::new(|ctx: Arc<dyn Context>, _params: Params| async move {
    match ctx.error() {
      Some(err) => warn!(context_id = ctx.id(), "Audit: chain failed: {}", err),
      None => info!(context_id = ctx.id(), "Audit: chain succeeded"),
    }
  });

  let registry = Registry::new();
  for amount in [40i64, 400] {
    let result = funcs
      .begin()
      .with_config("billing", Config::new().set("limit", 100))
      .with_registered_cache(&registry, "LocalCache", &Config::new())
      .then_with("reserve", Params::new().with("sku", "book-42".to_string()))
      .then_with("charge", Params::new().with("amount", amount))
      .subscribe(vec![audit.clone()])
      .commit()
      .await;
    match result {
      Ok(_) => info!("Order for {} committed.", amount),
      Err(e) => warn!("Order for {} rejected: {}", amount, e),
    }
  }

  // Unknown names make the whole chain fail before anything runs.
  if let Err(e) = funcs.begin().then("reserve").then("ship").commit().await {
    info!("Chain not built: {}", e);
  }

  // Subscribers run detached; give them a moment before the runtime exits.
  tokio::time::sleep(Duration::from_millis(50)).await;
  Ok(())
}
