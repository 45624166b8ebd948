// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use parking_lot::Mutex;
use pipeflow::{Config, Context, FnHandler, Handler, NameValue, Registry, Step};
use serde_json::json;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tracing::Level;

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("persist failed: {0}")]
  Persist(String),

  #[error("handler construction failed: {0}")]
  Construction(String),
}

// --- Probe shared between a test and the handlers it registers ---
#[derive(Clone, Default)]
pub struct Probe {
  calls: Arc<Mutex<Vec<String>>>,
  constructions: Arc<AtomicUsize>,
}

impl Probe {
  pub fn new() -> Self {
    Self::default()
  }

  /// Labels of handlers invoked so far, in invocation order.
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().clone()
  }

  pub fn constructions(&self) -> usize {
    self.constructions.load(Ordering::SeqCst)
  }

  fn record(&self, label: &str) {
    self.calls.lock().push(label.to_string());
  }

  fn constructed(&self) {
    self.constructions.fetch_add(1, Ordering::SeqCst);
  }
}

// --- Common Handler Factories ---

/// Factory for a handler that records its label and appends one output entry
/// named after the label, valued with the step name.
pub fn recording_factory(
  probe: &Probe,
  label: &'static str,
) -> impl Fn(&Config) -> anyhow::Result<Arc<dyn Handler>> + Send + Sync + 'static {
  let probe = probe.clone();
  move |_conf: &Config| -> anyhow::Result<Arc<dyn Handler>> {
    probe.constructed();
    let probe = probe.clone();
    let handler = FnHandler::new(move |step: Step, ctx: Arc<dyn Context>| {
      let probe = probe.clone();
      async move {
        probe.record(label);
        ctx.append_output(vec![NameValue::new(label, json!(step.name())).with_tags(["step"])]);
        tracing::debug!(target: "test_handlers", step = %step, "executed {}", label);
        Ok(())
      }
    });
    Ok(Arc::new(handler) as Arc<dyn Handler>)
  }
}

/// Factory for a handler that records its label and fails with `err`.
pub fn failing_factory(
  probe: &Probe,
  label: &'static str,
  err: TestError,
) -> impl Fn(&Config) -> anyhow::Result<Arc<dyn Handler>> + Send + Sync + 'static {
  let probe = probe.clone();
  move |_conf: &Config| -> anyhow::Result<Arc<dyn Handler>> {
    probe.constructed();
    let probe = probe.clone();
    let err = err.clone();
    let handler = FnHandler::new(move |step: Step, _ctx: Arc<dyn Context>| {
      let probe = probe.clone();
      let err = err.clone();
      async move {
        probe.record(label);
        tracing::warn!(target: "test_handlers", step = %step, "failing with: '{}'", err);
        Err(anyhow::Error::new(err))
      }
    });
    Ok(Arc::new(handler) as Arc<dyn Handler>)
  }
}

/// Factory that never produces a handler.
pub fn broken_factory(message: &'static str) -> impl Fn(&Config) -> anyhow::Result<Arc<dyn Handler>> + Send + Sync + 'static {
  move |_conf: &Config| -> anyhow::Result<Arc<dyn Handler>> { Err(anyhow::Error::new(TestError::Construction(message.to_string()))) }
}

/// Registry with the built-ins plus the onboarding handlers `V`, `P` and `N`,
/// all recording into `probe`.
pub fn onboarding_registry(probe: &Probe, failing_v: bool, failing_p: bool) -> Registry {
  let registry = Registry::new();
  if failing_v {
    registry.register_handler("V", failing_factory(probe, "V", TestError::Validation("email missing".into())));
  } else {
    registry.register_handler("V", recording_factory(probe, "V"));
  }
  if failing_p {
    registry.register_handler("P", failing_factory(probe, "P", TestError::Persist("db down".into())));
  } else {
    registry.register_handler("P", recording_factory(probe, "P"));
  }
  registry.register_handler("N", recording_factory(probe, "N"));
  registry
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Atomic counter for tests that count constructions across the process ---
pub static FACTORY_EXEC_COUNTER: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  FACTORY_EXEC_COUNTER.store(0, Ordering::SeqCst);
}
