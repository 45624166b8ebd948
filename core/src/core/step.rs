// pipeflow/src/core/step.rs

//! Defines the structure for a single step within a flow.

use crate::config::Config;
use std::fmt;

/// One immutable unit of a flow: a handler binding plus step-local options.
///
/// Steps are built once when the flow is constructed and shared read-only by
/// every task created from that flow.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
  flow_name: String,
  name: String,
  handler_name: String,
  config: Config,
}

impl Step {
  pub fn new(
    flow_name: impl Into<String>,
    name: impl Into<String>,
    handler_name: impl Into<String>,
    config: Config,
  ) -> Self {
    Self {
      flow_name: flow_name.into(),
      name: name.into(),
      handler_name: handler_name.into(),
      config,
    }
  }

  pub fn flow_name(&self) -> &str {
    &self.flow_name
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn handler_name(&self) -> &str {
    &self.handler_name
  }

  /// Step-level options; they override the runner's options for the handler.
  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Key under which a singleton handler instance is cached. Kept as a tuple:
  /// names may contain dots, so a joined string would not be unique.
  pub fn instance_key(&self) -> (String, String, String) {
    (self.flow_name.clone(), self.name.clone(), self.handler_name.clone())
  }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<{}.{}.{}>", self.flow_name, self.name, self.handler_name)
  }
}
