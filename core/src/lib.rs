// pipeflow/src/lib.rs

//! Pipeflow: an embeddable, pluggable pipeline-execution engine.
//!
//! A host defines a named [`Flow`] as an ordered list of steps, binds each
//! step to a [`Handler`] registered by name, and executes the flow as a
//! single-use [`Task`]:
//!  - Handler, runner, context-provider and cache plugins registered in a [`Registry`].
//!  - A default [`PipeTaskRunner`] that runs steps strictly in order, caching
//!    handler instances per `(flow, step, handler)` unless `singleton` is off.
//!  - A pluggable [`ErrorHandler`] deciding whether a run continues past a failed step.
//!  - A per-task [`Context`] with an append-only [`Output`] log.
//!  - Ad-hoc chains of [`HandlerFunc`]s with fire-and-forget subscribers.

pub mod chain;
pub mod config;
pub mod core;
pub mod error;
pub mod flow;
pub mod registry;
pub mod runner;

// --- Re-exports for the Public API ---

pub use crate::core::cache::{Cache, LocalCache};
pub use crate::core::context::{Attachments, Context, ContextProvider, LocalContext, LocalContextProvider};
pub use crate::core::handler::{ErrorHandler, FnErrorHandler, FnHandler, Handler};
pub use crate::core::output::{NameValue, Output};
pub use crate::core::params::Params;
pub use crate::core::step::Step;

pub use crate::chain::{Chain, FuncRegistry, HandlerFunc, Subscriber};
pub use crate::config::Config;
pub use crate::flow::{Flow, FlowBuilder, Task, TaskStatus};
pub use crate::runner::{PipeTaskRunner, TaskRunner};

pub use crate::error::{FlowError, FlowResult};

// The registries for plugging in handlers, runners, context providers and caches
pub use crate::registry::{Factory, PluginRegistry, Registry};

/*
    Core Workflow:
    1. Build a `Registry` (`Registry::new()` carries the built-in runner,
       context provider and cache).
    2. Register a factory per handler: `registry.register_handler("Persist", |conf| ...)`.
    3. Build a flow: `Flow::builder("onboarding").step("validate", "Validate")...build(&registry)`
       or `Flow::from_config("onboarding", &conf, &registry)`.
    4. Optionally install an `ErrorHandler` with `flow.set_error_handler(..)`.
    5. Per execution: `let task = flow.new_task(); task.run().await`, then read
       `task.errors()` and `task.context().list_output()`.
*/
