pub mod cache;
pub mod context;
pub mod handler;
pub mod output;
pub mod params;
pub mod step;

// Re-export key types for easier access from other modules (and lib.rs)
pub use cache::{Cache, LocalCache};
pub use context::{Attachments, Context, ContextProvider, LocalContext, LocalContextProvider};
pub use handler::{ErrorHandler, FnErrorHandler, FnHandler, Handler};
pub use output::{NameValue, Output};
pub use params::Params;
pub use step::Step;
