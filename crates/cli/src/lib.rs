mod app;
pub mod command;

/// Re-exports.
pub use app::{Args, RunCmd};
