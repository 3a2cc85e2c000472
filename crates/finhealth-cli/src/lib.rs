//! The `finhealth` command-line front end: settings, store retries, and the
//! subcommand bodies. `main.rs` only parses arguments and dispatches here.

pub mod commands;
pub mod render;
pub mod retry;
pub mod settings;

pub use settings::{RetryPolicy, Settings};
