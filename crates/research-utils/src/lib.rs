//! Shared utilities for the equity research pipeline
//!
//! Logging setup and environment-variable helpers used by the binaries and
//! by configuration loaders across the workspace.

pub mod config;
pub mod logging;

pub use config::{env_parse, env_var, load_dotenv};
pub use logging::{LogFormat, init_tracing};
