//! wkhtmltox-http - HTML to PDF/JPEG conversion over HTTP
//!
//! Every request becomes one `wkhtmltopdf` or `wkhtmltoimage` subprocess.
//! The crate shapes the invocation, manages the temporary files around it
//! and binds the subprocess lifetime to the request.
//!
//! # Modules
//!
//! - [`render`] - argument translation, subprocess execution, orchestration
//! - [`web`] - axum routes, server and graceful shutdown
//! - [`cli`] - command-line flags
//! - [`telemetry`] - tracing subscriber setup

pub mod cli;
pub mod render;
pub mod telemetry;
pub mod web;

pub use cli::Cli;
pub use render::{
    CommandInvocation, ConversionRequest, Converter, ErrorKind, FormFields, OutputFormat,
    RenderError,
};
pub use web::{ServerConfig, ServerError, ShutdownCoordinator, ShutdownResult, WebServer};

/// Process exit codes
pub mod exit_codes {
    /// Clean shutdown
    pub const SUCCESS: i32 = 0;
    /// Runtime failure or forced shutdown
    pub const GENERAL_ERROR: i32 = 1;
    /// Invalid command-line arguments
    pub const INVALID_ARGS: i32 = 2;
    /// Listen address unavailable
    pub const BIND_ERROR: i32 = 3;
}
