//! Web server module for wkhtmltox-http
//!
//! Exposes the rendering binaries over HTTP.
//!
//! # Endpoints
//!
//! - `GET|POST /healthz` - liveness probe, always `OK`
//! - `GET|POST /version` - stdout of `wkhtmltopdf --version`
//! - `GET|POST /pdf` - render `url` or `html` to PDF
//! - `GET|POST /jpg` - render `url` or `html` to JPEG
//!
//! Conversion endpoints accept `options[<name>]=<value>` fields, forwarded to
//! the binary as `--<name> <value>` (or a bare `--<name>` for empty values).

mod form;
mod middleware;
mod routes;
mod server;
pub mod shutdown;

pub use form::SubmittedForm;
pub use routes::{api_routes, AppError, AppState};
pub use server::{ServerConfig, ServerError, WebServer};
pub use shutdown::{ShutdownConfig, ShutdownCoordinator, ShutdownResult, ShutdownSignal};

use std::time::Duration;

/// Default listen address (all interfaces)
pub const DEFAULT_ADDRESS: &str = ":8080";

/// Default per-request subprocess timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request body read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Default response body write timeout
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request body limit in bytes (32 MB)
pub const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;
