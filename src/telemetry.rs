//! Logging setup

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Presence of this variable switches log output to JSON
pub const STRUCTURED_LOG_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Telemetry setup errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

impl LogFormat {
    /// JSON inside Kubernetes, compact text elsewhere
    pub fn detect() -> Self {
        Self::from_env_present(std::env::var_os(STRUCTURED_LOG_ENV).is_some())
    }

    fn from_env_present(present: bool) -> Self {
        if present {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// Default log level for the debug toggle
pub fn level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the level chosen by `debug`.
pub fn init(debug: bool, format: LogFormat) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level(debug).into())
        .from_env_lossy();

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
