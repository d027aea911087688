//! Web server implementation
//!
//! Provides the main server struct and configuration.

use axum::{extract::DefaultBodyLimit, Router};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::{RequestBodyTimeoutLayer, ResponseBodyTimeoutLayer};
use tracing::{info, warn};

use super::middleware::log_request;
use super::routes::{api_routes, AppState};
use super::shutdown::{drain, ShutdownConfig, ShutdownCoordinator, ShutdownResult};
use super::{
    DEFAULT_ADDRESS, DEFAULT_BODY_LIMIT, DEFAULT_READ_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_WRITE_TIMEOUT,
};
use crate::render::{Converter, DEFAULT_IMAGE_BINARY, DEFAULT_PDF_BINARY};

/// Time aborted requests get to respond after the grace period
const ABORT_DRAIN: Duration = Duration::from_secs(1);

/// Server error types
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error serving requests: {0}")]
    Serve(#[source] std::io::Error),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PDF rendering binary
    pub pdf_binary: PathBuf,
    /// Image rendering binary
    pub image_binary: PathBuf,
    /// Listen address, `:port` listens on all interfaces
    pub address: String,
    /// Subprocess timeout per request
    pub request_timeout: Duration,
    /// Request body read timeout
    pub read_timeout: Duration,
    /// Response body write timeout
    pub write_timeout: Duration,
    /// Maximum request body size in bytes
    pub body_limit: usize,
    /// Directory for temporary artifacts (system default when unset)
    pub temp_dir: Option<PathBuf>,
    /// Grace period after the first shutdown signal
    pub grace_period: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pdf_binary: PathBuf::from(DEFAULT_PDF_BINARY),
            image_binary: PathBuf::from(DEFAULT_IMAGE_BINARY),
            address: DEFAULT_ADDRESS.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            body_limit: DEFAULT_BODY_LIMIT,
            temp_dir: None,
            grace_period: super::shutdown::DEFAULT_GRACE_PERIOD,
        }
    }
}

impl ServerConfig {
    /// Set the listen address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set both rendering binaries
    pub fn with_binaries(mut self, pdf: impl Into<PathBuf>, image: impl Into<PathBuf>) -> Self {
        self.pdf_binary = pdf.into();
        self.image_binary = image.into();
        self
    }

    /// Set the per-request subprocess timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the request body limit
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Set the temporary artifact directory
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Set the shutdown grace period
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Address in a form accepted by the socket layer
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_address().parse()
    }

    /// Build the converter described by this configuration
    pub fn converter(&self) -> Converter {
        let converter = Converter::new(
            &self.pdf_binary,
            &self.image_binary,
            self.request_timeout,
        );
        match &self.temp_dir {
            Some(dir) => converter.with_temp_dir(dir),
            None => converter,
        }
    }
}

/// Web server instance
pub struct WebServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server with default configuration
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new web server with the given configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let shutdown =
            ShutdownCoordinator::new(ShutdownConfig::with_grace_period(config.grace_period));
        let state = Arc::new(AppState::new(config.converter(), shutdown));
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shutdown coordinator shared with every request
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.state.shutdown
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        api_routes()
            .layer(axum::middleware::from_fn(log_request))
            .layer(DefaultBodyLimit::max(self.config.body_limit))
            .layer(RequestBodyLimitLayer::new(self.config.body_limit))
            .layer(RequestBodyTimeoutLayer::new(self.config.read_timeout))
            .layer(ResponseBodyTimeoutLayer::new(self.config.write_timeout))
            .with_state(self.state.clone())
    }

    /// Warn about rendering binaries that cannot be resolved
    pub fn check_binaries(&self) {
        for binary in [&self.config.pdf_binary, &self.config.image_binary] {
            match which::which(binary) {
                Ok(path) => info!(binary = %path.display(), "found rendering binary"),
                Err(e) => warn!(binary = %binary.display(), error = %e, "rendering binary not found"),
            }
        }
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<ShutdownResult, ServerError> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;

        self.check_binaries();
        info!(
            address = %address,
            timeout = ?self.config.request_timeout,
            "starting server"
        );

        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<ShutdownResult, ServerError> {
        let shutdown = self.state.shutdown.clone();
        let signal = {
            let shutdown = shutdown.clone();
            async move { shutdown.wait_for_shutdown().await }
        };

        let server = axum::serve(
            listener,
            self.build_router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                result.map_err(ServerError::Serve)?;
                return Ok(ShutdownResult::Success);
            }
            _ = shutdown.wait_for_shutdown() => {}
        }

        info!(grace_period = ?shutdown.grace_period(), "graceful shutdown");
        drain(&shutdown, server, ABORT_DRAIN)
            .await
            .map_err(ServerError::Serve)
    }
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new()
    }
}
