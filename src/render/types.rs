//! Common types for the render module

use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

// ============================================================
// Constants
// ============================================================

/// Default PDF rendering binary
pub const DEFAULT_PDF_BINARY: &str = "wkhtmltopdf";

/// Default image rendering binary
pub const DEFAULT_IMAGE_BINARY: &str = "wkhtmltoimage";

/// Suffix of the temporary file holding inline HTML
pub const HTML_SUFFIX: &str = ".html";

/// Argument passed to the PDF binary by the version endpoint
pub const VERSION_ARG: &str = "--version";

// ============================================================
// Error Types
// ============================================================

/// Render error types
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{context}: {source}")]
    Resource {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to execute {program} ({status}): {stderr}")]
    ExecutionFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}: {stderr}")]
    TimedOut {
        program: String,
        timeout: Duration,
        stderr: String,
    },

    #[error("{program} was cancelled by server shutdown")]
    Cancelled { program: String },
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed form or no content source
    InvalidRequest,
    /// Temporary file could not be created, written or read
    ResourceError,
    /// The rendering binary failed, could not start, or was killed
    ExecutionFailed,
}

impl RenderError {
    pub(crate) fn resource(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| RenderError::Resource { context, source }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            RenderError::Resource { .. } => ErrorKind::ResourceError,
            RenderError::Spawn { .. }
            | RenderError::Wait { .. }
            | RenderError::ExecutionFailed { .. }
            | RenderError::TimedOut { .. }
            | RenderError::Cancelled { .. } => ErrorKind::ExecutionFailed,
        }
    }

    /// Captured stderr of the failed subprocess, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            RenderError::ExecutionFailed { stderr, .. } | RenderError::TimedOut { stderr, .. } => {
                Some(stderr)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;

// ============================================================
// Output Format
// ============================================================

/// Rendering target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// PDF document rendered by the PDF binary
    Pdf,
    /// JPEG image rendered by the image binary
    Jpg,
}

impl OutputFormat {
    /// Suffix of the temporary output file
    pub fn suffix(self) -> &'static str {
        match self {
            OutputFormat::Pdf => ".pdf",
            OutputFormat::Jpg => ".jpg",
        }
    }

    /// Response content type
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Jpg => "image/jpeg",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Pdf => write!(f, "pdf"),
            OutputFormat::Jpg => write!(f, "jpg"),
        }
    }
}
