//! Render module driving the external HTML rendering binaries
//!
//! # Features
//!
//! - **Argument translation** ([`args`]) - `options[<name>]` form fields to `--<name>` flags
//! - **Subprocess execution** ([`exec`]) - bounded, cancellable runs with output capture
//! - **Orchestration** ([`convert`]) - temporary artifacts, invocation, read-back
//!
//! No rendering happens in-process: `wkhtmltopdf` and `wkhtmltoimage` do the
//! work, this module only shapes their invocation and collects the result.

pub mod args;
pub mod convert;
pub mod exec;
mod form;
mod types;

// Re-export public API
pub use args::{option_name, resolve_input, translate_options, InputSource};
pub use convert::{CommandInvocation, ConversionRequest, Converter, PreparedConversion};
pub use exec::{CommandRunner, LogSink, OutputStream, Tee};
pub use form::FormFields;
pub use types::{
    ErrorKind, OutputFormat, RenderError, Result, DEFAULT_IMAGE_BINARY, DEFAULT_PDF_BINARY,
};
