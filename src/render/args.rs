//! Form-field to command-line argument translation
//!
//! Fields named `options[<name>]` become `--<name>` flags for the rendering
//! binary. The content source is either the `url` field or inline `html`
//! written to a temporary file.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use tempfile::TempPath;

use super::form::FormFields;
use super::types::{RenderError, Result, HTML_SUFFIX};

const OPTION_PREFIX: &str = "options[";
const OPTION_SUFFIX: &str = "]";

/// Extract `<name>` from a field named `options[<name>]`
pub fn option_name(field: &str) -> Option<&str> {
    field
        .strip_prefix(OPTION_PREFIX)?
        .strip_suffix(OPTION_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Translate `options[...]` fields into binary arguments.
///
/// Options are emitted in lexicographic order of their names. A repeated
/// option keeps its first value, and an empty value produces a bare flag.
pub fn translate_options(fields: &FormFields) -> Vec<String> {
    let mut options: BTreeMap<&str, &str> = BTreeMap::new();
    for (field, value) in fields.iter() {
        if let Some(name) = option_name(field) {
            options.entry(name).or_insert(value);
        }
    }

    let mut args = Vec::with_capacity(options.len() * 2);
    for (name, value) in options {
        args.push(format!("--{}", name));
        if !value.is_empty() {
            args.push(value.to_string());
        }
    }
    args
}

/// Resolved content source
#[derive(Debug)]
pub enum InputSource {
    /// Remote page passed to the binary verbatim
    Url(String),
    /// Inline HTML materialized to a temporary file, removed on drop
    Html(TempPath),
}

impl InputSource {
    /// Argument passed to the binary as the input
    pub fn as_arg(&self) -> &OsStr {
        match self {
            InputSource::Url(url) => OsStr::new(url),
            InputSource::Html(path) => path.as_os_str(),
        }
    }

    /// Path of the temporary HTML file, if one was created
    pub fn temp_path(&self) -> Option<&Path> {
        match self {
            InputSource::Url(_) => None,
            InputSource::Html(path) => Some(&**path),
        }
    }
}

/// Resolve the content source of a request.
///
/// Non-empty `html` wins over `url`. The URL is not validated here; the
/// rendering binary reports unreachable or malformed URLs itself.
pub fn resolve_input(fields: &FormFields, temp_dir: &Path) -> Result<InputSource> {
    if let Some(html) = fields.non_empty("html") {
        let mut file = tempfile::Builder::new()
            .suffix(HTML_SUFFIX)
            .tempfile_in(temp_dir)
            .map_err(RenderError::resource("failed to create html temp file"))?;

        file.write_all(html.as_bytes())
            .and_then(|_| file.flush())
            .map_err(RenderError::resource("failed to write html temp file"))?;

        return Ok(InputSource::Html(file.into_temp_path()));
    }

    match fields.non_empty("url") {
        Some(url) => Ok(InputSource::Url(url.to_string())),
        None => Err(RenderError::InvalidRequest(
            "url or html is required".to_string(),
        )),
    }
}
