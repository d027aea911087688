//! Conversion orchestration
//!
//! Turns one [`ConversionRequest`] into one subprocess invocation and reads
//! the rendered file back. Temporary artifacts are held as [`TempPath`]s and
//! removed when the conversion finishes, fails, is cancelled or unwinds.

use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use tracing::debug;

use super::args::{resolve_input, translate_options, InputSource};
use super::exec::CommandRunner;
use super::form::FormFields;
use super::types::{OutputFormat, RenderError, Result, VERSION_ARG};

/// One conversion submitted over HTTP
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub format: OutputFormat,
    pub fields: FormFields,
}

impl ConversionRequest {
    pub fn new(format: OutputFormat, fields: FormFields) -> Self {
        Self { format, fields }
    }
}

/// Binary plus ordered argument list
///
/// Options come first, then the input, then the output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandInvocation {
    /// Build a conversion invocation
    pub fn new(
        program: impl Into<PathBuf>,
        options: Vec<String>,
        input: &OsStr,
        output: &Path,
    ) -> Self {
        let mut args: Vec<OsString> = options.into_iter().map(OsString::from).collect();
        args.push(input.to_os_string());
        args.push(output.as_os_str().to_os_string());
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build the version query invocation
    pub fn version(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![OsString::from(VERSION_ARG)],
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

/// Invocation together with the temporary files it refers to
#[derive(Debug)]
pub struct PreparedConversion {
    invocation: CommandInvocation,
    input: InputSource,
    output: TempPath,
}

impl PreparedConversion {
    pub fn invocation(&self) -> &CommandInvocation {
        &self.invocation
    }

    pub fn input(&self) -> &InputSource {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }
}

/// Drives the rendering binaries
#[derive(Debug, Clone)]
pub struct Converter {
    pdf_binary: PathBuf,
    image_binary: PathBuf,
    temp_dir: PathBuf,
    runner: CommandRunner,
}

impl Converter {
    /// Create a converter using the system temporary directory
    pub fn new(
        pdf_binary: impl Into<PathBuf>,
        image_binary: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            pdf_binary: pdf_binary.into(),
            image_binary: image_binary.into(),
            temp_dir: std::env::temp_dir(),
            runner: CommandRunner::new(timeout),
        }
    }

    /// Place temporary artifacts in `dir`
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Binary rendering the given format
    pub fn binary(&self, format: OutputFormat) -> &Path {
        match format {
            OutputFormat::Pdf => &self.pdf_binary,
            OutputFormat::Jpg => &self.image_binary,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    /// Resolve the input, allocate the output file and build the invocation
    pub fn prepare(&self, request: &ConversionRequest) -> Result<PreparedConversion> {
        let options = translate_options(&request.fields);
        let input = resolve_input(&request.fields, &self.temp_dir)?;

        let output = tempfile::Builder::new()
            .suffix(request.format.suffix())
            .tempfile_in(&self.temp_dir)
            .map_err(RenderError::resource("failed to create temp file"))?
            .into_temp_path();

        let invocation =
            CommandInvocation::new(self.binary(request.format), options, input.as_arg(), &output);

        Ok(PreparedConversion {
            invocation,
            input,
            output,
        })
    }

    /// Render the request and return the contents of the output file
    pub async fn convert<C>(&self, request: &ConversionRequest, cancel: C) -> Result<Vec<u8>>
    where
        C: Future<Output = ()>,
    {
        debug!(format = %request.format, fields = request.fields.len(), "processing request");

        let prepared = self.prepare(request)?;
        let invocation = prepared.invocation();

        self.runner
            .run(invocation.program(), invocation.args(), cancel)
            .await?;

        tokio::fs::read(prepared.output_path())
            .await
            .map_err(RenderError::resource("failed to read temp file"))
    }

    /// Run the PDF binary with `--version` and return its stdout
    pub async fn version<C>(&self, cancel: C) -> Result<Vec<u8>>
    where
        C: Future<Output = ()>,
    {
        let invocation = CommandInvocation::version(&self.pdf_binary);
        self.runner
            .run(invocation.program(), invocation.args(), cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::types::ErrorKind;

    fn request(format: OutputFormat, pairs: &[(&str, &str)]) -> ConversionRequest {
        ConversionRequest::new(format, pairs.iter().copied().collect())
    }

    fn converter(dir: &Path) -> Converter {
        Converter::new("wkhtmltopdf", "wkhtmltoimage", Duration::from_secs(5)).with_temp_dir(dir)
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_invocation_order() {
        let invocation = CommandInvocation::new(
            "wkhtmltopdf",
            vec!["--grayscale".into()],
            OsStr::new("http://example.com"),
            Path::new("/tmp/out.pdf"),
        );
        assert_eq!(invocation.program(), Path::new("wkhtmltopdf"));
        assert_eq!(
            invocation.args(),
            &[
                OsString::from("--grayscale"),
                OsString::from("http://example.com"),
                OsString::from("/tmp/out.pdf"),
            ]
        );
    }

    #[test]
    fn test_version_invocation() {
        let invocation = CommandInvocation::version("/usr/bin/wkhtmltopdf");
        assert_eq!(invocation.args(), &[OsString::from("--version")]);
    }

    #[test]
    fn test_binary_selected_by_format() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path());
        assert_eq!(converter.binary(OutputFormat::Pdf), Path::new("wkhtmltopdf"));
        assert_eq!(converter.binary(OutputFormat::Jpg), Path::new("wkhtmltoimage"));
    }

    #[test]
    fn test_prepare_url_with_bare_flag() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path());
        let prepared = converter
            .prepare(&request(
                OutputFormat::Pdf,
                &[("url", "http://example.com"), ("options[grayscale]", "")],
            ))
            .unwrap();

        let output = prepared.output_path().to_path_buf();
        assert_eq!(output.extension().unwrap(), "pdf");
        assert!(output.starts_with(dir.path()));
        assert_eq!(
            prepared.invocation().args(),
            &[
                OsString::from("--grayscale"),
                OsString::from("http://example.com"),
                output.clone().into_os_string(),
            ]
        );

        drop(prepared);
        assert!(!output.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_prepare_html_input_is_second_to_last() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path());
        let prepared = converter
            .prepare(&request(
                OutputFormat::Jpg,
                &[("html", "<p>hi</p>"), ("options[quality]", "80")],
            ))
            .unwrap();

        let input = prepared.input().temp_path().unwrap().to_path_buf();
        let args = prepared.invocation().args();
        assert_eq!(prepared.invocation().program(), Path::new("wkhtmltoimage"));
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], OsString::from("--quality"));
        assert_eq!(args[1], OsString::from("80"));
        assert_eq!(args[2], input.clone().into_os_string());
        assert_eq!(Path::new(&args[3]).extension().unwrap(), "jpg");
        assert_eq!(entries(dir.path()), 2);

        drop(prepared);
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_prepare_without_input_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let converter = converter(dir.path());
        let err = converter
            .prepare(&request(OutputFormat::Pdf, &[("options[grayscale]", "")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_convert_missing_binary_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::new(
            "/nonexistent/wkhtmltopdf",
            "/nonexistent/wkhtmltoimage",
            Duration::from_secs(5),
        )
        .with_temp_dir(dir.path());

        let err = converter
            .convert(
                &request(OutputFormat::Pdf, &[("html", "<p>hi</p>")]),
                std::future::pending(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert_eq!(entries(dir.path()), 0);
    }
}
