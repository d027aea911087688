//! Command-line interface
//!
//! Flag names follow the historical `wkhtmltopdf` HTTP wrapper so existing
//! deployments keep working.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::render::{DEFAULT_IMAGE_BINARY, DEFAULT_PDF_BINARY};
use crate::web::{ServerConfig, DEFAULT_ADDRESS, DEFAULT_BODY_LIMIT};

/// HTML to PDF/JPEG conversion over HTTP
#[derive(Debug, Parser)]
#[command(name = "wkhtmltox-http", version, about)]
pub struct Cli {
    /// Path to wkhtmltopdf binary
    #[arg(long = "wkhtmltopdf", value_name = "PATH", default_value = DEFAULT_PDF_BINARY)]
    pub wkhtmltopdf: PathBuf,

    /// Path to wkhtmltoimage binary
    #[arg(long = "wkhtmltoimage", value_name = "PATH", default_value = DEFAULT_IMAGE_BINARY)]
    pub wkhtmltoimage: PathBuf,

    /// Address to listen on
    #[arg(long = "web.address", value_name = "ADDR", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Request timeout
    #[arg(long = "web.timeout", value_name = "DURATION", default_value = "10s", value_parser = parse_duration)]
    pub request_timeout: Duration,

    /// Read timeout
    #[arg(long = "web.readTimeout", value_name = "DURATION", default_value = "5s", value_parser = parse_duration)]
    pub read_timeout: Duration,

    /// Write timeout
    #[arg(long = "web.writeTimeout", value_name = "DURATION", default_value = "10s", value_parser = parse_duration)]
    pub write_timeout: Duration,

    /// Maximum request body size in bytes
    #[arg(long = "web.bodyLimit", value_name = "BYTES", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,

    /// Directory for temporary files
    #[arg(long = "temp-dir", value_name = "PATH")]
    pub temp_dir: Option<PathBuf>,

    /// Graceful shutdown period
    #[arg(long = "graceful-shutdown", value_name = "DURATION", default_value = "10s", value_parser = parse_duration)]
    pub graceful_shutdown: Duration,

    /// Debug mode
    #[arg(long)]
    pub debug: bool,
}

impl From<&Cli> for ServerConfig {
    fn from(cli: &Cli) -> Self {
        ServerConfig {
            pdf_binary: cli.wkhtmltopdf.clone(),
            image_binary: cli.wkhtmltoimage.clone(),
            address: cli.address.clone(),
            request_timeout: cli.request_timeout,
            read_timeout: cli.read_timeout,
            write_timeout: cli.write_timeout,
            body_limit: cli.body_limit,
            temp_dir: cli.temp_dir.clone(),
            grace_period: cli.graceful_shutdown,
        }
    }
}

/// Parse a duration such as `500ms`, `10s`, `1m30s`, `2h` or bare seconds
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if digits == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let value: f64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid number in duration {:?}", input))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        rest = &rest[unit_len..];
        total += Duration::from_nanos((value * nanos_per_unit).round() as u64);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("10s5").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["wkhtmltox-http"]);
        assert_eq!(cli.wkhtmltopdf, PathBuf::from("wkhtmltopdf"));
        assert_eq!(cli.wkhtmltoimage, PathBuf::from("wkhtmltoimage"));
        assert_eq!(cli.address, ":8080");
        assert_eq!(cli.request_timeout, Duration::from_secs(10));
        assert_eq!(cli.read_timeout, Duration::from_secs(5));
        assert_eq!(cli.write_timeout, Duration::from_secs(10));
        assert_eq!(cli.graceful_shutdown, Duration::from_secs(10));
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_to_server_config() {
        let cli = Cli::parse_from([
            "wkhtmltox-http",
            "--wkhtmltopdf",
            "/usr/local/bin/wkhtmltopdf",
            "--web.address",
            "127.0.0.1:9090",
            "--web.timeout",
            "30s",
            "--web.readTimeout=2s",
            "--temp-dir",
            "/scratch",
            "--graceful-shutdown",
            "1m",
            "--debug",
        ]);
        assert!(cli.debug);

        let config = ServerConfig::from(&cli);
        assert_eq!(config.pdf_binary, PathBuf::from("/usr/local/bin/wkhtmltopdf"));
        assert_eq!(config.address, "127.0.0.1:9090");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(2));
        assert_eq!(config.temp_dir, Some(PathBuf::from("/scratch")));
        assert_eq!(config.grace_period, Duration::from_secs(60));
    }

    #[test]
    fn test_cli_rejects_bad_duration() {
        assert!(Cli::try_parse_from(["wkhtmltox-http", "--web.timeout", "soon"]).is_err());
    }
}
