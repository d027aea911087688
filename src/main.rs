//! wkhtmltox-http - HTML to PDF/JPEG conversion over HTTP
//!
//! Server entry point

use clap::Parser;
use tracing::{error, info, warn};
use wkhtmltox_http::{
    exit_codes,
    telemetry::{self, LogFormat},
    web::shutdown::spawn_signal_watcher,
    Cli, ServerConfig, ServerError, ShutdownResult, WebServer,
};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::INVALID_ARGS
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = telemetry::init(cli.debug, LogFormat::detect()) {
        eprintln!("Error: {}", e);
        std::process::exit(exit_codes::GENERAL_ERROR);
    }

    std::process::exit(run_serve(&cli));
}

fn run_serve(cli: &Cli) -> i32 {
    let config = ServerConfig::from(cli);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return exit_codes::GENERAL_ERROR;
        }
    };

    let result = rt.block_on(async {
        let server = WebServer::with_config(config);
        spawn_signal_watcher(server.shutdown().clone());
        server.run().await
    });

    match result {
        Ok(ShutdownResult::Success) => {
            info!("server stopped");
            exit_codes::SUCCESS
        }
        Ok(ShutdownResult::Timeout { pending_requests }) => {
            warn!(pending_requests, "server stopped with aborted requests");
            exit_codes::SUCCESS
        }
        Err(e @ ServerError::Bind { .. }) => {
            error!(error = %e, "error starting server");
            exit_codes::BIND_ERROR
        }
        Err(e) => {
            error!(error = %e, "server failed");
            exit_codes::GENERAL_ERROR
        }
    }
}
