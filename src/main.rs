//! Benchmark applications - Main entry point.

use benchapps::config::Config;
use benchapps::startup;
use benchapps::transport::{HttpTransport, Transport};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_tracing(&config);

    info!(
        app = %config.app,
        bind = %config.http_bind_addr(),
        "Starting benchmark application v{}",
        env!("CARGO_PKG_VERSION")
    );

    let application = match startup::bootstrap(&config).await {
        Ok(application) => application,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal_at_startup(), "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let transport = HttpTransport::new(application, &config.host, config.port)
        .with_graceful_timeout(config.shutdown_timeout_duration());

    info!(transport = transport.name(), "Serving");
    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}
