//! pingload CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use uuid::Uuid;

use pingload_client::cli::{Cli, Command};
use pingload_client::commands::{run::RunOptions, serve::ServeOptions};
use pingload_client::config::ClientConfig;
use pingload_client::error::{ClientError, ClientResult};
use pingload_client::session::ExchangeMode;
use pingload_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else if matches!(cli.command, Command::Serve { .. }) {
        TracingConfig::server()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    // Run the command
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    // Load configuration
    let config = if let Some(ref path) = cli.config {
        ClientConfig::load_from(path).map_err(ClientError::Config)?
    } else {
        ClientConfig::load().unwrap_or_default()
    };

    match cli.command {
        Command::Serve {
            port,
            bind,
            wire,
            max_connections,
            idle_timeout,
            request_log,
        } => {
            let bind = format!("{}:{}", bind, port)
                .parse()
                .map_err(|e| ClientError::Config(format!("invalid bind address: {}", e)))?;
            pingload_client::commands::serve::run(ServeOptions {
                bind,
                wire,
                max_connections,
                idle_timeout: idle_timeout.map(Duration::from_secs),
                request_log,
            })
            .await
        }
        Command::Run {
            host,
            port,
            messages,
            clients,
            client_id,
            servers,
            scenario,
            repetition,
            wire,
            pipelined,
            timeout,
            session_timeout,
            report,
        } => {
            let scenario = scenario.unwrap_or_else(|| {
                chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
            });
            let client_id_base =
                client_id.unwrap_or_else(|| format!("client-{}", Uuid::new_v4()));
            let exchange = if pipelined {
                ExchangeMode::Pipelined
            } else {
                ExchangeMode::Strict
            };
            pingload_client::commands::run::run(RunOptions {
                host: host.unwrap_or_else(|| config.connection.host.clone()),
                port: port.unwrap_or(config.connection.port),
                messages,
                clients,
                servers,
                scenario,
                repetition,
                client_id_base,
                wire,
                exchange,
                connect_timeout: Duration::from_secs(timeout.unwrap_or(config.connection.timeout)),
                session_timeout: session_timeout.map(Duration::from_secs),
                report_path: report.unwrap_or_else(|| config.report.path.clone()),
            })
            .await
        }
    }
}
