//! Run command — drives N concurrent client sessions and records results.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use pingload_core::{CsvLog, RESULT_LOG_HEADER, ResultRecord};
use pingload_protocol::WireMode;

use crate::error::ClientResult;
use crate::session::{ExchangeMode, SessionConfig, run_session};

/// Resolved options for the run command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub host: String,
    pub port: u16,
    pub messages: u32,
    pub clients: u32,
    pub servers: u32,
    pub scenario: String,
    pub repetition: u32,
    pub client_id_base: String,
    pub wire: WireMode,
    pub exchange: ExchangeMode,
    pub connect_timeout: Duration,
    pub session_timeout: Option<Duration>,
    pub report_path: PathBuf,
}

/// Runs the configured sessions concurrently and appends one result row per
/// session.
pub async fn run(opts: RunOptions) -> ClientResult<()> {
    let log = Arc::new(CsvLog::new(&opts.report_path, &RESULT_LOG_HEADER));

    info!(
        host = %opts.host,
        port = opts.port,
        clients = opts.clients,
        messages = opts.messages,
        wire = %opts.wire,
        scenario = %opts.scenario,
        "Starting load run"
    );

    let start = Instant::now();
    let mut tasks = Vec::with_capacity(opts.clients as usize);

    for index in 1..=opts.clients {
        let opts = opts.clone();
        let log = log.clone();

        tasks.push(tokio::spawn(async move {
            let mut config = SessionConfig::new(
                opts.host,
                opts.port,
                format!("{}_{}", opts.client_id_base, index),
            )
            .with_messages(opts.messages)
            .with_wire(opts.wire)
            .with_exchange(opts.exchange)
            .with_connect_timeout(opts.connect_timeout);
            if let Some(limit) = opts.session_timeout {
                config = config.with_session_timeout(limit);
            }

            let outcome = run_session(&config).await;

            let record = ResultRecord {
                scenario_id: opts.scenario,
                repetition: opts.repetition,
                client_index: index,
                num_clients: opts.clients,
                num_servers: opts.servers,
                num_messages: opts.messages,
                started_at: outcome.started_at,
                finished_at: outcome.finished_at,
                elapsed_ms: outcome.elapsed_ms,
                status: outcome.status,
                error: outcome.error.clone(),
                mem_mb: None,
            };
            if let Err(e) = log.append(&record.to_row()) {
                warn!(client_index = index, error = %e, "Failed to append result row");
            }

            outcome
        }));
    }

    let mut successes = 0u32;
    let mut failures = 0u32;
    for task in tasks {
        match task.await {
            Ok(outcome) => {
                if outcome.is_success() {
                    successes += 1;
                } else {
                    failures += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, "Session task panicked");
                failures += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    println!(
        "{} sessions: {} succeeded, {} failed in {:.3}s",
        opts.clients,
        successes,
        failures,
        elapsed.as_secs_f64()
    );
    println!("results appended to {}", opts.report_path.display());

    Ok(())
}
