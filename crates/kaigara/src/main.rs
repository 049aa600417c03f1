//! `kaigara` binary entrypoint.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use kai_supervisor::Supervisor;
use kaigara::factory::{
    encryptor_from_config, logstream_from_config, storage_from_config, supervisor_config,
};
use kaigara::telemetry::{init_tracing, shutdown_signal};
use kaigara::KaigaraCli;

fn main() -> ExitCode {
    let cli = KaigaraCli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    };

    // The stdin forwarder may be parked in a blocking read.
    runtime.shutdown_timeout(Duration::from_secs(1));
    code
}

async fn run(cli: KaigaraCli) -> anyhow::Result<ExitCode> {
    let config = match cli.config.load().and_then(|c| c.require_app_names().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            return Err(e).context("failed to load configuration");
        }
    };
    init_tracing(&config.log_level);

    let encryptor = encryptor_from_config(&config)
        .await
        .context("failed to initialize encryptor")?;
    let storage = storage_from_config(&config, encryptor)
        .await
        .context("failed to initialize storage")?;
    let logs = logstream_from_config(&config).await;

    let supervisor = Supervisor::new(storage, logs, supervisor_config(&config), &cli.command)?
        .with_stdin(Box::new(tokio::io::stdin()));

    let shutdown = supervisor.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("signal received, shutting down");
        shutdown.cancel();
    });

    let outcome = supervisor.run().await?;
    info!(
        exit_code = outcome.exit_code(),
        restarts = outcome.restarts,
        termination = %outcome.last_termination,
        "supervisor finished"
    );

    Ok(u8::try_from(outcome.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from))
}
