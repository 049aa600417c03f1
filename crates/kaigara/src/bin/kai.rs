//! `kai` binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use kaigara::commands::{DelCommand, DumpCommand, EnvCommand, SaveCommand, TailCommand};
use kaigara::factory::{encryptor_from_config, storage_from_config};
use kaigara::telemetry::init_tracing;
use kaigara::{KaiCli, KaiCommands};

fn main() -> ExitCode {
    let cli = KaiCli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: KaiCli) -> anyhow::Result<()> {
    let config = match cli.config.load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            return Err(e).context("failed to load configuration");
        }
    };
    init_tracing(&config.log_level);

    let mut stdout = io::stdout().lock();

    if let KaiCommands::Tail {
        channel,
        show_channel,
    } = &cli.command
    {
        TailCommand::new(&config)
            .execute(&mut stdout, channel, *show_channel)
            .await?;
        return Ok(());
    }

    let encryptor = encryptor_from_config(&config)
        .await
        .context("failed to initialize encryptor")?;
    let storage = storage_from_config(&config, encryptor)
        .await
        .context("failed to initialize storage")?;
    let storage = storage.as_ref();

    match &cli.command {
        KaiCommands::Dump { output } => {
            DumpCommand::new(storage, &config)
                .execute(&mut stdout, output)
                .await?;
        }
        KaiCommands::Save { file } => {
            SaveCommand::new(storage).execute(&mut stdout, file).await?;
        }
        KaiCommands::Del { pattern } => {
            DelCommand::new(storage).execute(&mut stdout, pattern).await?;
        }
        KaiCommands::Env { name } => {
            EnvCommand::new(storage, &config)
                .execute(&mut stdout, name.as_deref())
                .await?;
        }
        KaiCommands::Tail { .. } => {}
    }

    Ok(())
}
