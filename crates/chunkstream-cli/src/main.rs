//! ChunkStream CLI
//!
//! Drives the streaming engine from the command line: stream a single
//! payload with live chunk output, or run a batch under a concurrency cap.

use clap::Parser;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.global)?;

    init_logging(&config, cli.global.verbose);

    match cli.command {
        Commands::Stream { text, stop_after } => {
            let content =
                commands::run_stream(&config, text, stop_after.map(Duration::from_millis)).await?;
            println!();
            println!("Full content: {}", content);
        }

        Commands::Batch {
            texts,
            file,
            max_concurrent,
            json,
        } => {
            let payloads = match file {
                Some(path) => commands::read_payloads(&path)?,
                None => texts,
            };

            let results = commands::run_batch(&config, payloads, max_concurrent).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for (idx, result) in results.iter().enumerate() {
                    println!("[{}] {}", idx, result);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let filter = if verbose {
        "chunkstream_cli=debug,chunkstream_core=debug".to_string()
    } else {
        config.logging.filter.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
