use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chunkstream")]
#[command(author, version, about = "Stream text payloads chunk by chunk")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Configuration file path (YAML)
    #[arg(short, long, global = true, env = "CHUNKSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// Delay between chunks in milliseconds
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a single payload, printing chunks as they arrive
    Stream {
        /// Text to stream
        text: String,

        /// Stop the stream after this many milliseconds
        #[arg(long)]
        stop_after: Option<u64>,
    },

    /// Stream many payloads with bounded concurrency
    Batch {
        /// Payloads to stream (ignored when --file is given)
        texts: Vec<String>,

        /// Read payloads from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Maximum number of concurrent streams
        #[arg(short = 'j', long)]
        max_concurrent: Option<usize>,

        /// Print results as a JSON array
        #[arg(long)]
        json: bool,
    },
}
