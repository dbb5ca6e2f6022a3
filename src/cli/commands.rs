use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "will", about = "Multi-model trading decision and consensus engine")]
pub struct Cli {
    /// TOML config file (falls back to WILL_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one decision cycle
    Decide {
        /// JSON request with request_id, asset, timeframe, market_conditions, requested_volume, risk_profile
        json: String,
    },
    /// Decide a JSON array of requests concurrently, then print decisions and model health
    Batch {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Print the effective configuration
    Config,
}
