use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;
use will_core::application::snapshot_builder::DecisionRequest;
use will_core::cli::commands::{Cli, Commands};
use will_core::config::EngineConfig;
use will_core::WillEngine;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("will_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var_os("WILL_CONFIG").map(PathBuf::from));

    let config = match EngineConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(config, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(config: EngineConfig, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Decide { json } => {
            let engine = WillEngine::new(config)?;
            let request: DecisionRequest = serde_json::from_str(&json)?;
            let decision = engine.decide_request(request).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Batch { file } => {
            let engine = Arc::new(WillEngine::new(config)?);
            let raw = std::fs::read_to_string(&file)
                .map_err(|e| format!("cannot read {}: {e}", file.display()))?;
            let requests: Vec<DecisionRequest> = serde_json::from_str(&raw)?;
            let total = requests.len();

            let mut set = JoinSet::new();
            for (idx, request) in requests.into_iter().enumerate() {
                let engine = Arc::clone(&engine);
                set.spawn(async move {
                    let request_id = request.request_id.clone();
                    let result = match engine.decide_request(request).await {
                        Ok(decision) => serde_json::to_value(&decision)
                            .unwrap_or_else(|e| serde_json::json!({ "request_id": request_id, "error": e.to_string() })),
                        Err(e) => serde_json::json!({ "request_id": request_id, "error": e.to_string() }),
                    };
                    (idx, result)
                });
            }

            let mut results = vec![serde_json::Value::Null; total];
            while let Some(joined) = set.join_next().await {
                let (idx, value) = joined?;
                results[idx] = value;
            }

            let out = serde_json::json!({
                "decisions": results,
                "health": engine.get_health_snapshot(),
                "retrain_candidates": engine.retrain_candidates(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
