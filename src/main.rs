// StakeChain Node - Entry point
// Principle: Parameters change only with a majority of stake, and never mid-block

#![allow(dead_code)]

mod cli;
mod contracts;
mod execution;
mod genesis;
mod node;
mod storage;
mod types;

#[cfg(test)]
mod tests;

use clap::Parser;
use cli::config::NodeConfig;
use cli::runner::{run_apply, run_init, run_status};
use cli::{Cli, Commands};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_filter = if cli.verbose {
        "debug"
    } else {
        &cli.log_level
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    match cli.command {
        Commands::Init(args) => {
            let config = load_config(&args, None)?;
            run_init(&config).map_err(|e| {
                error!("Init failed: {}", e);
                anyhow::anyhow!("Init failed: {}", e)
            })?;
        }

        Commands::Status(args) => {
            let config = load_config(&args, None)?;
            run_status(&config).map_err(|e| anyhow::anyhow!("Status failed: {}", e))?;
        }

        Commands::Apply(cmd) => {
            let config = load_config(&cmd.chain, cmd.author.as_deref())?;
            let receipt = run_apply(&config, &cmd.block, cmd.timestamp, &cmd.extra_data).map_err(|e| {
                error!("Block production failed: {}", e);
                anyhow::anyhow!("Block production failed: {}", e)
            })?;
            info!(
                "Block #{} sealed: {} included, {} rejected",
                receipt.number,
                receipt.included.len(),
                receipt.rejected.len()
            );
        }

        Commands::Key { output } => generate_key(output.as_ref())?,
    }

    Ok(())
}

fn load_config(args: &cli::ChainArgs, author: Option<&str>) -> anyhow::Result<NodeConfig> {
    NodeConfig::from_args(args, author).map_err(|e| {
        error!("Configuration error: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })
}

/// Generate a new Ed25519 keypair
fn generate_key(output: Option<&std::path::PathBuf>) -> anyhow::Result<()> {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    let signing_key = SigningKey::generate(&mut OsRng);
    let account = types::AccountId::from_public_key(&signing_key.verifying_key());

    let json = serde_json::json!({
        "secretKey": format!("0x{}", hex::encode(signing_key.to_bytes())),
        "accountId": account.to_hex(),
    });
    let output_str = serde_json::to_string_pretty(&json)?;

    if let Some(path) = output {
        std::fs::write(path, &output_str)?;
        info!("Key saved to: {}", path.display());
    } else {
        println!("{}", output_str);
    }
    Ok(())
}
