// CLI - Command Line Interface for the StakeChain node
// Principle: Simple, clear, composable commands

pub mod config;
pub mod runner;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// StakeChain Node - stake-governed consensus parameters
#[derive(Parser, Debug)]
#[command(name = "stakechain-node")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "StakeChain node - consensus parameters governed by stake")]
#[command(long_about = r#"
Consensus parameters change only when stakeholders holding more than half of
all stake sign the exact proposal, and a change takes effect from the next block.

Create a development chain:
  stakechain-node init --chain solo

Execute a block of signed transactions:
  stakechain-node apply --block block.json
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "STAKECHAIN_LOG")]
    pub log_level: String,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the chain database from its genesis scheme
    Init(ChainArgs),

    /// Show best block, parameters, governance and stakes
    Status(ChainArgs),

    /// Produce one block from a JSON file of signed transactions
    Apply(ApplyCmd),

    /// Generate a new Ed25519 account key
    Key {
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Chain selection shared by every command
#[derive(Args, Debug, Clone)]
pub struct ChainArgs {
    /// Base path for chain data
    #[arg(short = 'd', long, env = "STAKECHAIN_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Genesis scheme (solo or path to a scheme file)
    #[arg(long, default_value = "solo")]
    pub chain: String,
}

impl ChainArgs {
    /// Get the base path, defaulting to platform-specific data directory
    pub fn get_base_path(&self) -> PathBuf {
        if let Some(ref path) = self.base_path {
            return path.clone();
        }

        let chain_dir = std::path::Path::new(&self.chain)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.chain.clone());

        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stakechain")
            .join("chains")
            .join(chain_dir)
    }
}

/// Produce a block
#[derive(Parser, Debug)]
pub struct ApplyCmd {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// JSON array of signed transactions
    #[arg(long, value_name = "FILE")]
    pub block: PathBuf,

    /// Block author credited with fees (hex account or dev account name)
    #[arg(long)]
    pub author: Option<String>,

    /// Block timestamp (defaults to now)
    #[arg(long)]
    pub timestamp: Option<u64>,

    /// Extra data, hex encoded
    #[arg(long, default_value = "")]
    pub extra_data: String,
}
