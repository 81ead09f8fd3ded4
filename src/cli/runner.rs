// Runner - Command execution against the chain database

use crate::cli::config::NodeConfig;
use crate::contracts::governance::StreamId;
use crate::node::{BlockReceipt, ChainContext, ChainError};
use crate::storage::{Database, DatabaseError};
use crate::types::{SignedTransaction, Timestamp};
use std::path::Path;
use tracing::info;

/// Opens (or creates) the chain described by `config`
pub fn open_chain(config: &NodeConfig) -> Result<ChainContext, RunnerError> {
    std::fs::create_dir_all(&config.base_path)
        .map_err(|e| RunnerError::Io(format!("Failed to create data dir: {}", e)))?;

    let db = Database::open(config.db_path())?;
    Ok(ChainContext::open(db, &config.scheme)?)
}

pub fn run_init(config: &NodeConfig) -> Result<(), RunnerError> {
    let chain = open_chain(config)?;
    info!("Data path: {}", config.base_path.display());
    println!("Chain:    {}", config.scheme.name);
    println!("Genesis:  {}", chain.genesis_hash().to_hex());
    println!("Best:     #{}", chain.best_number());
    Ok(())
}

pub fn run_status(config: &NodeConfig) -> Result<(), RunnerError> {
    let chain = open_chain(config)?;
    print!("{}", render_status(&chain));
    Ok(())
}

/// Reads a block of transactions, produces it and prints the receipt
pub fn run_apply(
    config: &NodeConfig,
    block_file: &Path,
    timestamp: Option<Timestamp>,
    extra_data: &str,
) -> Result<BlockReceipt, RunnerError> {
    let transactions = read_transactions(block_file)?;
    let extra_data = hex::decode(extra_data.strip_prefix("0x").unwrap_or(extra_data))
        .map_err(|e| RunnerError::Input(format!("Invalid extra data: {}", e)))?;
    let timestamp = timestamp.unwrap_or_else(now);

    let mut chain = open_chain(config)?;
    let receipt = chain.produce_block(transactions, config.author, timestamp, extra_data)?;

    println!("Block #{} {}", receipt.number, receipt.hash.to_hex());
    for included in &receipt.included {
        println!("  included {} (fee {})", included.tx_hash.to_hex(), included.fee_paid);
    }
    for rejected in &receipt.rejected {
        println!("  rejected {}: {}", rejected.tx_hash.to_hex(), rejected.reason());
    }
    if let Some(record) = &receipt.activated {
        println!("  new parameters active from #{}", record.effective_from_height);
    }

    Ok(receipt)
}

pub fn read_transactions(path: &Path) -> Result<Vec<SignedTransaction>, RunnerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RunnerError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    let transactions: Vec<SignedTransaction> =
        serde_json::from_str(&content).map_err(|e| RunnerError::Input(e.to_string()))?;
    Ok(transactions
        .into_iter()
        .map(|tx| SignedTransaction::new(tx.transaction, tx.signature))
        .collect())
}

pub fn render_status(chain: &ChainContext) -> String {
    let governance = chain.governance();
    let store = &governance.params;
    let mut out = String::new();

    out.push_str(&format!("Best block:       #{} {}\n", chain.best_number(), chain.best_block().hash().to_hex()));
    out.push_str(&format!("Genesis:          {}\n", chain.genesis_hash().to_hex()));
    out.push_str(&format!(
        "Change-params seq: next {}\n",
        governance.sequences.next_expected(StreamId::CHANGE_PARAMS)
    ));
    out.push_str(&format!("Active parameters (since #{}):\n", store.active_since()));
    for (name, value) in store.active().fields() {
        out.push_str(&format!("  {:<28} {}\n", name, value));
    }
    match store.pending() {
        Some(record) => out.push_str(&format!(
            "Pending activation at #{} (minPayCost={})\n",
            record.effective_from_height, record.effective_params.min_pay_cost
        )),
        None => out.push_str("Pending activation: none\n"),
    }
    out.push_str(&format!("Stakes (total {}):\n", chain.staking().total_stake()));
    for (account, stake) in chain.staking().stakeholders() {
        out.push_str(&format!("  {} {}\n", account.to_hex(), stake));
    }
    out
}

fn now() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}
