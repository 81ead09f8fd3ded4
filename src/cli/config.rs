// CLI Configuration - Convert CLI args to node config
// Principle: Clear mapping between user input and internal configuration

use crate::cli::ChainArgs;
use crate::genesis::{dev_account, Scheme, SchemeError};
use crate::types::AccountId;
use std::path::PathBuf;
use tracing::info;

/// Node configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Genesis scheme
    pub scheme: Scheme,
    /// Base data path
    pub base_path: PathBuf,
    /// Account credited with block fees
    pub author: AccountId,
}

impl NodeConfig {
    pub fn from_args(args: &ChainArgs, author: Option<&str>) -> Result<Self, ConfigError> {
        let scheme = Scheme::load(&args.chain)?;
        if args.chain != "solo" {
            info!("Loaded scheme '{}' from {}", scheme.name, args.chain);
        }

        let author = match author {
            Some(value) => Self::parse_author(value)?,
            None => scheme.author,
        };

        Ok(Self {
            base_path: args.get_base_path(),
            scheme,
            author,
        })
    }

    /// Dev account name or hex account id
    fn parse_author(value: &str) -> Result<AccountId, ConfigError> {
        if let Some(account) = dev_account(value) {
            return Ok(account);
        }
        value
            .parse()
            .map_err(|_| ConfigError::InvalidAuthor(value.to_string()))
    }

    /// Database directory under the base path
    pub fn db_path(&self) -> PathBuf {
        self.base_path.join("db")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Scheme error: {0}")]
    Scheme(#[from] SchemeError),

    #[error("Invalid author account: {0}")]
    InvalidAuthor(String),
}
