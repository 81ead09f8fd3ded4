// Scheme - Genesis configuration of a chain
use crate::contracts::governance::GovernanceState;
use crate::contracts::staking::{StakeError, StakeLedger};
use crate::types::{
    AccountId, AccountInfo, Balance, Block, BlockBody, BlockHeader, Hash, ParameterError, ParameterSet,
    StakeQuantity, Timestamp,
};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Development accounts of the solo scheme, with their key seeds
pub const DEV_ACCOUNTS: [(&str, u8); 4] = [("alice", 1), ("bob", 2), ("carol", 3), ("faucet", 4)];

/// Deterministic development key. Never use on a public network.
pub fn dev_key(name: &str) -> Option<SigningKey> {
    DEV_ACCOUNTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, seed)| SigningKey::from_bytes(&[*seed; 32]))
}

pub fn dev_account(name: &str) -> Option<AccountId> {
    dev_key(name).map(|key| AccountId::from_public_key(&key.verifying_key()))
}

/// Initial balance of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub account: AccountId,
    pub balance: Balance,
}

/// Initial stake of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisStake {
    pub account: AccountId,
    pub stake: StakeQuantity,
}

/// Configuration de genèse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheme {
    /// Nom de la chaîne
    pub name: String,

    /// Parameters active from block 0
    pub params: ParameterSet,

    pub balances: Vec<GenesisBalance>,

    pub stakeholders: Vec<GenesisStake>,

    pub timestamp: Timestamp,

    /// Author recorded in the genesis header
    pub author: AccountId,
}

impl Scheme {
    /// Single-node development chain.
    ///
    /// alice 50_000, bob 30_000, carol 20_000: alice+carol is a strict majority,
    /// bob+carol is exactly half, alice alone is exactly half.
    pub fn solo() -> Self {
        let account = |name: &str| dev_account(name).unwrap_or(AccountId::from_bytes([0u8; 32]));

        Self {
            name: "solo".to_string(),
            params: ParameterSet::reference(),
            balances: vec![
                GenesisBalance { account: account("alice"), balance: 1_000_000 },
                GenesisBalance { account: account("bob"), balance: 1_000_000 },
                GenesisBalance { account: account("carol"), balance: 1_000_000 },
                GenesisBalance { account: account("faucet"), balance: 1_000_000_000 },
            ],
            stakeholders: vec![
                GenesisStake { account: account("alice"), stake: 50_000 },
                GenesisStake { account: account("bob"), stake: 30_000 },
                GenesisStake { account: account("carol"), stake: 20_000 },
            ],
            timestamp: 0,
            author: AccountId::from_bytes([0u8; 32]),
        }
    }

    /// `solo` or a path to a JSON scheme file
    pub fn load(chain: &str) -> Result<Self, SchemeError> {
        match chain {
            "solo" => Ok(Self::solo()),
            path => Self::from_file(path),
        }
    }

    /// Charge depuis un fichier JSON
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemeError> {
        let content = std::fs::read_to_string(path)?;
        let scheme: Scheme = serde_json::from_str(&content)?;
        scheme.verify()?;
        Ok(scheme)
    }

    /// Sauvegarde vers un fichier JSON
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SchemeError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn verify(&self) -> Result<(), SchemeError> {
        self.params.verify()?;

        let mut seen = BTreeSet::new();
        for entry in &self.balances {
            if !seen.insert(entry.account) {
                return Err(SchemeError::DuplicateAccount(entry.account));
            }
        }
        seen.clear();
        for entry in &self.stakeholders {
            if !seen.insert(entry.account) {
                return Err(SchemeError::DuplicateAccount(entry.account));
            }
        }
        Ok(())
    }

    pub fn accounts(&self) -> Vec<(AccountId, AccountInfo)> {
        self.balances
            .iter()
            .map(|entry| (entry.account, AccountInfo::with_balance(entry.balance)))
            .collect()
    }

    pub fn stake_ledger(&self) -> Result<StakeLedger, SchemeError> {
        let mut ledger = StakeLedger::new();
        for entry in &self.stakeholders {
            ledger.deposit(entry.account, entry.stake)?;
        }
        Ok(ledger)
    }

    pub fn governance(&self) -> GovernanceState {
        GovernanceState::new(self.params.clone())
    }

    /// Block 0
    pub fn genesis_block(&self) -> Block {
        let header = BlockHeader {
            number: 0,
            parent_hash: Hash::ZERO,
            transactions_root: Hash::ZERO,
            timestamp: self.timestamp,
            author: self.author,
            extra_data: self.name.as_bytes().to_vec(),
        };
        Block::new(header, BlockBody::default())
    }
}

/// Erreurs de configuration de genèse
#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    #[error("Cannot read scheme: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid scheme JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid genesis parameters: {0}")]
    InvalidParameters(#[from] ParameterError),

    #[error("Invalid genesis stake: {0}")]
    Stake(#[from] StakeError),

    #[error("Account listed twice: {0}")]
    DuplicateAccount(AccountId),
}
