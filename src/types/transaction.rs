// Transaction - generic transaction envelope
use super::account::AccountId;
use super::params::{NetworkId, ParameterSet};
use super::primitives::{Balance, Hash, Nonce};
use super::signature::{domain_separate, Signature64, DOMAIN_TRANSACTION};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};

/// Transaction signée
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Transaction non signée
    pub transaction: Transaction,

    /// Signature Ed25519 (64 bytes)
    pub signature: Signature64,

    /// Hash de la transaction (pour indexation)
    #[serde(skip)]
    pub hash: Option<Hash>,
}

impl SignedTransaction {
    pub fn new(transaction: Transaction, signature: Signature64) -> Self {
        let hash = transaction.hash();
        Self {
            transaction,
            signature,
            hash: Some(hash),
        }
    }

    /// Signs `transaction` with `key`. The sender field must match the key.
    pub fn sign(transaction: Transaction, key: &SigningKey) -> Self {
        let message = Self::signing_message(&transaction);
        let signature = key.sign(&message);
        Self::new(transaction, Signature64::from(signature))
    }

    /// Vérifie la signature
    pub fn verify(&self) -> bool {
        let message = Self::signing_message(&self.transaction);
        self.transaction
            .sender
            .verify(&message, self.signature.as_bytes())
    }

    /// Domain-separated message covered by the sender's signature
    pub fn signing_message(transaction: &Transaction) -> Vec<u8> {
        domain_separate(DOMAIN_TRANSACTION, &transaction.encode())
    }

    /// Hash de la transaction
    pub fn hash(&self) -> Hash {
        self.hash.unwrap_or_else(|| self.transaction.hash())
    }

    /// Encoded size, counted against the block body limit
    pub fn encoded_len(&self) -> u64 {
        bincode::serialized_size(self).unwrap_or(u64::MAX)
    }
}

/// Transaction non signée
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Émetteur
    pub sender: AccountId,

    /// Network this transaction is valid on
    pub network_id: NetworkId,

    /// Sender sequence (anti-replay)
    pub seq: Nonce,

    /// Fee offered to the block author
    pub fee: Balance,

    /// What the transaction does
    pub action: Action,
}

impl Transaction {
    /// Canonical bytes of the unsigned transaction
    pub fn encode(&self) -> Vec<u8> {
        // Plain data: serializing into a Vec cannot fail
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn hash(&self) -> Hash {
        Hash::hash(&self.encode())
    }
}

/// Transaction actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Transfert simple
    Pay { receiver: AccountId, quantity: Balance },

    /// Application-defined payload routed by handler id
    Custom {
        handler_id: u64,
        #[serde(with = "payload_bytes")]
        bytes: Vec<u8>,
    },
}

impl Action {
    /// Minimum fee for this action under `params`
    pub fn min_cost(&self, params: &ParameterSet) -> Balance {
        match self {
            Action::Pay { .. } => params.min_pay_cost,
            Action::Custom { .. } => params.min_custom_cost,
        }
    }

    /// Balance moved out of the sender besides the fee
    pub fn spend(&self) -> Balance {
        match self {
            Action::Pay { quantity, .. } => *quantity,
            Action::Custom { .. } => 0,
        }
    }
}

/// Transaction validation failures. A failing transaction is excluded from the block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("Invalid transaction signature")]
    InvalidSignature,

    #[error("Invalid network id: expected {expected}, found {found}")]
    InvalidNetworkId { expected: NetworkId, found: NetworkId },

    #[error("Too Low Fee: minimum {minimum}, got {got}")]
    TooLowFee { minimum: Balance, got: Balance },

    #[error("Sender account not found: {0}")]
    UnknownSender(AccountId),

    #[error("Invalid transaction seq Expected {expected}, found {found}")]
    InvalidSeq { expected: Nonce, found: Nonce },

    #[error("Insufficient balance: need {cost}, have {balance}")]
    InsufficientBalance { balance: Balance, cost: Balance },

    #[error("Block body full: transaction of {size} bytes exceeds remaining {remaining}")]
    BlockBodyFull { size: u64, remaining: u64 },

    #[error("{0}")]
    Action(#[from] crate::contracts::stake_action::ActionError),
}

/// Hex in JSON, raw bytes in bincode
mod payload_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            hex::decode(text.strip_prefix("0x").unwrap_or(&text)).map_err(serde::de::Error::custom)
        } else {
            <Vec<u8>>::deserialize(deserializer)
        }
    }
}
