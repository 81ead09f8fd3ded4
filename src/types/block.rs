// Block - Structure de bloc minimal
use super::account::AccountId;
use super::primitives::{BlockNumber, Hash, Timestamp};
use super::transaction::SignedTransaction;
use serde::{Deserialize, Serialize};

/// Bloc complet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// En-tête du bloc
    pub header: BlockHeader,

    /// Corps du bloc (transactions)
    pub body: BlockBody,
}

impl Block {
    pub fn new(header: BlockHeader, body: BlockBody) -> Self {
        Self { header, body }
    }

    /// Hash du bloc
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    /// Vérifie que le header correspond aux transactions
    pub fn verify_body_root(&self) -> bool {
        self.header.transactions_root == self.body.transactions_root()
    }
}

/// En-tête de bloc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Numéro de bloc (hauteur)
    pub number: BlockNumber,

    /// Hash du bloc parent
    pub parent_hash: Hash,

    /// Root of the included transaction hashes
    pub transactions_root: Hash,

    /// Timestamp du bloc
    pub timestamp: Timestamp,

    /// Account credited with the block's fees
    pub author: AccountId,

    /// Free-form bytes, bounded by `max_extra_data_size`
    pub extra_data: Vec<u8>,
}

impl BlockHeader {
    /// Hash de l'en-tête (identifiant unique du bloc)
    pub fn hash(&self) -> Hash {
        let bytes = bincode::serialize(self).unwrap_or_default();
        Hash::hash(&bytes)
    }
}

/// Corps du bloc
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockBody {
    /// Transactions dans le bloc
    pub transactions: Vec<SignedTransaction>,
}

impl BlockBody {
    pub fn new(transactions: Vec<SignedTransaction>) -> Self {
        Self { transactions }
    }

    /// Hash over the ordered transaction hashes; zero for an empty body
    pub fn transactions_root(&self) -> Hash {
        if self.transactions.is_empty() {
            return Hash::ZERO;
        }
        let hashes: Vec<Hash> = self.transactions.iter().map(|tx| tx.hash()).collect();
        let parts: Vec<&[u8]> = hashes.iter().map(|h| h.as_bytes().as_slice()).collect();
        Hash::hash_parts(&parts)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.transactions.iter().any(|tx| tx.hash() == *hash)
    }
}
