// State - Persistent chain state on top of the database
use super::db::{Database, DatabaseError, WriteOp};
use crate::contracts::governance::GovernanceState;
use crate::contracts::staking::StakeLedger;
use crate::types::{AccountId, AccountInfo, Block, BlockNumber, Hash};
use std::collections::HashMap;

/// Storage key prefixes
const PREFIX_ACCOUNT: &[u8] = b"account:";
const PREFIX_BLOCK_BY_HASH: &[u8] = b"block_by_hash:";
const PREFIX_BLOCK_BY_NUMBER: &[u8] = b"block_by_num:";
const KEY_BEST_BLOCK: &[u8] = b"best_block";
const KEY_GENESIS_HASH: &[u8] = b"genesis_hash";
const KEY_STAKE_LEDGER: &[u8] = b"stake_ledger";
const KEY_GOVERNANCE: &[u8] = b"governance";

/// Chain state backend.
///
/// Accounts are read through a cache. Single writes go to the DB first, then to
/// the cache. Block commits go through `commit_batch`, which applies every
/// change of the block in one RocksDB batch and then drops the cache.
pub struct StateBackend {
    db: Database,
    /// Cache en mémoire, la DB fait autorité
    account_cache: HashMap<AccountId, AccountInfo>,
}

impl StateBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            account_cache: HashMap::new(),
        }
    }

    // ===== Accounts =====

    /// Récupère un compte
    pub fn get_account(&mut self, id: &AccountId) -> Result<Option<AccountInfo>, StateError> {
        if let Some(info) = self.account_cache.get(id) {
            return Ok(Some(info.clone()));
        }

        let info: Option<AccountInfo> = self.db.get_decoded(&Self::account_key(id))?;
        if let Some(info) = &info {
            self.account_cache.insert(*id, info.clone());
        }
        Ok(info)
    }

    /// Met à jour un compte (DB d'abord, cache ensuite)
    pub fn set_account(&mut self, id: AccountId, info: AccountInfo) -> Result<(), StateError> {
        let value = bincode::serialize(&info).map_err(|e| StateError::SerializationFailed(e.to_string()))?;
        self.db.put(&Self::account_key(&id), &value)?;
        self.account_cache.insert(id, info);
        Ok(())
    }

    /// Batch operation writing an account
    pub fn account_op(id: &AccountId, info: &AccountInfo) -> Result<WriteOp, StateError> {
        Ok(WriteOp::put_encoded(Self::account_key(id), info)?)
    }

    /// All stored accounts, in key order
    pub fn accounts(&self) -> Result<Vec<(AccountId, AccountInfo)>, StateError> {
        let mut accounts = Vec::new();
        for (key, value) in self.db.prefix_iterator(PREFIX_ACCOUNT) {
            let raw: [u8; 32] = key[PREFIX_ACCOUNT.len()..]
                .try_into()
                .map_err(|_| StateError::DeserializationFailed("malformed account key".into()))?;
            let info: AccountInfo =
                bincode::deserialize(&value).map_err(|e| StateError::DeserializationFailed(e.to_string()))?;
            accounts.push((AccountId::from_bytes(raw), info));
        }
        Ok(accounts)
    }

    // ===== Blocks =====

    /// Get best block number
    pub fn get_best_block(&self) -> Result<Option<BlockNumber>, StateError> {
        Ok(self.db.get_decoded(KEY_BEST_BLOCK)?)
    }

    pub fn best_block_op(number: BlockNumber) -> Result<WriteOp, StateError> {
        Ok(WriteOp::put_encoded(KEY_BEST_BLOCK.to_vec(), &number)?)
    }

    /// Operations storing a full block by hash and by number
    pub fn block_ops(block: &Block) -> Result<Vec<WriteOp>, StateError> {
        let data = bincode::serialize(block).map_err(|e| StateError::SerializationFailed(e.to_string()))?;
        Ok(vec![
            WriteOp::Put {
                key: Self::block_by_hash_key(&block.hash()),
                value: data.clone(),
            },
            WriteOp::Put {
                key: Self::block_by_number_key(block.number()),
                value: data,
            },
        ])
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StateError> {
        Ok(self.db.get_decoded(&Self::block_by_hash_key(hash))?)
    }

    pub fn get_block_by_number(&self, number: BlockNumber) -> Result<Option<Block>, StateError> {
        Ok(self.db.get_decoded(&Self::block_by_number_key(number))?)
    }

    pub fn get_genesis_hash(&self) -> Result<Option<Hash>, StateError> {
        Ok(self.db.get_decoded(KEY_GENESIS_HASH)?)
    }

    pub fn genesis_hash_op(hash: &Hash) -> Result<WriteOp, StateError> {
        Ok(WriteOp::put_encoded(KEY_GENESIS_HASH.to_vec(), hash)?)
    }

    // ===== Staking & governance =====

    pub fn get_stake_ledger(&self) -> Result<Option<StakeLedger>, StateError> {
        Ok(self.db.get_decoded(KEY_STAKE_LEDGER)?)
    }

    pub fn stake_ledger_op(ledger: &StakeLedger) -> Result<WriteOp, StateError> {
        Ok(WriteOp::put_encoded(KEY_STAKE_LEDGER.to_vec(), ledger)?)
    }

    pub fn get_governance(&self) -> Result<Option<GovernanceState>, StateError> {
        Ok(self.db.get_decoded(KEY_GOVERNANCE)?)
    }

    pub fn governance_op(governance: &GovernanceState) -> Result<WriteOp, StateError> {
        Ok(WriteOp::put_encoded(KEY_GOVERNANCE.to_vec(), governance)?)
    }

    /// Commit un batch de changements
    pub fn commit_batch(&mut self, ops: Vec<WriteOp>) -> Result<(), StateError> {
        self.db.batch_write(ops)?;
        self.account_cache.clear();
        Ok(())
    }

    // ===== Keys =====

    fn account_key(id: &AccountId) -> Vec<u8> {
        [PREFIX_ACCOUNT, id.as_bytes()].concat()
    }

    fn block_by_hash_key(hash: &Hash) -> Vec<u8> {
        [PREFIX_BLOCK_BY_HASH, hash.as_bytes()].concat()
    }

    fn block_by_number_key(number: BlockNumber) -> Vec<u8> {
        [PREFIX_BLOCK_BY_NUMBER, &number.to_be_bytes()[..]].concat()
    }
}

/// Erreurs d'état
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Erreur de base de données: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Échec de sérialisation: {0}")]
    SerializationFailed(String),

    #[error("Échec de désérialisation: {0}")]
    DeserializationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockBody, BlockHeader, ParameterSet};
    use tempfile::TempDir;

    fn open() -> (TempDir, StateBackend) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path()).unwrap();
        (temp_dir, StateBackend::new(db))
    }

    #[test]
    fn test_account_operations() {
        let (_dir, mut state) = open();
        let alice = AccountId::from_bytes([1; 32]);

        assert!(state.get_account(&alice).unwrap().is_none());
        state.set_account(alice, AccountInfo::with_balance(1000)).unwrap();
        assert_eq!(state.get_account(&alice).unwrap().unwrap().balance, 1000);
    }

    #[test]
    fn test_commit_batch_invalidates_cache() {
        let (_dir, mut state) = open();
        let alice = AccountId::from_bytes([1; 32]);
        state.set_account(alice, AccountInfo::with_balance(1000)).unwrap();
        assert!(state.account_cache.contains_key(&alice));

        let updated = AccountInfo {
            seq: 1,
            balance: 990,
        };
        state
            .commit_batch(vec![StateBackend::account_op(&alice, &updated).unwrap()])
            .unwrap();

        assert!(state.account_cache.is_empty());
        assert_eq!(state.get_account(&alice).unwrap(), Some(updated));
    }

    #[test]
    fn test_accounts_listing() {
        let (_dir, mut state) = open();
        state.set_account(AccountId::from_bytes([2; 32]), AccountInfo::with_balance(2)).unwrap();
        state.set_account(AccountId::from_bytes([1; 32]), AccountInfo::with_balance(1)).unwrap();

        let accounts = state.accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].0, AccountId::from_bytes([1; 32]));
        assert_eq!(accounts[1].1.balance, 2);
    }

    #[test]
    fn test_block_and_governance_storage() {
        let (_dir, mut state) = open();
        let block = Block::new(
            BlockHeader {
                number: 0,
                parent_hash: Hash::ZERO,
                transactions_root: Hash::ZERO,
                timestamp: 0,
                author: AccountId::from_bytes([0; 32]),
                extra_data: vec![],
            },
            BlockBody::default(),
        );
        let governance = GovernanceState::new(ParameterSet::reference());

        let mut ops = StateBackend::block_ops(&block).unwrap();
        ops.push(StateBackend::best_block_op(0).unwrap());
        ops.push(StateBackend::genesis_hash_op(&block.hash()).unwrap());
        ops.push(StateBackend::governance_op(&governance).unwrap());
        state.commit_batch(ops).unwrap();

        assert_eq!(state.get_best_block().unwrap(), Some(0));
        assert_eq!(state.get_genesis_hash().unwrap(), Some(block.hash()));
        assert_eq!(state.get_block_by_number(0).unwrap().unwrap().hash(), block.hash());
        assert!(state.get_block_by_hash(&block.hash()).unwrap().is_some());
        assert_eq!(state.get_governance().unwrap(), Some(governance));
        assert!(state.get_stake_ledger().unwrap().is_none());
    }
}
