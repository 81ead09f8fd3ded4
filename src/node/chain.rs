// Chain - Per-chain execution context, block production and finalization
//
// Each ChainContext owns its stake ledger, governance state and parameter store.
// Nothing is shared between chains, so independent chains can run side by side.

use crate::contracts::governance::GovernanceState;
use crate::contracts::parameters::ActivationRecord;
use crate::contracts::stake_action::StakeActionHandler;
use crate::contracts::staking::StakeLedger;
use crate::execution::{ExecutionError, Receipt, TransactionExecutor, WorkingState};
use crate::genesis::{Scheme, SchemeError};
use crate::storage::{Database, StateBackend, StateError, WriteOp};
use crate::types::{
    AccountId, AccountInfo, Action, Block, BlockBody, BlockHeader, BlockNumber, Hash, ParameterSet,
    SignedTransaction, Timestamp, TransactionError,
};
use tracing::{debug, info};

/// A transaction excluded from a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTransaction {
    pub tx_hash: Hash,
    pub error: TransactionError,
}

impl RejectedTransaction {
    pub fn reason(&self) -> String {
        self.error.to_string()
    }
}

/// Outcome of producing one block
#[derive(Debug, Clone)]
pub struct BlockReceipt {
    pub number: BlockNumber,
    pub hash: Hash,
    pub included: Vec<Receipt>,
    pub rejected: Vec<RejectedTransaction>,
    /// Parameter set that became active for the next block, if any
    pub activated: Option<ActivationRecord>,
}

impl BlockReceipt {
    pub fn is_included(&self, tx_hash: &Hash) -> bool {
        self.included.iter().any(|r| r.tx_hash == *tx_hash)
    }

    /// Rejection reason of `tx_hash`, if it was excluded
    pub fn rejection(&self, tx_hash: &Hash) -> Option<&TransactionError> {
        self.rejected
            .iter()
            .find(|r| r.tx_hash == *tx_hash)
            .map(|r| &r.error)
    }
}

pub struct ChainContext {
    state: StateBackend,
    staking: StakeLedger,
    governance: GovernanceState,
    best: Block,
    genesis_hash: Hash,
}

impl ChainContext {
    /// Creates block 0 on an empty database, or reloads an existing chain
    pub fn open(db: Database, scheme: &Scheme) -> Result<Self, ChainError> {
        let mut state = StateBackend::new(db);
        let genesis = scheme.genesis_block();

        let Some(best_number) = state.get_best_block()? else {
            return Self::initialize(state, scheme, genesis);
        };

        let stored = state
            .get_genesis_hash()?
            .ok_or(ChainError::MissingState("genesis hash"))?;
        if stored != genesis.hash() {
            return Err(ChainError::GenesisMismatch {
                stored,
                expected: genesis.hash(),
            });
        }

        let best = state
            .get_block_by_number(best_number)?
            .ok_or(ChainError::MissingBlock(best_number))?;
        let staking = state
            .get_stake_ledger()?
            .ok_or(ChainError::MissingState("stake ledger"))?;
        let governance = state
            .get_governance()?
            .ok_or(ChainError::MissingState("governance"))?;

        info!("Chain '{}' reloaded at block #{}", scheme.name, best_number);

        Ok(Self {
            state,
            staking,
            governance,
            best,
            genesis_hash: stored,
        })
    }

    fn initialize(mut state: StateBackend, scheme: &Scheme, genesis: Block) -> Result<Self, ChainError> {
        scheme.verify()?;
        let staking = scheme.stake_ledger()?;
        let governance = scheme.governance();

        let mut ops = Vec::new();
        for (id, info) in scheme.accounts() {
            ops.push(StateBackend::account_op(&id, &info)?);
        }
        ops.extend(StateBackend::block_ops(&genesis)?);
        ops.push(StateBackend::best_block_op(0)?);
        ops.push(StateBackend::genesis_hash_op(&genesis.hash())?);
        ops.push(StateBackend::stake_ledger_op(&staking)?);
        ops.push(StateBackend::governance_op(&governance)?);
        state.commit_batch(ops)?;

        info!(
            "Chain '{}' initialized: genesis {}, {} stakeholder(s), total stake {}",
            scheme.name,
            genesis.hash(),
            staking.stakeholder_count(),
            staking.total_stake()
        );

        Ok(Self {
            state,
            staking,
            governance,
            genesis_hash: genesis.hash(),
            best: genesis,
        })
    }

    pub fn best_number(&self) -> BlockNumber {
        self.best.number()
    }

    pub fn best_block(&self) -> &Block {
        &self.best
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis_hash
    }

    pub fn staking(&self) -> &StakeLedger {
        &self.staking
    }

    pub fn governance(&self) -> &GovernanceState {
        &self.governance
    }

    /// Set that governs the next block
    pub fn active_params(&self) -> &ParameterSet {
        self.governance.params.active()
    }

    pub fn account(&mut self, id: &AccountId) -> Result<Option<AccountInfo>, ChainError> {
        Ok(self.state.get_account(id)?)
    }

    pub fn accounts(&self) -> Result<Vec<(AccountId, AccountInfo)>, ChainError> {
        Ok(self.state.accounts()?)
    }

    pub fn block(&self, number: BlockNumber) -> Result<Option<Block>, ChainError> {
        Ok(self.state.get_block_by_number(number)?)
    }

    /// Admission check against the current state and active parameters.
    ///
    /// Runs the envelope checks, then prepares custom actions against the current
    /// stake ledger and governance state, so governance rejections reach the submitter.
    pub fn validate_transaction(&mut self, tx: &SignedTransaction) -> Result<(), ChainError> {
        let account = self.state.get_account(&tx.transaction.sender)?;
        TransactionExecutor::check(self.governance.params.active(), account.as_ref(), tx)?;

        if let Action::Custom { handler_id, bytes } = &tx.transaction.action {
            StakeActionHandler::prepare(
                &self.staking,
                &self.governance,
                *handler_id,
                &tx.transaction.sender,
                bytes,
            )
            .map_err(TransactionError::from)?;
        }
        Ok(())
    }

    /// Executes `transactions` in order as block `best + 1` and seals it
    pub fn produce_block(
        &mut self,
        transactions: Vec<SignedTransaction>,
        author: AccountId,
        timestamp: Timestamp,
        extra_data: Vec<u8>,
    ) -> Result<BlockReceipt, ChainError> {
        let number = self.best.number() + 1;

        // Fixed for the whole block, whatever its transactions schedule
        let params = self.governance.params.active().clone();
        debug_assert_eq!(&params, self.governance.params.active_params_for(number));

        if extra_data.len() as u64 > params.max_extra_data_size {
            return Err(ChainError::ExtraDataTooLarge {
                size: extra_data.len() as u64,
                max: params.max_extra_data_size,
            });
        }

        let executor = TransactionExecutor::new(&params, number, author);
        let mut working = WorkingState::new(&mut self.state, self.staking.clone(), self.governance.clone());

        let mut body_size: u64 = 0;
        let mut included = Vec::new();
        let mut receipts = Vec::new();
        let mut rejected = Vec::new();

        for tx in transactions {
            let tx_hash = tx.hash();
            let size = tx.encoded_len();
            let remaining = params.max_body_size.saturating_sub(body_size);

            let result = if size > remaining {
                Err(ExecutionError::Rejected(TransactionError::BlockBodyFull { size, remaining }))
            } else {
                executor.execute(&mut working, &tx)
            };

            match result {
                Ok(receipt) => {
                    body_size += size;
                    receipts.push(receipt);
                    included.push(tx);
                }
                Err(ExecutionError::Rejected(error)) => {
                    debug!("Transaction {} excluded from block #{}: {}", tx_hash, number, error);
                    rejected.push(RejectedTransaction { tx_hash, error });
                }
                Err(ExecutionError::State(e)) => return Err(e.into()),
            }
        }

        let (accounts, staking, mut governance) = working.into_parts();

        let body = BlockBody::new(included);
        let header = BlockHeader {
            number,
            parent_hash: self.best.hash(),
            transactions_root: body.transactions_root(),
            timestamp,
            author,
            extra_data,
        };
        let block = Block::new(header, body);

        // Finalization hook: activate what is due for the next block
        let activated = governance.params.query_pending(number + 1).cloned();
        governance.params.promote(number + 1);

        let mut ops: Vec<WriteOp> = Vec::with_capacity(accounts.len() + 5);
        for (id, info) in &accounts {
            ops.push(StateBackend::account_op(id, info)?);
        }
        ops.extend(StateBackend::block_ops(&block)?);
        ops.push(StateBackend::best_block_op(number)?);
        ops.push(StateBackend::stake_ledger_op(&staking)?);
        ops.push(StateBackend::governance_op(&governance)?);
        self.state.commit_batch(ops)?;

        let hash = block.hash();
        info!(
            "Sealed block #{} ({}): {} included, {} rejected",
            number,
            hash,
            receipts.len(),
            rejected.len()
        );

        self.staking = staking;
        self.governance = governance;
        self.best = block;

        Ok(BlockReceipt {
            number,
            hash,
            included: receipts,
            rejected,
            activated,
        })
    }
}

/// Erreurs de chaîne
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Scheme error: {0}")]
    Scheme(#[from] SchemeError),

    #[error("Transaction rejected: {0}")]
    Rejected(#[from] TransactionError),

    #[error("Extra data too large: {size} bytes, max {max}")]
    ExtraDataTooLarge { size: u64, max: u64 },

    #[error("Database holds another chain: genesis {stored}, expected {expected}")]
    GenesisMismatch { stored: Hash, expected: Hash },

    #[error("Block #{0} missing from storage")]
    MissingBlock(BlockNumber),

    #[error("Missing {0} in storage")]
    MissingState(&'static str),
}
