// Executor - Transaction validity checks and dispatch
//
// A transaction is first checked (signature, network, fee, seq, balance), then its
// action is prepared without touching state, and only then committed. A
// rejected transaction therefore leaves no trace and pays no fee.

use crate::contracts::governance::GovernanceState;
use crate::contracts::stake_action::{ActionEffect, PreparedAction, StakeActionHandler};
use crate::contracts::staking::StakeLedger;
use crate::storage::{StateBackend, StateError};
use crate::types::{
    AccountId, AccountInfo, Action, Balance, BlockNumber, Hash, ParameterSet, SignedTransaction,
    TransactionError,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Block-local view of the chain state.
///
/// Account writes stay in memory until the block is sealed; the stake ledger and
/// governance state are working copies.
pub struct WorkingState<'a> {
    backend: &'a mut StateBackend,
    accounts: BTreeMap<AccountId, AccountInfo>,
    pub staking: StakeLedger,
    pub governance: GovernanceState,
}

impl<'a> WorkingState<'a> {
    pub fn new(backend: &'a mut StateBackend, staking: StakeLedger, governance: GovernanceState) -> Self {
        Self {
            backend,
            accounts: BTreeMap::new(),
            staking,
            governance,
        }
    }

    pub fn account(&mut self, id: &AccountId) -> Result<Option<AccountInfo>, StateError> {
        if let Some(info) = self.accounts.get(id) {
            return Ok(Some(info.clone()));
        }
        self.backend.get_account(id)
    }

    pub fn set_account(&mut self, id: AccountId, info: AccountInfo) {
        self.accounts.insert(id, info);
    }

    fn credit(&mut self, id: AccountId, amount: Balance) -> Result<(), StateError> {
        let mut info = self.account(&id)?.unwrap_or_default();
        info.balance = info.balance.saturating_add(amount);
        self.set_account(id, info);
        Ok(())
    }

    /// Touched accounts, stake ledger and governance state
    pub fn into_parts(self) -> (BTreeMap<AccountId, AccountInfo>, StakeLedger, GovernanceState) {
        (self.accounts, self.staking, self.governance)
    }
}

/// Successful execution of one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: Hash,
    pub fee_paid: Balance,
    pub effect: Option<ActionEffect>,
}

/// Executes transactions of one block
pub struct TransactionExecutor<'p> {
    /// Set captured before the first transaction of the block
    params: &'p ParameterSet,
    height: BlockNumber,
    author: AccountId,
}

impl<'p> TransactionExecutor<'p> {
    pub fn new(params: &'p ParameterSet, height: BlockNumber, author: AccountId) -> Self {
        Self {
            params,
            height,
            author,
        }
    }

    /// Envelope checks, in order. Returns the sender's account on success.
    pub fn check(
        params: &ParameterSet,
        sender_account: Option<&AccountInfo>,
        tx: &SignedTransaction,
    ) -> Result<AccountInfo, TransactionError> {
        let transaction = &tx.transaction;

        if !tx.verify() {
            return Err(TransactionError::InvalidSignature);
        }

        if transaction.network_id != params.network_id {
            return Err(TransactionError::InvalidNetworkId {
                expected: params.network_id.clone(),
                found: transaction.network_id.clone(),
            });
        }

        let minimum = transaction.action.min_cost(params);
        if transaction.fee < minimum {
            return Err(TransactionError::TooLowFee {
                minimum,
                got: transaction.fee,
            });
        }

        let account = sender_account
            .cloned()
            .ok_or(TransactionError::UnknownSender(transaction.sender))?;

        if transaction.seq != account.seq {
            return Err(TransactionError::InvalidSeq {
                expected: account.seq,
                found: transaction.seq,
            });
        }

        let cost = transaction.fee.checked_add(transaction.action.spend());
        match cost {
            Some(cost) if account.can_pay(cost) => Ok(account),
            _ => Err(TransactionError::InsufficientBalance {
                balance: account.balance,
                cost: cost.unwrap_or(Balance::MAX),
            }),
        }
    }

    /// Runs one transaction against the working state
    pub fn execute(
        &self,
        working: &mut WorkingState<'_>,
        tx: &SignedTransaction,
    ) -> Result<Receipt, ExecutionError> {
        let transaction = &tx.transaction;
        let sender = transaction.sender;

        let stored = working.account(&sender)?;
        let sender_account = Self::check(self.params, stored.as_ref(), tx)?;

        // Prepare: no state change on failure
        let prepared = match &transaction.action {
            Action::Pay { .. } => None,
            Action::Custom { handler_id, bytes } => Some(
                StakeActionHandler::prepare(
                    &working.staking,
                    &working.governance,
                    *handler_id,
                    &sender,
                    bytes,
                )
                .map_err(TransactionError::from)?,
            ),
        };

        self.apply(working, tx, sender_account, prepared)
    }

    /// Commit half of `execute`. The action is applied before the sender is charged,
    /// so a failing commit leaves the sender's balance and seq untouched.
    fn apply(
        &self,
        working: &mut WorkingState<'_>,
        tx: &SignedTransaction,
        mut sender_account: AccountInfo,
        prepared: Option<PreparedAction>,
    ) -> Result<Receipt, ExecutionError> {
        let transaction = &tx.transaction;
        let sender = transaction.sender;

        let effect = match prepared {
            Some(prepared) => Some(
                StakeActionHandler::commit(
                    &mut working.staking,
                    &mut working.governance,
                    prepared,
                    self.height,
                )
                .map_err(TransactionError::from)?,
            ),
            None => None,
        };

        sender_account.balance -= transaction.fee + transaction.action.spend();
        sender_account.seq += 1;
        working.set_account(sender, sender_account);

        if let Action::Pay { receiver, quantity } = &transaction.action {
            working.credit(*receiver, *quantity)?;
        }
        working.credit(self.author, transaction.fee)?;

        debug!(
            "Executed tx {} from {} (seq {}, fee {})",
            tx.hash(),
            sender,
            transaction.seq,
            transaction.fee
        );

        Ok(Receipt {
            tx_hash: tx.hash(),
            fee_paid: transaction.fee,
            effect,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The transaction is invalid and must be excluded
    #[error(transparent)]
    Rejected(#[from] TransactionError),

    /// Storage failure, fatal to the block
    #[error("State error: {0}")]
    State(#[from] StateError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::governance::{ChangeProposal, StreamId};
    use crate::contracts::stake_action::{StakeAction, STAKE_ACTION_HANDLER_ID};
    use crate::storage::Database;
    use crate::types::Transaction;
    use ed25519_dalek::SigningKey;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        backend: StateBackend,
        staking: StakeLedger,
    }

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn id(seed: u8) -> AccountId {
        AccountId::from_public_key(&key(seed).verifying_key())
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut backend = StateBackend::new(Database::open(dir.path()).unwrap());
        let mut staking = StakeLedger::new();
        for (seed, stake) in [(1u8, 50_000u64), (2, 30_000), (3, 20_000)] {
            backend.set_account(id(seed), AccountInfo::with_balance(1_000)).unwrap();
            staking.deposit(id(seed), stake).unwrap();
        }
        Fixture {
            _dir: dir,
            backend,
            staking,
        }
    }

    fn signed(seed: u8, seq: u64, fee: Balance, action: Action) -> SignedTransaction {
        let tx = Transaction {
            sender: id(seed),
            network_id: "tc".parse().unwrap(),
            seq,
            fee,
            action,
        };
        SignedTransaction::sign(tx, &key(seed))
    }

    fn pay(quantity: Balance) -> Action {
        Action::Pay {
            receiver: id(9),
            quantity,
        }
    }

    #[test]
    fn test_check_order() {
        let params = ParameterSet::reference();
        let account = AccountInfo::with_balance(100);

        // Tampered: signature fails before anything else
        let mut tx = signed(1, 5, 1, pay(1_000));
        tx.transaction.network_id = "xx".parse().unwrap();
        assert_eq!(
            TransactionExecutor::check(&params, Some(&account), &tx),
            Err(TransactionError::InvalidSignature)
        );

        let mut tx = Transaction {
            sender: id(1),
            network_id: "xx".parse().unwrap(),
            seq: 5,
            fee: 1,
            action: pay(1_000),
        };
        let wrong_network = SignedTransaction::sign(tx.clone(), &key(1));
        assert!(matches!(
            TransactionExecutor::check(&params, Some(&account), &wrong_network),
            Err(TransactionError::InvalidNetworkId { .. })
        ));

        tx.network_id = "tc".parse().unwrap();
        let low_fee = SignedTransaction::sign(tx.clone(), &key(1));
        let err = TransactionExecutor::check(&params, Some(&account), &low_fee).unwrap_err();
        assert_eq!(err, TransactionError::TooLowFee { minimum: 10, got: 1 });
        assert!(err.to_string().contains("Too Low Fee"));

        tx.fee = 10;
        let unknown = SignedTransaction::sign(tx.clone(), &key(1));
        assert_eq!(
            TransactionExecutor::check(&params, None, &unknown),
            Err(TransactionError::UnknownSender(id(1)))
        );
        assert_eq!(
            TransactionExecutor::check(&params, Some(&account), &unknown),
            Err(TransactionError::InvalidSeq { expected: 0, found: 5 })
        );

        tx.seq = 0;
        let broke = SignedTransaction::sign(tx, &key(1));
        assert_eq!(
            TransactionExecutor::check(&params, Some(&account), &broke),
            Err(TransactionError::InsufficientBalance { balance: 100, cost: 1_010 })
        );
    }

    #[test]
    fn test_pay_moves_balance_and_fee() {
        let mut f = fixture();
        let params = ParameterSet::reference();
        let author = id(7);
        let executor = TransactionExecutor::new(&params, 1, author);
        let gov = GovernanceState::new(params.clone());
        let mut working = WorkingState::new(&mut f.backend, f.staking.clone(), gov);

        let receipt = executor.execute(&mut working, &signed(1, 0, 10, pay(100))).unwrap();
        assert_eq!(receipt.fee_paid, 10);
        assert!(receipt.effect.is_none());

        assert_eq!(working.account(&id(1)).unwrap(), Some(AccountInfo { seq: 1, balance: 890 }));
        assert_eq!(working.account(&id(9)).unwrap().unwrap().balance, 100);
        assert_eq!(working.account(&author).unwrap().unwrap().balance, 10);
    }

    #[test]
    fn test_rejected_action_is_not_charged() {
        let mut f = fixture();
        let params = ParameterSet::reference();
        let executor = TransactionExecutor::new(&params, 1, id(7));
        let gov = GovernanceState::new(params.clone());
        let mut working = WorkingState::new(&mut f.backend, f.staking.clone(), gov);

        // bob + carol: exactly half of the stake
        let mut proposal = ChangeProposal::unsigned(
            0,
            ParameterSet {
                min_pay_cost: 11,
                ..ParameterSet::reference()
            },
        );
        proposal.sign_with(&key(2));
        proposal.sign_with(&key(3));
        let action = Action::Custom {
            handler_id: STAKE_ACTION_HANDLER_ID,
            bytes: StakeAction::ChangeParams(proposal).encode(),
        };

        let err = executor.execute(&mut working, &signed(1, 0, 10, action)).unwrap_err();
        let ExecutionError::Rejected(err) = err else {
            panic!("expected a rejection");
        };
        assert!(err.to_string().starts_with("Insufficient stakes:"));

        assert_eq!(working.account(&id(1)).unwrap(), Some(AccountInfo::with_balance(1_000)));
        assert!(working.account(&id(7)).unwrap().is_none());
        assert_eq!(working.governance.sequences.next_expected(StreamId::CHANGE_PARAMS), 0);
    }

    #[test]
    fn test_stake_transfer_through_custom_action() {
        let mut f = fixture();
        let params = ParameterSet::reference();
        let executor = TransactionExecutor::new(&params, 1, id(7));
        let gov = GovernanceState::new(params.clone());
        let mut working = WorkingState::new(&mut f.backend, f.staking.clone(), gov);

        let action = Action::Custom {
            handler_id: STAKE_ACTION_HANDLER_ID,
            bytes: StakeAction::TransferStake {
                receiver: id(3),
                quantity: 1,
            }
            .encode(),
        };
        let receipt = executor.execute(&mut working, &signed(1, 0, 10, action)).unwrap();
        assert!(matches!(receipt.effect, Some(ActionEffect::StakeTransferred { quantity: 1, .. })));

        let (accounts, staking, _) = working.into_parts();
        assert_eq!(staking.stake_of(&id(1)), 49_999);
        assert_eq!(staking.stake_of(&id(3)), 20_001);
        assert_eq!(accounts[&id(1)].seq, 1);
    }

    #[test]
    fn test_failed_commit_is_not_charged() {
        let mut f = fixture();
        let params = ParameterSet::reference();
        let executor = TransactionExecutor::new(&params, 1, id(7));
        let gov = GovernanceState::new(params.clone());
        let mut working = WorkingState::new(&mut f.backend, f.staking.clone(), gov);

        // Prepared against a ledger where id(1) still had the stake
        let prepared = PreparedAction::TransferStake {
            sender: id(1),
            receiver: id(3),
            quantity: 50_000,
        };
        working.staking.transfer(&id(1), id(2), 50_000).unwrap();

        let action = Action::Custom {
            handler_id: STAKE_ACTION_HANDLER_ID,
            bytes: StakeAction::TransferStake {
                receiver: id(3),
                quantity: 50_000,
            }
            .encode(),
        };
        let tx = signed(1, 0, 10, action);
        let account = working.account(&id(1)).unwrap().unwrap();

        let err = executor.apply(&mut working, &tx, account, Some(prepared)).unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected(TransactionError::Action(_))));

        assert_eq!(working.account(&id(1)).unwrap(), Some(AccountInfo::with_balance(1_000)));
        assert!(working.account(&id(7)).unwrap().is_none());
        assert_eq!(working.staking.stake_of(&id(3)), 20_000);
    }
}
