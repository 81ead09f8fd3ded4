// Staking - Stake ledger read by the threshold verifier
use crate::types::{AccountId, StakeQuantity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-account deposited stake and the total outstanding.
///
/// INVARIANT: `total` equals the sum of all entries, and no entry is zero.
/// Not internally synchronized; block execution applies transactions one at a
/// time, so the owning `ChainContext` is the only writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeLedger {
    stakes: BTreeMap<AccountId, StakeQuantity>,
    total: StakeQuantity,
}

impl StakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds stake to an account, creating its entry on first deposit
    pub fn deposit(&mut self, account: AccountId, quantity: StakeQuantity) -> Result<(), StakeError> {
        if quantity == 0 {
            return Ok(());
        }
        let total = self.total.checked_add(quantity).ok_or(StakeError::Overflow)?;
        let entry = self.stakes.entry(account).or_insert(0);
        *entry = entry.checked_add(quantity).ok_or(StakeError::Overflow)?;
        self.total = total;
        Ok(())
    }

    /// Removes stake from an account; a fully withdrawn account is dropped
    pub fn withdraw(&mut self, account: &AccountId, quantity: StakeQuantity) -> Result<(), StakeError> {
        let available = self.stake_of(account);
        if available < quantity {
            return Err(StakeError::InsufficientStake {
                account: *account,
                available,
                required: quantity,
            });
        }
        self.debit(account, available, quantity);
        self.total -= quantity;
        Ok(())
    }

    /// Moves stake between accounts; total stake is unchanged
    pub fn transfer(
        &mut self,
        sender: &AccountId,
        receiver: AccountId,
        quantity: StakeQuantity,
    ) -> Result<(), StakeError> {
        self.check_transfer(sender, quantity)?;
        if quantity == 0 || *sender == receiver {
            return Ok(());
        }
        let available = self.stake_of(sender);
        self.debit(sender, available, quantity);
        // Cannot overflow: the receiver's stake is bounded by total
        *self.stakes.entry(receiver).or_insert(0) += quantity;
        Ok(())
    }

    /// Checks a transfer without applying it
    pub fn check_transfer(&self, sender: &AccountId, quantity: StakeQuantity) -> Result<(), StakeError> {
        let available = self.stake_of(sender);
        if available < quantity {
            return Err(StakeError::InsufficientStake {
                account: *sender,
                available,
                required: quantity,
            });
        }
        Ok(())
    }

    fn debit(&mut self, account: &AccountId, available: StakeQuantity, quantity: StakeQuantity) {
        let remaining = available - quantity;
        if remaining == 0 {
            self.stakes.remove(account);
        } else {
            self.stakes.insert(*account, remaining);
        }
    }

    pub fn stake_of(&self, account: &AccountId) -> StakeQuantity {
        self.stakes.get(account).copied().unwrap_or(0)
    }

    /// Stake total
    pub fn total_stake(&self) -> StakeQuantity {
        self.total
    }

    pub fn stakeholder_count(&self) -> usize {
        self.stakes.len()
    }

    pub fn stakeholders(&self) -> impl Iterator<Item = (&AccountId, &StakeQuantity)> {
        self.stakes.iter()
    }

    /// Immutable copy for authorization checks
    pub fn snapshot(&self) -> StakeSnapshot {
        StakeSnapshot {
            stakes: self.stakes.clone(),
            total: self.total,
        }
    }

    pub fn is_consistent(&self) -> bool {
        let sum: u128 = self.stakes.values().map(|q| *q as u128).sum();
        sum == self.total as u128 && self.stakes.values().all(|q| *q > 0)
    }
}

/// Frozen view of the ledger taken when a governance action starts validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeSnapshot {
    stakes: BTreeMap<AccountId, StakeQuantity>,
    total: StakeQuantity,
}

impl StakeSnapshot {
    pub fn stake_of(&self, account: &AccountId) -> StakeQuantity {
        self.stakes.get(account).copied().unwrap_or(0)
    }

    pub fn total_stake(&self) -> StakeQuantity {
        self.total
    }
}

/// Erreurs de staking
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakeError {
    #[error("Insufficient stake for {account}: available {available}, required {required}")]
    InsufficientStake {
        account: AccountId,
        available: StakeQuantity,
        required: StakeQuantity,
    },

    #[error("Stake quantity overflow")]
    Overflow,
}
