// Parameter store and activation scheduling
//
// An authorized candidate is recorded with `effective_from_height = current + 1`
// and only becomes the active set when block finalization promotes it. The set
// used to validate block N is therefore fixed before any of N's transactions run.

use crate::types::{BlockNumber, ParameterSet};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A parameter set and the first height it governs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub effective_params: ParameterSet,
    pub effective_from_height: BlockNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterStore {
    /// Set in force when no activation applies
    genesis: ParameterSet,

    /// Set governing the next block to execute
    active: ParameterSet,

    /// Height from which `active` applies
    active_since: BlockNumber,

    /// At most one outstanding activation; a later proposal for the same height replaces it
    pending: Option<ActivationRecord>,

    /// Every scheduled activation, in scheduling order. Kept whole so
    /// `active_params_for` answers for any past height. It grows by one record per
    /// authorized change, never per block.
    history: Vec<ActivationRecord>,
}

impl ParameterStore {
    pub fn new(genesis: ParameterSet) -> Self {
        Self {
            active: genesis.clone(),
            genesis,
            active_since: 0,
            pending: None,
            history: Vec::new(),
        }
    }

    pub fn genesis(&self) -> &ParameterSet {
        &self.genesis
    }

    pub fn active(&self) -> &ParameterSet {
        &self.active
    }

    pub fn active_since(&self) -> BlockNumber {
        self.active_since
    }

    pub fn pending(&self) -> Option<&ActivationRecord> {
        self.pending.as_ref()
    }

    pub fn history(&self) -> &[ActivationRecord] {
        &self.history
    }

    /// Records that `candidate` becomes active at `current_height + 1`.
    /// Last writer wins among proposals made at the same height.
    pub fn propose_activation(
        &mut self,
        candidate: ParameterSet,
        current_height: BlockNumber,
    ) -> ActivationRecord {
        let record = ActivationRecord {
            effective_params: candidate,
            effective_from_height: current_height + 1,
        };
        self.pending = Some(record.clone());
        self.history.push(record.clone());
        record
    }

    /// Set that governs validation of transactions at `height`
    pub fn active_params_for(&self, height: BlockNumber) -> &ParameterSet {
        self.history
            .iter()
            .rev()
            .find(|record| record.effective_from_height <= height)
            .map(|record| &record.effective_params)
            .unwrap_or(&self.genesis)
    }

    /// Pending record due at `next_height`, if any
    pub fn query_pending(&self, next_height: BlockNumber) -> Option<&ActivationRecord> {
        self.pending
            .as_ref()
            .filter(|record| record.effective_from_height <= next_height)
    }

    /// Finalization hook for the transition to `next_height`. Returns true if
    /// a new set became active.
    pub fn promote(&mut self, next_height: BlockNumber) -> bool {
        if self.query_pending(next_height).is_none() {
            return false;
        }
        let Some(record) = self.pending.take() else {
            return false;
        };

        info!(
            "Parameters activated at block #{} (minPayCost={}, networkID={})",
            record.effective_from_height,
            record.effective_params.min_pay_cost,
            record.effective_params.network_id
        );

        self.active = record.effective_params;
        self.active_since = record.effective_from_height;
        true
    }
}
