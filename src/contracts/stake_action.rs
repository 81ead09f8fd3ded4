// Stake action handler - Dispatcher for custom transactions routed to staking
//
// Payload layout: one tag byte, then the bincode-encoded arguments.
//   0x01  TransferStake  (receiver, quantity)
//   0xff  ChangeParams   (seq, params, signatures)
// The handler only decodes and routes. Authorization lives in `governance`,
// balances in `staking`.

use super::governance::{
    AuthorizedChange, ChangeProposal, GovernanceError, GovernanceState, StakeSignature,
};
use super::parameters::ActivationRecord;
use super::staking::{StakeError, StakeLedger};
use crate::types::{AccountId, BlockNumber, Hash, ParameterError, ParameterSet, StakeQuantity};
use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Handler id custom transactions use to reach this handler
pub const STAKE_ACTION_HANDLER_ID: u64 = 2;

pub const TAG_TRANSFER_STAKE: u8 = 0x01;
pub const TAG_CHANGE_PARAMS: u8 = 0xff;

/// Fixed-width integers, trailing bytes rejected
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Hash of the encoding of `[0xff, seq, params]`: the message stakeholders sign
pub fn change_params_message_hash(seq: u64, params: &ParameterSet) -> Hash {
    // Plain data with sized sequences: serializing into a Vec cannot fail
    let body = codec().serialize(&(seq, params)).unwrap_or_default();
    Hash::hash_parts(&[&[TAG_CHANGE_PARAMS], &body])
}

#[derive(Serialize)]
struct ChangeParamsRef<'a> {
    seq: u64,
    params: &'a ParameterSet,
    signatures: &'a [StakeSignature],
}

#[derive(Deserialize)]
struct ChangeParamsWire {
    seq: u64,
    params: ParameterSet,
    signatures: Vec<StakeSignature>,
}

#[derive(Serialize, Deserialize)]
struct TransferStakeWire {
    receiver: AccountId,
    quantity: StakeQuantity,
}

/// Decoded stake action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakeAction {
    TransferStake {
        receiver: AccountId,
        quantity: StakeQuantity,
    },
    ChangeParams(ChangeProposal),
}

impl StakeAction {
    pub fn tag(&self) -> u8 {
        match self {
            StakeAction::TransferStake { .. } => TAG_TRANSFER_STAKE,
            StakeAction::ChangeParams(_) => TAG_CHANGE_PARAMS,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&tag, body) = bytes.split_first().ok_or(DecodeError::Empty)?;
        match tag {
            TAG_TRANSFER_STAKE => {
                let wire: TransferStakeWire = codec()
                    .deserialize(body)
                    .map_err(|e| DecodeError::Malformed(e.to_string()))?;
                Ok(StakeAction::TransferStake {
                    receiver: wire.receiver,
                    quantity: wire.quantity,
                })
            }
            TAG_CHANGE_PARAMS => {
                let wire: ChangeParamsWire = codec()
                    .deserialize(body)
                    .map_err(|e| DecodeError::Malformed(e.to_string()))?;
                wire.params.verify()?;
                Ok(StakeAction::ChangeParams(ChangeProposal {
                    seq: wire.seq,
                    candidate: wire.params,
                    signatures: wire.signatures,
                }))
            }
            other => Err(DecodeError::UnknownTag(other)),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        // Same argument as the message hash: no fallible Serialize impl is reached
        let body = match self {
            StakeAction::TransferStake { receiver, quantity } => codec().serialize(&TransferStakeWire {
                receiver: *receiver,
                quantity: *quantity,
            }),
            StakeAction::ChangeParams(proposal) => codec().serialize(&ChangeParamsRef {
                seq: proposal.seq,
                params: &proposal.candidate,
                signatures: &proposal.signatures,
            }),
        }
        .unwrap_or_default();

        let mut bytes = Vec::with_capacity(body.len() + 1);
        bytes.push(self.tag());
        bytes.extend_from_slice(&body);
        bytes
    }
}

/// Action that passed every check and only needs applying
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedAction {
    TransferStake {
        sender: AccountId,
        receiver: AccountId,
        quantity: StakeQuantity,
    },
    ChangeParams(AuthorizedChange),
}

/// Observable effect of a committed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEffect {
    StakeTransferred {
        sender: AccountId,
        receiver: AccountId,
        quantity: StakeQuantity,
    },
    ParamsScheduled(ActivationRecord),
}

pub struct StakeActionHandler;

impl StakeActionHandler {
    /// Decodes and validates an action against the current ledger and governance
    /// state. Nothing is modified; a failure leaves all state as it was.
    pub fn prepare(
        staking: &StakeLedger,
        governance: &GovernanceState,
        handler_id: u64,
        sender: &AccountId,
        bytes: &[u8],
    ) -> Result<PreparedAction, ActionError> {
        let result = Self::route(staking, governance, handler_id, sender, bytes);
        if let Err(e) = &result {
            warn!("Stake action from {} rejected: {}", sender, e);
        }
        result
    }

    fn route(
        staking: &StakeLedger,
        governance: &GovernanceState,
        handler_id: u64,
        sender: &AccountId,
        bytes: &[u8],
    ) -> Result<PreparedAction, ActionError> {
        if handler_id != STAKE_ACTION_HANDLER_ID {
            return Err(ActionError::UnknownHandler(handler_id));
        }

        match StakeAction::decode(bytes)? {
            StakeAction::TransferStake { receiver, quantity } => {
                staking.check_transfer(sender, quantity)?;
                Ok(PreparedAction::TransferStake {
                    sender: *sender,
                    receiver,
                    quantity,
                })
            }
            StakeAction::ChangeParams(proposal) => {
                // Snapshot reflects every earlier transaction of the block
                let snapshot = staking.snapshot();
                let change = governance.prepare_change_params(proposal, &snapshot)?;
                Ok(PreparedAction::ChangeParams(change))
            }
        }
    }

    /// Applies a prepared action at `current_height`
    pub fn commit(
        staking: &mut StakeLedger,
        governance: &mut GovernanceState,
        prepared: PreparedAction,
        current_height: BlockNumber,
    ) -> Result<ActionEffect, ActionError> {
        match prepared {
            PreparedAction::TransferStake {
                sender,
                receiver,
                quantity,
            } => {
                staking.transfer(&sender, receiver, quantity)?;
                debug!("Stake transfer {} -> {}: {}", sender, receiver, quantity);
                Ok(ActionEffect::StakeTransferred {
                    sender,
                    receiver,
                    quantity,
                })
            }
            PreparedAction::ChangeParams(change) => {
                let record = governance.commit_change_params(change, current_height)?;
                Ok(ActionEffect::ParamsScheduled(record))
            }
        }
    }
}

/// Malformed payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Empty stake action payload")]
    Empty,

    #[error("Unknown stake action tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("Malformed stake action: {0}")]
    Malformed(String),

    #[error("Invalid candidate parameters: {0}")]
    InvalidParameters(#[from] ParameterError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown custom action handler: {0}")]
    UnknownHandler(u64),

    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error(transparent)]
    Stake(#[from] StakeError),
}
