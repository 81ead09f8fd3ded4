// Governance - Stake-weighted authorization of consensus parameter changes
//
// A change-params proposal is accepted when:
//   1. its sequence number is exactly the next one expected on its stream, and
//   2. the distinct stakeholders who signed its message hold strictly more than
//      half of the total outstanding stake.
// Only then is the sequence consumed and the candidate scheduled for the next block.

use super::parameters::{ActivationRecord, ParameterStore};
use super::staking::StakeSnapshot;
use crate::types::{
    domain_separate, AccountId, BlockNumber, Hash, ParameterSet, Signature64, StakeQuantity,
    DOMAIN_CHANGE_PARAMS,
};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Identifies an independent governance sequence. Streams are keyed by action tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u8);

impl StreamId {
    /// Stream of change-params proposals
    pub const CHANGE_PARAMS: StreamId = StreamId(0xff);
}

// =============================================================================
// SEQUENCE TRACKER
// =============================================================================

/// Next expected sequence number per stream (starting at 0)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceTracker {
    next: BTreeMap<StreamId, u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_expected(&self, stream: StreamId) -> u64 {
        self.next.get(&stream).copied().unwrap_or(0)
    }

    /// Checks `proposed` without consuming it
    pub fn ensure_next(&self, stream: StreamId, proposed: u64) -> Result<(), SequenceError> {
        let expected = self.next_expected(stream);
        if proposed != expected {
            return Err(SequenceError {
                stream,
                expected,
                found: proposed,
            });
        }
        Ok(())
    }

    /// Accepts only `proposed == next_expected`, then advances the stream by one
    pub fn check_and_advance(&mut self, stream: StreamId, proposed: u64) -> Result<(), SequenceError> {
        self.ensure_next(stream, proposed)?;
        self.next.insert(stream, proposed + 1);
        Ok(())
    }
}

/// Proposal sequence does not match the stream's next expected value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid governance seq: expected {expected}, found {found}")]
pub struct SequenceError {
    pub stream: StreamId,
    pub expected: u64,
    pub found: u64,
}

// =============================================================================
// STAKEHOLDER SIGNATURES
// =============================================================================

/// A stakeholder's signature over a proposal message hash.
///
/// Ed25519 cannot recover a key from a signature, so the signer travels with it;
/// a signature that verifies against `signer` recovers that identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSignature {
    pub signer: AccountId,
    pub signature: Signature64,
}

impl StakeSignature {
    pub fn sign(key: &SigningKey, message_hash: &Hash) -> Self {
        let message = domain_separate(DOMAIN_CHANGE_PARAMS, message_hash.as_bytes());
        Self {
            signer: AccountId::from_public_key(&key.verifying_key()),
            signature: Signature64::from(key.sign(&message)),
        }
    }

    /// Signer identity if the signature is valid for `message_hash`
    pub fn recover(&self, message_hash: &Hash) -> Option<AccountId> {
        let message = domain_separate(DOMAIN_CHANGE_PARAMS, message_hash.as_bytes());
        if self.signer.verify(&message, self.signature.as_bytes()) {
            Some(self.signer)
        } else {
            None
        }
    }
}

// =============================================================================
// THRESHOLD VERIFIER
// =============================================================================

/// Result of a successful authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedStake {
    /// Distinct signers, in first-appearance order
    pub signers: Vec<AccountId>,
    pub authorized: StakeQuantity,
    pub total: StakeQuantity,
}

/// Stateless majority-of-stake check over an immutable ledger snapshot
pub struct ThresholdVerifier;

impl ThresholdVerifier {
    /// Sums the stake of distinct valid signers and requires `sum * 2 > total`.
    ///
    /// The count of signers or stakeholders plays no role. Repeating a signer's
    /// signature counts its stake once.
    pub fn authorize(
        message_hash: &Hash,
        signatures: &[StakeSignature],
        snapshot: &StakeSnapshot,
    ) -> Result<AuthorizedStake, AuthorizationError> {
        if signatures.is_empty() {
            return Err(AuthorizationError::NoSignatures);
        }

        let mut seen = BTreeSet::new();
        let mut signers = Vec::new();
        let mut authorized: u128 = 0;

        for (index, item) in signatures.iter().enumerate() {
            let signer = item
                .recover(message_hash)
                .ok_or(AuthorizationError::InvalidSignature { index })?;
            if seen.insert(signer) {
                authorized += snapshot.stake_of(&signer) as u128;
                signers.push(signer);
            }
        }

        let total = snapshot.total_stake();
        // Bounded by total, which fits in a StakeQuantity
        let authorized = authorized as StakeQuantity;

        if !exceeds_half(authorized, total) {
            return Err(AuthorizationError::InsufficientStake {
                authorized,
                total,
                required_exclusive: total / 2,
            });
        }

        Ok(AuthorizedStake {
            signers,
            authorized,
            total,
        })
    }
}

/// `authorized` is strictly more than half of `total`
pub fn exceeds_half(authorized: StakeQuantity, total: StakeQuantity) -> bool {
    (authorized as u128) * 2 > total as u128
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Change-params action carries no signatures")]
    NoSignatures,

    #[error("Invalid stakeholder signature at position {index}")]
    InvalidSignature { index: usize },

    #[error("Insufficient stakes: authorized {authorized} of {total} total, more than {required_exclusive} required")]
    InsufficientStake {
        authorized: StakeQuantity,
        total: StakeQuantity,
        required_exclusive: StakeQuantity,
    },
}

// =============================================================================
// PROPOSALS
// =============================================================================

/// A decoded change-params action. Never stored: it either consumes its
/// sequence number and becomes an activation record, or is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeProposal {
    pub seq: u64,
    pub candidate: ParameterSet,
    pub signatures: Vec<StakeSignature>,
}

impl ChangeProposal {
    pub fn unsigned(seq: u64, candidate: ParameterSet) -> Self {
        Self {
            seq,
            candidate,
            signatures: Vec::new(),
        }
    }

    /// Hash bound by every signature: covers tag, seq and candidate, not the signatures
    pub fn message_hash(&self) -> Hash {
        super::stake_action::change_params_message_hash(self.seq, &self.candidate)
    }

    /// Appends a stakeholder signature over the current message hash
    pub fn sign_with(&mut self, key: &SigningKey) {
        let hash = self.message_hash();
        self.signatures.push(StakeSignature::sign(key, &hash));
    }
}

/// A proposal that passed both checks, ready to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedChange {
    pub seq: u64,
    pub candidate: ParameterSet,
    pub authorization: AuthorizedStake,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GovernanceError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

/// Governance state owned by one chain's execution context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceState {
    pub sequences: SequenceTracker,
    pub params: ParameterStore,
}

impl GovernanceState {
    pub fn new(genesis_params: ParameterSet) -> Self {
        Self {
            sequences: SequenceTracker::new(),
            params: ParameterStore::new(genesis_params),
        }
    }

    /// Sequence check first (cheap), then stake authorization. Mutates nothing.
    pub fn prepare_change_params(
        &self,
        proposal: ChangeProposal,
        snapshot: &StakeSnapshot,
    ) -> Result<AuthorizedChange, GovernanceError> {
        self.sequences
            .ensure_next(StreamId::CHANGE_PARAMS, proposal.seq)?;

        let authorization =
            ThresholdVerifier::authorize(&proposal.message_hash(), &proposal.signatures, snapshot)?;

        Ok(AuthorizedChange {
            seq: proposal.seq,
            candidate: proposal.candidate,
            authorization,
        })
    }

    /// Consumes the sequence number and schedules the candidate for `current_height + 1`
    pub fn commit_change_params(
        &mut self,
        change: AuthorizedChange,
        current_height: BlockNumber,
    ) -> Result<ActivationRecord, GovernanceError> {
        self.sequences
            .check_and_advance(StreamId::CHANGE_PARAMS, change.seq)?;

        let record = self.params.propose_activation(change.candidate, current_height);

        info!(
            "Change-params #{} authorized by {} signer(s) ({}/{} stake), active from block #{}",
            change.seq,
            change.authorization.signers.len(),
            change.authorization.authorized,
            change.authorization.total,
            record.effective_from_height
        );

        Ok(record)
    }

    /// Runs both phases; used where no other effect has to be staged in between
    pub fn apply_change_params(
        &mut self,
        proposal: ChangeProposal,
        snapshot: &StakeSnapshot,
        current_height: BlockNumber,
    ) -> Result<ActivationRecord, GovernanceError> {
        let change = self.prepare_change_params(proposal, snapshot)?;
        self.commit_change_params(change, current_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::staking::StakeLedger;

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn id(key: &SigningKey) -> AccountId {
        AccountId::from_public_key(&key.verifying_key())
    }

    /// alice 50_000, bob 30_000, carol 20_000
    fn three_stakeholders() -> (SigningKey, SigningKey, SigningKey, StakeLedger) {
        let (alice, bob, carol) = (key(1), key(2), key(3));
        let mut ledger = StakeLedger::new();
        ledger.deposit(id(&alice), 50_000).unwrap();
        ledger.deposit(id(&bob), 30_000).unwrap();
        ledger.deposit(id(&carol), 20_000).unwrap();
        (alice, bob, carol, ledger)
    }

    fn proposal(seq: u64, min_pay_cost: u64, signers: &[&SigningKey]) -> ChangeProposal {
        let candidate = ParameterSet {
            min_pay_cost,
            ..ParameterSet::reference()
        };
        let mut proposal = ChangeProposal::unsigned(seq, candidate);
        for key in signers {
            proposal.sign_with(key);
        }
        proposal
    }

    #[test]
    fn test_sequence_tracker_advances_by_one() {
        let mut tracker = SequenceTracker::new();
        let stream = StreamId::CHANGE_PARAMS;
        assert_eq!(tracker.next_expected(stream), 0);

        tracker.check_and_advance(stream, 0).unwrap();
        tracker.check_and_advance(stream, 1).unwrap();
        assert_eq!(tracker.next_expected(stream), 2);

        let err = tracker.check_and_advance(stream, 1).unwrap_err();
        assert_eq!(err.expected, 2);
        assert_eq!(err.found, 1);
        assert_eq!(err.to_string(), "Invalid governance seq: expected 2, found 1");

        assert!(tracker.check_and_advance(stream, 3).is_err());
        assert_eq!(tracker.next_expected(stream), 2);
    }

    #[test]
    fn test_streams_are_independent() {
        let mut tracker = SequenceTracker::new();
        tracker.check_and_advance(StreamId::CHANGE_PARAMS, 0).unwrap();
        assert_eq!(tracker.next_expected(StreamId(0x10)), 0);
        tracker.check_and_advance(StreamId(0x10), 0).unwrap();
        assert_eq!(tracker.next_expected(StreamId::CHANGE_PARAMS), 1);
    }

    #[test]
    fn test_signature_recovers_signer() {
        let alice = key(1);
        let hash = Hash::hash(b"message");
        let sig = StakeSignature::sign(&alice, &hash);
        assert_eq!(sig.recover(&hash), Some(id(&alice)));
        assert_eq!(sig.recover(&Hash::hash(b"other")), None);
    }

    #[test]
    fn test_majority_of_stake_authorizes() {
        let (alice, _bob, carol, ledger) = three_stakeholders();
        let p = proposal(0, 11, &[&alice, &carol]);
        let result =
            ThresholdVerifier::authorize(&p.message_hash(), &p.signatures, &ledger.snapshot()).unwrap();
        assert_eq!(result.authorized, 70_000);
        assert_eq!(result.total, 100_000);
        assert_eq!(result.signers, vec![id(&alice), id(&carol)]);
    }

    #[test]
    fn test_exactly_half_is_not_enough() {
        let (_alice, bob, carol, ledger) = three_stakeholders();
        let p = proposal(0, 11, &[&bob, &carol]);
        let err = ThresholdVerifier::authorize(&p.message_hash(), &p.signatures, &ledger.snapshot())
            .unwrap_err();
        assert_eq!(
            err,
            AuthorizationError::InsufficientStake {
                authorized: 50_000,
                total: 100_000,
                required_exclusive: 50_000,
            }
        );
        assert!(err.to_string().starts_with("Insufficient stakes:"));
    }

    #[test]
    fn test_single_half_holder_is_not_enough() {
        let (alice, _bob, _carol, ledger) = three_stakeholders();
        let p = proposal(0, 11, &[&alice]);
        assert!(ThresholdVerifier::authorize(&p.message_hash(), &p.signatures, &ledger.snapshot()).is_err());
    }

    #[test]
    fn test_repeated_signature_counts_once() {
        let (alice, _bob, _carol, ledger) = three_stakeholders();
        let p = proposal(0, 11, &[&alice, &alice, &alice]);
        let err = ThresholdVerifier::authorize(&p.message_hash(), &p.signatures, &ledger.snapshot())
            .unwrap_err();
        assert!(matches!(
            err,
            AuthorizationError::InsufficientStake { authorized: 50_000, .. }
        ));
    }

    #[test]
    fn test_amount_not_headcount() {
        // Two large holders out of many small ones
        let big1 = key(1);
        let big2 = key(2);
        let mut ledger = StakeLedger::new();
        ledger.deposit(id(&big1), 30).unwrap();
        ledger.deposit(id(&big2), 21).unwrap();
        for seed in 10..59u8 {
            ledger.deposit(id(&key(seed)), 1).unwrap();
        }
        assert_eq!(ledger.total_stake(), 100);

        let p = proposal(0, 11, &[&big1, &big2]);
        assert!(ThresholdVerifier::authorize(&p.message_hash(), &p.signatures, &ledger.snapshot()).is_ok());

        // Forty-nine small holders are not enough
        let small: Vec<SigningKey> = (10..59u8).map(key).collect();
        let refs: Vec<&SigningKey> = small.iter().collect();
        let p = proposal(0, 11, &refs);
        assert!(ThresholdVerifier::authorize(&p.message_hash(), &p.signatures, &ledger.snapshot()).is_err());
    }

    #[test]
    fn test_non_stakeholder_signature_adds_nothing() {
        let (_alice, bob, carol, ledger) = three_stakeholders();
        let outsider = key(42);
        let p = proposal(0, 11, &[&bob, &carol, &outsider]);
        assert!(ThresholdVerifier::authorize(&p.message_hash(), &p.signatures, &ledger.snapshot()).is_err());
    }

    #[test]
    fn test_invalid_signature_rejects() {
        let (alice, _bob, carol, ledger) = three_stakeholders();
        let mut p = proposal(0, 11, &[&alice, &carol]);
        p.signatures[1].signature = Signature64::zero();
        let err = ThresholdVerifier::authorize(&p.message_hash(), &p.signatures, &ledger.snapshot())
            .unwrap_err();
        assert_eq!(err, AuthorizationError::InvalidSignature { index: 1 });
    }

    #[test]
    fn test_signature_bound_to_exact_proposal() {
        let (alice, _bob, carol, ledger) = three_stakeholders();
        let signed = proposal(0, 11, &[&alice, &carol]);

        // Same signatures transplanted onto a different candidate
        let transplanted = ChangeProposal {
            seq: 0,
            candidate: ParameterSet {
                min_pay_cost: 1,
                ..ParameterSet::reference()
            },
            signatures: signed.signatures.clone(),
        };
        assert!(ThresholdVerifier::authorize(
            &transplanted.message_hash(),
            &transplanted.signatures,
            &ledger.snapshot()
        )
        .is_err());

        // ...or onto a different sequence number
        let replayed = ChangeProposal {
            seq: 1,
            ..signed
        };
        assert!(ThresholdVerifier::authorize(&replayed.message_hash(), &replayed.signatures, &ledger.snapshot())
            .is_err());
    }

    #[test]
    fn test_empty_signatures_and_empty_ledger() {
        let ledger = StakeLedger::new();
        let hash = Hash::hash(b"m");
        assert_eq!(
            ThresholdVerifier::authorize(&hash, &[], &ledger.snapshot()),
            Err(AuthorizationError::NoSignatures)
        );
        let sig = StakeSignature::sign(&key(1), &hash);
        assert!(ThresholdVerifier::authorize(&hash, &[sig], &ledger.snapshot()).is_err());
    }

    #[test]
    fn test_rejected_proposals_consume_no_sequence() {
        let (alice, bob, carol, ledger) = three_stakeholders();
        let mut gov = GovernanceState::new(ParameterSet::reference());
        let snapshot = ledger.snapshot();

        // Unauthorized
        assert!(gov.apply_change_params(proposal(0, 11, &[&bob, &carol]), &snapshot, 1).is_err());
        assert_eq!(gov.sequences.next_expected(StreamId::CHANGE_PARAMS), 0);

        // Wrong sequence
        let err = gov
            .apply_change_params(proposal(1, 11, &[&alice, &carol]), &snapshot, 1)
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Sequence(SequenceError { expected: 0, found: 1, .. })));
        assert!(gov.params.pending().is_none());

        // Accepted
        let record = gov
            .apply_change_params(proposal(0, 11, &[&alice, &carol]), &snapshot, 1)
            .unwrap();
        assert_eq!(record.effective_from_height, 2);
        assert_eq!(gov.sequences.next_expected(StreamId::CHANGE_PARAMS), 1);

        // Replay of the consumed number fails even though fully authorized
        let err = gov
            .apply_change_params(proposal(0, 11, &[&alice, &bob, &carol]), &snapshot, 1)
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Sequence(SequenceError { expected: 1, found: 0, .. })));
    }

    #[test]
    fn test_sequence_checked_before_signatures() {
        let (_alice, bob, carol, ledger) = three_stakeholders();
        let gov = GovernanceState::new(ParameterSet::reference());
        // Both checks would fail; the sequence error wins
        let err = gov
            .prepare_change_params(proposal(5, 11, &[&bob, &carol]), &ledger.snapshot())
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Sequence(_)));
    }
}
