// Governance Invariants - property tests
//
// 1. Authorization succeeds iff distinct signers hold strictly more than half the stake
// 2. Repeated signatures never add stake
// 3. Accepted sequence numbers are exactly 0, 1, 2, ... with no reuse
// 4. Stake transfers conserve the total

#[cfg(test)]
mod invariants {
    use crate::contracts::governance::{
        AuthorizationError, SequenceTracker, StakeSignature, StreamId, ThresholdVerifier,
    };
    use crate::contracts::staking::StakeLedger;
    use crate::types::{AccountId, Hash};
    use ed25519_dalek::SigningKey;
    use proptest::prelude::*;

    fn key(index: usize) -> SigningKey {
        SigningKey::from_bytes(&[index as u8 + 1; 32])
    }

    fn account(index: usize) -> AccountId {
        AccountId::from_public_key(&key(index).verifying_key())
    }

    fn ledger_of(stakes: &[u64]) -> StakeLedger {
        let mut ledger = StakeLedger::new();
        for (index, stake) in stakes.iter().enumerate() {
            ledger.deposit(account(index), *stake).unwrap();
        }
        ledger
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn threshold_is_strict_majority_of_stake(
            stakes in prop::collection::vec(1u64..1_000_000, 1..12),
            mask in prop::collection::vec(any::<bool>(), 12),
        ) {
            let ledger = ledger_of(&stakes);
            let message = Hash::hash(b"proposal");
            let signers: Vec<usize> = (0..stakes.len()).filter(|i| mask[*i]).collect();
            let signatures: Vec<StakeSignature> =
                signers.iter().map(|i| StakeSignature::sign(&key(*i), &message)).collect();

            let signed_stake: u64 = signers.iter().map(|i| stakes[*i]).sum();
            let total: u64 = stakes.iter().sum();

            let result = ThresholdVerifier::authorize(&message, &signatures, &ledger.snapshot());
            if signatures.is_empty() {
                prop_assert_eq!(result, Err(AuthorizationError::NoSignatures));
            } else if signed_stake * 2 > total {
                let authorized = result.unwrap();
                prop_assert_eq!(authorized.authorized, signed_stake);
                prop_assert_eq!(authorized.signers.len(), signers.len());
            } else {
                let is_insufficient = matches!(result, Err(AuthorizationError::InsufficientStake { .. }));
                prop_assert!(is_insufficient);
            }
        }

        #[test]
        fn repeated_signatures_count_once(
            stakes in prop::collection::vec(1u64..1_000, 2..6),
            repeats in 1usize..5,
        ) {
            let ledger = ledger_of(&stakes);
            let message = Hash::hash(b"proposal");
            let signature = StakeSignature::sign(&key(0), &message);
            let signatures = vec![signature; repeats];

            let total: u64 = stakes.iter().sum();
            match ThresholdVerifier::authorize(&message, &signatures, &ledger.snapshot()) {
                Ok(authorized) => prop_assert_eq!(authorized.authorized, stakes[0]),
                Err(AuthorizationError::InsufficientStake { authorized, .. }) => {
                    prop_assert_eq!(authorized, stakes[0]);
                    prop_assert!(stakes[0] * 2 <= total);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        #[test]
        fn sequence_numbers_are_consumed_in_order(proposals in prop::collection::vec(0u64..8, 1..40)) {
            let mut tracker = SequenceTracker::new();
            let stream = StreamId::CHANGE_PARAMS;
            let mut accepted = Vec::new();

            for seq in proposals {
                let expected = tracker.next_expected(stream);
                match tracker.check_and_advance(stream, seq) {
                    Ok(()) => {
                        prop_assert_eq!(seq, expected);
                        accepted.push(seq);
                    }
                    Err(e) => {
                        prop_assert_eq!(e.expected, expected);
                        prop_assert_eq!(tracker.next_expected(stream), expected);
                    }
                }
            }

            let in_order: Vec<u64> = (0..accepted.len() as u64).collect();
            prop_assert_eq!(accepted, in_order);
        }

        #[test]
        fn stake_transfers_conserve_total(
            stakes in prop::collection::vec(1u64..10_000, 2..6),
            moves in prop::collection::vec((0usize..6, 0usize..6, 0u64..20_000), 0..30),
        ) {
            let mut ledger = ledger_of(&stakes);
            let total = ledger.total_stake();

            for (from, to, quantity) in moves {
                let before = ledger.clone();
                if ledger.transfer(&account(from), account(to), quantity).is_err() {
                    prop_assert_eq!(&ledger, &before);
                }
                prop_assert_eq!(ledger.total_stake(), total);
                prop_assert!(ledger.is_consistent());
            }
        }
    }
}
