//! Property-based tests for node selection and reconstruction.
//!
//! These check the protocol's "for all" guarantees over random rosters,
//! bodies and partial results rather than fixed vectors.

use multinode_signer::{
    account::AccountId,
    requester::RequesterReconstructor,
    roster::NodeRoster,
    selection::{select_nodes_with_rng, SelectionError},
    signer::{Ed25519Signer, TransactionSigner},
    transaction::{
        BincodeBodyCodec, Timestamp, TransactionBody, TransactionBodyCodec, TransactionId, Transfer,
    },
    wallet::SigningResult,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::HashSet;

fn roster(n: u64) -> NodeRoster {
    (0..n)
        .map(|i| (format!("node-{}", i), AccountId::new(0, 0, 3 + i)))
        .collect()
}

fn arb_account() -> impl Strategy<Value = AccountId> {
    (0u64..4, 0u64..4, 0u64..100_000).prop_map(|(s, r, n)| AccountId::new(s, r, n))
}

fn arb_body() -> impl Strategy<Value = TransactionBody> {
    (
        arb_account(),
        any::<i64>(),
        0u32..1_000_000_000,
        any::<u64>(),
        1u64..180,
        "[a-zA-Z0-9 ]{0,100}",
        prop::collection::vec((arb_account(), any::<i64>()), 0..6),
    )
        .prop_map(|(payer, seconds, nanos, fee, duration, memo, transfers)| TransactionBody {
            transaction_id: TransactionId {
                account_id: payer,
                valid_start: Timestamp { seconds, nanos },
            },
            node_account_id: None,
            transaction_fee: fee,
            valid_duration: duration,
            memo,
            transfers: transfers
                .into_iter()
                .map(|(account_id, amount)| Transfer { account_id, amount })
                .collect(),
        })
}

// ============================================================================
// Selection Properties
// ============================================================================

proptest! {
    /// Property: for |R| >= k >= 1, selection yields k distinct members of R.
    #[test]
    fn prop_selection_distinct_members(
        (n, k) in (1u64..40).prop_flat_map(|n| (Just(n), 1..=n as usize)),
        seed in any::<u64>(),
    ) {
        let roster = roster(n);
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let selected = select_nodes_with_rng(&roster, k, &mut rng).unwrap();

        prop_assert_eq!(selected.len(), k);
        let unique: HashSet<_> = selected.iter().collect();
        prop_assert_eq!(unique.len(), k, "selection must not repeat nodes");
        for node in &selected {
            prop_assert!(roster.contains(node));
        }
    }

    /// Property: asking for more than the roster holds never clamps.
    #[test]
    fn prop_selection_never_clamps(n in 0u64..20, extra in 1usize..10, seed in any::<u64>()) {
        let roster = roster(n);
        let k = n as usize + extra;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);

        prop_assert_eq!(
            select_nodes_with_rng(&roster, k, &mut rng),
            Err(SelectionError::InsufficientNodes { requested: k, available: n as usize })
        );
    }
}

// ============================================================================
// Body and Reconstruction Properties
// ============================================================================

proptest! {
    /// Property: inject-then-strip restores the canonical bytes exactly.
    #[test]
    fn prop_inject_strip_byte_identical(body in arb_body(), node in arb_account()) {
        let codec = BincodeBodyCodec::new(64 * 1024);
        let original = codec.encode(&body).unwrap();

        let scoped = codec.encode(&body.with_node_account_id(node)).unwrap();
        let decoded = codec.decode(&scoped).unwrap();
        prop_assert_eq!(decoded.node_account_id(), Some(node));
        prop_assert_eq!(codec.encode(&decoded.without_node_account_id()).unwrap(), original);
    }

    /// Property: for every m in 0..=k, each reconstructed body stripped of
    /// its node is byte-identical to the original.
    #[test]
    fn prop_reconstruction_preserves_content(
        body in arb_body(),
        (k, m) in (1usize..8).prop_flat_map(|k| (Just(k), 0..=k)),
        seed in any::<u64>(),
    ) {
        let codec = BincodeBodyCodec::new(64 * 1024);
        let signer = Ed25519Signer::from_secret_bytes(AccountId::new(0, 0, 2), &[3u8; 32]);
        let mut rng = ChaCha20Rng::seed_from_u64(seed);

        let nodes = select_nodes_with_rng(&roster(10), m.max(1), &mut rng).unwrap();
        let node_account_ids: Vec<_> = nodes.into_iter().take(m).collect();
        let signature_maps = node_account_ids
            .iter()
            .map(|node| {
                let scoped = codec.encode(&body.with_node_account_id(*node)).unwrap();
                signer.sign(&scoped).unwrap()
            })
            .collect();
        let result = SigningResult { signature_maps, node_account_ids };

        let txs = RequesterReconstructor::new(body.clone(), k, codec)
            .unwrap()
            .with_verifying_key(signer.verifying_key())
            .reconstruct(&result)
            .unwrap();

        prop_assert_eq!(txs.len(), m);
        let original = codec.encode(&body).unwrap();
        for tx in &txs {
            let stripped = tx.body(&codec).unwrap().without_node_account_id();
            prop_assert_eq!(codec.encode(&stripped).unwrap(), original.clone());
            prop_assert_eq!(tx.transaction_id(), body.transaction_id);
        }
    }
}
