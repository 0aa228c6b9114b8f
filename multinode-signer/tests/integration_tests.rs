//! Integration tests for multinode-signer
//!
//! These tests drive the requester and wallet together:
//! - Node selection against roster snapshots
//! - Wallet rejections and their JSON-RPC codes
//! - Reconstruction of partial and empty results
//! - A full JSON round trip from a TOML configuration
//! - A wallet that signs something other than what it was sent

use multinode_signer::{
    account::{AccountId, SignerAccountId},
    config::{Config, SigningConfig},
    error::{RequesterError, Stage, WalletError, INTERNAL_ERROR, INVALID_PARAMS},
    requester::{RequesterReconstructor, RequesterSession},
    roster::NodeRoster,
    rpc::{
        JsonRpcRequest, JsonRpcResponse, SignTransactionsParams, SignTransactionsResult,
        WalletRpcHandler, METHOD_SIGN_TRANSACTIONS,
    },
    selection::SelectionError,
    signer::{Ed25519Signer, SignatureMap, SignerError, TransactionSigner},
    transaction::{
        BincodeBodyCodec, SignedTransaction, Timestamp, TransactionBody, TransactionBodyCodec,
        TransactionId, Transfer,
    },
    wallet::{SigningRequest, SigningResult, WalletSigningService},
};
use serde_json::json;
use std::{collections::HashSet, sync::Arc};
use tempfile::TempDir;

const PAYER: AccountId = AccountId::new(0, 0, 1234);
const SECRET: [u8; 32] = [7u8; 32];

fn body() -> TransactionBody {
    TransactionBody {
        transaction_id: TransactionId {
            account_id: PAYER,
            valid_start: Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            },
        },
        node_account_id: None,
        transaction_fee: 200_000,
        valid_duration: 120,
        memo: "multi-node transfer".to_string(),
        transfers: vec![
            Transfer {
                account_id: PAYER,
                amount: -1_000,
            },
            Transfer {
                account_id: AccountId::new(0, 0, 98),
                amount: 1_000,
            },
        ],
    }
}

fn roster(n: u64) -> NodeRoster {
    (0..n)
        .map(|i| (format!("10.0.1.{}:50211", i), AccountId::new(0, 0, 3 + i)))
        .collect()
}

fn signer() -> Arc<Ed25519Signer> {
    Arc::new(Ed25519Signer::from_secret_bytes(PAYER, &SECRET))
}

fn signer_account() -> SignerAccountId {
    SignerAccountId::new("hedera:testnet", PAYER)
}

fn request(body: &TransactionBody, node_count: usize) -> SigningRequest {
    SigningRequest {
        signer_account_id: signer_account(),
        transaction_body: BincodeBodyCodec::default().encode(body).unwrap(),
        node_count,
    }
}

/// Signs only the first `limit` node-scoped bodies.
struct PrefixSigner {
    inner: Ed25519Signer,
    limit: usize,
}

impl TransactionSigner for PrefixSigner {
    fn account_id(&self) -> AccountId {
        self.inner.account_id()
    }

    fn public_key(&self) -> Vec<u8> {
        self.inner.public_key()
    }

    fn sign(&self, message: &[u8]) -> Result<SignatureMap, SignerError> {
        self.inner.sign(message)
    }

    fn sign_all(&self, messages: &[Vec<u8>]) -> Result<Vec<SignatureMap>, SignerError> {
        messages
            .iter()
            .take(self.limit)
            .map(|m| self.inner.sign(m))
            .collect()
    }
}

/// Rewrites the memo before signing, as a compromised wallet might.
struct TamperingSigner {
    inner: Ed25519Signer,
}

impl TransactionSigner for TamperingSigner {
    fn account_id(&self) -> AccountId {
        self.inner.account_id()
    }

    fn public_key(&self) -> Vec<u8> {
        self.inner.public_key()
    }

    fn sign(&self, message: &[u8]) -> Result<SignatureMap, SignerError> {
        let codec = BincodeBodyCodec::default();
        let mut body = codec
            .decode(message)
            .map_err(|e| SignerError::Rejected(e.to_string()))?;
        body.memo = "pay the attacker".to_string();
        let altered = codec
            .encode(&body)
            .map_err(|e| SignerError::Rejected(e.to_string()))?;
        self.inner.sign(&altered)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Scenarios
// ============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn test_eight_node_roster_signs_for_five() {
        init_tracing();
        let signer = signer();
        let service = WalletSigningService::default().with_signer(signer.clone());
        let roster = roster(8);

        let result = service.handle(&request(&body(), 5), &roster).unwrap();
        assert_eq!(result.signature_maps.len(), 5);
        assert_eq!(result.node_account_ids.len(), 5);

        let distinct: HashSet<_> = result.node_account_ids.iter().collect();
        assert_eq!(distinct.len(), 5);

        let codec = BincodeBodyCodec::default();
        for (node, map) in result.iter() {
            assert!(roster.contains(node));
            let scoped = codec.encode(&body().with_node_account_id(*node)).unwrap();
            assert!(map.verify_ed25519(&signer.verifying_key(), &scoped));
        }
    }

    #[test]
    fn test_two_node_roster_cannot_serve_five() {
        let service = WalletSigningService::default().with_signer(signer());
        let err = service.handle(&request(&body(), 5), &roster(2)).unwrap_err();

        assert_eq!(
            err,
            WalletError::NodeSelection(SelectionError::InsufficientNodes {
                requested: 5,
                available: 2
            })
        );
        assert_eq!(err.code(), INTERNAL_ERROR);
        assert_eq!(err.stage(), Stage::NodeSelection);
    }

    #[test]
    fn test_preset_node_rejected_over_rpc() {
        let handler =
            WalletRpcHandler::from_config(&SigningConfig::default()).with_signer(signer());
        let preset = body().with_node_account_id(AccountId::new(0, 0, 3));
        let params = SignTransactionsParams::from_request(&request(&preset, 5));

        let response = handler.handle(
            &JsonRpcRequest::new(1, METHOD_SIGN_TRANSACTIONS, params.to_value()),
            &roster(8),
        );

        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.message.contains("must not have nodeAccountId set"));
    }

    #[test]
    fn test_empty_result_reconstructs_to_nothing() {
        let reconstructor =
            RequesterReconstructor::new(body(), 5, BincodeBodyCodec::default()).unwrap();
        let txs = reconstructor
            .reconstruct_wire(&SignTransactionsResult::default())
            .unwrap();
        assert!(txs.is_empty());
    }

    #[test]
    fn test_three_of_five_reconstructs_three() {
        let inner = Ed25519Signer::from_secret_bytes(PAYER, &SECRET);
        let key = inner.verifying_key();
        let service = WalletSigningService::default()
            .with_signer(Arc::new(PrefixSigner { inner, limit: 3 }));

        let result = service.handle(&request(&body(), 5), &roster(8)).unwrap();
        assert_eq!(result.len(), 3);

        let txs = RequesterReconstructor::new(body(), 5, BincodeBodyCodec::default())
            .unwrap()
            .with_verifying_key(key)
            .reconstruct(&result)
            .unwrap();

        assert_eq!(txs.len(), 3);
        let codec = BincodeBodyCodec::default();
        for (tx, node) in txs.iter().zip(&result.node_account_ids) {
            assert_eq!(tx.node_account_id(), *node);
            assert_eq!(tx.transaction_id(), body().transaction_id);
            assert_eq!(tx.body(&codec).unwrap().without_node_account_id(), body());
        }
    }

    #[test]
    fn test_reconstructed_transactions_differ_only_by_node() {
        let signer = signer();
        let service = WalletSigningService::default().with_signer(signer.clone());
        let result = service.handle(&request(&body(), 2), &roster(4)).unwrap();

        let txs = RequesterReconstructor::new(body(), 2, BincodeBodyCodec::default())
            .unwrap()
            .with_verifying_key(signer.verifying_key())
            .reconstruct(&result)
            .unwrap();
        assert_eq!(txs.len(), 2);

        let codec = BincodeBodyCodec::default();
        let (a, b) = (&txs[0], &txs[1]);
        assert_ne!(a.node_account_id(), b.node_account_id());
        assert_ne!(a.sig_map(), b.sig_map());
        assert_eq!(a.transaction_id(), b.transaction_id());
        assert_eq!(
            a.body(&codec).unwrap().without_node_account_id(),
            b.body(&codec).unwrap().without_node_account_id()
        );
        assert_ne!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());
    }
}

// ============================================================================
// End-to-End JSON-RPC Tests
// ============================================================================

mod end_to_end {
    use super::*;

    const CONFIG: &str = r#"
[signing]
default_node_count = 3
verify_signatures = true

[network]
name = "testnet"

[network.nodes]
"35.237.200.180:50211" = "0.0.3"
"35.186.191.247:50211" = "0.0.4"
"35.192.2.25:50211" = "0.0.5"
"35.199.161.108:50211" = "0.0.6"
"testnet-node-6" = "0.0.6"
"#;

    fn load_config() -> (TempDir, Config) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("signer.toml");
        std::fs::write(&path, CONFIG).unwrap();
        let config = Config::load(&path).unwrap();
        (temp_dir, config)
    }

    #[test]
    fn test_json_round_trip_from_config() {
        init_tracing();
        let (_dir, config) = load_config();
        let roster = config.network.roster().unwrap();
        assert_eq!(roster.available(), 4);

        let signer = signer();
        let handler = WalletRpcHandler::from_config(&config.signing).with_signer(signer.clone());
        let session = RequesterSession::from_config(
            signer_account(),
            body(),
            &config.signing,
            Some(signer.verifying_key()),
        )
        .unwrap();

        let raw_request = serde_json::to_string(&session.rpc_request(9)).unwrap();
        let raw_response = handler.handle_json(&raw_request, &roster);
        let response: JsonRpcResponse = serde_json::from_str(&raw_response).unwrap();
        assert_eq!(response.id, json!(9));

        let txs = session.accept_response(response).unwrap();
        assert_eq!(txs.len(), 3);

        let nodes: HashSet<_> = txs.iter().map(|tx| tx.node_account_id()).collect();
        assert_eq!(nodes.len(), 3);
        for tx in &txs {
            assert!(roster.contains(&tx.node_account_id()));
            let parsed =
                SignedTransaction::from_bytes(&tx.to_bytes().unwrap(), &BincodeBodyCodec::default())
                    .unwrap();
            assert_eq!(&parsed, tx);
        }
    }

    #[test]
    fn test_wallet_rejection_reaches_requester() {
        let (_dir, config) = load_config();
        let roster = config.network.roster().unwrap();
        let handler = WalletRpcHandler::from_config(&config.signing).with_signer(signer());

        let session = RequesterSession::new(
            signer_account(),
            body(),
            10,
            BincodeBodyCodec::default(),
        )
        .unwrap();

        let response = handler.handle(&session.rpc_request(1), &roster);
        let err = session.accept_response(response).unwrap_err();
        match err {
            RequesterError::WalletRejected { code, message } => {
                assert_eq!(code, INTERNAL_ERROR);
                assert!(message.starts_with("Node selection failed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_signer_account() {
        let (_dir, config) = load_config();
        let handler = WalletRpcHandler::from_config(&config.signing).with_signer(signer());

        let session = RequesterSession::from_config(
            SignerAccountId::new("hedera:testnet", AccountId::new(0, 0, 4321)),
            body(),
            &config.signing,
            None,
        )
        .unwrap();

        let response = handler.handle(&session.rpc_request(1), &config.network.roster().unwrap());
        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.message.starts_with("Signer account not available"));
    }

    #[test]
    fn test_large_body_round_trips_under_raised_limit() {
        let mut config = SigningConfig::default();
        config.max_transaction_body_size = 256 * 1024;

        let signer = signer();
        let handler = WalletRpcHandler::from_config(&config).with_signer(signer.clone());

        let mut large = body();
        large.memo = "m".repeat(70 * 1024);
        let session = RequesterSession::new(
            signer_account(),
            large.clone(),
            2,
            BincodeBodyCodec::new(config.max_transaction_body_size),
        )
        .unwrap()
        .with_verifying_key(signer.verifying_key());

        let response = handler.handle(&session.rpc_request(1), &roster(4));
        let txs = session.accept_response(response).unwrap();
        assert_eq!(txs.len(), 2);

        let codec = BincodeBodyCodec::new(config.max_transaction_body_size);
        for tx in &txs {
            let bytes = tx.to_bytes().unwrap();
            assert!(bytes.len() > 70 * 1024);
            assert_eq!(&SignedTransaction::from_bytes(&bytes, &codec).unwrap(), tx);
            assert_eq!(tx.body(&codec).unwrap().without_node_account_id(), large);
            assert!(tx.hash().is_ok());
        }
    }

    #[test]
    fn test_oversized_body_rejected_by_wallet() {
        let mut config = SigningConfig::default();
        config.max_transaction_body_size = 128;
        let handler = WalletRpcHandler::from_config(&config).with_signer(signer());

        let mut big = body();
        big.memo = "x".repeat(512);
        let session = RequesterSession::new(
            signer_account(),
            big,
            2,
            BincodeBodyCodec::new(4096),
        )
        .unwrap();

        let response = handler.handle(&session.rpc_request(1), &roster(4));
        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.message.starts_with("Failed to decode transaction body"));
    }
}

// ============================================================================
// Tampering Tests
// ============================================================================

mod tampering {
    use super::*;

    fn tampered_result() -> (Ed25519Signer, SigningResult) {
        let inner = Ed25519Signer::from_secret_bytes(PAYER, &SECRET);
        let reference = Ed25519Signer::from_secret_bytes(PAYER, &SECRET);
        let service =
            WalletSigningService::default().with_signer(Arc::new(TamperingSigner { inner }));
        let result = service.handle(&request(&body(), 3), &roster(5)).unwrap();
        (reference, result)
    }

    #[test]
    fn test_verification_rejects_foreign_content() {
        let (signer, result) = tampered_result();
        let err = RequesterReconstructor::new(body(), 3, BincodeBodyCodec::default())
            .unwrap()
            .with_verifying_key(signer.verifying_key())
            .reconstruct(&result)
            .unwrap_err();

        assert!(matches!(err, RequesterError::InvalidSignature { .. }));
        assert_eq!(err.stage(), Stage::Reconstruction);
    }

    #[test]
    fn test_content_always_comes_from_requester() {
        let (signer, result) = tampered_result();
        let txs = RequesterReconstructor::new(body(), 3, BincodeBodyCodec::default())
            .unwrap()
            .reconstruct(&result)
            .unwrap();

        let codec = BincodeBodyCodec::default();
        for tx in &txs {
            let rebuilt = tx.body(&codec).unwrap();
            assert_eq!(rebuilt.memo, "multi-node transfer");
            // The attached signatures cover different bytes, so the ledger
            // would refuse these.
            assert!(!tx.sig_map().verify_ed25519(&signer.verifying_key(), tx.body_bytes()));
        }
    }
}

// ============================================================================
// Thread Safety
// ============================================================================

mod thread_safety {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_shared_types_are_send_sync() {
        assert_send_sync::<WalletSigningService>();
        assert_send_sync::<WalletRpcHandler>();
        assert_send_sync::<RequesterReconstructor>();
        assert_send_sync::<RequesterSession>();
        assert_send_sync::<NodeRoster>();
    }
}
