// Copyright (c) 2024 Botho Foundation

//! Requester-side reconstruction.
//!
//! The requester never takes transaction content from the wallet. It keeps
//! its own canonical body and, for each returned `(node, signature map)`
//! pair, rebuilds the node-scoped body locally and attaches the signatures.
//! A wallet that signed something else produces signatures that do not
//! cover the rebuilt bytes; with a verifying key configured this is caught
//! here, otherwise the ledger rejects the submission.

use ed25519_dalek::VerifyingKey;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::{
    account::{NodeId, SignerAccountId},
    config::SigningConfig,
    error::RequesterError,
    rpc::{
        JsonRpcRequest, JsonRpcResponse, SignTransactionsParams, SignTransactionsResult,
        METHOD_SIGN_TRANSACTIONS,
    },
    signer::SignatureMap,
    transaction::{BincodeBodyCodec, SignedTransaction, TransactionBody, TransactionBodyCodec},
    wallet::{SigningRequest, SigningResult},
};

/// Rebuilds signed transactions from the requester's own body.
#[derive(Debug, Clone)]
pub struct RequesterReconstructor<C = BincodeBodyCodec> {
    body: TransactionBody,
    canonical_bytes: Vec<u8>,
    requested: usize,
    codec: C,
    verifying_key: Option<VerifyingKey>,
}

impl<C: TransactionBodyCodec> RequesterReconstructor<C> {
    /// `body` must be canonical; `requested` is the node count asked of the
    /// wallet.
    pub fn new(body: TransactionBody, requested: usize, codec: C) -> Result<Self, RequesterError> {
        if let Some(node) = body.node_account_id() {
            return Err(RequesterError::NodeAccountIdPreset(node));
        }
        if requested == 0 {
            return Err(RequesterError::InvalidNodeCount);
        }

        let canonical_bytes = codec.encode(&body).map_err(RequesterError::Encode)?;
        Ok(Self {
            body,
            canonical_bytes,
            requested,
            codec,
            verifying_key: None,
        })
    }

    /// Verify every signature map against `key` during reconstruction.
    pub fn with_verifying_key(mut self, key: VerifyingKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    /// Encoded canonical body, as sent to the wallet.
    pub fn canonical_bytes(&self) -> &[u8] {
        &self.canonical_bytes
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Rebuild one signed transaction per returned node.
    ///
    /// An empty result is valid and yields an empty vector. Any malformed
    /// entry aborts the whole reconstruction.
    pub fn reconstruct(
        &self,
        result: &SigningResult,
    ) -> Result<Vec<SignedTransaction>, RequesterError> {
        self.check_shape(result.signature_maps.len(), result.node_account_ids.len())?;

        let mut seen = HashSet::with_capacity(result.len());
        for node in &result.node_account_ids {
            if !seen.insert(*node) {
                return Err(RequesterError::MalformedResponse(format!(
                    "duplicate node account id {}",
                    node
                )));
            }
        }

        let transactions = result
            .iter()
            .enumerate()
            .map(|(index, (node, map))| self.rebuild(index, *node, map))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            transaction_id = %self.body.transaction_id,
            requested = self.requested,
            reconstructed = transactions.len(),
            "reconstructed {} signed transactions",
            transactions.len()
        );
        Ok(transactions)
    }

    /// Decode a wire result and reconstruct from it.
    pub fn reconstruct_wire(
        &self,
        wire: &SignTransactionsResult,
    ) -> Result<Vec<SignedTransaction>, RequesterError> {
        self.check_shape(wire.signature_maps.len(), wire.node_account_ids.len())?;
        self.reconstruct(&wire.decode()?)
    }

    fn check_shape(&self, maps: usize, nodes: usize) -> Result<(), RequesterError> {
        if maps != nodes {
            return Err(RequesterError::MalformedResponse(format!(
                "{} signature maps for {} node account ids",
                maps, nodes
            )));
        }
        if nodes > self.requested {
            return Err(RequesterError::MalformedResponse(format!(
                "{} entries returned for {} requested nodes",
                nodes, self.requested
            )));
        }
        Ok(())
    }

    fn rebuild(
        &self,
        index: usize,
        node: NodeId,
        map: &SignatureMap,
    ) -> Result<SignedTransaction, RequesterError> {
        map.validate()
            .map_err(|source| RequesterError::MalformedSignatureMap { index, source })?;

        let scoped = self.body.with_node_account_id(node);
        let tx = SignedTransaction::new(&scoped, &self.codec, map.clone())
            .map_err(RequesterError::Codec)?;

        // Only the node id may differ from what we sent.
        let stripped = tx
            .body(&self.codec)
            .map_err(RequesterError::Codec)?
            .without_node_account_id();
        let stripped_bytes = self.codec.encode(&stripped).map_err(RequesterError::Codec)?;
        if stripped_bytes != self.canonical_bytes {
            warn!(node = %node, "rebuilt body differs from canonical body");
            return Err(RequesterError::ContentMismatch { node });
        }

        if let Some(key) = &self.verifying_key {
            if !map.verify_ed25519(key, tx.body_bytes()) {
                warn!(node = %node, "signature map does not verify");
                return Err(RequesterError::InvalidSignature { node });
            }
        }

        match tx.hash() {
            Ok(hash) => {
                debug!(node = %node, hash = %hex::encode(hash), "rebuilt signed transaction")
            }
            Err(e) => debug!(node = %node, "rebuilt signed transaction, hash unavailable: {}", e),
        }
        Ok(tx)
    }
}

/// One signing round trip from the requester's side.
#[derive(Debug, Clone)]
pub struct RequesterSession<C = BincodeBodyCodec> {
    signer_account_id: SignerAccountId,
    reconstructor: RequesterReconstructor<C>,
}

impl RequesterSession<BincodeBodyCodec> {
    /// Session using the configured node count and body size limit.
    ///
    /// `key` is only used when `verify_signatures` is set.
    pub fn from_config(
        signer_account_id: SignerAccountId,
        body: TransactionBody,
        config: &SigningConfig,
        key: Option<VerifyingKey>,
    ) -> Result<Self, RequesterError> {
        let session = Self::new(
            signer_account_id,
            body,
            config.default_node_count,
            BincodeBodyCodec::new(config.max_transaction_body_size),
        )?;

        Ok(match key {
            Some(key) if config.verify_signatures => session.with_verifying_key(key),
            _ => session,
        })
    }
}

impl<C: TransactionBodyCodec> RequesterSession<C> {
    pub fn new(
        signer_account_id: SignerAccountId,
        body: TransactionBody,
        node_count: usize,
        codec: C,
    ) -> Result<Self, RequesterError> {
        Ok(Self {
            signer_account_id,
            reconstructor: RequesterReconstructor::new(body, node_count, codec)?,
        })
    }

    pub fn with_verifying_key(mut self, key: VerifyingKey) -> Self {
        self.reconstructor = self.reconstructor.with_verifying_key(key);
        self
    }

    pub fn reconstructor(&self) -> &RequesterReconstructor<C> {
        &self.reconstructor
    }

    /// Typed request for an in-process wallet.
    pub fn signing_request(&self) -> SigningRequest {
        SigningRequest {
            signer_account_id: self.signer_account_id.clone(),
            transaction_body: self.reconstructor.canonical_bytes().to_vec(),
            node_count: self.reconstructor.requested(),
        }
    }

    /// JSON-RPC request for a remote wallet.
    pub fn rpc_request(&self, id: impl Into<Value>) -> JsonRpcRequest {
        let params = SignTransactionsParams::from_request(&self.signing_request());
        JsonRpcRequest::new(id, METHOD_SIGN_TRANSACTIONS, params.to_value())
    }

    /// Turn a wallet response into signed transactions.
    pub fn accept_response(
        &self,
        response: JsonRpcResponse,
    ) -> Result<Vec<SignedTransaction>, RequesterError> {
        if let Some(error) = response.error {
            warn!(code = error.code, "wallet rejected signing request: {}", error.message);
            return Err(RequesterError::WalletRejected {
                code: error.code,
                message: error.message,
            });
        }

        let result = response
            .result
            .ok_or_else(|| RequesterError::MalformedResponse("missing result".to_string()))?;
        let wire: SignTransactionsResult = serde_json::from_value(result)
            .map_err(|e| RequesterError::MalformedResponse(e.to_string()))?;

        self.reconstructor.reconstruct_wire(&wire)
    }

    /// Reconstruct from an in-process result.
    pub fn accept_result(
        &self,
        result: &SigningResult,
    ) -> Result<Vec<SignedTransaction>, RequesterError> {
        self.reconstructor.reconstruct(result)
    }
}
