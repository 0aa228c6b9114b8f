// Copyright (c) 2024 Botho Foundation

//! Canonical transaction bodies and their byte codec.
//!
//! A [`TransactionBody`] describes what a transaction does. The canonical form
//! exchanged between requester and wallet carries no node account id; a
//! node-scoped copy is made by injecting one, and the signature always covers
//! the node-scoped bytes.

use bincode::Options;
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

use crate::{
    account::{AccountId, NodeId},
    signer::{SignatureMap, MAX_SIG_MAP_SIZE},
};

/// Default upper bound on an encoded transaction body, in bytes.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 6 * 1024;

/// Length prefixes of the signed envelope's two fields.
const ENVELOPE_FRAMING: u64 = 16;

/// Errors from the transaction codec.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum CodecError {
    /// Failed to encode: {0}
    Encode(String),

    /// Failed to decode: {0}
    Decode(String),
}

/// Canonical bincode options: fixed-width integers, size limit, and no
/// trailing bytes, so one body has exactly one encoding.
pub(crate) fn canonical_options(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .with_limit(limit)
}

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

/// Transaction identity: the paying account and the start of the validity
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Timestamp,
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.account_id, self.valid_start.seconds, self.valid_start.nanos
        )
    }
}

/// A balance change for one account, in the ledger's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub account_id: AccountId,
    pub amount: i64,
}

/// Structural description of a transaction's effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    /// Node the transaction is addressed to. Absent in the canonical form.
    pub node_account_id: Option<NodeId>,
    pub transaction_fee: u64,
    /// Validity window length in seconds.
    pub valid_duration: u64,
    pub memo: String,
    pub transfers: Vec<Transfer>,
}

impl TransactionBody {
    /// Node the body is scoped to, if any.
    pub fn node_account_id(&self) -> Option<NodeId> {
        self.node_account_id
    }

    /// True if no node has been injected.
    pub fn is_canonical(&self) -> bool {
        self.node_account_id.is_none()
    }

    /// Copy of this body scoped to `node`. `self` is left untouched.
    pub fn with_node_account_id(&self, node: NodeId) -> Self {
        Self {
            node_account_id: Some(node),
            ..self.clone()
        }
    }

    /// Copy of this body with any node id removed.
    pub fn without_node_account_id(&self) -> Self {
        Self {
            node_account_id: None,
            ..self.clone()
        }
    }

}

/// Encodes and decodes transaction bodies.
///
/// The ledger's native format is opaque to the signing protocol; it only
/// needs a deterministic round-trip.
pub trait TransactionBodyCodec: Send + Sync {
    fn encode(&self, body: &TransactionBody) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<TransactionBody, CodecError>;
}

/// Canonical bincode codec.
#[derive(Debug, Clone, Copy)]
pub struct BincodeBodyCodec {
    max_body_size: u64,
}

impl Default for BincodeBodyCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

impl BincodeBodyCodec {
    pub fn new(max_body_size: u64) -> Self {
        Self { max_body_size }
    }

    pub fn max_body_size(&self) -> u64 {
        self.max_body_size
    }
}

impl TransactionBodyCodec for BincodeBodyCodec {
    fn encode(&self, body: &TransactionBody) -> Result<Vec<u8>, CodecError> {
        canonical_options(self.max_body_size)
            .serialize(body)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<TransactionBody, CodecError> {
        if bytes.len() as u64 > self.max_body_size {
            return Err(CodecError::Decode(format!(
                "body is {} bytes, limit is {}",
                bytes.len(),
                self.max_body_size
            )));
        }
        canonical_options(self.max_body_size)
            .deserialize(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[derive(Serialize, Deserialize)]
struct SignedTransactionWire {
    body_bytes: Vec<u8>,
    sig_map: SignatureMap,
}

/// A node-scoped body together with its authorization, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    node_account_id: NodeId,
    transaction_id: TransactionId,
    body_bytes: Vec<u8>,
    sig_map: SignatureMap,
}

impl SignedTransaction {
    /// Assemble a signed transaction from a node-scoped body.
    ///
    /// Fails if `body` has no node account id.
    pub fn new(
        body: &TransactionBody,
        codec: &dyn TransactionBodyCodec,
        sig_map: SignatureMap,
    ) -> Result<Self, CodecError> {
        let node_account_id = body
            .node_account_id()
            .ok_or_else(|| CodecError::Encode("body is not scoped to a node".to_string()))?;

        Ok(Self {
            node_account_id,
            transaction_id: body.transaction_id,
            body_bytes: codec.encode(body)?,
            sig_map,
        })
    }

    /// Parse complete submittable bytes back into a signed transaction.
    ///
    /// The envelope is bounded by the input itself; the body is bounded by
    /// `codec`.
    pub fn from_bytes(bytes: &[u8], codec: &dyn TransactionBodyCodec) -> Result<Self, CodecError> {
        let wire: SignedTransactionWire = canonical_options(bytes.len() as u64)
            .deserialize(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let body = codec.decode(&wire.body_bytes)?;
        Self::new(&body, codec, wire.sig_map)
    }

    pub fn node_account_id(&self) -> NodeId {
        self.node_account_id
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// The exact bytes the signatures cover.
    pub fn body_bytes(&self) -> &[u8] {
        &self.body_bytes
    }

    pub fn sig_map(&self) -> &SignatureMap {
        &self.sig_map
    }

    /// Decode the node-scoped body.
    pub fn body(&self, codec: &dyn TransactionBodyCodec) -> Result<TransactionBody, CodecError> {
        codec.decode(&self.body_bytes)
    }

    /// Complete submittable bytes: body plus signature map.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let wire = SignedTransactionWire {
            body_bytes: self.body_bytes.clone(),
            sig_map: self.sig_map.clone(),
        };
        canonical_options(self.envelope_limit())
            .serialize(&wire)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Largest envelope this body can produce with a well-formed signature map.
    fn envelope_limit(&self) -> u64 {
        self.body_bytes.len() as u64 + MAX_SIG_MAP_SIZE + ENVELOPE_FRAMING
    }

    /// SHA-256 over the complete submittable bytes.
    pub fn hash(&self) -> Result<[u8; 32], CodecError> {
        let bytes = self.to_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }
}
