// Copyright (c) 2024 Botho Foundation

//! Signature maps and the signing capability.
//!
//! Key custody lives outside this crate. The wallet only needs something that
//! turns bytes into a [`SignatureMap`]; [`Ed25519Signer`] is the in-process
//! implementation backed by a local key.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bincode::Options;
use displaydoc::Display;
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{account::AccountId, transaction::canonical_options};

/// Upper bound on an encoded signature map.
pub(crate) const MAX_SIG_MAP_SIZE: u64 = 16 * 1024;

/// Errors from the signing capability.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SignerError {
    /// Signing key unavailable: {0}
    KeyUnavailable(String),

    /// Signer rejected the request: {0}
    Rejected(String),
}

/// Why a signature map failed to decode or validate.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SignatureMapError {
    /// invalid base64: {0}
    Base64(String),

    /// undecodable signature map: {0}
    Decode(String),

    /// failed to encode signature map: {0}
    Encode(String),

    /// signature map has no signatures
    Empty,

    /// signature pair {0} has an empty signature
    EmptySignature(usize),
}

/// One signer's signature together with a prefix of its public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub pub_key_prefix: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Ordered set of signatures authorizing one byte sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMap {
    pairs: Vec<SignaturePair>,
}

impl SignatureMap {
    pub fn new(pairs: Vec<SignaturePair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[SignaturePair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Check the map is non-empty and every signature has bytes.
    pub fn validate(&self) -> Result<(), SignatureMapError> {
        if self.pairs.is_empty() {
            return Err(SignatureMapError::Empty);
        }
        if let Some(i) = self.pairs.iter().position(|p| p.signature.is_empty()) {
            return Err(SignatureMapError::EmptySignature(i));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SignatureMapError> {
        canonical_options(MAX_SIG_MAP_SIZE)
            .serialize(self)
            .map_err(|e| SignatureMapError::Encode(e.to_string()))
    }

    /// Decode and validate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureMapError> {
        let map: Self = canonical_options(MAX_SIG_MAP_SIZE)
            .deserialize(bytes)
            .map_err(|e| SignatureMapError::Decode(e.to_string()))?;
        map.validate()?;
        Ok(map)
    }

    pub fn to_base64(&self) -> Result<String, SignatureMapError> {
        Ok(BASE64.encode(self.to_bytes()?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SignatureMapError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| SignatureMapError::Base64(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// True if some pair carries a valid Ed25519 signature by `key` over
    /// `message`.
    pub fn verify_ed25519(&self, key: &VerifyingKey, message: &[u8]) -> bool {
        let key_bytes = key.as_bytes();
        self.pairs
            .iter()
            .filter(|p| !p.pub_key_prefix.is_empty() && key_bytes.starts_with(&p.pub_key_prefix))
            .filter_map(|p| Signature::from_slice(&p.signature).ok())
            .any(|sig| key.verify_strict(message, &sig).is_ok())
    }
}

/// Capability to sign node-scoped transaction bytes on behalf of an account.
pub trait TransactionSigner: Send + Sync {
    /// Account whose key this signer holds.
    fn account_id(&self) -> AccountId;

    /// Raw public key bytes.
    fn public_key(&self) -> Vec<u8>;

    /// Sign one message.
    fn sign(&self, message: &[u8]) -> Result<SignatureMap, SignerError>;

    /// Sign a batch of messages.
    ///
    /// The i-th returned map authorizes the i-th message. An implementation
    /// may return fewer maps than messages (a prefix) when that is its
    /// coherent answer, but any error fails the whole batch.
    fn sign_all(&self, messages: &[Vec<u8>]) -> Result<Vec<SignatureMap>, SignerError> {
        messages.iter().map(|m| self.sign(m)).collect()
    }
}

/// Signer backed by a local Ed25519 key.
pub struct Ed25519Signer {
    account_id: AccountId,
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(account_id: AccountId, key: SigningKey) -> Self {
        Self { account_id, key }
    }

    /// Build from a 32-byte secret key.
    pub fn from_secret_bytes(account_id: AccountId, secret: &[u8; 32]) -> Self {
        Self::new(account_id, SigningKey::from_bytes(secret))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("account_id", &self.account_id)
            .field("public_key", &hex::encode(self.key.verifying_key().as_bytes()))
            .finish()
    }
}

impl TransactionSigner for Ed25519Signer {
    fn account_id(&self) -> AccountId {
        self.account_id
    }

    fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    fn sign(&self, message: &[u8]) -> Result<SignatureMap, SignerError> {
        let signature = self.key.sign(message);
        Ok(SignatureMap::new(vec![SignaturePair {
            pub_key_prefix: self.public_key(),
            signature: signature.to_bytes().to_vec(),
        }]))
    }
}
