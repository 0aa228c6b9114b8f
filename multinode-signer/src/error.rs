// Copyright (c) 2024 Botho Foundation

//! Error taxonomy shared by the wallet and requester sides.
//!
//! Every error names the stage that failed so a caller can tell "your
//! request was malformed" apart from "the wallet could not service it".

use std::fmt;
use thiserror::Error;

use crate::{
    account::{IdParseError, NodeId},
    selection::SelectionError,
    signer::{SignatureMapError, SignerError},
    transaction::CodecError,
};

/// JSON-RPC: method not found.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// JSON-RPC: invalid params.
pub const INVALID_PARAMS: i32 = -32602;

/// JSON-RPC: internal error.
pub const INTERNAL_ERROR: i32 = -32603;

/// Processing stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Decode,
    Validation,
    NodeSelection,
    Signing,
    Reconstruction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Decode => "decode",
            Stage::Validation => "validation",
            Stage::NodeSelection => "node-selection",
            Stage::Signing => "signing",
            Stage::Reconstruction => "reconstruction",
        })
    }
}

/// Broad class of a wallet error, mapped one-to-one onto JSON-RPC codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller error; never retried.
    InvalidParams,
    /// Wallet environment could not service the request.
    InternalError,
}

impl ErrorKind {
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::InvalidParams => INVALID_PARAMS,
            ErrorKind::InternalError => INTERNAL_ERROR,
        }
    }
}

/// Errors returned by the wallet signing service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Invalid signerAccountId: {0}")]
    InvalidSignerAccount(#[source] IdParseError),

    #[error("Signer account not available: {0}")]
    UnknownSigner(String),

    #[error("Failed to decode transaction body: invalid base64: {0}")]
    InvalidBodyEncoding(String),

    #[error("Failed to decode transaction body: {0}")]
    BodyDecode(#[source] CodecError),

    #[error("Transaction body must not have nodeAccountId set (found {0})")]
    NodeAccountIdPreset(NodeId),

    #[error("nodeCount must be a positive number")]
    InvalidNodeCount,

    #[error("Node selection failed: {0}")]
    NodeSelection(#[source] SelectionError),

    #[error("Signing failed: {0}")]
    BodyEncode(#[source] CodecError),

    #[error("Signing failed: {0}")]
    Signing(#[source] SignerError),

    #[error("Signing failed: signer returned {returned} signature maps for {requested} transactions")]
    SignerOverflow { requested: usize, returned: usize },

    #[error("Signing failed: signature map {index} is malformed: {source}")]
    SignerMalformed {
        index: usize,
        #[source]
        source: SignatureMapError,
    },
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidParams(_)
            | WalletError::InvalidSignerAccount(_)
            | WalletError::UnknownSigner(_)
            | WalletError::InvalidBodyEncoding(_)
            | WalletError::BodyDecode(_)
            | WalletError::NodeAccountIdPreset(_)
            | WalletError::InvalidNodeCount => ErrorKind::InvalidParams,
            WalletError::NodeSelection(_)
            | WalletError::BodyEncode(_)
            | WalletError::Signing(_)
            | WalletError::SignerOverflow { .. }
            | WalletError::SignerMalformed { .. } => ErrorKind::InternalError,
        }
    }

    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        self.kind().code()
    }

    pub fn stage(&self) -> Stage {
        match self {
            WalletError::InvalidBodyEncoding(_) | WalletError::BodyDecode(_) => Stage::Decode,
            WalletError::InvalidParams(_)
            | WalletError::InvalidSignerAccount(_)
            | WalletError::UnknownSigner(_)
            | WalletError::NodeAccountIdPreset(_)
            | WalletError::InvalidNodeCount => Stage::Validation,
            WalletError::NodeSelection(_) => Stage::NodeSelection,
            WalletError::BodyEncode(_)
            | WalletError::Signing(_)
            | WalletError::SignerOverflow { .. }
            | WalletError::SignerMalformed { .. } => Stage::Signing,
        }
    }
}

/// Errors raised on the requester side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequesterError {
    #[error("Transaction body must not have nodeAccountId set (found {0})")]
    NodeAccountIdPreset(NodeId),

    #[error("nodeCount must be a positive number")]
    InvalidNodeCount,

    #[error("Failed to encode transaction body: {0}")]
    Encode(#[source] CodecError),

    #[error("Wallet rejected request ({code}): {message}")]
    WalletRejected { code: i32, message: String },

    #[error("Failed to reconstruct signed transaction: malformed signature map at index {index}: {source}")]
    MalformedSignatureMap {
        index: usize,
        #[source]
        source: SignatureMapError,
    },

    #[error("Failed to reconstruct signed transaction: malformed response: {0}")]
    MalformedResponse(String),

    #[error("Failed to reconstruct signed transaction: body for node {node} differs from the original")]
    ContentMismatch { node: NodeId },

    #[error("Failed to reconstruct signed transaction: signature for node {node} does not verify")]
    InvalidSignature { node: NodeId },

    #[error("Failed to reconstruct signed transaction: {0}")]
    Codec(#[source] CodecError),
}

impl RequesterError {
    pub fn stage(&self) -> Stage {
        match self {
            RequesterError::NodeAccountIdPreset(_)
            | RequesterError::InvalidNodeCount
            | RequesterError::Encode(_) => Stage::Validation,
            RequesterError::WalletRejected { .. }
            | RequesterError::MalformedSignatureMap { .. }
            | RequesterError::MalformedResponse(_)
            | RequesterError::ContentMismatch { .. }
            | RequesterError::InvalidSignature { .. }
            | RequesterError::Codec(_) => Stage::Reconstruction,
        }
    }
}
