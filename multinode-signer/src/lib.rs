// Copyright (c) 2024 Botho Foundation

//! Multi-node transaction signing
//!
//! A requester hands a wallet one canonical transaction body. The wallet
//! picks several distinct execution nodes at random, signs a node-scoped copy
//! of the body for each, and returns only the signatures and node ids. The
//! requester rebuilds the signed transactions from its own body, so it can
//! submit the same logical transaction to several nodes for redundancy.
//!
//! ## Security Model
//!
//! - Transaction content never crosses back from the wallet
//! - A body that already names a node is rejected on both sides
//! - Node choice is uniform and not caller-controlled
//! - Returned signatures can be verified before submission

pub mod account;
pub mod config;
pub mod error;
pub mod requester;
pub mod roster;
pub mod rpc;
pub mod selection;
pub mod signer;
pub mod transaction;
pub mod wallet;

pub use account::{AccountId, NodeId, SignerAccountId};
pub use config::Config;
pub use error::{RequesterError, Stage, WalletError};
pub use requester::{RequesterReconstructor, RequesterSession};
pub use roster::NodeRoster;
pub use rpc::WalletRpcHandler;
pub use selection::{select_nodes, SelectionError};
pub use signer::{Ed25519Signer, SignatureMap, TransactionSigner};
pub use transaction::{BincodeBodyCodec, SignedTransaction, TransactionBody, TransactionBodyCodec};
pub use wallet::{SigningRequest, SigningResult, WalletSigningService};
