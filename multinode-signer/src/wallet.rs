// Copyright (c) 2024 Botho Foundation

//! Wallet-side multi-node signing.
//!
//! Turns one canonical transaction body into node-scoped copies for a random
//! set of nodes, signs each copy, and returns only the signatures and the
//! node ids they belong to. The caller keeps its own body; nothing the wallet
//! returns can change what the transaction does.
//!
//! ## Request lifecycle
//!
//! ```text
//! Received -> Validated -> NodesSelected -> PerNodeSigned -> Responded
//!     \___________\______________\_______________\________-> Failed(stage)
//! ```
//!
//! No state survives between requests. The roster is a snapshot passed in by
//! the caller, and the decoded body is cloned for every node.

use rand::Rng;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    account::{AccountId, NodeId, SignerAccountId},
    error::{Stage, WalletError},
    roster::NodeRoster,
    selection::select_nodes_with_rng,
    signer::{SignatureMap, TransactionSigner},
    transaction::{BincodeBodyCodec, CodecError, TransactionBody, TransactionBodyCodec},
};

/// A request to sign one body for several nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub signer_account_id: SignerAccountId,
    /// Encoded canonical body; must not carry a node account id.
    pub transaction_body: Vec<u8>,
    pub node_count: usize,
}

/// Signatures for node-scoped copies of one body.
///
/// `signature_maps[i]` authorizes the body scoped to `node_account_ids[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningResult {
    pub signature_maps: Vec<SignatureMap>,
    pub node_account_ids: Vec<NodeId>,
}

impl SigningResult {
    pub fn len(&self) -> usize {
        self.node_account_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_account_ids.is_empty()
    }

    /// Iterate `(node, signature map)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &SignatureMap)> {
        self.node_account_ids.iter().zip(&self.signature_maps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Received,
    Validated,
    NodesSelected,
    PerNodeSigned,
    Responded,
    Failed(Stage),
}

/// Per-request state tracker; only used for tracing.
struct RequestTrace {
    signer: String,
    state: RequestState,
}

impl RequestTrace {
    fn new(signer: &SignerAccountId) -> Self {
        let trace = Self {
            signer: signer.to_string(),
            state: RequestState::Received,
        };
        debug!(signer = %trace.signer, state = ?trace.state, "signing request received");
        trace
    }

    fn advance(&mut self, next: RequestState) {
        debug!(signer = %self.signer, from = ?self.state, to = ?next, "signing request transition");
        self.state = next;
    }
}

/// Signs canonical transaction bodies for multiple nodes.
pub struct WalletSigningService<C = BincodeBodyCodec> {
    signers: HashMap<AccountId, Arc<dyn TransactionSigner>>,
    codec: C,
}

impl Default for WalletSigningService<BincodeBodyCodec> {
    fn default() -> Self {
        Self::new(BincodeBodyCodec::default())
    }
}

impl<C> fmt::Debug for WalletSigningService<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut accounts: Vec<_> = self.signers.keys().map(|a| a.to_string()).collect();
        accounts.sort();
        f.debug_struct("WalletSigningService")
            .field("accounts", &accounts)
            .finish()
    }
}

impl<C: TransactionBodyCodec> WalletSigningService<C> {
    /// Create a service with no signers.
    pub fn new(codec: C) -> Self {
        Self {
            signers: HashMap::new(),
            codec,
        }
    }

    /// Register a signer for its account, replacing any existing one.
    pub fn add_signer(&mut self, signer: Arc<dyn TransactionSigner>) {
        self.signers.insert(signer.account_id(), signer);
    }

    /// Builder-style [`Self::add_signer`].
    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.add_signer(signer);
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Handle a request using the thread-local RNG for node selection.
    pub fn handle(
        &self,
        request: &SigningRequest,
        roster: &NodeRoster,
    ) -> Result<SigningResult, WalletError> {
        self.handle_with_rng(request, roster, &mut rand::thread_rng())
    }

    /// Handle a request, drawing nodes with `rng`.
    pub fn handle_with_rng<R: Rng + ?Sized>(
        &self,
        request: &SigningRequest,
        roster: &NodeRoster,
        rng: &mut R,
    ) -> Result<SigningResult, WalletError> {
        let mut trace = RequestTrace::new(&request.signer_account_id);

        match self.process(request, roster, rng, &mut trace) {
            Ok(result) => {
                trace.advance(RequestState::Responded);
                info!(
                    signer = %request.signer_account_id,
                    requested = request.node_count,
                    signed = result.len(),
                    "signed transaction for {} nodes",
                    result.len()
                );
                Ok(result)
            }
            Err(e) => {
                trace.advance(RequestState::Failed(e.stage()));
                warn!(
                    signer = %request.signer_account_id,
                    stage = %e.stage(),
                    code = e.code(),
                    "signing request failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    fn process<R: Rng + ?Sized>(
        &self,
        request: &SigningRequest,
        roster: &NodeRoster,
        rng: &mut R,
        trace: &mut RequestTrace,
    ) -> Result<SigningResult, WalletError> {
        let body = self
            .codec
            .decode(&request.transaction_body)
            .map_err(WalletError::BodyDecode)?;

        // A preset node would let the caller pin selection and defeat the
        // redundancy of the broadcast.
        if let Some(node) = body.node_account_id() {
            return Err(WalletError::NodeAccountIdPreset(node));
        }

        // Node ids encode at a fixed width, so any id gives the scoped size.
        self.codec
            .encode(&body.with_node_account_id(NodeId::new(0, 0, 0)))
            .map_err(|e| {
                WalletError::BodyDecode(CodecError::Decode(format!(
                    "no room to scope body to a node: {}",
                    e
                )))
            })?;

        if request.node_count == 0 {
            return Err(WalletError::InvalidNodeCount);
        }

        let signer = self
            .signers
            .get(&request.signer_account_id.account)
            .ok_or_else(|| WalletError::UnknownSigner(request.signer_account_id.to_string()))?;
        trace.advance(RequestState::Validated);

        let nodes = select_nodes_with_rng(roster, request.node_count, rng)
            .map_err(WalletError::NodeSelection)?;
        trace.advance(RequestState::NodesSelected);
        debug!(
            transaction_id = %body.transaction_id,
            nodes = ?nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
            "selected nodes"
        );

        let messages = self.node_scoped_bytes(&body, &nodes)?;
        let signature_maps = signer.sign_all(&messages).map_err(WalletError::Signing)?;

        if signature_maps.len() > nodes.len() {
            return Err(WalletError::SignerOverflow {
                requested: nodes.len(),
                returned: signature_maps.len(),
            });
        }
        for (index, map) in signature_maps.iter().enumerate() {
            map.validate()
                .map_err(|source| WalletError::SignerMalformed { index, source })?;
        }

        // The signer may coherently sign a prefix; keep the association.
        let mut node_account_ids = nodes;
        node_account_ids.truncate(signature_maps.len());
        trace.advance(RequestState::PerNodeSigned);

        Ok(SigningResult {
            signature_maps,
            node_account_ids,
        })
    }

    /// Encode one node-scoped copy of `body` per node, in order.
    fn node_scoped_bytes(
        &self,
        body: &TransactionBody,
        nodes: &[NodeId],
    ) -> Result<Vec<Vec<u8>>, WalletError> {
        nodes
            .iter()
            .map(|node| {
                self.codec
                    .encode(&body.with_node_account_id(*node))
                    .map_err(WalletError::BodyEncode)
            })
            .collect()
    }
}
