// Copyright (c) 2024 Botho Foundation

//! JSON-RPC 2.0 boundary for the wallet.
//!
//! Exposes a single method, `ledger_signTransactions`:
//!
//! ```text
//! params: { signerAccountId, transactionBody (base64), nodeCount? }
//! result: { signatureMaps: [base64], nodeAccountIds: ["0.0.3", ...] }
//! ```
//!
//! Optional fields default here through [`SigningConfig`]; everything past
//! this module works with typed values.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::{
    account::{NodeId, SignerAccountId},
    config::SigningConfig,
    error::{RequesterError, WalletError, INTERNAL_ERROR, METHOD_NOT_FOUND},
    roster::NodeRoster,
    signer::{SignatureMap, TransactionSigner},
    transaction::{BincodeBodyCodec, TransactionBodyCodec},
    wallet::{SigningRequest, SigningResult, WalletSigningService},
};

/// Method name for multi-node signing.
pub const METHOD_SIGN_TRANSACTIONS: &str = "ledger_signTransactions";

/// JSON-RPC: parse error.
const PARSE_ERROR: i32 = -32700;

/// JSON-RPC: invalid request.
const INVALID_REQUEST: i32 = -32600;

/// JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: id.into(),
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Value,
}

/// JSON-RPC error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
            id,
        }
    }
}

/// Params of `ledger_signTransactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionsParams {
    pub signer_account_id: String,
    /// Base64 canonical body.
    pub transaction_body: String,
    /// Kept loose so negative, fractional and non-numeric values get the
    /// same error as zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<Value>,
}

impl SignTransactionsParams {
    /// Build params for a typed request.
    pub fn from_request(request: &SigningRequest) -> Self {
        Self {
            signer_account_id: request.signer_account_id.to_string(),
            transaction_body: BASE64.encode(&request.transaction_body),
            node_count: Some(Value::from(request.node_count as u64)),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut params = json!({
            "signerAccountId": self.signer_account_id,
            "transactionBody": self.transaction_body,
        });
        if let Some(count) = &self.node_count {
            params["nodeCount"] = count.clone();
        }
        params
    }

    /// Parse into a typed request, filling `nodeCount` from `config` when
    /// absent.
    pub fn into_request(self, config: &SigningConfig) -> Result<SigningRequest, WalletError> {
        let signer_account_id: SignerAccountId = self
            .signer_account_id
            .parse()
            .map_err(WalletError::InvalidSignerAccount)?;

        let transaction_body = BASE64
            .decode(self.transaction_body.as_bytes())
            .map_err(|e| WalletError::InvalidBodyEncoding(e.to_string()))?;

        let node_count = match self.node_count {
            None | Some(Value::Null) => config.default_node_count,
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or(WalletError::InvalidNodeCount)?,
        };

        Ok(SigningRequest {
            signer_account_id,
            transaction_body,
            node_count,
        })
    }
}

/// Result of `ledger_signTransactions` in wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionsResult {
    pub signature_maps: Vec<String>,
    pub node_account_ids: Vec<String>,
}

impl SignTransactionsResult {
    pub fn from_result(result: &SigningResult) -> Result<Self, WalletError> {
        let signature_maps = result
            .signature_maps
            .iter()
            .enumerate()
            .map(|(index, map)| {
                map.to_base64()
                    .map_err(|source| WalletError::SignerMalformed { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            signature_maps,
            node_account_ids: result
                .node_account_ids
                .iter()
                .map(|n| n.to_string())
                .collect(),
        })
    }

    /// Decode wire strings. Array lengths are carried through unchanged;
    /// shape checks belong to reconstruction.
    pub fn decode(&self) -> Result<SigningResult, RequesterError> {
        let node_account_ids = self
            .node_account_ids
            .iter()
            .map(|s| {
                s.parse::<NodeId>().map_err(|e| {
                    RequesterError::MalformedResponse(format!("invalid node account id: {}", e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let signature_maps = self
            .signature_maps
            .iter()
            .enumerate()
            .map(|(index, s)| {
                SignatureMap::from_base64(s)
                    .map_err(|source| RequesterError::MalformedSignatureMap { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SigningResult {
            signature_maps,
            node_account_ids,
        })
    }
}

/// Routes JSON-RPC requests to the signing service.
#[derive(Debug)]
pub struct WalletRpcHandler<C = BincodeBodyCodec> {
    service: WalletSigningService<C>,
    config: SigningConfig,
}

impl WalletRpcHandler<BincodeBodyCodec> {
    /// Handler with the body size limit taken from `config`.
    pub fn from_config(config: &SigningConfig) -> Self {
        Self::new(
            WalletSigningService::new(BincodeBodyCodec::new(config.max_transaction_body_size)),
            config.clone(),
        )
    }
}

impl<C: TransactionBodyCodec> WalletRpcHandler<C> {
    pub fn new(service: WalletSigningService<C>, config: SigningConfig) -> Self {
        Self { service, config }
    }

    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.service.add_signer(signer);
        self
    }

    pub fn service(&self) -> &WalletSigningService<C> {
        &self.service
    }

    /// Handle one decoded request against a roster snapshot.
    pub fn handle(&self, request: &JsonRpcRequest, roster: &NodeRoster) -> JsonRpcResponse {
        let id = request.id.clone();
        debug!("RPC request: method={}", request.method);

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid JSON-RPC version");
        }

        match request.method.as_str() {
            METHOD_SIGN_TRANSACTIONS => self.handle_sign_transactions(id, &request.params, roster),
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        }
    }

    /// Handle a raw JSON request body, returning the serialized response.
    pub fn handle_json(&self, body: &str, roster: &NodeRoster) -> String {
        let response = match serde_json::from_str::<JsonRpcRequest>(body) {
            Ok(request) => self.handle(&request, roster),
            Err(e) => {
                JsonRpcResponse::error(Value::Null, PARSE_ERROR, &format!("Parse error: {}", e))
            }
        };

        serde_json::to_string(&response).unwrap_or_else(|_| {
            format!(
                r#"{{"jsonrpc":"2.0","error":{{"code":{},"message":"Internal error"}},"id":null}}"#,
                INTERNAL_ERROR
            )
        })
    }

    /// Typed entry point for `ledger_signTransactions`.
    pub fn sign_transactions(
        &self,
        params: &Value,
        roster: &NodeRoster,
    ) -> Result<SignTransactionsResult, WalletError> {
        let params: SignTransactionsParams = serde_json::from_value(params.clone())
            .map_err(|e| WalletError::InvalidParams(e.to_string()))?;
        let request = params.into_request(&self.config)?;
        let result = self.service.handle(&request, roster)?;
        SignTransactionsResult::from_result(&result)
    }

    fn handle_sign_transactions(
        &self,
        id: Value,
        params: &Value,
        roster: &NodeRoster,
    ) -> JsonRpcResponse {
        match self.sign_transactions(params, roster) {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, &e.to_string()),
            },
            Err(e) => JsonRpcResponse::error(id, e.code(), &e.to_string()),
        }
    }
}
