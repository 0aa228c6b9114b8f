// Copyright (c) 2024 Botho Foundation

//! Ledger entity identifiers.
//!
//! Accounts and execution nodes are both addressed by a `shard.realm.num`
//! triple. A node is identified by the account that receives its fees, so
//! [`NodeId`] is an alias of [`AccountId`].

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Errors from parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    /// Expected exactly three dot-separated components.
    #[error("expected <shard>.<realm>.<num>, got {0:?}")]
    BadShape(String),

    /// A component is not an unsigned integer.
    #[error("invalid component {component:?} in {input:?}")]
    BadComponent { input: String, component: String },

    /// Signer account is missing its network prefix.
    #[error("expected <network>:<shard>.<realm>.<num>, got {0:?}")]
    MissingNetwork(String),
}

/// A `shard.realm.num` entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

/// Identifier of an execution node.
pub type NodeId = AccountId;

impl AccountId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(IdParseError::BadShape(s.to_string()));
        }

        let parse = |component: &str| {
            component
                .parse::<u64>()
                .map_err(|_| IdParseError::BadComponent {
                    input: s.to_string(),
                    component: component.to_string(),
                })
        };

        Ok(Self {
            shard: parse(parts[0])?,
            realm: parse(parts[1])?,
            num: parse(parts[2])?,
        })
    }
}

/// Signer account as addressed over the wallet transport:
/// `<network>:<shard>.<realm>.<num>`.
///
/// The network part may contain colons itself (`hedera:testnet`), so the
/// account is always taken from after the last one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignerAccountId {
    pub network: String,
    pub account: AccountId,
}

impl SignerAccountId {
    pub fn new(network: impl Into<String>, account: AccountId) -> Self {
        Self {
            network: network.into(),
            account,
        }
    }
}

impl fmt::Display for SignerAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.account)
    }
}

impl FromStr for SignerAccountId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (network, account) = s
            .rsplit_once(':')
            .filter(|(network, _)| !network.is_empty())
            .ok_or_else(|| IdParseError::MissingNetwork(s.to_string()))?;

        Ok(Self {
            network: network.to_string(),
            account: account.parse()?,
        })
    }
}
