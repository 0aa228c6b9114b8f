// Copyright (c) 2024 Botho Foundation

//! Signing configuration.
//!
//! Optional request fields default here rather than at each call site.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::{account::NodeId, roster::NodeRoster, transaction::DEFAULT_MAX_BODY_SIZE};

/// Node count used when a request does not specify one.
pub const DEFAULT_NODE_COUNT: usize = 5;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Nodes to sign for when the request omits `nodeCount`.
    #[serde(default = "default_node_count")]
    pub default_node_count: usize,

    /// Largest transaction body the wallet will decode, in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_transaction_body_size: u64,

    /// Verify returned signature maps against the signer's key when the
    /// requester knows it.
    #[serde(default = "default_verify_signatures")]
    pub verify_signatures: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            default_node_count: default_node_count(),
            max_transaction_body_size: default_max_body_size(),
            verify_signatures: default_verify_signatures(),
        }
    }
}

fn default_node_count() -> usize {
    DEFAULT_NODE_COUNT
}

fn default_max_body_size() -> u64 {
    DEFAULT_MAX_BODY_SIZE
}

fn default_verify_signatures() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name, e.g. `testnet`.
    #[serde(default = "default_network_name")]
    pub name: String,

    /// Roster entries: display key (usually `host:port`) to node account id.
    #[serde(default)]
    pub nodes: BTreeMap<String, String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network_name(),
            nodes: BTreeMap::new(),
        }
    }
}

fn default_network_name() -> String {
    "testnet".to_string()
}

impl NetworkConfig {
    /// Parse the configured entries into a roster snapshot.
    pub fn roster(&self) -> Result<NodeRoster> {
        self.nodes
            .iter()
            .map(|(key, id)| {
                let node: NodeId = id
                    .parse()
                    .with_context(|| format!("Invalid node account id for {}", key))?;
                Ok::<_, anyhow::Error>((key.clone(), node))
            })
            .collect()
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Reject values no request could be served with.
    pub fn validate(&self) -> Result<()> {
        if self.signing.default_node_count == 0 {
            return Err(anyhow!("signing.default_node_count must be positive"));
        }
        if self.signing.max_transaction_body_size == 0 {
            return Err(anyhow!("signing.max_transaction_body_size must be positive"));
        }
        self.network.roster()?;
        Ok(())
    }
}
