//! Configuration transaction body.

use serde::{Deserialize, Serialize};

/// Proposed configuration for a chain. Carried in the `data` of a payload
/// whose header type is `configuration_transaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationEnvelope {
    /// Chain the configuration applies to.
    pub chain_id: String,
    /// Must be exactly one past the chain's current configuration sequence.
    pub sequence: u64,
    #[serde(default)]
    pub items: Vec<ConfigItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigItem {
    pub key: String,
    pub value: serde_json::Value,
}

impl ConfigurationEnvelope {
    pub fn new(chain_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            sequence,
            items: Vec::new(),
        }
    }

    /// Builder-style item insertion.
    pub fn with_item(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.items.push(ConfigItem {
            key: key.into(),
            value,
        });
        self
    }
}
