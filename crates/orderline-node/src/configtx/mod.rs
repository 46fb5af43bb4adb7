//! Configuration transaction management.
//!
//! `ConfigManager` is the collaborator the config filter consults before a
//! configuration transaction is admitted, and that the chain calls once the
//! transaction has been written. `SequencedConfigManager` is the reference
//! implementation: it only checks addressing and sequencing and stores the
//! applied items verbatim.

use std::collections::BTreeMap;
use std::sync::RwLock;

use orderline_core::error::{OrderlineError, Result};
use orderline_core::protocol::ConfigurationEnvelope;

/// Validates and applies configuration transactions for one chain.
pub trait ConfigManager: Send + Sync {
    /// Check a proposed configuration without committing anything.
    /// Must be safe to call any number of times.
    fn validate(&self, config: &ConfigurationEnvelope) -> Result<()>;

    /// Commit a configuration that has been ordered.
    fn apply(&self, config: &ConfigurationEnvelope) -> Result<()>;

    /// Chain this manager is responsible for.
    fn chain_id(&self) -> &str;
}

#[derive(Debug, Default)]
struct ConfigState {
    sequence: u64,
    items: BTreeMap<String, serde_json::Value>,
}

/// Reference manager: accepts a configuration when it targets this chain,
/// carries the next sequence number and has unique, non-empty item keys.
#[derive(Debug)]
pub struct SequencedConfigManager {
    chain_id: String,
    state: RwLock<ConfigState>,
}

impl SequencedConfigManager {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            state: RwLock::new(ConfigState::default()),
        }
    }

    /// Sequence of the last applied configuration (0 before any).
    pub fn sequence(&self) -> u64 {
        self.state.read().map(|s| s.sequence).unwrap_or_default()
    }

    /// Current value of an applied item.
    pub fn item(&self, key: &str) -> Option<serde_json::Value> {
        self.state.read().ok()?.items.get(key).cloned()
    }

    fn check(&self, current: u64, config: &ConfigurationEnvelope) -> Result<()> {
        if config.chain_id != self.chain_id {
            return Err(OrderlineError::Rejected(format!(
                "config addressed to chain {} but manager owns {}",
                config.chain_id, self.chain_id
            )));
        }
        let expected = current + 1;
        if config.sequence != expected {
            return Err(OrderlineError::Rejected(format!(
                "config sequence {} does not follow current {current}",
                config.sequence
            )));
        }
        let mut keys = std::collections::HashSet::new();
        for item in &config.items {
            if item.key.is_empty() {
                return Err(OrderlineError::Rejected("config item with empty key".into()));
            }
            if !keys.insert(item.key.as_str()) {
                return Err(OrderlineError::Rejected(format!(
                    "duplicate config item key: {}",
                    item.key
                )));
            }
        }
        Ok(())
    }
}

impl ConfigManager for SequencedConfigManager {
    fn validate(&self, config: &ConfigurationEnvelope) -> Result<()> {
        // Poisoned lock means a logic bug elsewhere; reject instead of panic.
        let state = self
            .state
            .read()
            .map_err(|_| OrderlineError::Internal("config state poisoned".into()))?;
        self.check(state.sequence, config)
    }

    fn apply(&self, config: &ConfigurationEnvelope) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| OrderlineError::Internal("config state poisoned".into()))?;
        self.check(state.sequence, config)?;
        for item in &config.items {
            state.items.insert(item.key.clone(), item.value.clone());
        }
        state.sequence = config.sequence;
        tracing::info!(chain = %self.chain_id, sequence = config.sequence, "configuration applied");
        Ok(())
    }

    fn chain_id(&self) -> &str {
        &self.chain_id
    }
}
