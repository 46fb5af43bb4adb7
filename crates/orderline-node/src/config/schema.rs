use std::collections::HashSet;
use std::time::Duration;

use orderline_core::error::{OrderlineError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrdererConfig {
    pub version: u32,

    #[serde(default)]
    pub general: GeneralSection,

    #[serde(default = "default_system_chain")]
    pub system_chain: String,

    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

impl OrdererConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(OrderlineError::InvalidConfig(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        if self.system_chain.is_empty() {
            return Err(OrderlineError::InvalidConfig("system_chain must not be empty".into()));
        }

        self.general.validate()?;

        let mut seen = HashSet::new();
        for c in &self.chains {
            if c.id.is_empty() {
                return Err(OrderlineError::InvalidConfig("chain id must not be empty".into()));
            }
            if !seen.insert(c.id.as_str()) {
                return Err(OrderlineError::InvalidConfig(format!("duplicate chain id: {}", c.id)));
            }
            if let Some(ms) = c.batch_timeout_ms {
                validate_batch_timeout(ms, &format!("chains[{}].batch_timeout_ms", c.id))?;
            }
            if let Some(bs) = &c.batch_size {
                bs.validate(&format!("chains[{}].batch_size", c.id))?;
            }
        }
        Ok(())
    }

    /// Every chain to create at startup. The system chain comes first and is
    /// included even when it is not listed under `chains`.
    pub fn chain_plans(&self) -> Vec<ChainPlan> {
        let mut plans = Vec::with_capacity(self.chains.len() + 1);
        let listed_system = self.chains.iter().find(|c| c.id == self.system_chain);
        plans.push(self.plan_for(&self.system_chain, listed_system));
        for c in self.chains.iter().filter(|c| c.id != self.system_chain) {
            plans.push(self.plan_for(&c.id, Some(c)));
        }
        plans
    }

    fn plan_for(&self, id: &str, chain: Option<&ChainConfig>) -> ChainPlan {
        let g = &self.general;
        ChainPlan {
            id: id.to_string(),
            queue_size: g.chain_queue_size,
            batch_timeout: Duration::from_millis(
                chain.and_then(|c| c.batch_timeout_ms).unwrap_or(g.batch_timeout_ms),
            ),
            batch_size: chain
                .and_then(|c| c.batch_size.clone())
                .unwrap_or_else(|| g.batch_size.clone()),
            history_size: g.ram_ledger.history_size,
        }
    }
}

/// Resolved per-chain settings (general defaults + per-chain overrides).
#[derive(Debug, Clone)]
pub struct ChainPlan {
    pub id: String,
    pub queue_size: usize,
    pub batch_timeout: Duration,
    pub batch_size: BatchSizeConfig,
    pub history_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralSection {
    /// Per-connection mailbox capacity.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Per-chain admission queue capacity.
    #[serde(default = "default_queue_size")]
    pub chain_queue_size: usize,

    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    #[serde(default)]
    pub batch_size: BatchSizeConfig,

    #[serde(default)]
    pub ram_ledger: RamLedgerConfig,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            chain_queue_size: default_queue_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
            batch_size: BatchSizeConfig::default(),
            ram_ledger: RamLedgerConfig::default(),
        }
    }
}

impl GeneralSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100_000).contains(&self.queue_size) {
            return Err(OrderlineError::InvalidConfig(
                "general.queue_size must be between 1 and 100000".into(),
            ));
        }
        if !(1..=100_000).contains(&self.chain_queue_size) {
            return Err(OrderlineError::InvalidConfig(
                "general.chain_queue_size must be between 1 and 100000".into(),
            ));
        }
        validate_batch_timeout(self.batch_timeout_ms, "general.batch_timeout_ms")?;
        self.batch_size.validate("general.batch_size")?;
        if self.ram_ledger.history_size == 0 {
            return Err(OrderlineError::InvalidConfig(
                "general.ram_ledger.history_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

fn validate_batch_timeout(ms: u64, field: &str) -> Result<()> {
    if !(1..=3_600_000).contains(&ms) {
        return Err(OrderlineError::InvalidConfig(format!(
            "{field} must be between 1 and 3600000"
        )));
    }
    Ok(())
}

/// Cut-policy parameters for the reference block cutter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchSizeConfig {
    #[serde(default = "default_max_message_count")]
    pub max_message_count: usize,
    #[serde(default = "default_preferred_max_bytes")]
    pub preferred_max_bytes: usize,
    #[serde(default = "default_absolute_max_bytes")]
    pub absolute_max_bytes: usize,
}

impl Default for BatchSizeConfig {
    fn default() -> Self {
        Self {
            max_message_count: default_max_message_count(),
            preferred_max_bytes: default_preferred_max_bytes(),
            absolute_max_bytes: default_absolute_max_bytes(),
        }
    }
}

impl BatchSizeConfig {
    pub fn validate(&self, field: &str) -> Result<()> {
        if self.max_message_count == 0 {
            return Err(OrderlineError::InvalidConfig(format!(
                "{field}.max_message_count must be at least 1"
            )));
        }
        if self.preferred_max_bytes == 0 {
            return Err(OrderlineError::InvalidConfig(format!(
                "{field}.preferred_max_bytes must be at least 1"
            )));
        }
        if self.absolute_max_bytes < self.preferred_max_bytes {
            return Err(OrderlineError::InvalidConfig(format!(
                "{field}.absolute_max_bytes must not be smaller than preferred_max_bytes"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RamLedgerConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for RamLedgerConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub id: String,
    #[serde(default)]
    pub batch_timeout_ms: Option<u64>,
    #[serde(default)]
    pub batch_size: Option<BatchSizeConfig>,
}

fn default_system_chain() -> String {
    "system".into()
}
fn default_queue_size() -> usize {
    10
}
fn default_batch_timeout_ms() -> u64 {
    2000
}
fn default_max_message_count() -> usize {
    10
}
fn default_preferred_max_bytes() -> usize {
    512 * 1024
}
fn default_absolute_max_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_history_size() -> usize {
    1000
}
