//! Orderer config loader (strict parsing).

pub mod schema;

use std::fs;

use orderline_core::error::{OrderlineError, Result};

pub use schema::{
    BatchSizeConfig, ChainConfig, ChainPlan, GeneralSection, OrdererConfig, RamLedgerConfig,
};

pub fn load_from_file(path: &str) -> Result<OrdererConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| OrderlineError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<OrdererConfig> {
    let cfg: OrdererConfig = serde_yaml::from_str(s)
        .map_err(|e| OrderlineError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
