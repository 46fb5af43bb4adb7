//! Ledger writer seam.
//!
//! The durable ledger is an external collaborator. The chain only needs an
//! append entry point; `RamLedger` is the in-memory reference implementation.

mod ram;

use std::sync::Arc;

use async_trait::async_trait;

use orderline_core::error::Result;
use orderline_core::protocol::Envelope;

use crate::chain::Batch;

pub use ram::RamLedger;

/// A written batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub data: Vec<Envelope>,
    pub metadata: Vec<Vec<u8>>,
}

/// Durable append of ordered batches. Called from a single chain task.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    async fn append(&self, batch: Batch, metadata: Vec<Vec<u8>>) -> Result<Arc<Block>>;
}
