//! Per-chain ordering: cut policy, batch timer and ledger handoff.

pub mod cutter;
pub mod solo;
pub mod types;

pub use cutter::{BlockCutter, SizeCutter};
pub use solo::{ChainHandle, OrderingChain};
pub use types::{Admitted, Batch, TxKind};
