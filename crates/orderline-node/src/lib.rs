//! Orderline node library.
//!
//! Wires the admission path (broadcast handler, rule sets, config validation)
//! to the per-chain ordering loops and their ledgers. Transport and process
//! bootstrapping live outside this crate: callers hand `BroadcastHandler` an
//! inbound envelope stream and an outbound response sink per connection.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod broadcast;
pub mod chain;
pub mod config;
pub mod configtx;
pub mod filter;
pub mod ledger;
pub mod obs;
pub mod registry;

pub use broadcast::{BroadcastHandler, BroadcastResponse};
pub use chain::{Admitted, BlockCutter, ChainHandle, OrderingChain, SizeCutter};
pub use registry::{ChainRegistry, Support, SupportManager};
