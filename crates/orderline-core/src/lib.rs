//! Orderline core: transport-agnostic envelope types, payload decoding and the
//! shared error surface.
//!
//! This crate defines the data contracts shared by the ordering node, its
//! collaborators and test tooling. It carries no runtime dependencies so the
//! same types can be used by clients that build envelopes.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed payloads
//! surface as `OrderlineError` so a hostile client cannot crash the node.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{OrderlineError, Result, Status};
