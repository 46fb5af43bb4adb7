//! Top-level facade crate for Orderline.
//!
//! Re-exports core types and the ordering node library so users can depend on a single crate.

pub mod core {
    pub use orderline_core::*;
}

pub mod node {
    pub use orderline_node::*;
}
