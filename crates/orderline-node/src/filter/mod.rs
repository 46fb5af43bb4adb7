//! Broadcast filter layer (admission rules).
//!
//! An ordered rule set classifies every incoming envelope before it may be
//! queued for ordering. Rules are cheap and synchronous; the config filter is
//! the only stateful one and consults the chain's `ConfigManager`.

pub mod engine;
pub mod rules;

pub use engine::{AdmissionDecision, Rule, RuleSet};
pub use rules::{AcceptRule, ConfigFilter, EmptyRejectRule};
