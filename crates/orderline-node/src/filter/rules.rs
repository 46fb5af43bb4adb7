//! Standard admission rules.

use std::sync::Arc;

use orderline_core::protocol::Envelope;

use crate::configtx::ConfigManager;

use super::engine::{AdmissionDecision, Rule};

/// Rejects envelopes without a payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRejectRule;

impl Rule for EmptyRejectRule {
    fn apply(&self, env: &Envelope) -> AdmissionDecision {
        if env.is_empty() {
            return AdmissionDecision::reject("empty payload");
        }
        AdmissionDecision::Forward
    }
}

/// Terminal rule: accepts anything that reaches it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptRule;

impl Rule for AcceptRule {
    fn apply(&self, _env: &Envelope) -> AdmissionDecision {
        AdmissionDecision::Accept
    }
}

/// Recognizes configuration transactions and validates them against the
/// chain's config manager. Everything else is forwarded.
pub struct ConfigFilter {
    manager: Arc<dyn ConfigManager>,
}

impl ConfigFilter {
    pub fn new(manager: Arc<dyn ConfigManager>) -> Self {
        Self { manager }
    }
}

impl Rule for ConfigFilter {
    fn apply(&self, env: &Envelope) -> AdmissionDecision {
        let payload = match env.decode_payload() {
            Ok(p) => p,
            Err(e) => return AdmissionDecision::reject(e.to_string()),
        };
        if !payload.is_config() {
            return AdmissionDecision::Forward;
        }

        let config = match payload.decode_config() {
            Ok(c) => c,
            Err(e) => return AdmissionDecision::reject(e.to_string()),
        };

        match self.manager.validate(&config) {
            Ok(()) => AdmissionDecision::Reconfigure(Box::new(config)),
            Err(e) => {
                tracing::debug!(
                    chain = %self.manager.chain_id(),
                    error = %e,
                    "config transaction failed validation"
                );
                AdmissionDecision::reject(e.to_string())
            }
        }
    }
}
