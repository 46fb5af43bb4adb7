use std::sync::Arc;

use orderline_core::protocol::{ConfigurationEnvelope, Envelope};

use crate::configtx::ConfigManager;

use super::rules::{AcceptRule, ConfigFilter, EmptyRejectRule};

/// Decision from rule evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    /// No opinion; defer to the next rule.
    Forward,
    /// Queue for ordering as a regular transaction.
    Accept,
    /// Refuse; the client receives a bad-request status.
    Reject { reason: String },
    /// Queue for ordering as a validated configuration transaction.
    Reconfigure(Box<ConfigurationEnvelope>),
}

impl AdmissionDecision {
    pub fn reject(reason: impl Into<String>) -> Self {
        AdmissionDecision::Reject {
            reason: reason.into(),
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionDecision::Forward => "forward",
            AdmissionDecision::Accept => "accept",
            AdmissionDecision::Reject { .. } => "reject",
            AdmissionDecision::Reconfigure(_) => "reconfigure",
        }
    }
}

/// One admission rule.
pub trait Rule: Send + Sync {
    fn apply(&self, env: &Envelope) -> AdmissionDecision;
}

/// Ordered, short-circuiting rule list.
/// Construct once per chain at startup, then share via Arc.
#[derive(Clone)]
pub struct RuleSet {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Arc<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Empty check, config validation, then accept everything else.
    pub fn standard(manager: Arc<dyn ConfigManager>) -> Self {
        Self::new(vec![
            Arc::new(EmptyRejectRule),
            Arc::new(ConfigFilter::new(manager)),
            Arc::new(AcceptRule),
        ])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First non-forward decision in rule order.
    pub fn apply(&self, env: &Envelope) -> AdmissionDecision {
        for rule in &self.rules {
            match rule.apply(env) {
                AdmissionDecision::Forward => continue,
                decided => return decided,
            }
        }
        // A set without a terminal rule fails closed.
        tracing::warn!(rules = self.rules.len(), "no rule decided; rejecting");
        AdmissionDecision::reject("no rule accepted the envelope")
    }
}
