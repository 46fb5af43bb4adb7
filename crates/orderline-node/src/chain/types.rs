use orderline_core::protocol::{ConfigurationEnvelope, Envelope};

use crate::filter::AdmissionDecision;

/// Ordered group of envelopes destined for one ledger write.
pub type Batch = Vec<Envelope>;

/// How an admitted envelope must be treated by the cut policy.
#[derive(Debug, Clone, PartialEq)]
pub enum TxKind {
    Normal,
    /// Validated configuration transaction; always ordered in its own batch.
    Config(Box<ConfigurationEnvelope>),
}

/// Envelope that passed the filter, tagged with its admission class.
#[derive(Debug, Clone, PartialEq)]
pub struct Admitted {
    pub envelope: Envelope,
    pub kind: TxKind,
}

impl Admitted {
    pub fn normal(envelope: Envelope) -> Self {
        Self {
            envelope,
            kind: TxKind::Normal,
        }
    }

    pub fn config(envelope: Envelope, config: ConfigurationEnvelope) -> Self {
        Self {
            envelope,
            kind: TxKind::Config(Box::new(config)),
        }
    }

    /// Map a filter decision onto an admission. `None` for forward/reject.
    pub fn from_decision(envelope: Envelope, decision: AdmissionDecision) -> Option<Self> {
        match decision {
            AdmissionDecision::Accept => Some(Self::normal(envelope)),
            AdmissionDecision::Reconfigure(config) => Some(Self {
                envelope,
                kind: TxKind::Config(config),
            }),
            AdmissionDecision::Forward | AdmissionDecision::Reject { .. } => None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self.kind, TxKind::Config(_))
    }

    pub fn config_envelope(&self) -> Option<&ConfigurationEnvelope> {
        match &self.kind {
            TxKind::Config(c) => Some(c),
            TxKind::Normal => None,
        }
    }
}
