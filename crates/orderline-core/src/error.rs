//! Shared error type across Orderline crates.

use thiserror::Error;

/// Client-facing response status (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Envelope accepted for ordering. Does not mean it has been written.
    Success,
    /// Malformed, empty, unknown-chain or filter-rejected envelope.
    BadRequest,
    /// Mailbox full. Transient; the client may resubmit.
    ServiceUnavailable,
    /// Internal server error.
    Internal,
}

impl Status {
    /// String representation used in responses, logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::BadRequest => "BAD_REQUEST",
            Status::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Status::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, OrderlineError>;

/// Unified error type used by core and node.
#[derive(Debug, Error)]
pub enum OrderlineError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unknown chain: {0}")]
    UnknownChain(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("chain halted: {0}")]
    ChainHalted(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("ledger: {0}")]
    Ledger(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl OrderlineError {
    /// Map internal error to a stable client-facing status.
    ///
    /// `ChainHalted` maps to `Internal`: it terminates the connection instead
    /// of answering a single envelope, so it never shares a status with a
    /// policy rejection.
    pub fn status(&self) -> Status {
        match self {
            OrderlineError::BadRequest(_)
            | OrderlineError::UnknownChain(_)
            | OrderlineError::Rejected(_)
            | OrderlineError::InvalidConfig(_) => Status::BadRequest,
            OrderlineError::ServiceUnavailable => Status::ServiceUnavailable,
            OrderlineError::ChainHalted(_)
            | OrderlineError::Ledger(_)
            | OrderlineError::Internal(_) => Status::Internal,
        }
    }
}
