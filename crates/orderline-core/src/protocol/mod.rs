//! Protocol modules (envelope + configuration transaction).
//!
//! - Envelope: opaque signed bytes as received from a client.
//! - Payload: the JSON document inside an envelope, with a header naming the
//!   target chain and the transaction type. `data` stays raw until needed.
//! - Configuration: the body of a configuration transaction.
//!
//! All decoders are panic-free: malformed input is reported as
//! `OrderlineError` instead of panicking.

pub mod config;
pub mod envelope;

pub use config::{ConfigItem, ConfigurationEnvelope};
pub use envelope::{Envelope, Header, HeaderType, Payload};
