//! Client-facing admission: per-connection mailbox and broadcast handler.

pub mod handler;
pub mod mailbox;

pub use handler::{BroadcastHandler, BroadcastResponse};
pub use mailbox::{mailbox, Delivery, MailboxReceiver, MailboxSender, PostError};
