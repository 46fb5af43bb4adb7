//! Batch cut policy.
//!
//! A `BlockCutter` is owned by exactly one chain task, so implementations keep
//! plain mutable state and need no locking.

use crate::config::BatchSizeConfig;

use super::types::{Admitted, Batch};

/// Decides when accumulated envelopes form a deliverable batch.
pub trait BlockCutter: Send + Sync {
    /// Offer one admitted envelope.
    ///
    /// Returns the batches that are now complete, in write order, and whether
    /// the envelope was taken at all. `false` is a non-fatal drop.
    /// - size trigger: one batch, pending envelopes plus `msg`;
    /// - configuration transaction: the pending batch (possibly empty), then
    ///   a batch holding only `msg`;
    /// - otherwise: no batch, `msg` stays pending.
    fn ordered(&mut self, msg: Admitted) -> (Vec<Batch>, bool);

    /// Return and clear whatever is pending (possibly nothing).
    fn cut(&mut self) -> Batch;
}

/// Reference policy: cut on message count or accumulated bytes, refuse
/// envelopes above the absolute byte limit.
#[derive(Debug)]
pub struct SizeCutter {
    cfg: BatchSizeConfig,
    pending: Batch,
    pending_bytes: usize,
}

impl SizeCutter {
    pub fn new(cfg: BatchSizeConfig) -> Self {
        Self {
            cfg,
            pending: Vec::new(),
            pending_bytes: 0,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl BlockCutter for SizeCutter {
    fn ordered(&mut self, msg: Admitted) -> (Vec<Batch>, bool) {
        let size = msg.envelope.size();
        if size > self.cfg.absolute_max_bytes {
            tracing::warn!(
                size,
                limit = self.cfg.absolute_max_bytes,
                "envelope exceeds absolute_max_bytes; not ordering it"
            );
            return (Vec::new(), false);
        }

        if msg.is_config() {
            let prior = self.cut();
            return (vec![prior, vec![msg.envelope]], true);
        }

        self.pending_bytes += size;
        self.pending.push(msg.envelope);

        if self.pending.len() >= self.cfg.max_message_count
            || self.pending_bytes >= self.cfg.preferred_max_bytes
        {
            return (vec![self.cut()], true);
        }

        (Vec::new(), true)
    }

    fn cut(&mut self) -> Batch {
        self.pending_bytes = 0;
        std::mem::take(&mut self.pending)
    }
}
