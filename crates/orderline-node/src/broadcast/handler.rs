//! Broadcast front door (one call to `handle` per client connection).
//!
//! Responsibilities:
//! - Decode the payload header and resolve the target chain
//! - Run the chain's rule set
//! - Post admitted envelopes to the connection mailbox without waiting
//! - Reply to every envelope, in receipt order
//!
//! A spawned forward task drains the mailbox into the chain. The receive loop
//! never waits on the chain; a full mailbox is reported to the client as
//! `SERVICE_UNAVAILABLE` and the envelope is dropped.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{pin_mut, Sink, SinkExt, Stream, StreamExt};
use tokio::task::JoinError;
use tracing::{debug, info, warn, Instrument};

use orderline_core::error::{OrderlineError, Result, Status};
use orderline_core::protocol::Envelope;

use crate::chain::Admitted;
use crate::filter::AdmissionDecision;
use crate::obs::OrdererMetrics;
use crate::registry::{Support, SupportManager};

use super::mailbox::{mailbox, MailboxReceiver, MailboxSender, PostError};

/// Reply to one submitted envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub status: Status,
}

impl BroadcastResponse {
    pub fn new(status: Status) -> Self {
        Self { status }
    }
}

type Outstanding = (Arc<dyn Support>, Admitted);

pub struct BroadcastHandler {
    manager: Arc<dyn SupportManager>,
    queue_size: usize,
    metrics: Arc<OrdererMetrics>,
    next_conn: AtomicU64,
}

impl BroadcastHandler {
    /// `queue_size` is the per-connection mailbox capacity.
    pub fn new(manager: Arc<dyn SupportManager>, queue_size: usize) -> Self {
        Self {
            manager,
            queue_size: queue_size.max(1),
            metrics: Arc::new(OrdererMetrics::default()),
            next_conn: AtomicU64::new(1),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<OrdererMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Serve one connection until the inbound stream ends, the outbound sink
    /// fails, or a target chain halts (`Err(ChainHalted)`).
    pub async fn handle<R, W>(&self, inbound: R, outbound: W) -> Result<()>
    where
        R: Stream<Item = Envelope> + Send,
        W: Sink<BroadcastResponse> + Send,
        W::Error: Display,
    {
        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let span = tracing::info_span!("broadcast", conn);
        self.serve(inbound, outbound).instrument(span).await
    }

    async fn serve<R, W>(&self, inbound: R, outbound: W) -> Result<()>
    where
        R: Stream<Item = Envelope> + Send,
        W: Sink<BroadcastResponse> + Send,
        W::Error: Display,
    {
        pin_mut!(inbound);
        pin_mut!(outbound);

        let (post, deliveries) = mailbox::<Outstanding>(self.queue_size);
        let mut forward = tokio::spawn(forward_loop(deliveries).in_current_span());

        self.metrics.broadcast_connections.inc(&[]);
        info!(queue_size = self.queue_size, "connection opened");

        let outcome = loop {
            tokio::select! {
                biased;

                res = &mut forward => break forward_outcome(res),

                next = inbound.next() => {
                    let Some(env) = next else {
                        debug!("inbound stream ended");
                        break Ok(());
                    };

                    let status = self.admit(env, &post);
                    self.metrics
                        .broadcast_replies
                        .inc(&[("status", status.as_str())]);

                    if let Err(e) = outbound.send(BroadcastResponse::new(status)).await {
                        warn!(error = %e, "reply failed; closing connection");
                        break Err(OrderlineError::Internal(format!("outbound sink failed: {e}")));
                    }
                }
            }
        };

        // The forward task keeps delivering what was acknowledged; it ends
        // once the mailbox is drained and this sender is gone.
        drop(post);

        if let Err(e) = outbound.close().await {
            debug!(error = %e, "closing outbound sink failed");
        }
        self.metrics.broadcast_connections.dec(&[]);
        match &outcome {
            Ok(()) => info!("connection closed"),
            Err(e) => info!(error = %e, "connection terminated"),
        }
        outcome
    }

    fn admit(&self, env: Envelope, post: &MailboxSender<Outstanding>) -> Status {
        let payload = match env.decode_payload() {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "malformed envelope");
                return e.status();
            }
        };
        let chain_id = payload.chain_id();

        let Some(support) = self.manager.get_chain(chain_id) else {
            debug!(chain = chain_id, "unknown chain");
            return OrderlineError::UnknownChain(chain_id.to_string()).status();
        };

        let decision = support.filters().apply(&env);
        self.metrics
            .filter_decisions
            .inc(&[("chain", chain_id), ("decision", decision.as_str())]);

        if let AdmissionDecision::Reject { reason } = &decision {
            debug!(chain = chain_id, reason = %reason, "envelope rejected");
            return OrderlineError::Rejected(reason.clone()).status();
        }

        let Some(admitted) = Admitted::from_decision(env, decision) else {
            return Status::BadRequest;
        };

        match post.try_post((support, admitted)) {
            Ok(()) => Status::Success,
            Err(PostError::Full(_)) => {
                warn!(chain = chain_id, "mailbox full; envelope dropped");
                OrderlineError::ServiceUnavailable.status()
            }
            Err(PostError::Closed(_)) => {
                debug!(chain = chain_id, "mailbox closed; envelope dropped");
                OrderlineError::ServiceUnavailable.status()
            }
        }
    }
}

async fn forward_loop(mut deliveries: MailboxReceiver<Outstanding>) -> Result<()> {
    while let Some(delivery) = deliveries.recv().await {
        let ((support, msg), _slot) = delivery.into_parts();
        if let Err(e) = support.enqueue(msg).await {
            warn!(chain = support.chain_id(), error = %e, "enqueue failed; closing connection");
            deliveries.close();
            return Err(e);
        }
    }
    Ok(())
}

fn forward_outcome(res: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match res {
        Ok(outcome) => outcome,
        Err(e) => Err(OrderlineError::Internal(format!("forward task failed: {e}"))),
    }
}
