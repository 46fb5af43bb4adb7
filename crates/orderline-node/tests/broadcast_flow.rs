#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::{stream, Sink};
use tokio::sync::{mpsc, Semaphore};

use common::{config_tx, empty_envelope, finished, garbage_envelope, message, serve, WAIT};
use orderline_core::error::{OrderlineError, Result, Status};
use orderline_core::protocol::{ConfigurationEnvelope, Envelope};
use orderline_node::chain::{Admitted, TxKind};
use orderline_node::configtx::ConfigManager;
use orderline_node::filter::RuleSet;
use orderline_node::obs::OrdererMetrics;
use orderline_node::{BroadcastHandler, BroadcastResponse, Support, SupportManager};

const SYSTEM: &str = "system";

#[derive(Default)]
struct MockConfigManager {
    validated: AtomicUsize,
    fail: bool,
}

impl ConfigManager for MockConfigManager {
    fn validate(&self, _config: &ConfigurationEnvelope) -> Result<()> {
        self.validated.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OrderlineError::Rejected("fail to validate".into()));
        }
        Ok(())
    }

    fn apply(&self, _config: &ConfigurationEnvelope) -> Result<()> {
        Ok(())
    }

    fn chain_id(&self) -> &str {
        SYSTEM
    }
}

/// Support whose enqueue stalls until the gate is opened.
struct MockSupport {
    filters: RuleSet,
    manager: Arc<MockConfigManager>,
    gate: Arc<Semaphore>,
    delivered: mpsc::UnboundedSender<Admitted>,
    halted: AtomicBool,
}

#[async_trait]
impl Support for MockSupport {
    fn chain_id(&self) -> &str {
        SYSTEM
    }

    fn filters(&self) -> &RuleSet {
        &self.filters
    }

    fn config_manager(&self) -> Arc<dyn ConfigManager> {
        self.manager.clone()
    }

    async fn enqueue(&self, msg: Admitted) -> Result<()> {
        if self.halted.load(Ordering::SeqCst) {
            return Err(OrderlineError::ChainHalted(SYSTEM.into()));
        }
        drop(self.gate.acquire().await);
        let _ = self.delivered.send(msg);
        Ok(())
    }
}

struct MockManager {
    chains: HashMap<String, Arc<MockSupport>>,
}

impl SupportManager for MockManager {
    fn get_chain(&self, chain_id: &str) -> Option<Arc<dyn Support>> {
        let support: Arc<dyn Support> = self.chains.get(chain_id)?.clone();
        Some(support)
    }
}

struct Fixture {
    handler: Arc<BroadcastHandler>,
    support: Arc<MockSupport>,
    delivered: mpsc::UnboundedReceiver<Admitted>,
    metrics: Arc<OrdererMetrics>,
}

impl Fixture {
    fn new(queue_size: usize) -> Self {
        Self::with_manager(queue_size, MockConfigManager::default())
    }

    fn with_manager(queue_size: usize, manager: MockConfigManager) -> Self {
        common::init_tracing();
        let manager = Arc::new(manager);
        let (tx, delivered) = mpsc::unbounded_channel();
        let support = Arc::new(MockSupport {
            filters: RuleSet::standard(manager.clone()),
            manager,
            gate: Arc::new(Semaphore::new(0)),
            delivered: tx,
            halted: AtomicBool::new(false),
        });
        let mut chains = HashMap::new();
        chains.insert(SYSTEM.to_string(), support.clone());

        let metrics = Arc::new(OrdererMetrics::new());
        let handler = BroadcastHandler::new(Arc::new(MockManager { chains }), queue_size)
            .with_metrics(metrics.clone());
        Self {
            handler: Arc::new(handler),
            support,
            delivered,
            metrics,
        }
    }

    fn release(&self) {
        self.support.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    async fn next_delivered(&mut self) -> Admitted {
        tokio::time::timeout(WAIT, self.delivered.recv())
            .await
            .expect("nothing enqueued in time")
            .expect("support dropped")
    }
}

#[tokio::test]
async fn queue_overflow() {
    let f = Fixture::new(2);
    let (mut client, _task) = serve(&f.handler);

    for i in 0..3 {
        client.send(message(SYSTEM, &format!("tx-{i}")));
    }

    assert_eq!(client.status().await, Status::Success);
    assert_eq!(client.status().await, Status::Success);
    assert_eq!(client.status().await, Status::ServiceUnavailable);
}

#[tokio::test]
async fn multi_queue_overflow() {
    let f = Fixture::new(2);
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(serve(&f.handler));
    }

    for (client, _) in &clients {
        for i in 0..3 {
            client.send(message(SYSTEM, &format!("tx-{i}")));
        }
    }

    for (client, _) in &mut clients {
        assert_eq!(client.status().await, Status::Success);
        assert_eq!(client.status().await, Status::Success);
        assert_eq!(client.status().await, Status::ServiceUnavailable);
    }
}

#[tokio::test]
async fn released_mailbox_forwards_in_order_and_frees_slots() {
    let mut f = Fixture::new(2);
    let (mut client, _task) = serve(&f.handler);

    client.send(message(SYSTEM, "a"));
    client.send(message(SYSTEM, "b"));
    client.send(message(SYSTEM, "c"));
    assert_eq!(client.status().await, Status::Success);
    assert_eq!(client.status().await, Status::Success);
    assert_eq!(client.status().await, Status::ServiceUnavailable);

    f.release();
    let first = f.next_delivered().await;
    let second = f.next_delivered().await;
    assert_eq!(first.envelope, message(SYSTEM, "a"));
    assert_eq!(second.envelope, message(SYSTEM, "b"));

    client.send(message(SYSTEM, "d"));
    assert_eq!(client.status().await, Status::Success);
    assert_eq!(f.next_delivered().await.envelope, message(SYSTEM, "d"));
}

#[tokio::test]
async fn empty_envelope_is_bad_request() {
    let mut f = Fixture::new(2);
    f.release();
    let (mut client, _task) = serve(&f.handler);

    client.send(empty_envelope());
    assert_eq!(client.status().await, Status::BadRequest);
    assert_eq!(f.support.manager.validated.load(Ordering::SeqCst), 0);

    // the next good envelope is the first thing enqueued
    client.send(message(SYSTEM, "after"));
    assert_eq!(client.status().await, Status::Success);
    assert_eq!(f.next_delivered().await.envelope, message(SYSTEM, "after"));
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let f = Fixture::new(2);
    let (mut client, _task) = serve(&f.handler);

    client.send(garbage_envelope());
    assert_eq!(client.status().await, Status::BadRequest);
}

#[tokio::test]
async fn unknown_chain_is_bad_request() {
    let f = Fixture::new(2);
    let (mut client, _task) = serve(&f.handler);

    client.send(message("nope", "x"));
    assert_eq!(client.status().await, Status::BadRequest);
}

#[tokio::test]
async fn reconfigure_accept() {
    let mut f = Fixture::new(2);
    f.release();
    let (mut client, _task) = serve(&f.handler);

    let cfg = ConfigurationEnvelope::new(SYSTEM, 1);
    client.send(config_tx(&cfg));
    assert_eq!(client.status().await, Status::Success);

    let delivered = f.next_delivered().await;
    assert_eq!(delivered.kind, TxKind::Config(Box::new(cfg)));
    assert_eq!(f.support.manager.validated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reconfigure_reject() {
    let mut f = Fixture::with_manager(
        2,
        MockConfigManager {
            fail: true,
            ..Default::default()
        },
    );
    f.release();
    let (mut client, _task) = serve(&f.handler);

    client.send(config_tx(&ConfigurationEnvelope::new(SYSTEM, 1)));
    assert_eq!(client.status().await, Status::BadRequest);

    client.send(message(SYSTEM, "after"));
    assert_eq!(client.status().await, Status::Success);
    let delivered = f.next_delivered().await;
    assert!(!delivered.is_config(), "rejected config must never be enqueued");
}

#[tokio::test]
async fn halted_chain_terminates_connection() {
    let f = Fixture::new(2);
    f.support.halted.store(true, Ordering::SeqCst);
    let (mut client, task) = serve(&f.handler);

    client.send(message(SYSTEM, "x"));
    assert_eq!(client.status().await, Status::Success);

    let err = finished(task).await.expect_err("halted chain must end the connection");
    assert!(matches!(err, OrderlineError::ChainHalted(ref id) if id == SYSTEM));
    assert_eq!(f.metrics.broadcast_connections.get(&[]), 0);
}

#[tokio::test]
async fn stream_end_still_delivers_acknowledged() {
    let mut f = Fixture::new(4);
    let (mut client, task) = serve(&f.handler);

    client.send(message(SYSTEM, "a"));
    client.send(message(SYSTEM, "b"));
    assert_eq!(client.status().await, Status::Success);
    assert_eq!(client.status().await, Status::Success);

    client.hang_up();
    finished(task).await.unwrap();

    f.release();
    assert_eq!(f.next_delivered().await.envelope, message(SYSTEM, "a"));
    assert_eq!(f.next_delivered().await.envelope, message(SYSTEM, "b"));
}

#[tokio::test]
async fn replies_are_counted_by_status() {
    let f = Fixture::new(1);
    let (mut client, _task) = serve(&f.handler);

    client.send(message(SYSTEM, "a"));
    client.send(message(SYSTEM, "b"));
    client.send(empty_envelope());
    client.status().await;
    client.status().await;
    client.status().await;

    let replies = &f.metrics.broadcast_replies;
    assert_eq!(replies.get(&[("status", "SUCCESS")]), 1);
    assert_eq!(replies.get(&[("status", "SERVICE_UNAVAILABLE")]), 1);
    assert_eq!(replies.get(&[("status", "BAD_REQUEST")]), 1);
    assert_eq!(f.metrics.broadcast_connections.get(&[]), 1);
}

type SinkResult = std::result::Result<(), String>;

/// Outbound sink that delivers replies but fails to close.
struct CloseFails {
    tx: mpsc::UnboundedSender<BroadcastResponse>,
}

impl Sink<BroadcastResponse> for CloseFails {
    type Error = String;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<SinkResult> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: BroadcastResponse) -> SinkResult {
        self.tx.send(item).map_err(|e| e.to_string())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<SinkResult> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<SinkResult> {
        Poll::Ready(Err("peer already gone".into()))
    }
}

#[tokio::test]
async fn failed_sink_close_still_ends_cleanly() {
    let f = Fixture::new(2);
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Envelope>();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let inbound = stream::unfold(in_rx, |mut rx| async move {
        rx.recv().await.map(|env| (env, rx))
    });

    let handler = f.handler.clone();
    let outbound = CloseFails { tx: out_tx };
    let task = tokio::spawn(async move { handler.handle(inbound, outbound).await });

    in_tx.send(message(SYSTEM, "x")).unwrap();
    let reply = tokio::time::timeout(WAIT, out_rx.recv()).await.unwrap().unwrap();
    assert_eq!(reply.status, Status::Success);

    drop(in_tx);
    finished(task).await.unwrap();
    assert_eq!(f.metrics.broadcast_connections.get(&[]), 0);
}
