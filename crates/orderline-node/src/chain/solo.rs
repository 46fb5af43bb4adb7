//! Single-node FIFO ordering chain.
//!
//! One task per chain drains the chain's admission queue into the cut policy
//! and writes completed batches to the ledger. The task waits on three things
//! at once: a halt request, the batch timer, and the next queued envelope.
//! The timer is re-armed on every envelope that leaves a partial batch, so it
//! measures time since the last progress rather than batch age.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use orderline_core::error::{OrderlineError, Result};
use orderline_core::protocol::ConfigurationEnvelope;

use crate::configtx::ConfigManager;
use crate::ledger::LedgerWriter;
use crate::obs::OrdererMetrics;

use super::cutter::BlockCutter;
use super::types::{Admitted, Batch};

/// Cloneable entry point into a running chain.
#[derive(Clone)]
pub struct ChainHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    chain_id: String,
    queue: mpsc::Sender<Admitted>,
    halt: Arc<watch::Sender<bool>>,
    batch_timeout: watch::Sender<Duration>,
}

impl ChainHandle {
    pub fn chain_id(&self) -> &str {
        &self.inner.chain_id
    }

    /// Queue an admitted envelope for ordering.
    ///
    /// Waits while the chain's queue is full. Fails with `ChainHalted` once the
    /// chain has halted, including while waiting.
    pub async fn enqueue(&self, msg: Admitted) -> Result<()> {
        let mut halted = self.inner.halt.subscribe();
        tokio::select! {
            biased;
            _ = wait_halted(&mut halted) => Err(self.halted_err()),
            sent = self.inner.queue.send(msg) => sent.map_err(|_| self.halted_err()),
        }
    }

    /// Request the chain to stop. Idempotent; safe from any task.
    /// Pending, not yet cut envelopes are discarded.
    pub fn halt(&self) {
        if !self.inner.halt.send_replace(true) {
            info!(chain = %self.inner.chain_id, "halt requested");
        }
    }

    pub fn is_halted(&self) -> bool {
        *self.inner.halt.borrow()
    }

    /// Change the batch timeout. Takes effect the next time the timer is armed.
    pub fn set_batch_timeout(&self, timeout: Duration) {
        self.inner.batch_timeout.send_replace(timeout);
    }

    pub fn batch_timeout(&self) -> Duration {
        *self.inner.batch_timeout.borrow()
    }

    fn halted_err(&self) -> OrderlineError {
        OrderlineError::ChainHalted(self.inner.chain_id.clone())
    }
}

async fn wait_halted(rx: &mut watch::Receiver<bool>) {
    // Err means every sender is gone, which also ends the chain.
    let _ = rx.wait_for(|halted| *halted).await;
}

/// Per-chain ordering state machine. Owns the cut policy exclusively.
pub struct OrderingChain {
    chain_id: String,
    queue: mpsc::Receiver<Admitted>,
    halt: Arc<watch::Sender<bool>>,
    halted: watch::Receiver<bool>,
    batch_timeout: watch::Receiver<Duration>,
    cutter: Box<dyn BlockCutter>,
    writer: Arc<dyn LedgerWriter>,
    config_manager: Option<Arc<dyn ConfigManager>>,
    metrics: Arc<OrdererMetrics>,
}

impl OrderingChain {
    pub fn new(
        chain_id: impl Into<String>,
        queue_size: usize,
        batch_timeout: Duration,
        cutter: Box<dyn BlockCutter>,
        writer: Arc<dyn LedgerWriter>,
    ) -> (Self, ChainHandle) {
        let chain_id = chain_id.into();
        let (queue_tx, queue_rx) = mpsc::channel(queue_size.max(1));
        let (halt_tx, halt_rx) = watch::channel(false);
        let (timeout_tx, timeout_rx) = watch::channel(batch_timeout);
        let halt_tx = Arc::new(halt_tx);

        let handle = ChainHandle {
            inner: Arc::new(HandleInner {
                chain_id: chain_id.clone(),
                queue: queue_tx,
                halt: Arc::clone(&halt_tx),
                batch_timeout: timeout_tx,
            }),
        };

        let chain = Self {
            chain_id,
            queue: queue_rx,
            halt: halt_tx,
            halted: halt_rx,
            batch_timeout: timeout_rx,
            cutter,
            writer,
            config_manager: None,
            metrics: Arc::new(OrdererMetrics::default()),
        };
        (chain, handle)
    }

    /// Apply ordered configuration transactions through `manager`.
    pub fn with_config_manager(mut self, manager: Arc<dyn ConfigManager>) -> Self {
        self.config_manager = Some(manager);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<OrdererMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run the chain loop on its own task.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        let span = tracing::info_span!("chain", chain = %self.chain_id);
        tokio::spawn(self.run().instrument(span))
    }

    /// Chain loop. Returns `Ok` once halted, `Err` on a ledger failure (the
    /// chain is halted first so enqueuers observe it).
    pub async fn run(mut self) -> Result<()> {
        info!("chain started");

        let timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(timer);
        let mut armed = false;

        loop {
            tokio::select! {
                biased;

                _ = wait_halted(&mut self.halted) => {
                    info!(pending_timer = armed, "chain halted");
                    return Ok(());
                }

                () = &mut timer, if armed => {
                    armed = false;
                    let batch = self.cutter.cut();
                    if batch.is_empty() {
                        debug!("batch timer expired with nothing pending");
                        continue;
                    }
                    self.write(batch, "timeout").await?;
                }

                msg = self.queue.recv() => {
                    let Some(msg) = msg else {
                        info!("all chain handles dropped; stopping");
                        self.halt.send_replace(true);
                        return Ok(());
                    };

                    let config = msg.config_envelope().cloned();
                    let (batches, admitted) = self.cutter.ordered(msg);

                    if !admitted {
                        warn!("cut policy refused envelope; dropped");
                        self.metrics
                            .envelopes_refused
                            .inc(&[("chain", self.chain_id.as_str())]);
                        continue;
                    }

                    if batches.is_empty() {
                        let after = *self.batch_timeout.borrow();
                        timer.as_mut().reset(Instant::now() + after);
                        armed = true;
                        continue;
                    }

                    armed = false;
                    let last = batches.len() - 1;
                    for (i, batch) in batches.into_iter().enumerate() {
                        if batch.is_empty() {
                            continue;
                        }
                        let reason = match (&config, i == last) {
                            (None, _) => "size",
                            (Some(_), true) => "config",
                            // pending envelopes closed off by a config transaction
                            (Some(_), false) => "config_prior",
                        };
                        self.write(batch, reason).await?;
                    }

                    if let Some(config) = config {
                        self.apply_config(&config);
                    }
                }
            }
        }
    }

    async fn write(&self, batch: Batch, reason: &'static str) -> Result<()> {
        let count = batch.len();
        let started = std::time::Instant::now();
        let chain = self.chain_id.as_str();

        match self.writer.append(batch, Vec::new()).await {
            Ok(block) => {
                self.metrics
                    .append_duration
                    .observe(&[("chain", chain)], started.elapsed());
                self.metrics
                    .batches_written
                    .inc(&[("chain", chain), ("reason", reason)]);
                info!(block = block.number, count, reason, "batch written");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, count, "ledger append failed; halting chain");
                self.halt.send_replace(true);
                Err(e)
            }
        }
    }

    fn apply_config(&self, config: &ConfigurationEnvelope) {
        let Some(manager) = &self.config_manager else {
            return;
        };
        if let Err(e) = manager.apply(config) {
            error!(sequence = config.sequence, error = %e, "ordered configuration failed to apply");
            self.metrics
                .config_apply_failures
                .inc(&[("chain", self.chain_id.as_str())]);
        }
    }
}
