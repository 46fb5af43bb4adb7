//! Chain registry.
//!
//! Builds one ordering chain per configured chain id at startup and resolves
//! chain ids to the `Support` the broadcast admitter needs: the chain's rule
//! set, its configuration manager and its enqueue entry point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use orderline_core::error::{OrderlineError, Result};

use crate::chain::{Admitted, ChainHandle, OrderingChain, SizeCutter};
use crate::config::OrdererConfig;
use crate::configtx::{ConfigManager, SequencedConfigManager};
use crate::filter::RuleSet;
use crate::ledger::RamLedger;
use crate::obs::OrdererMetrics;

/// Everything the admitter needs from one chain.
#[async_trait]
pub trait Support: Send + Sync {
    fn chain_id(&self) -> &str;

    fn filters(&self) -> &RuleSet;

    fn config_manager(&self) -> Arc<dyn ConfigManager>;

    /// Blocks while the chain's queue is full; errors once the chain halted.
    async fn enqueue(&self, msg: Admitted) -> Result<()>;
}

/// Chain id lookup. Must be safe for concurrent use.
pub trait SupportManager: Send + Sync {
    fn get_chain(&self, chain_id: &str) -> Option<Arc<dyn Support>>;
}

/// `Support` backed by a running `OrderingChain`.
pub struct ChainSupport {
    handle: ChainHandle,
    filters: RuleSet,
    config_manager: Arc<dyn ConfigManager>,
}

impl ChainSupport {
    pub fn new(
        handle: ChainHandle,
        filters: RuleSet,
        config_manager: Arc<dyn ConfigManager>,
    ) -> Self {
        Self {
            handle,
            filters,
            config_manager,
        }
    }

    pub fn handle(&self) -> &ChainHandle {
        &self.handle
    }
}

#[async_trait]
impl Support for ChainSupport {
    fn chain_id(&self) -> &str {
        self.handle.chain_id()
    }

    fn filters(&self) -> &RuleSet {
        &self.filters
    }

    fn config_manager(&self) -> Arc<dyn ConfigManager> {
        Arc::clone(&self.config_manager)
    }

    async fn enqueue(&self, msg: Admitted) -> Result<()> {
        self.handle.enqueue(msg).await
    }
}

struct ChainEntry {
    support: Arc<ChainSupport>,
    ledger: Arc<RamLedger>,
    config: Arc<SequencedConfigManager>,
}

/// Owner of every chain of this node.
pub struct ChainRegistry {
    system_chain: String,
    chains: HashMap<String, ChainEntry>,
    tasks: Mutex<Vec<(String, JoinHandle<Result<()>>)>>,
    metrics: Arc<OrdererMetrics>,
}

impl ChainRegistry {
    /// Create and spawn every chain in `cfg`. Must run inside a tokio runtime.
    pub fn start(cfg: &OrdererConfig, metrics: Arc<OrdererMetrics>) -> Result<Self> {
        cfg.validate()?;

        let mut chains = HashMap::new();
        let mut tasks = Vec::new();

        for plan in cfg.chain_plans() {
            let ledger = Arc::new(RamLedger::new(plan.history_size));
            let config = Arc::new(SequencedConfigManager::new(plan.id.clone()));
            let manager: Arc<dyn ConfigManager> = config.clone();

            let (chain, handle) = OrderingChain::new(
                plan.id.clone(),
                plan.queue_size,
                plan.batch_timeout,
                Box::new(SizeCutter::new(plan.batch_size.clone())),
                ledger.clone(),
            );
            let chain = chain
                .with_config_manager(Arc::clone(&manager))
                .with_metrics(Arc::clone(&metrics));
            tasks.push((plan.id.clone(), chain.spawn()));

            tracing::info!(
                chain = %plan.id,
                queue_size = plan.queue_size,
                batch_timeout_ms = plan.batch_timeout.as_millis() as u64,
                max_message_count = plan.batch_size.max_message_count,
                "chain created"
            );

            let filters = RuleSet::standard(Arc::clone(&manager));
            let support = ChainSupport::new(handle, filters, manager);
            chains.insert(
                plan.id,
                ChainEntry {
                    support: Arc::new(support),
                    ledger,
                    config,
                },
            );
        }

        Ok(Self {
            system_chain: cfg.system_chain.clone(),
            chains,
            tasks: Mutex::new(tasks),
            metrics,
        })
    }

    pub fn system_chain(&self) -> &str {
        &self.system_chain
    }

    pub fn chain_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.chains.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn handle(&self, chain_id: &str) -> Option<ChainHandle> {
        self.chains.get(chain_id).map(|e| e.support.handle().clone())
    }

    pub fn ledger(&self, chain_id: &str) -> Option<Arc<RamLedger>> {
        self.chains.get(chain_id).map(|e| Arc::clone(&e.ledger))
    }

    pub fn config_manager(&self, chain_id: &str) -> Option<Arc<SequencedConfigManager>> {
        self.chains.get(chain_id).map(|e| Arc::clone(&e.config))
    }

    pub fn metrics(&self) -> &Arc<OrdererMetrics> {
        &self.metrics
    }

    pub fn halt_all(&self) {
        for entry in self.chains.values() {
            entry.support.handle().halt();
        }
    }

    /// Halt every chain and wait for the chain tasks. Returns the first
    /// chain failure, if any. Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        self.halt_all();

        let tasks = match self.tasks.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return Err(OrderlineError::Internal("registry lock poisoned".into())),
        };

        let mut first_err = None;
        for (chain, task) in tasks {
            let outcome = match task.await {
                Ok(res) => res,
                Err(e) => Err(OrderlineError::Internal(format!("chain task failed: {e}"))),
            };
            if let Err(e) = outcome {
                tracing::error!(chain = %chain, error = %e, "chain stopped with error");
                first_err.get_or_insert(e);
            }
        }

        tracing::info!(chains = self.chains.len(), "registry shut down");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl SupportManager for ChainRegistry {
    fn get_chain(&self, chain_id: &str) -> Option<Arc<dyn Support>> {
        let support: Arc<dyn Support> = self.chains.get(chain_id)?.support.clone();
        Some(support)
    }
}
