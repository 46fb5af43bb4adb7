use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use orderline_core::error::{OrderlineError, Result};

use crate::chain::Batch;

use super::{Block, LedgerWriter};

struct RamState {
    blocks: VecDeque<Arc<Block>>,
    next_number: u64,
}

/// In-memory ledger keeping the most recent `history_size` blocks.
/// Every appended block is also published to subscribers.
pub struct RamLedger {
    history_size: usize,
    state: Mutex<RamState>,
    signal: broadcast::Sender<Arc<Block>>,
}

impl RamLedger {
    pub fn new(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        let (signal, _) = broadcast::channel(history_size);
        Self {
            history_size,
            state: Mutex::new(RamState {
                blocks: VecDeque::with_capacity(history_size),
                next_number: 0,
            }),
            signal,
        }
    }

    /// Number of blocks ever written.
    pub fn height(&self) -> u64 {
        self.state.lock().map(|s| s.next_number).unwrap_or_default()
    }

    /// Block by number, if still retained.
    pub fn block(&self, number: u64) -> Option<Arc<Block>> {
        let state = self.state.lock().ok()?;
        let oldest = state.blocks.front()?.number;
        let idx = usize::try_from(number.checked_sub(oldest)?).ok()?;
        state.blocks.get(idx).cloned()
    }

    pub fn latest(&self) -> Option<Arc<Block>> {
        self.state.lock().ok()?.blocks.back().cloned()
    }

    /// Receive every block appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Block>> {
        self.signal.subscribe()
    }
}

#[async_trait]
impl LedgerWriter for RamLedger {
    async fn append(&self, batch: Batch, metadata: Vec<Vec<u8>>) -> Result<Arc<Block>> {
        let block = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| OrderlineError::Ledger("ram ledger state poisoned".into()))?;
            let block = Arc::new(Block {
                number: state.next_number,
                data: batch,
                metadata,
            });
            state.next_number += 1;
            if state.blocks.len() == self.history_size {
                state.blocks.pop_front();
            }
            state.blocks.push_back(Arc::clone(&block));
            block
        };
        // no subscribers is fine
        let _ = self.signal.send(Arc::clone(&block));
        Ok(block)
    }
}
