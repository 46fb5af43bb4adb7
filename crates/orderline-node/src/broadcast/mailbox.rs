//! Bounded per-connection mailbox.
//!
//! Capacity is counted with semaphore permits rather than channel slots. A
//! permit is taken on post and travels with the item; it is released only
//! when the consumer drops the delivery, i.e. after the item has been handed
//! downstream. Posting never waits.

use std::sync::Arc;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug, thiserror::Error)]
pub enum PostError<T> {
    #[error("mailbox full")]
    Full(T),
    #[error("mailbox closed")]
    Closed(T),
}

impl<T> PostError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PostError::Full(item) | PostError::Closed(item) => item,
        }
    }
}

/// Item taken from the mailbox. Holds its slot until dropped.
pub struct Delivery<T> {
    item: T,
    slot: OwnedSemaphorePermit,
}

impl<T> Delivery<T> {
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Split into the item and the slot guard. Drop the guard once the item
    /// is no longer outstanding.
    pub fn into_parts(self) -> (T, OwnedSemaphorePermit) {
        (self.item, self.slot)
    }
}

pub struct MailboxSender<T> {
    tx: mpsc::UnboundedSender<Delivery<T>>,
    slots: Arc<Semaphore>,
}

pub struct MailboxReceiver<T> {
    rx: mpsc::UnboundedReceiver<Delivery<T>>,
    slots: Arc<Semaphore>,
}

/// Mailbox with `capacity` outstanding items (at least one).
pub fn mailbox<T>(capacity: usize) -> (MailboxSender<T>, MailboxReceiver<T>) {
    let slots = Arc::new(Semaphore::new(capacity.max(1)));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MailboxSender {
            tx,
            slots: Arc::clone(&slots),
        },
        MailboxReceiver { rx, slots },
    )
}

impl<T> MailboxSender<T> {
    pub fn try_post(&self, item: T) -> Result<(), PostError<T>> {
        let slot = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(slot) => slot,
            Err(TryAcquireError::NoPermits) => return Err(PostError::Full(item)),
            Err(TryAcquireError::Closed) => return Err(PostError::Closed(item)),
        };
        self.tx
            .send(Delivery { item, slot })
            .map_err(|e| PostError::Closed(e.0.item))
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

impl<T> MailboxReceiver<T> {
    pub async fn recv(&mut self) -> Option<Delivery<T>> {
        self.rx.recv().await
    }

    /// Refuse further posts. Already queued items are discarded with the
    /// receiver.
    pub fn close(&mut self) {
        self.slots.close();
        self.rx.close();
    }
}
