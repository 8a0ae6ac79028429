//! The remote store interface.
//!
//! Everything kansync persists lives in an external document store. This
//! module defines the minimal surface the rest of the crate is allowed to
//! assume: point reads, inserts, field updates, deletes, and filtered
//! live subscriptions. `memory::MemoryStore` implements it in-process;
//! `crate::remote::ProcessStore` implements it against an external
//! provider binary.

pub mod memory;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::change::{Change, Filter};
use crate::document::{Collection, Document};
use crate::error::KanSyncResult;

/// A document store, as seen by controllers and application operations.
///
/// Implementations are cheap to clone (handles over shared state). All
/// reads of a collection's membership go through `subscribe`; there is
/// deliberately no list/query method.
#[allow(async_fn_in_trait)]
pub trait Store: Clone + Send + Sync + 'static {
    /// Point read of one document.
    async fn get(&self, collection: Collection, id: &str) -> KanSyncResult<Document>;

    /// Insert a new document, returning its generated id.
    async fn add(&self, collection: Collection, data: Value) -> KanSyncResult<String>;

    /// Update a single field of an existing document. `field` may be a
    /// dotted path into nested objects.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: Value,
    ) -> KanSyncResult<()>;

    /// Delete one document.
    async fn delete(&self, collection: Collection, id: &str) -> KanSyncResult<()>;

    /// Open a live subscription over `collection`, filtered by `filter`.
    ///
    /// Every currently-matching document is delivered as an `Added`
    /// change before this call returns, in unspecified order; live
    /// changes follow in store emission order.
    async fn subscribe(&self, collection: Collection, filter: Filter)
    -> KanSyncResult<Subscription>;
}

/// A standing live query. Dropping the subscription releases it: the
/// in-memory store unregisters the sender, the process store sends an
/// `unsubscribe` command. Controllers own their subscription, so
/// controller teardown releases it on every exit path.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Change>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Change>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Subscription {
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next change. `None` once the store side is gone.
    pub async fn recv(&mut self) -> Option<Change> {
        self.rx.recv().await
    }

    /// Take the next already-delivered change without waiting.
    pub fn try_recv(&mut self) -> Option<Change> {
        self.rx.try_recv().ok()
    }

    /// Drain every already-delivered change.
    pub fn drain(&mut self) -> Vec<Change> {
        let mut changes = Vec::new();
        while let Some(change) = self.try_recv() {
            changes.push(change);
        }
        changes
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
