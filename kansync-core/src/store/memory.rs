//! In-process document store.
//!
//! `MemoryStore` is the test double for the hosted store and the engine
//! inside `kansync-store-local`. It keeps documents in plain maps and
//! fans change events out to registered subscribers. It is not a
//! database: single-field equality is the only query shape, and nothing
//! is persisted (the local provider handles file persistence itself).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::change::{Change, ChangeKind, Filter};
use crate::document::{Collection, Document};
use crate::error::{KanSyncError, KanSyncResult};
use crate::store::{Store, Subscription};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    calendars: BTreeMap<String, Value>,
    rows: BTreeMap<String, Value>,
    cards: BTreeMap<String, Value>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
}

struct Subscriber {
    id: u64,
    collection: Collection,
    filter: Filter,
    tx: mpsc::UnboundedSender<Change>,
}

impl Inner {
    fn collection(&mut self, collection: Collection) -> &mut BTreeMap<String, Value> {
        match collection {
            Collection::Calendars => &mut self.calendars,
            Collection::Rows => &mut self.rows,
            Collection::Cards => &mut self.cards,
        }
    }

    /// Deliver a change to every live subscriber whose filter matches.
    /// Subscribers whose receiving side is gone are pruned as they fail.
    fn fan_out(&mut self, collection: Collection, change: Change) {
        self.subscribers.retain(|sub| {
            if sub.collection != collection || !sub.filter.matches(&change.doc) {
                return true;
            }
            sub.tx.send(change.clone()).is_ok()
        });
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole contents of a collection. Used by the local
    /// provider when loading persisted state; does not notify anyone.
    pub fn load_collection(&self, collection: Collection, docs: BTreeMap<String, Value>) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner.collection(collection) = docs;
        }
    }

    /// Snapshot the contents of a collection, for persistence.
    pub fn dump_collection(&self, collection: Collection) -> BTreeMap<String, Value> {
        self.inner
            .lock()
            .map(|mut inner| inner.collection(collection).clone())
            .unwrap_or_default()
    }

    /// Number of documents currently in a collection.
    pub fn len(&self, collection: Collection) -> usize {
        self.inner
            .lock()
            .map(|mut inner| inner.collection(collection).len())
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|i| i.subscribers.len()).unwrap_or(0)
    }

    fn lock(&self) -> KanSyncResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| KanSyncError::StoreUnavailable("store lock poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> KanSyncResult<Document> {
        let mut inner = self.lock()?;
        inner
            .collection(collection)
            .get(id)
            .map(|data| Document::new(id, data.clone()))
            .ok_or_else(|| KanSyncError::not_found(collection.as_str(), id))
    }

    async fn add(&self, collection: Collection, data: Value) -> KanSyncResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.lock()?;
        inner.collection(collection).insert(id.clone(), data.clone());
        inner.fan_out(
            collection,
            Change {
                kind: ChangeKind::Added,
                doc: Document::new(id.clone(), data),
            },
        );
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: Value,
    ) -> KanSyncResult<()> {
        let mut inner = self.lock()?;
        let data = match inner.collection(collection).get_mut(id) {
            Some(data) => data,
            None => return Err(KanSyncError::not_found(collection.as_str(), id)),
        };
        set_field(data, field, value);
        let doc = Document::new(id, data.clone());
        inner.fan_out(
            collection,
            Change {
                kind: ChangeKind::Modified,
                doc,
            },
        );
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> KanSyncResult<()> {
        let mut inner = self.lock()?;
        let data = inner
            .collection(collection)
            .remove(id)
            .ok_or_else(|| KanSyncError::not_found(collection.as_str(), id))?;
        inner.fan_out(
            collection,
            Change {
                kind: ChangeKind::Removed,
                doc: Document::new(id, data),
            },
        );
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> KanSyncResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber_id;
        {
            let mut inner = self.lock()?;

            // Current matching documents arrive as Added changes before
            // the subscriber is registered for live events, so they are
            // buffered by the time this call returns.
            for (id, data) in inner.collection(collection).iter() {
                let doc = Document::new(id.clone(), data.clone());
                if filter.matches(&doc) {
                    let _ = tx.send(Change {
                        kind: ChangeKind::Added,
                        doc,
                    });
                }
            }

            subscriber_id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.push(Subscriber {
                id: subscriber_id,
                collection,
                filter,
                tx,
            });
        }

        let store = self.inner.clone();
        Ok(Subscription::new(rx, move || {
            if let Ok(mut inner) = store.lock() {
                inner.subscribers.retain(|sub| sub.id != subscriber_id);
            }
        }))
    }
}

/// Set a (possibly dotted) field path inside a document payload,
/// creating intermediate objects as needed.
fn set_field(data: &mut Value, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let last = match parts.pop() {
        Some(last) if !last.is_empty() => last,
        _ => return,
    };

    if !data.is_object() {
        *data = Value::Object(Default::default());
    }

    let mut current = data;
    for part in parts {
        let map = match current.as_object_mut() {
            Some(map) => map,
            None => return,
        };
        let entry = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if !entry.is_object() {
            *entry = Value::Object(Default::default());
        }
        current = entry;
    }

    if let Some(map) = current.as_object_mut() {
        map.insert(last.to_string(), value);
    }
}
