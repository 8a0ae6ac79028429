//! Store provider client.
//!
//! `ProcessStore` talks to an external store binary (e.g.
//! `kansync-store-local`) over the protocol in `super::protocol`.
//! Providers are discovered by looking for executables named
//! `kansync-store-{name}` in PATH.
//!
//! Unlike a one-shot subprocess call, the provider stays alive for the
//! client's lifetime: subscriptions stream change events on the same
//! stdout as responses. A reader task routes event lines to their
//! subscription's channel and response lines to the in-flight call with
//! the matching seq.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::change::{Change, Filter};
use crate::document::{Collection, Document};
use crate::error::{KanSyncError, KanSyncResult};
use crate::remote::protocol::{
    self, Command, ErrorCode, EventEnvelope, Request, Response, ResponseLine, StoreCommand,
    StoreConfig,
};
use crate::store::{Store, Subscription};

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// A client for a store provider process. Cheap to clone; the provider
/// exits when the last clone is dropped (stdin closes, and the child is
/// killed as a backstop).
#[derive(Clone)]
pub struct ProcessStore {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    store_config: StoreConfig,
    requests: mpsc::UnboundedSender<String>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Response<Value>>>>,
    subscriptions: Mutex<HashMap<u64, mpsc::UnboundedSender<Change>>>,
    next_seq: AtomicU64,
    next_subscription: AtomicU64,
    child: Mutex<Option<tokio::process::Child>>,
}

impl ProcessStore {
    /// Spawn the provider named `kansync-store-{name}` from PATH and
    /// connect to it.
    pub fn spawn(name: &str, store_config: StoreConfig) -> KanSyncResult<Self> {
        let binary_name = format!("kansync-store-{}", name);
        let binary_path = which::which(&binary_name).map_err(|_| {
            KanSyncError::ProviderNotInstalled(format!(
                "Store provider '{}' not found. Install it with:\n  cargo install {}",
                name, binary_name
            ))
        })?;

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| KanSyncError::Provider("provider stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| KanSyncError::Provider("provider stdout unavailable".to_string()))?;

        let store = Self::connect(stdout, stdin, store_config);
        if let Ok(mut slot) = store.inner.child.lock() {
            *slot = Some(child);
        }
        Ok(store)
    }

    /// Connect over arbitrary streams. `spawn` wires this to a child
    /// process; tests wire it to an in-memory duplex.
    pub fn connect<R, W>(reader: R, writer: W, store_config: StoreConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel::<String>();

        let inner = Arc::new(ClientInner {
            store_config,
            requests: requests_tx,
            pending: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            next_subscription: AtomicU64::new(0),
            child: Mutex::new(None),
        });

        tokio::spawn(write_loop(requests_rx, writer));
        tokio::spawn(read_loop(reader, Arc::downgrade(&inner)));

        ProcessStore { inner }
    }

    async fn call<C: StoreCommand>(&self, cmd: C) -> KanSyncResult<C::Response> {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let params = serde_json::to_value(cmd)
            .map_err(|e| KanSyncError::Serialization(e.to_string()))?;
        let line = serde_json::to_string(&Request {
            seq,
            command: C::command(),
            params,
        })
        .map_err(|e| KanSyncError::Serialization(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.with_pending(|pending| {
            pending.insert(seq, tx);
        })?;

        if self.inner.requests.send(line).is_err() {
            self.with_pending(|pending| {
                pending.remove(&seq);
            })?;
            return Err(KanSyncError::StoreClosed);
        }

        let response = match timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(KanSyncError::StoreClosed),
            Err(_) => {
                self.with_pending(|pending| {
                    pending.remove(&seq);
                })?;
                return Err(KanSyncError::StoreTimeout(CALL_TIMEOUT.as_secs()));
            }
        };

        match response {
            Response::Success { data } => serde_json::from_value(data)
                .map_err(|e| KanSyncError::Serialization(e.to_string())),
            Response::Error { error, code } => Err(match code {
                Some(ErrorCode::NotFound) => KanSyncError::NotFound(error),
                Some(ErrorCode::PermissionDenied) => KanSyncError::PermissionDenied(error),
                Some(ErrorCode::Invalid) => KanSyncError::Invalid(error),
                Some(ErrorCode::Unavailable) => KanSyncError::StoreUnavailable(error),
                None => KanSyncError::Provider(error),
            }),
        }
    }

    fn with_pending<T>(
        &self,
        f: impl FnOnce(&mut HashMap<u64, oneshot::Sender<Response<Value>>>) -> T,
    ) -> KanSyncResult<T> {
        self.inner
            .pending
            .lock()
            .map(|mut pending| f(&mut pending))
            .map_err(|_| KanSyncError::StoreUnavailable("client state poisoned".to_string()))
    }

    fn config(&self) -> StoreConfig {
        self.inner.store_config.clone()
    }
}

async fn write_loop(
    mut requests: mpsc::UnboundedReceiver<String>,
    mut writer: impl AsyncWrite + Unpin,
) {
    while let Some(line) = requests.recv().await {
        if writer.write_all(line.as_bytes()).await.is_err()
            || writer.write_all(b"\n").await.is_err()
            || writer.flush().await.is_err()
        {
            break;
        }
    }
}

async fn read_loop(reader: impl AsyncRead + Unpin, client: Weak<ClientInner>) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(inner) = client.upgrade() else {
            break;
        };

        if let Ok(envelope) = serde_json::from_str::<EventEnvelope>(&line) {
            if let Ok(subs) = inner.subscriptions.lock() {
                if let Some(tx) = subs.get(&envelope.event.subscription) {
                    let _ = tx.send(envelope.event.change);
                }
            }
            continue;
        }

        match serde_json::from_str::<ResponseLine>(&line) {
            Ok(response) => {
                let waiter = inner
                    .pending
                    .lock()
                    .ok()
                    .and_then(|mut pending| pending.remove(&response.seq));
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response.response);
                    }
                    // Fire-and-forget requests (unsubscribe) have no waiter.
                    None => tracing::debug!(seq = response.seq, "response with no waiter"),
                }
            }
            Err(err) => tracing::warn!(error = %err, "unparseable provider line"),
        }
    }

    // Provider is gone: wake in-flight calls and end live subscriptions.
    if let Some(inner) = client.upgrade() {
        if let Ok(mut pending) = inner.pending.lock() {
            pending.clear();
        }
        if let Ok(mut subs) = inner.subscriptions.lock() {
            subs.clear();
        }
    }
}

impl Store for ProcessStore {
    async fn get(&self, collection: Collection, id: &str) -> KanSyncResult<Document> {
        self.call(protocol::Get {
            store_config: self.config(),
            collection,
            id: id.to_string(),
        })
        .await
    }

    async fn add(&self, collection: Collection, data: Value) -> KanSyncResult<String> {
        self.call(protocol::Add {
            store_config: self.config(),
            collection,
            data,
        })
        .await
        .map(|response| response.id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: Value,
    ) -> KanSyncResult<()> {
        self.call(protocol::Update {
            store_config: self.config(),
            collection,
            id: id.to_string(),
            field: field.to_string(),
            value,
        })
        .await
    }

    async fn delete(&self, collection: Collection, id: &str) -> KanSyncResult<()> {
        self.call(protocol::Delete {
            store_config: self.config(),
            collection,
            id: id.to_string(),
        })
        .await
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> KanSyncResult<Subscription> {
        let subscription = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        // Register routing before the request goes out: the provider
        // writes initial snapshot events ahead of the response, and the
        // reader task must have somewhere to put them.
        if let Ok(mut subs) = self.inner.subscriptions.lock() {
            subs.insert(subscription, tx);
        }

        let result = self
            .call(protocol::Subscribe {
                store_config: self.config(),
                collection,
                filter,
                subscription,
            })
            .await;
        if let Err(err) = result {
            if let Ok(mut subs) = self.inner.subscriptions.lock() {
                subs.remove(&subscription);
            }
            return Err(err);
        }

        let client = Arc::downgrade(&self.inner);
        Ok(Subscription::new(rx, move || {
            let Some(inner) = client.upgrade() else {
                return;
            };
            if let Ok(mut subs) = inner.subscriptions.lock() {
                subs.remove(&subscription);
            }
            // Fire-and-forget: the response (if the provider is still
            // there) has no waiter and is dropped by the reader task.
            let seq = inner.next_seq.fetch_add(1, Ordering::Relaxed);
            if let Ok(params) = serde_json::to_value(protocol::Unsubscribe { subscription }) {
                if let Ok(line) = serde_json::to_string(&Request {
                    seq,
                    command: Command::Unsubscribe,
                    params,
                }) {
                    let _ = inner.requests.send(line);
                }
            }
        }))
    }
}
