//! File-backed document store behind the provider protocol.
//!
//! `LocalStore` wraps the in-process store from kansync-core with JSON
//! file persistence and turns protocol requests into wire lines. Every
//! request yields zero or more event lines followed by exactly one
//! response line; for `subscribe`, the initial snapshot events precede
//! the success response, which is what the client contract requires.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kansync_core::error::{KanSyncError, KanSyncResult};
use kansync_core::remote::protocol::{
    self, Command, ErrorCode, EventEnvelope, Request, ResponseLine, StoreConfig,
};
use kansync_core::Collection;
use kansync_core::store::memory::MemoryStore;
use kansync_core::store::{Store, Subscription};

const DEFAULT_FILE_NAME: &str = "store.json";

/// On-disk shape: one JSON object per collection, documents keyed by id.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    calendars: BTreeMap<String, Value>,
    #[serde(default)]
    rows: BTreeMap<String, Value>,
    #[serde(default)]
    cards: BTreeMap<String, Value>,
}

struct LiveSub {
    id: u64,
    subscription: Subscription,
}

pub struct LocalStore {
    memory: MemoryStore,
    path: Option<PathBuf>,
    subscriptions: Vec<LiveSub>,
}

impl LocalStore {
    pub fn new() -> Self {
        LocalStore {
            memory: MemoryStore::new(),
            path: None,
            subscriptions: Vec::new(),
        }
    }

    /// Handle one request, returning the lines to write: change events
    /// first (if any), then the response.
    pub async fn handle(&mut self, request: Request) -> Vec<String> {
        let seq = request.seq;
        match self.dispatch(request).await {
            Ok(data) => {
                let mut lines = self.drain_events();
                lines.push(ResponseLine::success(seq, data));
                lines
            }
            Err(err) => vec![ResponseLine::error(seq, &err.to_string(), error_code(&err))],
        }
    }

    async fn dispatch(&mut self, request: Request) -> KanSyncResult<Value> {
        match request.command {
            Command::Get => {
                let cmd: protocol::Get = parse(request.params)?;
                self.ensure_loaded(&cmd.store_config)?;
                let doc = self.memory.get(cmd.collection, &cmd.id).await?;
                to_value(doc)
            }
            Command::Add => {
                let cmd: protocol::Add = parse(request.params)?;
                self.ensure_loaded(&cmd.store_config)?;
                let id = self.memory.add(cmd.collection, cmd.data).await?;
                self.save()?;
                to_value(protocol::AddResponse { id })
            }
            Command::Update => {
                let cmd: protocol::Update = parse(request.params)?;
                self.ensure_loaded(&cmd.store_config)?;
                self.memory
                    .update(cmd.collection, &cmd.id, &cmd.field, cmd.value)
                    .await?;
                self.save()?;
                Ok(Value::Null)
            }
            Command::Delete => {
                let cmd: protocol::Delete = parse(request.params)?;
                self.ensure_loaded(&cmd.store_config)?;
                self.memory.delete(cmd.collection, &cmd.id).await?;
                self.save()?;
                Ok(Value::Null)
            }
            Command::Subscribe => {
                let cmd: protocol::Subscribe = parse(request.params)?;
                self.ensure_loaded(&cmd.store_config)?;
                let subscription = self.memory.subscribe(cmd.collection, cmd.filter).await?;
                self.subscriptions.push(LiveSub {
                    id: cmd.subscription,
                    subscription,
                });
                Ok(Value::Null)
            }
            Command::Unsubscribe => {
                let cmd: protocol::Unsubscribe = parse(request.params)?;
                self.subscriptions.retain(|sub| sub.id != cmd.subscription);
                Ok(Value::Null)
            }
        }
    }

    /// Collect pending changes from every live subscription, in
    /// subscription order, as wire lines.
    fn drain_events(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        for live in &mut self.subscriptions {
            while let Some(change) = live.subscription.try_recv() {
                lines.push(EventEnvelope::line(live.id, change));
            }
        }
        lines
    }

    /// Resolve the data file from the first request's config and load
    /// it. Later requests reuse the already-loaded state.
    fn ensure_loaded(&mut self, config: &StoreConfig) -> KanSyncResult<()> {
        if self.path.is_some() {
            return Ok(());
        }
        let path = data_file_path(config)?;
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let file: StoreFile = serde_json::from_str(&raw)
                .map_err(|e| KanSyncError::Serialization(format!("corrupt store file: {}", e)))?;
            self.memory.load_collection(Collection::Calendars, file.calendars);
            self.memory.load_collection(Collection::Rows, file.rows);
            self.memory.load_collection(Collection::Cards, file.cards);
        }
        self.path = Some(path);
        Ok(())
    }

    fn save(&self) -> KanSyncResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = StoreFile {
            calendars: self.memory.dump_collection(Collection::Calendars),
            rows: self.memory.dump_collection(Collection::Rows),
            cards: self.memory.dump_collection(Collection::Cards),
        };
        let raw = serde_json::to_string_pretty(&file)
            .map_err(|e| KanSyncError::Serialization(e.to_string()))?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

fn data_file_path(config: &StoreConfig) -> KanSyncResult<PathBuf> {
    if let Some(path) = config.get("path").and_then(Value::as_str) {
        return Ok(PathBuf::from(path));
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| KanSyncError::Config("could not determine data directory".to_string()))?;
    Ok(data_dir.join("kansync").join(DEFAULT_FILE_NAME))
}

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> KanSyncResult<T> {
    serde_json::from_value(params)
        .map_err(|e| KanSyncError::Invalid(format!("bad request params: {}", e)))
}

fn to_value(data: impl Serialize) -> KanSyncResult<Value> {
    serde_json::to_value(data).map_err(|e| KanSyncError::Serialization(e.to_string()))
}

fn error_code(err: &KanSyncError) -> Option<ErrorCode> {
    match err {
        KanSyncError::NotFound(_) => Some(ErrorCode::NotFound),
        KanSyncError::PermissionDenied(_) => Some(ErrorCode::PermissionDenied),
        KanSyncError::Invalid(_) => Some(ErrorCode::Invalid),
        KanSyncError::StoreUnavailable(_) | KanSyncError::StoreTimeout(_) => {
            Some(ErrorCode::Unavailable)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kansync_core::Filter;
    use kansync_core::remote::protocol::StoreCommand;
    use serde_json::json;
    use std::path::Path;

    fn request<C: StoreCommand>(seq: u64, cmd: C) -> Request {
        Request {
            seq,
            command: C::command(),
            params: serde_json::to_value(cmd).unwrap(),
        }
    }

    fn config_for(path: &Path) -> StoreConfig {
        let mut config = StoreConfig::new();
        config.insert("path".to_string(), json!(path.to_string_lossy()));
        config
    }

    fn parse_response(line: &str) -> ResponseLine {
        serde_json::from_str(line).unwrap()
    }

    #[tokio::test]
    async fn add_persists_to_file_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let config = config_for(&path);

        let mut store = LocalStore::new();
        let lines = store
            .handle(request(
                0,
                protocol::Add {
                    store_config: config.clone(),
                    collection: Collection::Cards,
                    data: json!({ "text": "buy milk", "row_id": "r1" }),
                },
            ))
            .await;
        let response = parse_response(lines.last().unwrap());
        let id = match response.response {
            protocol::Response::Success { data } => data["id"].as_str().unwrap().to_string(),
            protocol::Response::Error { error, .. } => panic!("add failed: {}", error),
        };

        // A fresh instance reads the same file.
        let mut reopened = LocalStore::new();
        let lines = reopened
            .handle(request(
                1,
                protocol::Get {
                    store_config: config,
                    collection: Collection::Cards,
                    id: id.clone(),
                },
            ))
            .await;
        let response = parse_response(lines.last().unwrap());
        match response.response {
            protocol::Response::Success { data } => {
                assert_eq!(data["id"], json!(id));
                assert_eq!(data["data"]["text"], json!("buy milk"));
            }
            protocol::Response::Error { error, .. } => panic!("get failed: {}", error),
        }
    }

    #[tokio::test]
    async fn missing_document_reports_not_found_code() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir.path().join("store.json"));

        let mut store = LocalStore::new();
        let lines = store
            .handle(request(
                0,
                protocol::Get {
                    store_config: config,
                    collection: Collection::Calendars,
                    id: "nope".to_string(),
                },
            ))
            .await;

        let response = parse_response(&lines[0]);
        match response.response {
            protocol::Response::Error { code, .. } => {
                assert_eq!(code, Some(ErrorCode::NotFound));
            }
            protocol::Response::Success { .. } => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn subscribe_emits_snapshot_events_before_response() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir.path().join("store.json"));

        let mut store = LocalStore::new();
        store
            .handle(request(
                0,
                protocol::Add {
                    store_config: config.clone(),
                    collection: Collection::Cards,
                    data: json!({ "text": "buy milk", "row_id": "r1" }),
                },
            ))
            .await;

        let lines = store
            .handle(request(
                1,
                protocol::Subscribe {
                    store_config: config.clone(),
                    collection: Collection::Cards,
                    filter: Filter::field_eq("row_id", "r1"),
                    subscription: 42,
                },
            ))
            .await;

        assert_eq!(lines.len(), 2);
        let event: EventEnvelope = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(event.event.subscription, 42);
        assert_eq!(event.event.change.doc.str_field("text"), Some("buy milk"));
        assert!(matches!(
            parse_response(&lines[1]).response,
            protocol::Response::Success { .. }
        ));

        // A later mutation reaches the live subscription too.
        let lines = store
            .handle(request(
                2,
                protocol::Add {
                    store_config: config,
                    collection: Collection::Cards,
                    data: json!({ "text": "buy eggs", "row_id": "r1" }),
                },
            ))
            .await;
        assert_eq!(lines.len(), 2);
        let event: EventEnvelope = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(event.event.change.doc.str_field("text"), Some("buy eggs"));
    }
}
