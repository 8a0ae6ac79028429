//! Defines the JSON protocol used for communication between kansync
//! and store provider binaries over stdin/stdout.
//!
//! One JSON value per line. The client writes `Request` lines; the
//! provider answers each with a `Response` line, and may interleave
//! unsolicited `EventEnvelope` lines carrying subscription changes.
//! Initial snapshot events for a subscription are written before that
//! subscription's success response, so a client that has awaited
//! `subscribe` can synchronously drain the current state.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::change::{Change, Filter};
use crate::document::{Collection, Document};

/// Free-form provider configuration passed with every command (e.g. the
/// local provider's data file path). Providers own its interpretation.
pub type StoreConfig = serde_json::Map<String, Value>;

pub trait StoreCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Get,
    Add,
    Update,
    Delete,
    Subscribe,
    Unsubscribe,
}

/// Request sent from the client to the provider. `seq` is echoed on the
/// response line so the client can correlate responses with in-flight
/// calls on the shared stream.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    pub command: Command,
    #[serde(default)]
    pub params: Value,
}

/// Machine-readable failure classification, so clients can map provider
/// failures onto the error taxonomy without parsing message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    PermissionDenied,
    Invalid,
    Unavailable,
}

/// Response sent from the provider to the client.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success {
        data: T,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

/// A full response line: the echoed request seq plus the response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseLine {
    pub seq: u64,
    #[serde(flatten)]
    pub response: Response<Value>,
}

impl ResponseLine {
    pub fn success(seq: u64, data: impl Serialize) -> String {
        serde_json::to_string(&ResponseLine {
            seq,
            response: Response::Success {
                data: serde_json::to_value(data).unwrap_or(Value::Null),
            },
        })
        .unwrap()
    }

    pub fn error(seq: u64, msg: &str, code: Option<ErrorCode>) -> String {
        serde_json::to_string(&ResponseLine {
            seq,
            response: Response::Error {
                error: msg.to_string(),
                code,
            },
        })
        .unwrap()
    }
}

/// An unsolicited change notification for one subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub subscription: u64,
    pub change: Change,
}

/// Wire envelope distinguishing event lines from response lines.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: ChangeNotice,
}

impl EventEnvelope {
    pub fn line(subscription: u64, change: Change) -> String {
        serde_json::to_string(&EventEnvelope {
            event: ChangeNotice {
                subscription,
                change,
            },
        })
        .unwrap()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Point read of one document.
#[derive(Debug, Serialize, Deserialize)]
pub struct Get {
    pub store_config: StoreConfig,
    pub collection: Collection,
    pub id: String,
}

impl StoreCommand for Get {
    type Response = Document;
    fn command() -> Command {
        Command::Get
    }
}

/// Insert a document; the provider generates and returns the id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Add {
    pub store_config: StoreConfig,
    pub collection: Collection,
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddResponse {
    pub id: String,
}

impl StoreCommand for Add {
    type Response = AddResponse;
    fn command() -> Command {
        Command::Add
    }
}

/// Update one (possibly dotted) field of a document.
#[derive(Debug, Serialize, Deserialize)]
pub struct Update {
    pub store_config: StoreConfig,
    pub collection: Collection,
    pub id: String,
    pub field: String,
    pub value: Value,
}

impl StoreCommand for Update {
    type Response = ();
    fn command() -> Command {
        Command::Update
    }
}

/// Delete one document.
#[derive(Debug, Serialize, Deserialize)]
pub struct Delete {
    pub store_config: StoreConfig,
    pub collection: Collection,
    pub id: String,
}

impl StoreCommand for Delete {
    type Response = ();
    fn command() -> Command {
        Command::Delete
    }
}

/// Open a live subscription. The subscription id is client-assigned so
/// the client can register its routing before any event line exists.
#[derive(Debug, Serialize, Deserialize)]
pub struct Subscribe {
    pub store_config: StoreConfig,
    pub collection: Collection,
    pub filter: Filter,
    pub subscription: u64,
}

impl StoreCommand for Subscribe {
    type Response = ();
    fn command() -> Command {
        Command::Subscribe
    }
}

/// Release a live subscription.
#[derive(Debug, Serialize, Deserialize)]
pub struct Unsubscribe {
    pub subscription: u64,
}

impl StoreCommand for Unsubscribe {
    type Response = ();
    fn command() -> Command {
        Command::Unsubscribe
    }
}
