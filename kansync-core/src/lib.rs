//! Core types for the kansync ecosystem.
//!
//! This crate provides everything shared between the kansync CLI and
//! store providers:
//! - `document` and `change` for the persisted data model and the
//!   incremental change events live subscriptions deliver
//! - `store` for the minimal remote-store interface and the in-process
//!   implementation
//! - `remote` for the JSON protocol spoken with external store binaries
//! - `controller` for the calendar/row controllers and their reducers
//! - `ops` for the application-level cascade operations

pub mod auth;
pub mod change;
pub mod controller;
pub mod document;
pub mod error;
pub mod ops;
pub mod remote;
pub mod retry;
pub mod store;

pub use auth::{CurrentUser, User};
pub use change::{Change, ChangeKind, Filter};
pub use document::{Calendar, CalendarMeta, Card, CardView, Collection, Document, Row, RowView};
pub use error::{KanSyncError, KanSyncResult};
pub use store::{Store, Subscription};
