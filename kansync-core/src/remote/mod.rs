//! Communication with external store provider binaries.

pub mod client;
pub mod protocol;

pub use client::ProcessStore;
pub use protocol::StoreConfig;
