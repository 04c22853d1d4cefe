//! Asynchronous record store capability.
//!
//! The pipeline treats persistence as an external collaborator: an insert /
//! select interface over named tables of JSON rows. `MemoryStore` backs
//! tests and demo mode; `RestStore` talks to the hosted Hearth backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Table receiving the best-effort signal log.
pub const SIGNALS_TABLE: &str = "signals";
/// Table receiving created nudges.
pub const NUDGES_TABLE: &str = "nudges";
/// Family calendar events (scanner input).
pub const EVENTS_TABLE: &str = "events";
/// Family members (scanner input).
pub const MEMBERS_TABLE: &str = "members";

/// Asynchronous record store over named tables of JSON rows.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a record and return the stored row, with the id the store
    /// assigned.
    async fn insert(&self, table: &str, record: Value) -> Result<Value, StoreError>;

    /// Select rows matching all equality filters (column, value).
    async fn select(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Value>, StoreError>;
}
