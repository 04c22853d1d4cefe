//! In-memory store for tests and demo mode.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

use super::Store;

/// Id prefix per table, matching the backend's row id convention.
fn id_prefix(table: &str) -> &'static str {
    match table {
        super::NUDGES_TABLE => "n",
        super::SIGNALS_TABLE => "sig",
        super::EVENTS_TABLE => "e",
        super::MEMBERS_TABLE => "m",
        _ => "row",
    }
}

/// Table map of JSON rows behind a non-poisoning lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a table's rows, for assertions and the demo binary.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

fn row_matches(row: &Value, filters: &[(&str, String)]) -> bool {
    filters.iter().all(|(column, want)| match row.get(*column) {
        Some(Value::String(s)) => s == want,
        Some(other) => other.to_string() == *want,
        None => false,
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, table: &str, record: Value) -> Result<Value, StoreError> {
        let mut row = match record {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Malformed(format!(
                    "insert into '{}' requires an object, got {}",
                    table, other
                )))
            }
        };

        if !row.contains_key("id") {
            row.insert(
                "id".to_string(),
                Value::String(format!("{}-{}", id_prefix(table), Uuid::new_v4())),
            );
        }
        if !row.contains_key("created_at") {
            row.insert(
                "created_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        let stored = Value::Object(row);
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn select(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .tables
            .lock()
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row_matches(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NUDGES_TABLE;

    #[tokio::test]
    async fn test_insert_assigns_id_and_created_at() {
        let store = MemoryStore::new();
        let row = store
            .insert(NUDGES_TABLE, serde_json::json!({ "family_id": "f1" }))
            .await
            .expect("insert");

        let id = row.get("id").and_then(|v| v.as_str()).expect("id");
        assert!(id.starts_with("n-"));
        assert!(row.get("created_at").and_then(|v| v.as_str()).is_some());
    }

    #[tokio::test]
    async fn test_insert_rejects_non_object() {
        let store = MemoryStore::new();
        let err = store
            .insert(NUDGES_TABLE, serde_json::json!("not a row"))
            .await
            .expect_err("should reject");
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_select_applies_equality_filters() {
        let store = MemoryStore::new();
        store
            .insert(NUDGES_TABLE, serde_json::json!({ "family_id": "f1", "status": "pending" }))
            .await
            .expect("insert 1");
        store
            .insert(NUDGES_TABLE, serde_json::json!({ "family_id": "f2", "status": "pending" }))
            .await
            .expect("insert 2");

        let rows = store
            .select(NUDGES_TABLE, &[("family_id", "f1".to_string())])
            .await
            .expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("family_id").and_then(|v| v.as_str()), Some("f1"));

        let none = store
            .select(NUDGES_TABLE, &[("family_id", "f3".to_string())])
            .await
            .expect("select empty");
        assert!(none.is_empty());
    }
}
