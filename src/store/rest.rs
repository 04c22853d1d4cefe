//! REST client for the hosted Hearth record store.
//!
//! Rows travel as JSON against `/rest/v1/{table}`. Inserts ask for the
//! representation back so callers get the id the backend assigned. Auth is
//! apikey + Bearer with the same service key.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::error::StoreError;

use super::Store;

pub struct RestStore {
    http: reqwest::Client,
    base: Url,
    api_key: String,
}

impl RestStore {
    /// Build a client against a project base url (e.g.
    /// `https://fam.hearth.dev`) with a service key.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StoreError> {
        let base = Url::parse(base_url)
            .map_err(|e| StoreError::Malformed(format!("bad store url '{}': {}", base_url, e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            api_key: api_key.to_string(),
        })
    }

    /// Build from the configured connection settings.
    pub fn from_config(config: &crate::config::StoreConfig) -> Result<Self, StoreError> {
        Self::new(&config.url, &config.api_key)
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.base
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| StoreError::Malformed(format!("bad table '{}': {}", table, e)))
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Map a non-success response to a `StoreError`. 4xx means the backend
    /// refused the operation (auth, row-level security); 5xx is treated as
    /// transient.
    async fn error_for(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            StoreError::Denied(format!("{}: {}", status, body))
        } else {
            StoreError::Network(format!("{}: {}", status, body))
        }
    }

    async fn rows_from(response: reqwest::Response) -> Result<Vec<Value>, StoreError> {
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::Malformed(format!("expected row array: {}", e)))
    }
}

/// Query pairs for equality filters, in the backend's `col=eq.val` form.
fn eq_filters(filters: &[(&str, String)]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(column, value)| ((*column).to_string(), format!("eq.{}", value)))
        .collect()
}

#[async_trait]
impl Store for RestStore {
    async fn insert(&self, table: &str, record: Value) -> Result<Value, StoreError> {
        let response = self
            .auth(self.http.post(self.table_url(table)?))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let mut rows = Self::rows_from(response).await?;
        if rows.is_empty() {
            return Err(StoreError::Malformed(format!(
                "insert into '{}' returned no representation",
                table
            )));
        }
        Ok(rows.remove(0))
    }

    async fn select(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Value>, StoreError> {
        let response = self
            .auth(self.http.get(self.table_url(table)?))
            .query(&eq_filters(filters))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Self::rows_from(response).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(RestStore::new("not a url", "key").is_err());
    }

    #[test]
    fn test_table_url_shape() {
        let store = RestStore::new("https://fam.hearth.dev", "key").expect("new");
        let url = store.table_url("nudges").expect("url");
        assert_eq!(url.as_str(), "https://fam.hearth.dev/rest/v1/nudges");
    }

    #[test]
    fn test_eq_filter_encoding() {
        let pairs = eq_filters(&[
            ("family_id", "f1".to_string()),
            ("status", "pending".to_string()),
        ]);
        assert_eq!(
            pairs,
            vec![
                ("family_id".to_string(), "eq.f1".to_string()),
                ("status".to_string(), "eq.pending".to_string()),
            ]
        );
    }
}
