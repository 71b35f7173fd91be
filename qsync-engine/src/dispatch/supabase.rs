//! Merge-upsert store client (PostgREST / Supabase)
//!
//! One request per record: `POST {url}/rest/v1/{table}` with body `[record]`
//! and `Prefer: resolution=merge-duplicates`, so the store creates or
//! merges by primary key. Any 2xx is success.

use super::{RecordStore, StoreError};
use async_trait::async_trait;
use qsync_common::config::SupabaseSettings;
use reqwest::Url;
use serde_json::{Map, Value};
use std::time::Duration;

const NAME: &str = "supabase";
const PHASE: &str = "upsert";

pub struct SupabaseStore {
    http_client: reqwest::Client,
    settings: SupabaseSettings,
}

impl SupabaseStore {
    pub fn new(settings: SupabaseSettings, timeout: Option<Duration>) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(StoreError::transport)?;
        Ok(Self {
            http_client,
            settings,
        })
    }

    /// `{url}/rest/v1/{table}` with the table name percent-encoded
    pub fn endpoint(&self) -> Result<Url, StoreError> {
        let base = self.settings.url.as_deref().unwrap_or_default().trim();
        let mut url = Url::parse(base).map_err(|e| StoreError::Parse {
            phase: PHASE,
            message: format!("invalid url '{}': {}", base, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Parse {
                phase: PHASE,
                message: format!("url '{}' cannot be a base", base),
            })?
            .pop_if_empty()
            .extend(["rest", "v1", self.settings.table.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    async fn upsert(&self, id: &str, payload: &Map<String, Value>) -> Result<(), StoreError> {
        let url = self.endpoint()?;
        let key = self.settings.key.as_deref().unwrap_or_default();

        tracing::debug!(id = %id, url = %url, "Upserting record into Supabase");

        let response = self
            .http_client
            .post(url)
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[payload])
            .send()
            .await
            .map_err(StoreError::transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            phase: PHASE,
            status: status.as_u16(),
            body,
        })
    }
}
