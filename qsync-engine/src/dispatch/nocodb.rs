//! Check-then-write store client (NocoDB v2)
//!
//! Two phases per record, rooted at `{url}/api/v2/tables/{project}/{table}`:
//! 1. `GET rows?where=(id,eq,<id>)` looks for an existing record
//! 2. found → `PATCH rows/{rowId}` using the store's own row identifier,
//!    not found → `POST rows`
//!
//! A failed query fails the target rather than falling through to a create,
//! which could duplicate the record.

use super::{RecordStore, StoreError};
use async_trait::async_trait;
use qsync_common::config::NocoDbSettings;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

const NAME: &str = "nocodb";
const TOKEN_HEADER: &str = "xc-token";

/// Characters with meaning in a `where` expression; ids holding them are refused
const WHERE_RESERVED: [char; 4] = [',', '(', ')', '~'];

/// Keys that may carry the store's internal row identifier, in lookup order
const ROW_ID_KEYS: [&str; 4] = ["Id", "id", "_id", "__id"];

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    list: Vec<Map<String, Value>>,
}

pub struct NocoDbStore {
    http_client: reqwest::Client,
    settings: NocoDbSettings,
}

impl NocoDbStore {
    pub fn new(settings: NocoDbSettings, timeout: Option<Duration>) -> Result<Self, StoreError> {
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

    /// `{url}/api/v2/tables/{project}/{table}/rows[/{extra}]`
    pub fn rows_url(&self, phase: &'static str, row_id: Option<&str>) -> Result<Url, StoreError> {
        let base = self.settings.url.as_deref().unwrap_or_default().trim();
        let project = self.settings.project.as_deref().unwrap_or_default();
        let mut url = Url::parse(base).map_err(|e| StoreError::Parse {
            phase,
            message: format!("invalid url '{}': {}", base, e),
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| StoreError::Parse {
                phase,
                message: format!("url '{}' cannot be a base", base),
            })?;
            segments
                .pop_if_empty()
                .extend(["api", "v2", "tables", project, self.settings.table.as_str(), "rows"]);
            if let Some(row_id) = row_id {
                segments.push(row_id);
            }
        }
        Ok(url)
    }

    fn token(&self) -> &str {
        self.settings.token.as_deref().unwrap_or_default()
    }

    /// Internal row identifier of the record with this `id`, if any
    async fn find_row_id(&self, id: &str) -> Result<Option<String>, StoreError> {
        if id.contains(&WHERE_RESERVED[..]) {
            return Err(StoreError::Parse {
                phase: "query",
                message: format!("id '{}' cannot be used in a where filter", id),
            });
        }
        let mut url = self.rows_url("query", None)?;
        url.query_pairs_mut()
            .append_pair("where", &format!("(id,eq,{})", id));

        let response = self
            .http_client
            .get(url)
            .header(TOKEN_HEADER, self.token())
            .send()
            .await
            .map_err(StoreError::transport)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(StoreError::Status {
                phase: "query",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ListResponse = serde_json::from_str(&body).map_err(|e| StoreError::Parse {
            phase: "query",
            message: e.to_string(),
        })?;

        match parsed.list.first() {
            None => Ok(None),
            Some(existing) => row_id_of(existing).map(Some).ok_or_else(|| StoreError::Parse {
                phase: "query",
                message: "existing row carries no row identifier".to_string(),
            }),
        }
    }

    async fn write(
        &self,
        phase: &'static str,
        request: reqwest::RequestBuilder,
        payload: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let response = request
            .header(TOKEN_HEADER, self.token())
            .json(payload)
            .send()
            .await
            .map_err(StoreError::transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            phase,
            status: status.as_u16(),
            body,
        })
    }
}

/// First non-null identifier among [`ROW_ID_KEYS`], as a string
fn row_id_of(row: &Map<String, Value>) -> Option<String> {
    ROW_ID_KEYS.iter().find_map(|key| match row.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[async_trait]
impl RecordStore for NocoDbStore {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    async fn upsert(&self, id: &str, payload: &Map<String, Value>) -> Result<(), StoreError> {
        match self.find_row_id(id).await? {
            Some(row_id) => {
                tracing::debug!(id = %id, row_id = %row_id, "Updating existing NocoDB row");
                let url = self.rows_url("update", Some(&row_id))?;
                self.write("update", self.http_client.patch(url), payload).await
            }
            None => {
                tracing::debug!(id = %id, "Creating NocoDB row");
                let url = self.rows_url("create", None)?;
                self.write("create", self.http_client.post(url), payload).await
            }
        }
    }
}
