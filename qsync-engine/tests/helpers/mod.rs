//! Test Helper Utilities
//!
//! Local axum servers standing in for the two remote record stores, plus
//! configuration builders pointing at them.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use qsync_common::config::{NocoDbSettings, SupabaseSettings, TargetsConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const SUPABASE_TABLE: &str = "cotizaciones";
pub const NOCODB_PROJECT: &str = "p_test";
pub const NOCODB_TABLE: &str = "Cotizaciones_Master";

/// Serve `app` on an ephemeral local port; returns the base URL
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// One request observed by a mock store
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: &'static str,
    pub path: String,
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub body: Value,
}

// ---------------------------------------------------------------------------
// Merge-upsert store
// ---------------------------------------------------------------------------

pub struct SupabaseMock {
    pub status: StatusCode,
    pub body: String,
    pub requests: Mutex<Vec<Captured>>,
}

impl SupabaseMock {
    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

async fn supabase_upsert(
    State(mock): State<Arc<SupabaseMock>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    mock.requests.lock().unwrap().push(Captured {
        method: "POST",
        path: format!("/rest/v1/{}", table),
        headers,
        query: HashMap::new(),
        body,
    });
    (mock.status, mock.body.clone())
}

/// Start a merge-upsert store answering every upsert with `status`/`body`
pub async fn start_supabase(status: StatusCode, body: &str) -> (String, Arc<SupabaseMock>) {
    let mock = Arc::new(SupabaseMock {
        status,
        body: body.to_string(),
        requests: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/rest/v1/:table", post(supabase_upsert))
        .with_state(mock.clone());
    (spawn_server(app).await, mock)
}

pub fn supabase_settings(url: &str) -> SupabaseSettings {
    SupabaseSettings {
        url: Some(url.to_string()),
        key: Some("service-key".to_string()),
        table: SUPABASE_TABLE.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Check-then-write store
// ---------------------------------------------------------------------------

pub struct NocoDbMock {
    /// Rows returned by the query phase
    pub existing: Vec<Value>,
    pub query_status: StatusCode,
    pub write_status: StatusCode,
    pub requests: Mutex<Vec<Captured>>,
}

impl NocoDbMock {
    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.requests().iter().map(|c| c.method).collect()
    }
}

async fn nocodb_list(
    State(mock): State<Arc<NocoDbMock>>,
    Path((project, table)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    mock.requests.lock().unwrap().push(Captured {
        method: "GET",
        path: format!("/api/v2/tables/{}/{}/rows", project, table),
        headers,
        query,
        body: Value::Null,
    });
    if !mock.query_status.is_success() {
        return (mock.query_status, Json(json!({ "msg": "query failed" })));
    }
    (StatusCode::OK, Json(json!({ "list": mock.existing, "pageInfo": {} })))
}

async fn nocodb_create(
    State(mock): State<Arc<NocoDbMock>>,
    Path((project, table)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    mock.requests.lock().unwrap().push(Captured {
        method: "POST",
        path: format!("/api/v2/tables/{}/{}/rows", project, table),
        headers,
        query: HashMap::new(),
        body,
    });
    (mock.write_status, "{}".to_string())
}

async fn nocodb_update(
    State(mock): State<Arc<NocoDbMock>>,
    Path((project, table, row_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    mock.requests.lock().unwrap().push(Captured {
        method: "PATCH",
        path: format!("/api/v2/tables/{}/{}/rows/{}", project, table, row_id),
        headers,
        query: HashMap::new(),
        body,
    });
    (mock.write_status, "{}".to_string())
}

/// Start a check-then-write store whose query phase returns `existing`
pub async fn start_nocodb(
    existing: Vec<Value>,
    query_status: StatusCode,
    write_status: StatusCode,
) -> (String, Arc<NocoDbMock>) {
    let mock = Arc::new(NocoDbMock {
        existing,
        query_status,
        write_status,
        requests: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route(
            "/api/v2/tables/:project/:table/rows",
            get(nocodb_list).post(nocodb_create),
        )
        .route("/api/v2/tables/:project/:table/rows/:row_id", patch(nocodb_update))
        .with_state(mock.clone());
    (spawn_server(app).await, mock)
}

pub fn nocodb_settings(url: &str) -> NocoDbSettings {
    NocoDbSettings {
        url: Some(url.to_string()),
        token: Some("noco-token".to_string()),
        project: Some(NOCODB_PROJECT.to_string()),
        table: NOCODB_TABLE.to_string(),
    }
}

pub fn targets(supabase_url: &str, nocodb_url: &str) -> TargetsConfig {
    TargetsConfig {
        supabase: supabase_settings(supabase_url),
        nocodb: nocodb_settings(nocodb_url),
        request_timeout_secs: Some(5),
    }
}
