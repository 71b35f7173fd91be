//! Upsert Dispatcher
//!
//! Sends an enriched record to every configured external record store and
//! aggregates per-target outcomes. Targets are attempted independently and
//! in order; one target failing never stops the next one. There is no
//! rollback of targets that already succeeded: replication is at-least-once
//! and the stores may diverge after a partial failure.
//!
//! Aggregation: the overall call succeeds only if every target succeeded.
//! An unconfigured target is not attempted, but it still makes the overall
//! result unsuccessful.

pub mod nocodb;
pub mod supabase;

pub use nocodb::NocoDbStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use qsync_common::config::TargetsConfig;
use qsync_common::Record;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Record store failure, rendered into the per-target detail string
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection, DNS, TLS or timeout failure
    #[error("transport: {0}")]
    Transport(String),

    /// Non-2xx response in the given phase
    #[error("{phase} {status}: {body}")]
    Status {
        phase: &'static str,
        status: u16,
        body: String,
    },

    /// Response or endpoint could not be interpreted
    #[error("{phase} parse: {message}")]
    Parse { phase: &'static str, message: String },
}

impl StoreError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// A remote store with create-or-update-by-id semantics
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Target identifier used in outcome details and logs
    fn name(&self) -> &str;

    /// Endpoint and credentials present
    fn is_configured(&self) -> bool;

    /// Create or update `payload` keyed by its `id` field
    async fn upsert(&self, id: &str, payload: &Map<String, Value>) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Synced,
    Unconfigured,
    Failed,
}

/// Result of one target for one record
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOutcome {
    pub target: String,
    pub kind: OutcomeKind,
    pub detail: String,
}

impl TargetOutcome {
    pub fn succeeded(&self) -> bool {
        self.kind == OutcomeKind::Synced
    }
}

/// Aggregated result over all targets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub outcomes: Vec<TargetOutcome>,
}

impl DispatchReport {
    /// AND over every target (vacuously true with no targets)
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::succeeded)
    }

    /// Failure reasons joined with `" | "`; empty on success
    pub fn detail(&self) -> String {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.detail.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded() {
            write!(f, "ok ({} targets)", self.outcomes.len())
        } else {
            write!(f, "{}", self.detail())
        }
    }
}

pub struct Dispatcher {
    stores: Vec<Box<dyn RecordStore>>,
}

impl Dispatcher {
    pub fn new(stores: Vec<Box<dyn RecordStore>>) -> Self {
        Self { stores }
    }

    /// Both record stores, configured or not, built from startup configuration
    pub fn from_config(config: &TargetsConfig) -> Result<Self, StoreError> {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        Ok(Self::new(vec![
            Box::new(SupabaseStore::new(config.supabase.clone(), timeout)?),
            Box::new(NocoDbStore::new(config.nocodb.clone(), timeout)?),
        ]))
    }

    /// Upsert `record` into every target
    pub async fn dispatch(&self, record: &Record) -> DispatchReport {
        let Some(id) = record.id() else {
            // Identity is assigned before dispatch; reaching here means a caller skipped it.
            let outcomes = self
                .stores
                .iter()
                .map(|store| TargetOutcome {
                    target: store.name().to_string(),
                    kind: OutcomeKind::Failed,
                    detail: format!("{} refused: record has no id", store.name()),
                })
                .collect();
            return DispatchReport { outcomes };
        };

        let payload = record.to_payload();
        let mut outcomes = Vec::with_capacity(self.stores.len());

        for store in &self.stores {
            let target = store.name().to_string();
            let outcome = if !store.is_configured() {
                TargetOutcome {
                    detail: format!("{} not configured", target),
                    target,
                    kind: OutcomeKind::Unconfigured,
                }
            } else {
                match store.upsert(&id, &payload).await {
                    Ok(()) => {
                        debug!(store = %target, id = %id, "Upsert succeeded");
                        TargetOutcome {
                            detail: String::new(),
                            target,
                            kind: OutcomeKind::Synced,
                        }
                    }
                    Err(err) => {
                        warn!(store = %target, id = %id, error = %err, "Upsert failed");
                        TargetOutcome {
                            detail: format!("{} {}", target, err),
                            target,
                            kind: OutcomeKind::Failed,
                        }
                    }
                }
            };
            outcomes.push(outcome);
        }

        DispatchReport { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsync_common::CellValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeStore {
        name: &'static str,
        configured: bool,
        fail_with: Option<(u16, &'static str)>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeStore {
        fn boxed(
            name: &'static str,
            configured: bool,
            fail_with: Option<(u16, &'static str)>,
            calls: &Arc<AtomicUsize>,
        ) -> Box<dyn RecordStore> {
            Box::new(Self {
                name,
                configured,
                fail_with,
                calls: calls.clone(),
            })
        }
    }

    #[async_trait]
    impl RecordStore for FakeStore {
        fn name(&self) -> &str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn upsert(&self, _id: &str, _payload: &Map<String, Value>) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some((status, body)) => Err(StoreError::Status {
                    phase: "upsert",
                    status,
                    body: body.to_string(),
                }),
                None => Ok(()),
            }
        }
    }

    fn record_with_id() -> Record {
        Record::from_row(&["id".to_string()], vec![CellValue::text("r-1")]).unwrap()
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_targets() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![
            FakeStore::boxed("supabase", true, Some((500, "db error")), &calls),
            FakeStore::boxed("nocodb", true, None, &calls),
        ]);

        let report = dispatcher.dispatch(&record_with_id()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!report.succeeded());
        assert!(report.detail().contains("500: db error"));
        assert!(report.outcomes[1].succeeded());
    }

    #[tokio::test]
    async fn test_unconfigured_target_is_not_attempted_but_fails_overall() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![
            FakeStore::boxed("supabase", false, None, &calls),
            FakeStore::boxed("nocodb", true, None, &calls),
        ]);

        let report = dispatcher.dispatch(&record_with_id()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.outcomes[0].kind, OutcomeKind::Unconfigured);
        assert!(!report.succeeded());
        assert_eq!(report.detail(), "supabase not configured");
    }

    #[tokio::test]
    async fn test_all_targets_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![
            FakeStore::boxed("supabase", true, None, &calls),
            FakeStore::boxed("nocodb", true, None, &calls),
        ]);
        let report = dispatcher.dispatch(&record_with_id()).await;
        assert!(report.succeeded());
        assert_eq!(report.detail(), "");
    }

    #[tokio::test]
    async fn test_failure_details_are_joined() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![
            FakeStore::boxed("supabase", true, Some((500, "db error")), &calls),
            FakeStore::boxed("nocodb", true, Some((422, "bad field")), &calls),
        ]);
        let report = dispatcher.dispatch(&record_with_id()).await;
        assert_eq!(
            report.detail(),
            "supabase upsert 500: db error | nocodb upsert 422: bad field"
        );
    }

    #[tokio::test]
    async fn test_no_targets_is_vacuous_success() {
        let report = Dispatcher::new(Vec::new()).dispatch(&record_with_id()).await;
        assert!(report.succeeded());
        assert!(report.outcomes.is_empty());
    }

    /// Records the lookup key and the payload's `id` field of every upsert
    struct CapturingStore {
        seen: Arc<std::sync::Mutex<Vec<(String, Value)>>>,
    }

    #[async_trait]
    impl RecordStore for CapturingStore {
        fn name(&self) -> &str {
            "capturing"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn upsert(&self, id: &str, payload: &Map<String, Value>) -> Result<(), StoreError> {
            let payload_id = payload.get("id").cloned().unwrap_or(Value::Null);
            self.seen.lock().unwrap().push((id.to_string(), payload_id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lookup_key_matches_payload_id() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![Box::new(CapturingStore { seen: seen.clone() })]);
        let record = Record::from_row(&["id".to_string()], vec![CellValue::text(" abc-1 ")]).unwrap();

        let report = dispatcher.dispatch(&record).await;

        assert!(report.succeeded());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (key, payload_id) = &seen[0];
        assert_eq!(payload_id, &Value::String(key.clone()));
        assert_eq!(key, " abc-1 ");
    }

    #[tokio::test]
    async fn test_record_without_id_is_refused() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![FakeStore::boxed("supabase", true, None, &calls)]);
        let record = Record::from_row(&["id".to_string()], vec![CellValue::Empty]).unwrap();
        let report = dispatcher.dispatch(&record).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!report.succeeded());
    }
}
