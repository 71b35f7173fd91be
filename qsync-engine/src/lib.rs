//! qsync-engine: Row Reconciliation Engine
//!
//! Keeps derived KPIs and the two external replicas of every master-table
//! row consistent with the table. Exposes the pipeline components for the
//! `qsync` binary and for integration testing.

pub mod api;
pub mod bulk;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod kpi;
pub mod maintenance;
pub mod normalizer;
pub mod reconcile;
pub mod trigger;
pub mod worker;

pub use crate::bulk::{BulkJob, BulkSummary};
pub use crate::dispatch::{DispatchReport, Dispatcher, RecordStore};
pub use crate::error::{ApiError, PipelineError};
pub use crate::reconcile::Reconciler;
pub use crate::trigger::{TriggerController, TriggerOutcome};
