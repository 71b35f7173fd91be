//! # qsync Common Library
//!
//! Shared code for the quotation reconciliation workspace:
//! - Cell and record model for the master quotation table
//! - Persistent table access (`Sheet` trait, SQLite and in-memory tables)
//! - Canonical master schema
//! - Configuration loading
//! - Event messages
//! - Time and UUID helpers

pub mod cell;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod record;
pub mod schema;
pub mod sheet;
pub mod time;
pub mod uuid_utils;

pub use cell::CellValue;
pub use error::{Error, Result};
pub use events::RowChanged;
pub use record::Record;
pub use sheet::{PrimaryTable, Sheet};
