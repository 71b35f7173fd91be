//! Database initialization for the SQLite-backed table store

pub mod init;

pub use init::*;
