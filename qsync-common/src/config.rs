//! Configuration loading
//!
//! Configuration is resolved once at startup into an immutable [`AppConfig`]
//! that callers pass explicitly to the components that need it.
//!
//! # Sources Priority
//!
//! 1. Command-line arguments (`--database`, `--bind`)
//! 2. Environment variables (`QSYNC_*`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_MASTER_SHEET: &str = "Cotizaciones_Master";
pub const DEFAULT_MASTER_ALIAS: &str = "📦 Cotizaciones_Master";
pub const DEFAULT_BIND: &str = "127.0.0.1:5790";
pub const DEFAULT_SUPABASE_TABLE: &str = "cotizaciones";
pub const DEFAULT_NOCODB_TABLE: &str = "Cotizaciones_Master";

/// Configuration file contents; every field is optional
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to the SQLite file holding the master table
    pub database_path: Option<PathBuf>,
    /// HTTP listen address for the event adapter
    pub bind: Option<String>,
    /// Name of the master table
    pub master_sheet: Option<String>,
    /// Display alias also accepted as the master table
    pub master_sheet_alias: Option<String>,
    /// Dispatch to the record stores on every non-derived edit, not only KPI inputs
    pub sync_on_any_edit: bool,
    /// Per-request timeout for store calls; unset leaves the HTTP client default
    pub request_timeout_secs: Option<u64>,
    pub logging: LoggingConfig,
    pub supabase: SupabaseSettings,
    pub nocodb: NocoDbSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Merge-upsert store (PostgREST/Supabase style)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupabaseSettings {
    pub url: Option<String>,
    pub key: Option<String>,
    pub table: String,
}

impl Default for SupabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            table: DEFAULT_SUPABASE_TABLE.to_string(),
        }
    }
}

impl SupabaseSettings {
    /// Endpoint and credential both present
    pub fn is_configured(&self) -> bool {
        is_set(&self.url) && is_set(&self.key)
    }
}

/// Check-then-write store (NocoDB v2 style)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NocoDbSettings {
    pub url: Option<String>,
    pub token: Option<String>,
    pub project: Option<String>,
    pub table: String,
}

impl Default for NocoDbSettings {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            project: None,
            table: DEFAULT_NOCODB_TABLE.to_string(),
        }
    }
}

impl NocoDbSettings {
    /// Endpoint, credential and project all present
    pub fn is_configured(&self) -> bool {
        is_set(&self.url) && is_set(&self.token) && is_set(&self.project)
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Settings for the external record stores
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetsConfig {
    pub supabase: SupabaseSettings,
    pub nocodb: NocoDbSettings,
    pub request_timeout_secs: Option<u64>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database_path: Option<PathBuf>,
    pub bind: Option<String>,
}

/// Fully resolved, immutable application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub bind: String,
    pub master_sheet: String,
    pub master_sheet_alias: String,
    pub sync_on_any_edit: bool,
    pub log_level: String,
    pub targets: TargetsConfig,
}

impl AppConfig {
    /// Resolve from CLI overrides, process environment and TOML contents
    pub fn resolve(cli: CliOverrides, toml: TomlConfig) -> Self {
        Self::resolve_with(cli, toml, |key| std::env::var(key).ok())
    }

    /// Resolution with an injectable environment lookup
    pub fn resolve_with<F>(cli: CliOverrides, toml: TomlConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let database_path = cli
            .database_path
            .or_else(|| lookup("QSYNC_DATABASE").map(PathBuf::from))
            .or(toml.database_path)
            .unwrap_or_else(default_database_path);

        let bind = cli
            .bind
            .or_else(|| lookup("QSYNC_BIND"))
            .or(toml.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let supabase = SupabaseSettings {
            url: lookup("QSYNC_SUPABASE_URL").or(toml.supabase.url),
            key: lookup("QSYNC_SUPABASE_KEY").or(toml.supabase.key),
            table: lookup("QSYNC_SUPABASE_TABLE").unwrap_or(toml.supabase.table),
        };

        let nocodb = NocoDbSettings {
            url: lookup("QSYNC_NOCODB_URL").or(toml.nocodb.url),
            token: lookup("QSYNC_NOCODB_TOKEN").or(toml.nocodb.token),
            project: lookup("QSYNC_NOCODB_PROJECT").or(toml.nocodb.project),
            table: lookup("QSYNC_NOCODB_TABLE").unwrap_or(toml.nocodb.table),
        };

        Self {
            database_path,
            bind,
            master_sheet: toml
                .master_sheet
                .unwrap_or_else(|| DEFAULT_MASTER_SHEET.to_string()),
            master_sheet_alias: toml
                .master_sheet_alias
                .unwrap_or_else(|| DEFAULT_MASTER_ALIAS.to_string()),
            sync_on_any_edit: toml.sync_on_any_edit,
            log_level: lookup("QSYNC_LOG_LEVEL").unwrap_or(toml.logging.level),
            targets: TargetsConfig {
                supabase,
                nocodb,
                request_timeout_secs: toml.request_timeout_secs,
            },
        }
    }
}

impl TomlConfig {
    /// Parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the given file, or the platform default; missing file → defaults
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => {
                    warn!("Could not determine config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let config = Self::load(&path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// `~/.config/qsync/config.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("qsync").join("config.toml"))
}

/// `~/.local/share/qsync/qsync.db` (platform equivalent elsewhere)
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("qsync"))
        .unwrap_or_else(|| PathBuf::from("./qsync_data"))
        .join("qsync.db")
}
