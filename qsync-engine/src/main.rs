//! qsync - Row Reconciliation Engine for the quotation master table
//!
//! `qsync serve` runs the HTTP adapter in front of the serial event worker.
//! The other subcommands run one maintenance operation against the table
//! and exit.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use qsync_common::config::{AppConfig, CliOverrides, TomlConfig};
use qsync_common::schema::MASTER_COLUMNS;
use qsync_common::sheet::{MasterSheetNames, SqliteSheet};
use qsync_common::{time, CellValue, RowChanged, Sheet};
use qsync_engine::api::{build_router, AppState};
use qsync_engine::maintenance;
use qsync_engine::worker::{spawn_worker, DEFAULT_QUEUE_CAPACITY};
use qsync_engine::{Dispatcher, Reconciler, TriggerController};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "qsync", version, about = "Reconcile quotation rows and replicate them to external stores")]
struct Cli {
    /// TOML configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database holding the master table
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP adapter and event worker
    Serve {
        /// Listen address, e.g. 127.0.0.1:5790
        #[arg(long)]
        bind: Option<String>,
    },
    /// Reconcile and dispatch every data row
    ResyncAll,
    /// Reconcile and dispatch one data row
    ResyncRow { row: u32 },
    /// Append missing master columns and backfill id / fecha_registro
    UpgradeSchema,
    /// Recompute KPI columns for every row without dispatching
    BackfillKpis,
    /// Write one cell and handle the resulting change event
    Edit {
        row: u32,
        column: String,
        value: String,
    },
    /// Append a row from COLUMN=VALUE pairs and reconcile it
    Add { fields: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config loading logs before the configured level is known
    let bootstrap = tracing_subscriber::fmt().with_max_level(Level::INFO).finish();
    let toml = tracing::subscriber::with_default(bootstrap, || {
        TomlConfig::load_or_default(cli.config.as_deref())
    })?;

    let bind = match &cli.command {
        Command::Serve { bind } => bind.clone(),
        _ => None,
    };
    let config = AppConfig::resolve(
        CliOverrides {
            database_path: cli.database.clone(),
            bind,
        },
        toml,
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting qsync v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());

    let pool = qsync_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;
    let sheet = SqliteSheet::new(pool, config.master_sheet.clone());
    sheet.ensure_headers(MASTER_COLUMNS).await?;
    let sheet: Arc<dyn Sheet> = Arc::new(sheet);

    let dispatcher = Dispatcher::from_config(&config.targets).context("Invalid store configuration")?;
    for (name, configured) in [
        ("supabase", config.targets.supabase.is_configured()),
        ("nocodb", config.targets.nocodb.is_configured()),
    ] {
        if configured {
            info!(store = name, "Record store configured");
        } else {
            warn!(store = name, "Record store not configured; rows will report it as failed");
        }
    }

    let reconciler = Reconciler::new(sheet.clone(), Arc::new(dispatcher));
    let controller = TriggerController::new(
        reconciler.clone(),
        Arc::new(MasterSheetNames::new([
            config.master_sheet.clone(),
            config.master_sheet_alias.clone(),
        ])),
    )
    .with_sync_on_any_edit(config.sync_on_any_edit);

    match cli.command {
        Command::Serve { .. } => serve(&config, controller).await?,
        Command::ResyncAll => println!("{}", maintenance::resync_all(&reconciler).await),
        Command::ResyncRow { row } => println!("{}", maintenance::resync_row(&reconciler, row).await),
        Command::UpgradeSchema => {
            let report = maintenance::upgrade_schema(sheet.as_ref(), time::now()).await?;
            println!("{}", report);
        }
        Command::BackfillKpis => {
            let report = maintenance::backfill_kpis(&reconciler).await?;
            println!("{}", report);
        }
        Command::Edit { row, column, value } => {
            let event = RowChanged::new(config.master_sheet.clone(), row, column);
            let outcome = controller.apply_edit(&event, parse_cell(&value)).await;
            println!("{:?}", outcome);
        }
        Command::Add { fields } => {
            let headers = sheet.headers().await?;
            let mut values = vec![CellValue::Empty; headers.len()];
            for field in &fields {
                let Some((column, value)) = field.split_once('=') else {
                    bail!("Expected COLUMN=VALUE, got '{}'", field);
                };
                let Some(idx) = headers.iter().position(|h| h == column.trim()) else {
                    bail!("Unknown column '{}'", column.trim());
                };
                values[idx] = parse_cell(value);
            }
            let row = sheet.append_row(values).await?;
            println!("Row {}: {}", row, maintenance::resync_row(&reconciler, row).await);
        }
    }

    Ok(())
}

async fn serve(config: &AppConfig, controller: TriggerController) -> Result<()> {
    let (worker, worker_task) = spawn_worker(controller, DEFAULT_QUEUE_CAPACITY);
    let app = build_router(AppState::new(worker));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    // Router (and with it the last worker handle) is gone; let queued work finish
    worker_task.await?;
    Ok(())
}

/// CLI cell value: empty → Empty, decimal → Number, anything else → Text
fn parse_cell(value: &str) -> CellValue {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::text(value),
    }
}
