//! Serial event worker
//!
//! Change events and manual resync requests are queued on a bounded channel
//! and handled by a single task, one command at a time, so two handlers never
//! run against the table concurrently. Each command runs in its own task; a
//! panic is logged and the worker keeps consuming.

use crate::maintenance;
use crate::trigger::{TriggerController, TriggerOutcome};
use qsync_common::{CellValue, RowChanged};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Default command queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum WorkerCommand {
    /// Fire-and-forget change notification; with a `value`, the cell is
    /// written before the change is handled
    RowChanged {
        event: RowChanged,
        value: Option<CellValue>,
    },
    /// Manual resync of one row; replies with the human-readable summary
    ResyncRow {
        row: u32,
        reply: oneshot::Sender<String>,
    },
    /// Bulk resync; replies with the human-readable summary
    ResyncAll { reply: oneshot::Sender<String> },
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("event worker has stopped")]
    Stopped,
}

/// Sending side of the worker queue
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    /// Queue a change event; returns once it is queued, not once handled
    pub async fn submit(&self, event: RowChanged) -> Result<(), WorkerError> {
        self.send(WorkerCommand::RowChanged { event, value: None }).await
    }

    /// Queue a cell write together with its change event
    pub async fn submit_edit(&self, event: RowChanged, value: CellValue) -> Result<(), WorkerError> {
        self.send(WorkerCommand::RowChanged {
            event,
            value: Some(value),
        })
        .await
    }

    async fn send(&self, command: WorkerCommand) -> Result<(), WorkerError> {
        self.tx.send(command).await.map_err(|_| WorkerError::Stopped)
    }

    pub async fn resync_row(&self, row: u32) -> Result<String, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.request(WorkerCommand::ResyncRow { row, reply }, rx).await
    }

    pub async fn resync_all(&self) -> Result<String, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.request(WorkerCommand::ResyncAll { reply }, rx).await
    }

    async fn request(
        &self,
        command: WorkerCommand,
        rx: oneshot::Receiver<String>,
    ) -> Result<String, WorkerError> {
        self.send(command).await?;
        rx.await.map_err(|_| WorkerError::Stopped)
    }
}

/// Start the worker; it stops once every [`WorkerHandle`] is dropped
pub fn spawn_worker(controller: TriggerController, capacity: usize) -> (WorkerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(run_worker(controller, rx));
    (WorkerHandle { tx }, task)
}

async fn run_worker(controller: TriggerController, mut rx: mpsc::Receiver<WorkerCommand>) {
    info!("Event worker started");

    while let Some(command) = rx.recv().await {
        debug!(?command, "Processing worker command");
        let controller = controller.clone();
        let task = tokio::spawn(async move { execute(&controller, command).await });
        if let Err(e) = task.await {
            error!(error = %e, "Worker command panicked");
        }
    }

    info!("Event worker shutting down");
}

async fn execute(controller: &TriggerController, command: WorkerCommand) {
    match command {
        WorkerCommand::RowChanged { event, value } => {
            let outcome = match value {
                Some(value) => controller.apply_edit(&event, value).await,
                None => controller.handle(&event).await,
            };
            if let TriggerOutcome::Failed { row, error } = outcome {
                debug!(row, error = %error, "Change event failed");
            }
        }
        WorkerCommand::ResyncRow { row, reply } => {
            let summary = maintenance::resync_row(controller.reconciler(), row).await;
            // The requester may have gone away; the resync itself already happened.
            let _ = reply.send(summary);
        }
        WorkerCommand::ResyncAll { reply } => {
            let summary = maintenance::resync_all(controller.reconciler()).await;
            let _ = reply.send(summary);
        }
    }
}
