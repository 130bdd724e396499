//! Device push and queue drain service.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::database::DatabaseService;
use crate::config::SyncSettings;
use crate::db::EnqueueOutcome;
use crate::models::{NewSyncOperation, SyncOperation};
use crate::sync::{DrainReport, PushResponse, ReconciliationEngine};
use crate::Result;

/// What happened to each operation of a pushed batch at enqueue time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnqueueSummary {
    pub queued: Vec<String>,
    pub already_queued: Vec<String>,
    pub already_applied: Vec<String>,
    pub dead_lettered: Vec<String>,
}

impl EnqueueSummary {
    fn record(&mut self, id: String, outcome: &EnqueueOutcome) {
        match outcome {
            EnqueueOutcome::Queued(_) => self.queued.push(id),
            EnqueueOutcome::AlreadyQueued => self.already_queued.push(id),
            EnqueueOutcome::AlreadyApplied => self.already_applied.push(id),
            EnqueueOutcome::DeadLettered => self.dead_lettered.push(id),
        }
    }
}

/// Accepts device batches and replays the queue.
///
/// Drains are single-flight. Each operation takes the database lock only for
/// its own unit of work, so pushes keep enqueuing while a drain runs. Store
/// work runs on the blocking pool, never on a runtime worker.
#[derive(Clone)]
pub struct SyncService {
    database: DatabaseService,
    engine: ReconciliationEngine,
    drain_lock: Arc<Mutex<()>>,
}

impl SyncService {
    pub fn new(database: DatabaseService, settings: SyncSettings) -> Self {
        Self {
            database,
            engine: ReconciliationEngine::new(settings),
            drain_lock: Arc::new(Mutex::new(())),
        }
    }

    pub const fn database(&self) -> &DatabaseService {
        &self.database
    }

    pub const fn settings(&self) -> &SyncSettings {
        self.engine.settings()
    }

    /// Durably enqueue a batch, all or nothing, in the given order.
    pub async fn enqueue_batch(&self, operations: Vec<NewSyncOperation>) -> Result<EnqueueSummary> {
        let operations = operations
            .into_iter()
            .map(NewSyncOperation::normalized)
            .collect::<Result<Vec<_>>>()?;

        let total = operations.len();
        let summary = self
            .database
            .blocking(move |db| {
                let uow = db.unit_of_work()?;
                let mut summary = EnqueueSummary::default();
                for operation in &operations {
                    let outcome = uow.sync_queue().enqueue(operation)?;
                    if !matches!(outcome, EnqueueOutcome::Queued(_)) {
                        tracing::debug!(
                            operation_id = %operation.id,
                            ?outcome,
                            "Operation not queued"
                        );
                    }
                    summary.record(operation.id.clone(), &outcome);
                }
                uow.commit()?;
                Ok(summary)
            })
            .await?;

        tracing::info!(
            queued = summary.queued.len(),
            duplicates = total - summary.queued.len(),
            "Enqueued sync batch"
        );
        Ok(summary)
    }

    /// Replay every operation queued when the drain starts.
    pub async fn drain(&self) -> Result<DrainReport> {
        let _guard = self.drain_lock.lock().await;

        let pending: Vec<String> = self
            .database
            .list_queue()
            .await?
            .into_iter()
            .map(|operation| operation.id)
            .collect();

        let mut report = DrainReport::default();
        for id in pending {
            let engine = self.engine.clone();
            let outcome = self
                .database
                .blocking(move |db| engine.process_id(db, &id))
                .await?;
            if let Some(outcome) = outcome {
                report.record(outcome);
            }
        }

        report.log();
        Ok(report)
    }

    /// Enqueue a device batch, then drain the whole queue.
    ///
    /// Fails only when the batch could not be enqueued. A drain fault after
    /// enqueue is reported as a partial failure; the batch stays queued.
    pub async fn push(&self, operations: Vec<NewSyncOperation>) -> Result<PushResponse> {
        self.enqueue_batch(operations).await?;

        match self.drain().await {
            Ok(report) => Ok(PushResponse::from_report(&report)),
            Err(error) => {
                tracing::error!("Drain after push failed: {error}");
                Ok(PushResponse::drain_failed(&error))
            }
        }
    }

    /// Reset an operation's retry budget, restoring it from the dead-letter
    /// table if needed.
    pub async fn requeue(&self, id: &str) -> Result<SyncOperation> {
        let id = id.to_string();
        let operation = self
            .database
            .blocking(move |db| db.sync_queue().requeue(&id))
            .await?;
        tracing::info!(operation_id = %operation.id, "Requeued sync operation");
        Ok(operation)
    }
}
