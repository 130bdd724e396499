//! Queue replay

use super::payload::SyncPayload;
use super::report::{AppliedEffect, AppliedOperation, DrainReport, FailedOperation, OperationOutcome};
use crate::config::{ExhaustedPolicy, SyncSettings};
use crate::db::{Database, UnitOfWork, VersionedRepository};
use crate::error::{Error, Result};
use crate::models::SyncOperation;
use crate::store::Recorded;
use crate::util::compact_text;

/// Replays queued device operations against the store.
///
/// Each operation is applied in its own unit of work together with its
/// removal from the queue, so an operation is either fully applied and gone
/// or not applied at all and still queued.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    settings: SyncSettings,
}

impl ReconciliationEngine {
    pub const fn new(settings: SyncSettings) -> Self {
        Self { settings }
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Process every queued operation in order.
    ///
    /// Failures of individual operations are recorded in the report; only a
    /// storage fault on the queue itself fails the drain.
    pub fn drain(&self, db: &mut Database) -> Result<DrainReport> {
        let pending = db.sync_queue().list_all()?;
        let mut report = DrainReport::default();

        for operation in pending {
            if let Some(outcome) = self.process_id(db, &operation.id)? {
                report.record(outcome);
            }
        }

        report.log();
        Ok(report)
    }

    /// Attempt the queued operation with this id. Returns `None` when it is
    /// no longer queued.
    ///
    /// The entry is read back under the unit of work's write lock, so two
    /// drains over the same file never both attempt it. The apply runs under
    /// a savepoint; a failure undoes only the apply, and the retry
    /// bookkeeping commits with the claim.
    pub fn process_id(&self, db: &mut Database, id: &str) -> Result<Option<OperationOutcome>> {
        let uow = db.unit_of_work()?;
        let Some(operation) = uow.sync_queue().get(id)? else {
            uow.rollback()?;
            tracing::debug!(operation_id = %id, "Sync operation no longer queued, skipping");
            return Ok(None);
        };

        let outcome = if operation.is_exhausted(self.settings.max_retries) {
            self.handle_exhausted(&uow, &operation)?
        } else {
            let attempt = uow.attempt(|uow| {
                let effect = apply(uow, &operation)?;
                uow.sync_queue().complete(&operation)?;
                Ok(effect)
            });
            match attempt {
                Ok(effect) => {
                    tracing::info!(
                        operation_id = %operation.id,
                        entity_type = %operation.entity_type,
                        outcome = ?effect,
                        "Applied sync operation"
                    );
                    OperationOutcome::Applied(AppliedOperation {
                        id: operation.id.clone(),
                        entity_type: operation.entity_type.clone(),
                        effect,
                    })
                }
                Err(error) => self.record_failure(&uow, &operation, &error)?,
            }
        };

        uow.commit()?;
        Ok(Some(outcome))
    }

    fn record_failure(
        &self,
        uow: &UnitOfWork<'_>,
        operation: &SyncOperation,
        error: &Error,
    ) -> Result<OperationOutcome> {
        let message = compact_text(&error.to_string());

        let retry_count = uow.sync_queue().bump_retry(&operation.id, &message)?;
        let exhausted = retry_count >= self.settings.max_retries;
        if exhausted && self.settings.exhausted_policy == ExhaustedPolicy::DeadLetter {
            uow.sync_queue().move_to_dead_letter(&operation.id)?;
        }

        let failed = FailedOperation {
            id: operation.id.clone(),
            entity_type: operation.entity_type.clone(),
            retry_count,
            error: message,
        };

        if exhausted {
            tracing::warn!(
                operation_id = %operation.id,
                entity_type = %operation.entity_type,
                retry_count,
                policy = %self.settings.exhausted_policy,
                error = %failed.error,
                "Sync operation exhausted its retries"
            );
            Ok(OperationOutcome::Exhausted(failed))
        } else {
            tracing::warn!(
                operation_id = %operation.id,
                entity_type = %operation.entity_type,
                retry_count,
                error = %failed.error,
                "Sync operation deferred"
            );
            Ok(OperationOutcome::Deferred(failed))
        }
    }

    /// An entry already at its retry cap is never applied again. Under the
    /// retain policy it is reported on every pass; under dead-letter it is
    /// moved out (e.g. after the policy was switched).
    fn handle_exhausted(
        &self,
        uow: &UnitOfWork<'_>,
        operation: &SyncOperation,
    ) -> Result<OperationOutcome> {
        if self.settings.exhausted_policy == ExhaustedPolicy::DeadLetter {
            uow.sync_queue().move_to_dead_letter(&operation.id)?;
        }

        let error = Error::Exhausted {
            operation_id: operation.id.clone(),
            retry_count: operation.retry_count,
        };
        tracing::debug!(operation_id = %operation.id, "Skipping exhausted sync operation");

        Ok(OperationOutcome::Exhausted(FailedOperation {
            id: operation.id.clone(),
            entity_type: operation.entity_type.clone(),
            retry_count: operation.retry_count,
            error: operation
                .last_error
                .clone()
                .unwrap_or_else(|| error.to_string()),
        }))
    }
}

fn apply(uow: &UnitOfWork<'_>, operation: &SyncOperation) -> Result<AppliedEffect> {
    let effect = match SyncPayload::decode(operation)? {
        SyncPayload::Product(product) => uow.products().reconcile(product)?.into(),
        SyncPayload::User(user) => uow.users().reconcile(user)?.into(),
        SyncPayload::Sale(entry) => recorded(&uow.transactions().create_sale(entry)?),
        SyncPayload::Purchase(entry) => recorded(&uow.transactions().create_purchase(entry)?),
    };
    Ok(effect)
}

const fn recorded<T>(outcome: &Recorded<T>) -> AppliedEffect {
    match outcome {
        Recorded::Created(_) => AppliedEffect::Recorded,
        Recorded::Replayed => AppliedEffect::Replayed,
    }
}
