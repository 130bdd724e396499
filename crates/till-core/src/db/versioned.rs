//! Last-writer-wins reconciliation over versioned rows

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::Versioned;
use crate::util::unix_millis_now;

/// What a reconcile call did to the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// No row existed; the incoming record was inserted
    Inserted,
    /// The incoming version was newer and replaced the stored row
    Updated,
    /// The incoming version was not newer; nothing changed
    Skipped,
}

/// Storage for an entity ordered by a per-id version counter
pub trait VersionedRepository {
    type Record: Versioned;

    fn find(&self, id: &str) -> Result<Option<Self::Record>>;

    fn insert(&self, record: &Self::Record) -> Result<()>;

    /// Overwrite every mutable column, but only while the stored version
    /// still equals `expected_version`. Returns the number of rows changed.
    fn update_if_version(&self, record: &Self::Record, expected_version: i64) -> Result<usize>;

    /// Insert when absent, replace when strictly newer, skip otherwise.
    ///
    /// The conditional update closes the window between read and write: if
    /// another writer moved the row first, the call fails with
    /// [`Error::VersionConflict`] instead of clobbering the newer state.
    fn reconcile(&self, mut incoming: Self::Record) -> Result<ReconcileOutcome> {
        let now = unix_millis_now();
        incoming.normalize(now);

        let Some(existing) = self.find(incoming.id())? else {
            self.insert(&incoming)?;
            tracing::debug!(
                entity = <Self::Record as Versioned>::ENTITY,
                id = incoming.id(),
                version = incoming.version(),
                "Inserted record"
            );
            return Ok(ReconcileOutcome::Inserted);
        };

        if incoming.version() <= existing.version() {
            tracing::debug!(
                entity = <Self::Record as Versioned>::ENTITY,
                id = incoming.id(),
                incoming = incoming.version(),
                stored = existing.version(),
                "Skipped stale record"
            );
            return Ok(ReconcileOutcome::Skipped);
        }

        incoming.touch(now);
        let rows = self.update_if_version(&incoming, existing.version())?;
        if rows == 0 {
            return Err(Error::VersionConflict {
                entity: <Self::Record as Versioned>::ENTITY,
                id: incoming.id().to_string(),
                expected: existing.version(),
            });
        }

        Ok(ReconcileOutcome::Updated)
    }
}
