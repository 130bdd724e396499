//! Durable queue of pending device operations
//!
//! Operations are replayed in `created_at` order. The stamp is assigned here,
//! at enqueue time, and is strictly increasing so two operations accepted in
//! the same millisecond still keep their arrival order.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{DeadLetter, NewSyncOperation, OperationKind, SyncOperation};
use crate::util::unix_millis_now;

const OPERATION_COLUMNS: &str =
    "id, entity_type, entity_id, operation, payload, device_id, created_at, retry_count, last_error";

/// Result of offering an operation to the queue
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// Newly queued
    Queued(SyncOperation),
    /// Already pending; the existing entry is kept unchanged
    AlreadyQueued,
    /// Already applied once; replaying it would duplicate its effect
    AlreadyApplied,
    /// Parked in the dead-letter table; requeue it explicitly instead
    DeadLettered,
}

/// `SQLite` implementation of the sync queue, dead letters and applied ledger
pub struct SqliteSyncQueue<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncQueue<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Run `f` atomically. Inside a unit of work the surrounding transaction
    /// already provides that; on a bare connection a short transaction is
    /// opened.
    fn atomically<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return f();
        }
        let tx = self.conn.unchecked_transaction()?;
        let value = f()?;
        tx.commit()?;
        Ok(value)
    }

    /// Durably queue an operation
    pub fn enqueue(&self, operation: &NewSyncOperation) -> Result<EnqueueOutcome> {
        self.atomically(|| {
            if self.is_applied(&operation.id)? {
                return Ok(EnqueueOutcome::AlreadyApplied);
            }
            if self.contains(&operation.id)? {
                return Ok(EnqueueOutcome::AlreadyQueued);
            }
            if self.get_dead_letter(&operation.id)?.is_some() {
                return Ok(EnqueueOutcome::DeadLettered);
            }

            let created_at = self.next_stamp()?;
            self.conn.execute(
                "INSERT INTO sync_operations
                 (id, entity_type, entity_id, operation, payload, device_id, created_at, retry_count)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
                params![
                    operation.id,
                    operation.entity_type,
                    operation.entity_id,
                    operation.operation.as_str(),
                    operation.payload,
                    operation.device_id,
                    created_at
                ],
            )?;

            Ok(EnqueueOutcome::Queued(SyncOperation {
                id: operation.id.clone(),
                entity_type: operation.entity_type.clone(),
                entity_id: operation.entity_id.clone(),
                operation: operation.operation,
                payload: operation.payload.clone(),
                device_id: operation.device_id.clone(),
                created_at,
                retry_count: 0,
                last_error: None,
            }))
        })
    }

    /// `max(now, newest stamp + 1)`
    fn next_stamp(&self) -> Result<i64> {
        let newest: Option<i64> =
            self.conn
                .query_row("SELECT MAX(created_at) FROM sync_operations", [], |row| {
                    row.get(0)
                })?;
        let now = unix_millis_now();
        Ok(newest.map_or(now, |newest| now.max(newest + 1)))
    }

    /// All pending operations in replay order
    pub fn list_all(&self) -> Result<Vec<SyncOperation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OPERATION_COLUMNS} FROM sync_operations ORDER BY created_at, id"
        ))?;

        let operations = stmt
            .query_map([], Self::parse_operation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(operations)
    }

    pub fn get(&self, id: &str) -> Result<Option<SyncOperation>> {
        let operation = self
            .conn
            .query_row(
                &format!("SELECT {OPERATION_COLUMNS} FROM sync_operations WHERE id = ?"),
                params![id],
                Self::parse_operation,
            )
            .optional()?;
        Ok(operation)
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sync_operations WHERE id = ?)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Number of pending operations
    pub fn len(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM sync_operations", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove an operation from the queue. Returns whether a row was removed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_operations WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    /// Record a failed attempt and return the new retry count
    pub fn bump_retry(&self, id: &str, error: &str) -> Result<u32> {
        let retry_count: Option<u32> = self
            .conn
            .query_row(
                "UPDATE sync_operations
                 SET retry_count = retry_count + 1, last_error = ?
                 WHERE id = ?
                 RETURNING retry_count",
                params![error, id],
                |row| row.get(0),
            )
            .optional()?;

        retry_count.ok_or_else(|| Error::not_found("sync operation", id))
    }

    /// Dequeue a successfully applied operation and remember its id
    pub fn complete(&self, operation: &SyncOperation) -> Result<()> {
        self.atomically(|| {
            if !self.remove(&operation.id)? {
                return Err(Error::not_found("sync operation", operation.id.as_str()));
            }
            self.conn.execute(
                "INSERT OR IGNORE INTO applied_operations (operation_id, entity_type, entity_id, applied_at)
                 VALUES (?, ?, ?, ?)",
                params![
                    operation.id,
                    operation.entity_type,
                    operation.entity_id,
                    unix_millis_now()
                ],
            )?;
            Ok(())
        })
    }

    /// Whether an operation id has already been applied
    pub fn is_applied(&self, id: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM applied_operations WHERE operation_id = ?)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Move an operation from the queue to the dead-letter table.
    /// Returns `false` when no such operation is queued.
    pub fn move_to_dead_letter(&self, id: &str) -> Result<bool> {
        self.atomically(|| {
            let moved = self.conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO dead_letter_operations ({OPERATION_COLUMNS}, failed_at)
                     SELECT {OPERATION_COLUMNS}, ? FROM sync_operations WHERE id = ?"
                ),
                params![unix_millis_now(), id],
            )?;
            if moved == 0 {
                return Ok(false);
            }
            self.remove(id)?;
            Ok(true)
        })
    }

    /// Dead-lettered operations, most recent failure first
    pub fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OPERATION_COLUMNS}, failed_at
             FROM dead_letter_operations
             ORDER BY failed_at DESC, id"
        ))?;

        let letters = stmt
            .query_map([], Self::parse_dead_letter)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(letters)
    }

    pub fn get_dead_letter(&self, id: &str) -> Result<Option<DeadLetter>> {
        let letter = self
            .conn
            .query_row(
                &format!(
                    "SELECT {OPERATION_COLUMNS}, failed_at FROM dead_letter_operations WHERE id = ?"
                ),
                params![id],
                Self::parse_dead_letter,
            )
            .optional()?;
        Ok(letter)
    }

    /// Give an operation a fresh retry budget.
    ///
    /// A dead-lettered operation goes back into the queue at its original
    /// position; a queued one just has its counter reset.
    pub fn requeue(&self, id: &str) -> Result<SyncOperation> {
        self.atomically(|| {
            let reset = self.conn.execute(
                "UPDATE sync_operations SET retry_count = 0, last_error = NULL WHERE id = ?",
                params![id],
            )?;

            if reset == 0 {
                let restored = self.conn.execute(
                    "INSERT INTO sync_operations
                     (id, entity_type, entity_id, operation, payload, device_id, created_at, retry_count, last_error)
                     SELECT id, entity_type, entity_id, operation, payload, device_id, created_at, 0, NULL
                     FROM dead_letter_operations WHERE id = ?",
                    params![id],
                )?;
                if restored == 0 {
                    return Err(Error::not_found("sync operation", id));
                }
                self.conn.execute(
                    "DELETE FROM dead_letter_operations WHERE id = ?",
                    params![id],
                )?;
            }

            self.get(id)?
                .ok_or_else(|| Error::not_found("sync operation", id))
        })
    }

    fn parse_operation(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncOperation> {
        let operation: String = row.get(3)?;
        let operation = operation.parse::<OperationKind>().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(error))
        })?;
        Ok(SyncOperation {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            operation,
            payload: row.get(4)?,
            device_id: row.get(5)?,
            created_at: row.get(6)?,
            retry_count: row.get(7)?,
            last_error: row.get(8)?,
        })
    }

    fn parse_dead_letter(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeadLetter> {
        Ok(DeadLetter {
            operation: Self::parse_operation(row)?,
            failed_at: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn new_op(id: &str) -> NewSyncOperation {
        NewSyncOperation {
            id: id.to_string(),
            entity_type: "product".to_string(),
            entity_id: "p1".to_string(),
            operation: OperationKind::Update,
            payload: json!({"id": "p1", "version": 2}),
            device_id: "device-1".to_string(),
        }
    }

    fn queued(outcome: EnqueueOutcome) -> SyncOperation {
        match outcome {
            EnqueueOutcome::Queued(operation) => operation,
            other => panic!("expected queued, got {other:?}"),
        }
    }

    #[test]
    fn test_enqueue_and_read_back() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();

        let op = queued(queue.enqueue(&new_op("op-1")).unwrap());
        assert_eq!(op.retry_count, 0);
        assert!(op.created_at > 0);

        let stored = queue.get("op-1").unwrap().unwrap();
        assert_eq!(stored, op);
        assert_eq!(stored.payload["version"], 2);
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_same_millisecond_keeps_arrival_order() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();

        // "b" sorts before "c" and "a"; arrival order must win anyway
        for id in ["c", "a", "b"] {
            queue.enqueue(&new_op(id)).unwrap();
        }

        let ids: Vec<_> = queue.list_all().unwrap().into_iter().map(|op| op.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let stamps: Vec<_> = queue
            .list_all()
            .unwrap()
            .into_iter()
            .map(|op| op.created_at)
            .collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_duplicate_enqueue_keeps_existing_entry() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();

        let first = queued(queue.enqueue(&new_op("op-1")).unwrap());
        queue.bump_retry("op-1", "boom").unwrap();

        let mut changed = new_op("op-1");
        changed.payload = json!({"id": "p1", "version": 9});
        assert_eq!(
            queue.enqueue(&changed).unwrap(),
            EnqueueOutcome::AlreadyQueued
        );

        let stored = queue.get("op-1").unwrap().unwrap();
        assert_eq!(stored.payload, first.payload);
        assert_eq!(stored.retry_count, 1);
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_applied_operation_is_not_requeued() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();

        let op = queued(queue.enqueue(&new_op("op-1")).unwrap());
        queue.complete(&op).unwrap();

        assert!(queue.is_applied("op-1").unwrap());
        assert!(queue.is_empty().unwrap());
        assert_eq!(
            queue.enqueue(&new_op("op-1")).unwrap(),
            EnqueueOutcome::AlreadyApplied
        );
    }

    #[test]
    fn test_complete_requires_queued_entry() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();

        let op = queued(queue.enqueue(&new_op("op-1")).unwrap());
        queue.complete(&op).unwrap();

        let err = queue.complete(&op).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "sync operation", .. }));
    }

    #[test]
    fn test_corrupt_operation_kind_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();
        queue.enqueue(&new_op("op-1")).unwrap();
        db.connection()
            .execute("UPDATE sync_operations SET operation = 'upsert' WHERE id = 'op-1'", [])
            .unwrap();

        let err = queue.get("op-1").unwrap_err();
        assert!(matches!(
            err,
            Error::Database(rusqlite::Error::FromSqlConversionFailure(3, _, _))
        ));
    }

    #[test]
    fn test_bump_retry_records_error() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();
        queue.enqueue(&new_op("op-1")).unwrap();

        assert_eq!(queue.bump_retry("op-1", "first").unwrap(), 1);
        assert_eq!(queue.bump_retry("op-1", "second").unwrap(), 2);

        let stored = queue.get("op-1").unwrap().unwrap();
        assert_eq!(stored.retry_count, 2);
        assert_eq!(stored.last_error.as_deref(), Some("second"));
    }

    #[test]
    fn test_bump_retry_missing_operation() {
        let db = Database::open_in_memory().unwrap();
        let err = db.sync_queue().bump_retry("ghost", "x").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.sync_queue().remove("ghost").unwrap());
    }

    #[test]
    fn test_dead_letter_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();
        let original = queued(queue.enqueue(&new_op("op-1")).unwrap());
        queue.bump_retry("op-1", "boom").unwrap();

        assert!(queue.move_to_dead_letter("op-1").unwrap());
        assert!(!queue.move_to_dead_letter("op-1").unwrap());
        assert!(queue.is_empty().unwrap());

        let letters = queue.list_dead_letters().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].operation.retry_count, 1);
        assert_eq!(letters[0].operation.last_error.as_deref(), Some("boom"));
        assert_eq!(
            queue.enqueue(&new_op("op-1")).unwrap(),
            EnqueueOutcome::DeadLettered
        );

        let requeued = queue.requeue("op-1").unwrap();
        assert_eq!(requeued.retry_count, 0);
        assert_eq!(requeued.last_error, None);
        assert_eq!(requeued.created_at, original.created_at);
        assert!(queue.list_dead_letters().unwrap().is_empty());
    }

    #[test]
    fn test_requeue_resets_pending_operation() {
        let db = Database::open_in_memory().unwrap();
        let queue = db.sync_queue();
        queue.enqueue(&new_op("op-1")).unwrap();
        queue.bump_retry("op-1", "boom").unwrap();

        assert_eq!(queue.requeue("op-1").unwrap().retry_count, 0);
        assert!(matches!(
            queue.requeue("ghost"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_atomic_inside_unit_of_work() {
        let mut db = Database::open_in_memory().unwrap();
        db.sync_queue().enqueue(&new_op("op-1")).unwrap();

        {
            let uow = db.unit_of_work().unwrap();
            assert!(uow.sync_queue().move_to_dead_letter("op-1").unwrap());
            uow.rollback().unwrap();
        }

        assert!(db.sync_queue().contains("op-1").unwrap());
        assert!(db.sync_queue().list_dead_letters().unwrap().is_empty());
    }
}
