//! Drain and push results

use serde::{Deserialize, Serialize};

use crate::db::ReconcileOutcome;
use crate::error::Error;

/// What applying an operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedEffect {
    Inserted,
    Updated,
    /// Stale version, nothing changed
    Skipped,
    /// Compound transaction written with its stock effects
    Recorded,
    /// Compound transaction already present
    Replayed,
}

impl From<ReconcileOutcome> for AppliedEffect {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Inserted => Self::Inserted,
            ReconcileOutcome::Updated => Self::Updated,
            ReconcileOutcome::Skipped => Self::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOperation {
    pub id: String,
    pub entity_type: String,
    pub effect: AppliedEffect,
}

/// An operation that did not apply on this pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub id: String,
    pub entity_type: String,
    pub retry_count: u32,
    pub error: String,
}

/// Terminal state of one operation within a drain pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Applied(AppliedOperation),
    /// Failed, still queued for another attempt
    Deferred(FailedOperation),
    /// Failed with its retry budget spent
    Exhausted(FailedOperation),
}

/// Aggregate result of draining the queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub applied: Vec<AppliedOperation>,
    pub deferred: Vec<FailedOperation>,
    pub exhausted: Vec<FailedOperation>,
    /// Failed ids in processing order
    #[serde(skip)]
    failed: Vec<String>,
}

impl DrainReport {
    pub fn record(&mut self, outcome: OperationOutcome) {
        match outcome {
            OperationOutcome::Applied(applied) => self.applied.push(applied),
            OperationOutcome::Deferred(failed) => {
                self.failed.push(failed.id.clone());
                self.deferred.push(failed);
            }
            OperationOutcome::Exhausted(failed) => {
                self.failed.push(failed.id.clone());
                self.exhausted.push(failed);
            }
        }
    }

    /// Every id left unresolved by this pass
    pub fn failed_ids(&self) -> Vec<String> {
        if self.failed.is_empty() {
            // Deserialized reports carry no processing order
            return self
                .deferred
                .iter()
                .chain(&self.exhausted)
                .map(|failed| failed.id.clone())
                .collect();
        }
        self.failed.clone()
    }

    pub fn is_clean(&self) -> bool {
        self.deferred.is_empty() && self.exhausted.is_empty()
    }

    /// Number of operations looked at
    pub fn attempted(&self) -> usize {
        self.applied.len() + self.deferred.len() + self.exhausted.len()
    }

    pub(crate) fn log(&self) {
        if self.attempted() == 0 {
            return;
        }
        tracing::info!(
            applied = self.applied.len(),
            deferred = self.deferred.len(),
            exhausted = self.exhausted.len(),
            "Drained sync queue"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Ok,
    PartialFail,
}

/// Response body of a device push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub status: PushStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_operations: Vec<String>,
}

impl PushResponse {
    pub const fn ok() -> Self {
        Self {
            status: PushStatus::Ok,
            message: None,
            failed_operations: Vec::new(),
        }
    }

    /// Summarize a completed drain
    pub fn from_report(report: &DrainReport) -> Self {
        let failed = report.failed_ids();
        if failed.is_empty() {
            return Self::ok();
        }
        Self {
            status: PushStatus::PartialFail,
            message: Some(format!(
                "failed to process operations: [{}]",
                failed.join(" ")
            )),
            failed_operations: failed,
        }
    }

    /// The batch was enqueued but the drain itself could not run
    pub fn drain_failed(error: &Error) -> Self {
        Self {
            status: PushStatus::PartialFail,
            message: Some(error.to_string()),
            failed_operations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn failed(id: &str) -> FailedOperation {
        FailedOperation {
            id: id.to_string(),
            entity_type: "sale".to_string(),
            retry_count: 1,
            error: "boom".to_string(),
        }
    }

    #[test]
    fn failed_ids_keep_processing_order() {
        let mut report = DrainReport::default();
        report.record(OperationOutcome::Exhausted(failed("b")));
        report.record(OperationOutcome::Deferred(failed("a")));

        assert_eq!(report.failed_ids(), vec!["b".to_string(), "a".to_string()]);
        assert!(!report.is_clean());
        assert_eq!(report.attempted(), 2);
    }

    #[test]
    fn clean_report_serializes_ok() {
        let json = serde_json::to_value(PushResponse::from_report(&DrainReport::default())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }

    #[test]
    fn partial_fail_lists_ids() {
        let mut report = DrainReport::default();
        report.record(OperationOutcome::Deferred(failed("op-1")));
        report.record(OperationOutcome::Deferred(failed("op-2")));

        let json = serde_json::to_value(PushResponse::from_report(&report)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "partial_fail",
                "message": "failed to process operations: [op-1 op-2]",
                "failed_operations": ["op-1", "op-2"]
            })
        );
    }
}
