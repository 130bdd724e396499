//! Offline device sync: payload decoding, queue replay and results

mod engine;
mod payload;
mod report;

pub use engine::ReconciliationEngine;
pub use payload::SyncPayload;
pub use report::{
    AppliedEffect, AppliedOperation, DrainReport, FailedOperation, OperationOutcome, PushResponse,
    PushStatus,
};
