pub mod common;
pub mod completions;
pub mod queue;
pub mod records;
pub mod sync;
