use std::path::Path;

use chrono::Utc;

use crate::commands::common::{
    format_dead_letter_lines, format_queue_lines, normalize_identifier, open_database,
    open_sync_service, print_json, print_lines,
};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let operations = db.list_queue().await?;

    if as_json {
        return print_json(&operations);
    }
    let now_ms = Utc::now().timestamp_millis();
    print_lines(&format_queue_lines(&operations, now_ms), "Queue is empty.");
    Ok(())
}

pub async fn run_dead_letters(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let dead_letters = db.list_dead_letters().await?;

    if as_json {
        return print_json(&dead_letters);
    }
    print_lines(
        &format_dead_letter_lines(&dead_letters),
        "No dead-lettered operations.",
    );
    Ok(())
}

pub async fn run_requeue(id: &str, db_path: &Path) -> Result<(), CliError> {
    let id = normalize_identifier("Operation", id)?;
    let service = open_sync_service(db_path).await?;
    let operation = service.requeue(&id).await?;
    println!("Requeued {}", operation.id);
    Ok(())
}
