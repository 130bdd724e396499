use std::path::Path;

use crate::commands::common::{
    format_push_response, format_report_lines, open_sync_service, print_json, print_lines,
    read_batch,
};
use crate::error::CliError;

pub async fn run_push(
    file: &Path,
    no_drain: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let operations = read_batch(file)?;
    let service = open_sync_service(db_path).await?;

    if no_drain {
        let summary = service.enqueue_batch(operations).await?;
        if as_json {
            print_json(&summary)?;
        } else {
            println!(
                "Queued {} operation(s) ({} already queued, {} already applied, {} dead-lettered)",
                summary.queued.len(),
                summary.already_queued.len(),
                summary.already_applied.len(),
                summary.dead_lettered.len()
            );
        }
        return Ok(());
    }

    let response = service.push(operations).await?;
    if as_json {
        print_json(&response)?;
    } else {
        println!("{}", format_push_response(&response));
    }
    Ok(())
}

pub async fn run_drain(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_sync_service(db_path).await?;
    let report = service.drain().await?;

    if as_json {
        print_json(&report)?;
    } else {
        print_lines(&format_report_lines(&report), "Queue is empty.");
    }
    Ok(())
}
