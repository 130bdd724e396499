use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use till_core::models::{
    DeadLetter, NewSyncOperation, Product, Purchase, PurchaseEntry, Sale, SaleEntry, SyncOperation,
    User,
};
use till_core::sync::{FailedOperation, PushStatus};
use till_core::{DatabaseService, DrainReport, PushResponse, SyncService, SyncSettings};

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TILL_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("till")
        .join("till.db")
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}

/// Open the store with retry settings taken from `TILL_SYNC_*`.
pub async fn open_sync_service(path: &Path) -> Result<SyncService, CliError> {
    let settings = SyncSettings::from_env()?;
    let database = open_database(path).await?;
    Ok(SyncService::new(database, settings))
}

pub fn normalize_identifier(kind: &'static str, id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyId(kind));
    }
    Ok(trimmed.to_string())
}

/// Read a batch from a file, or from stdin when the path is `-`.
pub fn read_batch(path: &Path) -> Result<Vec<NewSyncOperation>, CliError> {
    let source = path.display().to_string();
    let text = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    parse_batch(&text, &source)
}

pub fn parse_batch(text: &str, source: &str) -> Result<Vec<NewSyncOperation>, CliError> {
    let operations = match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<NewSyncOperation>, _>>()?,
        value @ Value::Object(_) => vec![serde_json::from_value(value)?],
        _ => return Err(CliError::InvalidBatch),
    };

    if operations.is_empty() {
        return Err(CliError::EmptyBatch(source.to_string()));
    }
    Ok(operations)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_lines(lines: &[String], empty: &str) {
    if lines.is_empty() {
        println!("{empty}");
        return;
    }
    for line in lines {
        println!("{line}");
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

fn entity_label(entity_type: &str, entity_id: &str) -> String {
    if entity_id.is_empty() {
        entity_type.to_string()
    } else {
        format!("{entity_type}/{entity_id}")
    }
}

pub fn format_queue_lines(operations: &[SyncOperation], now_ms: i64) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let mut line = format!(
                "{:<10}  {}  {}  retries={}",
                format_relative_time(operation.created_at, now_ms),
                operation.id,
                entity_label(&operation.entity_type, &operation.entity_id),
                operation.retry_count
            );
            if let Some(error) = &operation.last_error {
                line.push_str(&format!("  last_error={error}"));
            }
            line
        })
        .collect()
}

pub fn format_dead_letter_lines(dead_letters: &[DeadLetter]) -> Vec<String> {
    dead_letters
        .iter()
        .map(|dead_letter| {
            let operation = &dead_letter.operation;
            format!(
                "{}  {}  {}  retries={}  {}",
                format_timestamp(dead_letter.failed_at),
                operation.id,
                entity_label(&operation.entity_type, &operation.entity_id),
                operation.retry_count,
                operation.last_error.as_deref().unwrap_or("-")
            )
        })
        .collect()
}

pub fn format_product_lines(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|product| {
            format!(
                "{}  {:<24}  stock={:<6} price={:.2}  v{}",
                product.id, product.name, product.stock, product.price, product.version
            )
        })
        .collect()
}

pub fn format_user_lines(users: &[User]) -> Vec<String> {
    users
        .iter()
        .map(|user| {
            format!(
                "{}  {:<20}  {:<28}  {}  v{}",
                user.id, user.name, user.email, user.role, user.version
            )
        })
        .collect()
}

pub fn format_sale_lines(sales: &[Sale]) -> Vec<String> {
    sales
        .iter()
        .map(|sale| {
            format!(
                "{}  {}  total={:.2}  cashier={}",
                format_timestamp(sale.created_at),
                sale.id,
                sale.total,
                sale.user_id
            )
        })
        .collect()
}

pub fn format_purchase_lines(purchases: &[Purchase]) -> Vec<String> {
    purchases
        .iter()
        .map(|purchase| {
            format!(
                "{}  {}  total={:.2}  supplier={}",
                format_timestamp(purchase.created_at),
                purchase.id,
                purchase.total_amount,
                purchase.supplier
            )
        })
        .collect()
}

pub fn format_sale_entry(entry: &SaleEntry) -> Vec<String> {
    let mut lines = format_sale_lines(std::slice::from_ref(&entry.sale));
    lines.extend(entry.items.iter().map(|item| {
        format!(
            "  {} x{} @ {:.2} = {:.2}",
            item.product_id, item.quantity, item.price, item.total
        )
    }));
    lines
}

pub fn format_purchase_entry(entry: &PurchaseEntry) -> Vec<String> {
    let mut lines = format_purchase_lines(std::slice::from_ref(&entry.purchase));
    lines.extend(entry.items.iter().map(|item| {
        format!(
            "  {} x{} @ {:.2} = {:.2}",
            item.product_id, item.quantity, item.price, item.total
        )
    }));
    lines
}

fn format_failed(label: &str, failed: &FailedOperation) -> String {
    format!(
        "{label:<9} {}  {}  retries={}  {}",
        failed.id, failed.entity_type, failed.retry_count, failed.error
    )
}

pub fn format_report_lines(report: &DrainReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Drained {} operation(s): {} applied, {} deferred, {} exhausted",
        report.attempted(),
        report.applied.len(),
        report.deferred.len(),
        report.exhausted.len()
    )];
    lines.extend(report.deferred.iter().map(|failed| format_failed("deferred", failed)));
    lines.extend(
        report
            .exhausted
            .iter()
            .map(|failed| format_failed("exhausted", failed)),
    );
    lines
}

pub fn format_push_response(response: &PushResponse) -> String {
    match (response.status, response.message.as_deref()) {
        (PushStatus::Ok, _) => "ok".to_string(),
        (PushStatus::PartialFail, Some(message)) => format!("partial_fail: {message}"),
        (PushStatus::PartialFail, None) => "partial_fail".to_string(),
    }
}
