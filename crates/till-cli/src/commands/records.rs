use std::path::Path;

use crate::commands::common::{
    format_product_lines, format_purchase_entry, format_purchase_lines, format_sale_entry,
    format_sale_lines, format_user_lines, normalize_identifier, open_database, print_json,
    print_lines,
};
use crate::error::CliError;

pub async fn run_products(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let products = open_database(db_path).await?.list_products().await?;
    if as_json {
        return print_json(&products);
    }
    print_lines(&format_product_lines(&products), "No products.");
    Ok(())
}

pub async fn run_users(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let users = open_database(db_path).await?.list_users().await?;
    if as_json {
        return print_json(&users);
    }
    print_lines(&format_user_lines(&users), "No users.");
    Ok(())
}

pub async fn run_sales(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let sales = open_database(db_path).await?.list_sales(limit, 0).await?;
    if as_json {
        return print_json(&sales);
    }
    print_lines(&format_sale_lines(&sales), "No sales recorded.");
    Ok(())
}

pub async fn run_sale(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let id = normalize_identifier("Sale", id)?;
    let db = open_database(db_path).await?;
    let Some(entry) = db.get_sale(&id).await? else {
        return Err(CliError::NotFound { entity: "Sale", id });
    };

    if as_json {
        return print_json(&entry);
    }
    print_lines(&format_sale_entry(&entry), "");
    Ok(())
}

pub async fn run_purchases(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let purchases = open_database(db_path).await?.list_purchases(limit, 0).await?;
    if as_json {
        return print_json(&purchases);
    }
    print_lines(&format_purchase_lines(&purchases), "No purchases recorded.");
    Ok(())
}

pub async fn run_purchase(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let id = normalize_identifier("Purchase", id)?;
    let db = open_database(db_path).await?;
    let Some(entry) = db.get_purchase(&id).await? else {
        return Err(CliError::NotFound {
            entity: "Purchase",
            id,
        });
    };

    if as_json {
        return print_json(&entry);
    }
    print_lines(&format_purchase_entry(&entry), "");
    Ok(())
}
