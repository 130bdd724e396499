//! Till CLI - operator tooling for the sync queue
//!
//! Push device batches by hand, drain and inspect the queue, and read back
//! what the store holds.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::queue::{run_dead_letters, run_queue, run_requeue};
use crate::commands::records::{
    run_products, run_purchase, run_purchases, run_sale, run_sales, run_users,
};
use crate::commands::sync::{run_drain, run_push};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "till_core=warn".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Push {
            file,
            no_drain,
            json,
        } => run_push(&file, no_drain, json, &db_path).await?,
        Commands::Drain { json } => run_drain(json, &db_path).await?,
        Commands::Queue { json } => run_queue(json, &db_path).await?,
        Commands::DeadLetters { json } => run_dead_letters(json, &db_path).await?,
        Commands::Requeue { id } => run_requeue(&id, &db_path).await?,
        Commands::Products { json } => run_products(json, &db_path).await?,
        Commands::Users { json } => run_users(json, &db_path).await?,
        Commands::Sales { limit, json } => run_sales(limit, json, &db_path).await?,
        Commands::Sale { id, json } => run_sale(&id, json, &db_path).await?,
        Commands::Purchases { limit, json } => run_purchases(limit, json, &db_path).await?,
        Commands::Purchase { id, json } => run_purchase(&id, json, &db_path).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
