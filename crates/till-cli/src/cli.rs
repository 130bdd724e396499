use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "till")]
#[command(about = "Operate the Till sync queue and inspect the authoritative store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the store's database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue a batch of device operations and drain the queue
    Push {
        /// JSON file holding an operation or an array of them (`-` for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Only queue the batch; leave draining for later
        #[arg(long)]
        no_drain: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay every queued operation once
    Drain {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued operations in replay order
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List operations moved out of the queue after exhausting their retries
    DeadLetters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset an operation's retry budget, restoring it from dead letters if needed
    Requeue {
        /// Operation ID
        id: String,
    },
    /// List products
    Products {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List users
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent sales
    Sales {
        /// Number of sales to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a sale with its lines
    Sale {
        /// Sale ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent purchases
    Purchases {
        /// Number of purchases to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a purchase with its lines
    Purchase {
        /// Purchase ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
