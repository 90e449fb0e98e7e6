pub mod accounts;
pub mod categories;
pub mod confirm;
pub mod init;
pub mod report;
pub mod stage;
pub mod status;
pub mod transactions;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::{Result, ShaftError};
use crate::reports::Period;
use crate::settings::Settings;

/// Opens the configured database, applying pending migrations.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(ShaftError::Settings(format!(
            "No database found at {}\nRun `shaft init` to set up.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    Ok(conn)
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[derive(Parser)]
#[command(name = "shaft", version, about = "Stage bank statements, review them, and keep a personal ledger.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for shaft data (default: ~/Documents/shaft)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
    /// Inspect bank accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Work with the staging area.
    Stage {
        #[command(subcommand)]
        command: StageCommands,
    },
    /// Promote staged records into the ledger.
    Confirm {
        /// Only confirm this import batch
        #[arg(long)]
        batch: Option<String>,
    },
    /// Work with ledger transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// List the category taxonomy.
    Categories,
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// List all accounts.
    List,
    /// Sum of the latest balances across accounts.
    Total,
}

#[derive(Subcommand)]
pub enum StageCommands {
    /// Stage rows from a CSV file (date,details,amount[,account,category,...]).
    Csv {
        file: String,
        /// Batch id to stage under (default: generated)
        #[arg(long)]
        batch: Option<String>,
    },
    /// Stage records from a saved extraction response (JSON array).
    Json {
        file: String,
        #[arg(long)]
        batch: Option<String>,
    },
    /// List staged records.
    List {
        #[arg(long)]
        batch: Option<String>,
    },
    /// Summarize staged batches.
    Batches,
    /// Apply a saved categorization response to a batch.
    Categorize {
        batch: String,
        /// JSON file with one categorized record per staged record
        #[arg(long)]
        response: String,
    },
    /// Set the category of a staged record.
    SetCategory { id: i64, category: String },
    /// Set the transaction type of a staged record: income, expense, transfer.
    SetType { id: i64, kind: String },
    /// Flip the deletion flag of a staged record.
    Toggle { id: i64 },
    /// Remove a single staged record.
    Discard { id: i64 },
    /// Remove staged records, optionally only one batch.
    Clear {
        #[arg(long)]
        batch: Option<String>,
    },
    /// Write a staged batch as JSON records, oldest first.
    Export {
        #[arg(long)]
        batch: String,
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List ledger transactions, newest first.
    List {
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<NaiveDate>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<NaiveDate>,
        /// Show at most this many rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Record a transaction directly in the ledger.
    Add {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        details: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
        #[arg(long)]
        category: Option<String>,
        /// income, expense or transfer
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long = "account-id")]
        account_id: Option<i64>,
    },
    /// Change the category of a transaction.
    Categorize { id: i64, category: String },
    /// Change the type of a transaction.
    SetType { id: i64, kind: String },
    /// Delete a transaction.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Expense breakdown by category.
    Expenses {
        /// Look-back period ending today
        #[arg(long, value_enum, default_value = "month")]
        period: Period,
        /// Start date: YYYY-MM-DD (overrides --period)
        #[arg(long = "from", requires = "to_date")]
        from_date: Option<NaiveDate>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to", requires = "from_date")]
        to_date: Option<NaiveDate>,
    },
    /// Income and expenses per month.
    Monthly {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Daily income, expenses and running net worth.
    Daily {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Net worth against the savings target.
    NetWorth,
}
