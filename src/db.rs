use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE: &str = "finance.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    account_number TEXT,
    bank_name TEXT NOT NULL,
    current_balance REAL DEFAULT 0,
    currency TEXT DEFAULT 'IDR',
    last_synced TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    UNIQUE(bank_name, account_number)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    details TEXT NOT NULL,
    amount REAL NOT NULL,
    account TEXT,
    source TEXT,
    category TEXT NOT NULL,
    account_id INTEGER REFERENCES accounts(id),
    running_balance REAL,
    transaction_type TEXT DEFAULT 'expense',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS pending_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    details TEXT NOT NULL,
    amount REAL NOT NULL,
    account TEXT,
    source TEXT,
    category TEXT,
    marked_for_deletion INTEGER DEFAULT 0,
    import_batch_id TEXT,
    account_id INTEGER REFERENCES accounts(id),
    running_balance REAL,
    transaction_type TEXT DEFAULT 'expense',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category);
CREATE INDEX IF NOT EXISTS idx_transactions_amount ON transactions(amount);
CREATE INDEX IF NOT EXISTS idx_pending_batch ON pending_transactions(import_batch_id);
";

// UNIQUE(bank_name, account_number) lets any number of NULL account numbers
// through; this index gives each bank a single NULL slot.
const IDENTITY_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_identity \
                              ON accounts(bank_name, IFNULL(account_number, ''));";

// Columns added after the first release, as (table, column, definition).
const MIGRATIONS: &[(&str, &str, &str)] = &[
    ("transactions", "account_id", "INTEGER REFERENCES accounts(id)"),
    ("transactions", "running_balance", "REAL"),
    ("transactions", "transaction_type", "TEXT DEFAULT 'expense'"),
    ("pending_transactions", "account_id", "INTEGER REFERENCES accounts(id)"),
    ("pending_transactions", "running_balance", "REAL"),
    ("pending_transactions", "transaction_type", "TEXT DEFAULT 'expense'"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    migrate(conn)?;
    merge_duplicate_accounts(conn)?;
    conn.execute_batch(IDENTITY_INDEX)?;
    // Needs the migrated column on databases created before account linkage.
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_transactions_account_id ON transactions(account_id);",
    )?;
    Ok(())
}

/// Older databases may hold several accounts with the same bank and no
/// account number. Folds each group into its lowest id, relinking
/// transactions and staged records first.
fn merge_duplicate_accounts(conn: &Connection) -> Result<()> {
    let duplicates: i64 = conn.query_row(
        "SELECT count(*) FROM (
             SELECT 1 FROM accounts GROUP BY bank_name, IFNULL(account_number, '') HAVING count(*) > 1
         )",
        [],
        |r| r.get(0),
    )?;
    if duplicates == 0 {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    for table in ["transactions", "pending_transactions"] {
        tx.execute_batch(&format!(
            "UPDATE {table} SET account_id = (
                 SELECT MIN(keep.id) FROM accounts dup
                 JOIN accounts keep ON keep.bank_name = dup.bank_name
                     AND IFNULL(keep.account_number, '') = IFNULL(dup.account_number, '')
                 WHERE dup.id = {table}.account_id
             )
             WHERE account_id IN (SELECT id FROM accounts)"
        ))?;
    }
    let removed = tx.execute(
        "DELETE FROM accounts WHERE id NOT IN (
             SELECT MIN(id) FROM accounts GROUP BY bank_name, IFNULL(account_number, '')
         )",
        [],
    )?;
    tx.commit()?;
    tracing::info!(removed, "merged duplicate accounts");
    Ok(())
}

fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

fn migrate(conn: &Connection) -> Result<()> {
    for (table, column, definition) in MIGRATIONS {
        if !column_names(conn, table)?.iter().any(|c| c == column) {
            tracing::info!(table, column, "adding missing column");
            conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))?;
        }
    }
    Ok(())
}

pub struct Stats {
    pub accounts: i64,
    pub transactions: i64,
    pub pending: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |table: &str| -> Result<i64> {
        Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?)
    };
    Ok(Stats {
        accounts: count("accounts")?,
        transactions: count("transactions")?,
        pending: count("pending_transactions")?,
    })
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}
