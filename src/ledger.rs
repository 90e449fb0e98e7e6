use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::categories::UNCATEGORISED;
use crate::error::{Result, ShaftError};
use crate::models::{NewTransaction, Transaction, TransactionType};

const TRANSACTION_COLUMNS: &str = "id, date, details, amount, account, source, category, account_id, \
                                   running_balance, transaction_type, created_at, updated_at";

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        date: row.get(1)?,
        details: row.get(2)?,
        amount: row.get(3)?,
        account: row.get(4)?,
        source: row.get(5)?,
        category: row.get(6)?,
        account_id: row.get(7)?,
        running_balance: row.get(8)?,
        transaction_type: row.get::<_, Option<TransactionType>>(9)?.unwrap_or_default(),
        created_at: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
    })
}

fn query(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, transaction_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Newest first. Both bounds are inclusive and only applied when both are given.
pub fn list(conn: &Connection, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Vec<Transaction>> {
    match (from, to) {
        (Some(from), Some(to)) => query(
            conn,
            &format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE date BETWEEN ?1 AND ?2 ORDER BY date DESC, id DESC"
            ),
            rusqlite::params![from, to],
        ),
        _ => query(
            conn,
            &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY date DESC, id DESC"),
            [],
        ),
    }
}

pub fn list_ascending(conn: &Connection) -> Result<Vec<Transaction>> {
    query(
        conn,
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY date ASC, id ASC"),
        [],
    )
}

pub fn get(conn: &Connection, id: i64) -> Result<Transaction> {
    conn.query_row(
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
        [id],
        transaction_from_row,
    )
    .optional()?
    .ok_or_else(|| ShaftError::not_found("transaction", id))
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?)
}

/// Writes one ledger row. A missing category becomes the `Uncategorised`
/// sentinel and a missing kind becomes `expense`.
pub fn insert(conn: &Connection, tx: &NewTransaction) -> Result<i64> {
    tx.validate()?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO transactions (date, details, amount, account, source, category, account_id, running_balance, transaction_type) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    let category = tx
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORISED);
    stmt.execute(rusqlite::params![
        tx.date,
        tx.details,
        tx.amount,
        tx.account,
        tx.source,
        category,
        tx.account_id,
        tx.running_balance,
        tx.transaction_type.unwrap_or_default(),
    ])?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_many(conn: &mut Connection, txs: &[NewTransaction]) -> Result<usize> {
    for tx in txs {
        tx.validate()?;
    }
    let db_tx = conn.transaction()?;
    for tx in txs {
        insert(&db_tx, tx)?;
    }
    db_tx.commit()?;
    tracing::info!(count = txs.len(), "inserted ledger transactions");
    Ok(txs.len())
}

pub fn update_category(conn: &Connection, id: i64, category: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE transactions SET category = ?1, updated_at = datetime('now') WHERE id = ?2",
        rusqlite::params![category, id],
    )?;
    if changed == 0 {
        return Err(ShaftError::not_found("transaction", id));
    }
    Ok(())
}

pub fn update_type(conn: &Connection, id: i64, kind: TransactionType) -> Result<()> {
    let changed = conn.execute(
        "UPDATE transactions SET transaction_type = ?1, updated_at = datetime('now') WHERE id = ?2",
        rusqlite::params![kind, id],
    )?;
    if changed == 0 {
        return Err(ShaftError::not_found("transaction", id));
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(ShaftError::not_found("transaction", id));
    }
    tracing::info!(id, "deleted ledger transaction");
    Ok(())
}
