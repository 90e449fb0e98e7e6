use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{Result, ShaftError};
use crate::models::{NewTransaction, PendingTransaction, TransactionType};

const PENDING_COLUMNS: &str = "id, date, details, amount, account, source, category, marked_for_deletion, \
                               import_batch_id, account_id, running_balance, transaction_type, created_at";

fn pending_from_row(row: &Row) -> rusqlite::Result<PendingTransaction> {
    Ok(PendingTransaction {
        id: row.get(0)?,
        date: row.get(1)?,
        details: row.get(2)?,
        amount: row.get(3)?,
        account: row.get(4)?,
        source: row.get(5)?,
        category: row.get(6)?,
        marked_for_deletion: row.get::<_, Option<bool>>(7)?.unwrap_or(false),
        import_batch_id: row.get(8)?,
        account_id: row.get(9)?,
        running_balance: row.get(10)?,
        transaction_type: row.get::<_, Option<TransactionType>>(11)?.unwrap_or_default(),
        created_at: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
    })
}

pub(crate) fn query(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<PendingTransaction>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, pending_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn select_sql(filter: &str, order: &str) -> String {
    format!("SELECT {PENDING_COLUMNS} FROM pending_transactions {filter} ORDER BY {order}")
}

/// Stages every record under `batch_id`, all or nothing.
pub fn insert_batch(conn: &mut Connection, records: &[NewTransaction], batch_id: &str) -> Result<usize> {
    if batch_id.trim().is_empty() {
        return Err(ShaftError::InvalidInput("batch id must not be empty".to_string()));
    }
    for record in records {
        record.validate()?;
    }

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO pending_transactions \
             (date, details, amount, account, source, category, running_balance, transaction_type, import_batch_id, account_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for r in records {
            stmt.execute(rusqlite::params![
                r.date,
                r.details,
                r.amount,
                r.account.as_deref().filter(|a| !a.trim().is_empty()),
                r.source.as_deref().filter(|s| !s.trim().is_empty()),
                r.category.as_deref().filter(|c| !c.trim().is_empty()),
                r.running_balance,
                r.transaction_type.unwrap_or_default(),
                batch_id,
                r.account_id,
            ])?;
        }
    }
    tx.commit()?;
    tracing::info!(batch_id, count = records.len(), "staged batch");
    Ok(records.len())
}

/// Without a batch: newest staged first. With a batch: latest date first.
pub fn list(conn: &Connection, batch_id: Option<&str>) -> Result<Vec<PendingTransaction>> {
    match batch_id {
        Some(batch) => query(
            conn,
            &select_sql("WHERE import_batch_id = ?1", "date DESC, id DESC"),
            [batch],
        ),
        None => query(conn, &select_sql("", "created_at DESC, date DESC, id DESC"), []),
    }
}

pub fn get(conn: &Connection, id: i64) -> Result<PendingTransaction> {
    conn.query_row(&select_sql("WHERE id = ?1", "id"), [id], pending_from_row)
        .optional()?
        .ok_or_else(|| ShaftError::not_found("pending transaction", id))
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM pending_transactions", [], |r| r.get(0))?)
}

fn expect_changed(changed: usize, id: i64) -> Result<()> {
    if changed == 0 {
        return Err(ShaftError::not_found("pending transaction", id));
    }
    Ok(())
}

pub fn update_category(conn: &Connection, id: i64, category: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE pending_transactions SET category = ?1 WHERE id = ?2",
        rusqlite::params![category, id],
    )?;
    expect_changed(changed, id)
}

pub fn update_category_and_type(conn: &Connection, id: i64, category: &str, kind: TransactionType) -> Result<()> {
    let changed = conn.execute(
        "UPDATE pending_transactions SET category = ?1, transaction_type = ?2 WHERE id = ?3",
        rusqlite::params![category, kind, id],
    )?;
    expect_changed(changed, id)
}

/// Changes only the kind; an unset category stays unset.
pub fn update_type(conn: &Connection, id: i64, kind: TransactionType) -> Result<()> {
    let changed = conn.execute(
        "UPDATE pending_transactions SET transaction_type = ?1 WHERE id = ?2",
        rusqlite::params![kind, id],
    )?;
    expect_changed(changed, id)
}

/// Flips the exclusion mark and returns the new value.
pub fn toggle_deletion_flag(conn: &Connection, id: i64) -> Result<bool> {
    conn.query_row(
        "UPDATE pending_transactions \
         SET marked_for_deletion = CASE WHEN marked_for_deletion = 1 THEN 0 ELSE 1 END \
         WHERE id = ?1 RETURNING marked_for_deletion",
        [id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| ShaftError::not_found("pending transaction", id))
}

pub fn discard(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM pending_transactions WHERE id = ?1", [id])?;
    expect_changed(changed, id)?;
    tracing::info!(id, "discarded staged record");
    Ok(())
}

pub fn discard_batch(conn: &Connection, batch_id: &str) -> Result<usize> {
    let removed = conn.execute("DELETE FROM pending_transactions WHERE import_batch_id = ?1", [batch_id])?;
    tracing::info!(batch_id, removed, "discarded staged batch");
    Ok(removed)
}

pub fn discard_all(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM pending_transactions", [])?;
    tracing::info!(removed, "discarded all staged records");
    Ok(removed)
}

pub struct BatchSummary {
    pub batch_id: Option<String>,
    pub records: i64,
    pub marked_for_deletion: i64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// One line per import batch, most recently staged first.
pub fn batches(conn: &Connection) -> Result<Vec<BatchSummary>> {
    let mut stmt = conn.prepare(
        "SELECT import_batch_id, count(*), COALESCE(SUM(marked_for_deletion), 0), MIN(date), MAX(date) \
         FROM pending_transactions GROUP BY import_batch_id ORDER BY MAX(created_at) DESC, MAX(id) DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(BatchSummary {
                batch_id: row.get(0)?,
                records: row.get(1)?,
                marked_for_deletion: row.get(2)?,
                first_date: row.get(3)?,
                last_date: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
