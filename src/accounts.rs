use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{Result, ShaftError};
use crate::models::Account;

const ACCOUNT_COLUMNS: &str = "id, name, account_number, bank_name, current_balance, currency, \
                               last_synced, created_at, updated_at";

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_number: row.get(2)?,
        bank_name: row.get(3)?,
        current_balance: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        currency: row.get::<_, Option<String>>(5)?.unwrap_or_else(|| "IDR".to_string()),
        last_synced: row.get(6)?,
        created_at: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
    })
}

/// Trims the identity and folds an empty account number into "no number".
fn normalize_identity<'a>(
    bank_name: &'a str,
    account_number: Option<&'a str>,
) -> Result<(&'a str, Option<&'a str>)> {
    let bank = bank_name.trim();
    if bank.is_empty() {
        return Err(ShaftError::InvalidInput("bank name must not be empty".to_string()));
    }
    let number = account_number.map(str::trim).filter(|n| !n.is_empty());
    Ok((bank, number))
}

fn find(conn: &Connection, bank: &str, number: Option<&str>) -> rusqlite::Result<Account> {
    conn.query_row(
        &format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE bank_name = ?1 AND (account_number = ?2 OR (account_number IS NULL AND ?2 IS NULL))"
        ),
        rusqlite::params![bank, number],
        account_from_row,
    )
}

/// Looks up the account for a bank and optional account number. A missing
/// number only matches an account stored without one.
pub fn resolve(conn: &Connection, bank_name: &str, account_number: Option<&str>) -> Result<Option<Account>> {
    let (bank, number) = normalize_identity(bank_name, account_number)?;
    Ok(find(conn, bank, number).optional()?)
}

pub fn resolve_or_create(conn: &Connection, bank_name: &str, account_number: Option<&str>) -> Result<Account> {
    let (bank, number) = normalize_identity(bank_name, account_number)?;
    if let Some(existing) = find(conn, bank, number).optional()? {
        return Ok(existing);
    }

    let display_name = match number {
        Some(n) => format!("{bank} - {n}"),
        None => bank.to_string(),
    };
    // OR IGNORE: another writer may have created the same identity between
    // the lookup and this insert.
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO accounts (name, account_number, bank_name) VALUES (?1, ?2, ?3)",
        rusqlite::params![display_name, number, bank],
    )?;
    if inserted > 0 {
        tracing::info!(bank, number = ?number, name = %display_name, "created account");
    }
    Ok(find(conn, bank, number)?)
}

pub fn get(conn: &Connection, id: i64) -> Result<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [id],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| ShaftError::not_found("account", id))
}

/// Overwrites the stored balance. The caller is the source of truth; nothing
/// is checked against transaction history.
pub fn update_balance(conn: &Connection, id: i64, balance: f64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE accounts SET current_balance = ?1, last_synced = datetime('now'), updated_at = datetime('now') \
         WHERE id = ?2",
        rusqlite::params![balance, id],
    )?;
    if changed == 0 {
        return Err(ShaftError::not_found("account", id));
    }
    Ok(())
}

pub fn total_balance(conn: &Connection) -> Result<f64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(current_balance), 0.0) FROM accounts",
        [],
        |row| row.get(0),
    )?)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY bank_name, name"
    ))?;
    let rows = stmt
        .query_map([], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[test]
    fn test_resolve_or_create_is_idempotent() {
        let (_dir, conn) = test_db();
        let a = resolve_or_create(&conn, "BCA", Some("123")).unwrap();
        let b = resolve_or_create(&conn, "BCA", Some("123")).unwrap();
        assert_eq!(a.id, b.id);
        let count: i64 = conn.query_row("SELECT count(*) FROM accounts", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_display_name() {
        let (_dir, conn) = test_db();
        let numbered = resolve_or_create(&conn, "BCA", Some("123")).unwrap();
        assert_eq!(numbered.name, "BCA - 123");
        assert_eq!(numbered.current_balance, 0.0);
        assert_eq!(numbered.currency, "IDR");
        let bare = resolve_or_create(&conn, "Mandiri", None).unwrap();
        assert_eq!(bare.name, "Mandiri");
        assert_eq!(bare.account_number, None);
    }

    #[test]
    fn test_absent_number_matches_only_absent() {
        let (_dir, conn) = test_db();
        let numbered = resolve_or_create(&conn, "BCA", Some("123")).unwrap();
        assert!(resolve(&conn, "BCA", None).unwrap().is_none());
        let bare = resolve_or_create(&conn, "BCA", None).unwrap();
        assert_ne!(numbered.id, bare.id);
        assert_eq!(resolve(&conn, "BCA", None).unwrap().unwrap().id, bare.id);
        assert_eq!(resolve_or_create(&conn, "BCA", None).unwrap().id, bare.id);
    }

    #[test]
    fn test_empty_number_is_absent() {
        let (_dir, conn) = test_db();
        let a = resolve_or_create(&conn, "OCBC", Some("  ")).unwrap();
        let b = resolve_or_create(&conn, "OCBC", None).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_empty_bank_name_rejected() {
        let (_dir, conn) = test_db();
        assert!(matches!(
            resolve_or_create(&conn, "  ", Some("1")),
            Err(ShaftError::InvalidInput(_))
        ));
        assert!(matches!(resolve(&conn, "", None), Err(ShaftError::InvalidInput(_))));
        let count: i64 = conn.query_row("SELECT count(*) FROM accounts", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_update_balance_and_total() {
        let (_dir, conn) = test_db();
        assert_eq!(total_balance(&conn).unwrap(), 0.0);
        let a = resolve_or_create(&conn, "BCA", Some("123")).unwrap();
        let b = resolve_or_create(&conn, "Bank Mega", None).unwrap();
        update_balance(&conn, a.id, 1_500_000.0).unwrap();
        update_balance(&conn, b.id, -250_000.0).unwrap();
        assert_eq!(total_balance(&conn).unwrap(), 1_250_000.0);
        let refreshed = get(&conn, a.id).unwrap();
        assert_eq!(refreshed.current_balance, 1_500_000.0);
        assert!(refreshed.last_synced.is_some());
    }

    #[test]
    fn test_update_balance_unknown_account() {
        let (_dir, conn) = test_db();
        assert!(matches!(
            update_balance(&conn, 42, 1.0),
            Err(ShaftError::NotFound { entity: "account", id: 42 })
        ));
    }

    #[test]
    fn test_list_all_ordering() {
        let (_dir, conn) = test_db();
        resolve_or_create(&conn, "OCBC", None).unwrap();
        resolve_or_create(&conn, "BCA", Some("999")).unwrap();
        resolve_or_create(&conn, "BCA", Some("111")).unwrap();
        let names: Vec<String> = list_all(&conn).unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["BCA - 111", "BCA - 999", "OCBC"]);
    }
}
