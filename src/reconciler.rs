use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};

use crate::accounts;
use crate::error::Result;
use crate::ledger;
use crate::staging;

/// Latest-dated running balance seen per account during one confirmation.
#[derive(Debug, Default)]
pub struct BalanceTracker {
    latest: BTreeMap<i64, (NaiveDate, f64)>,
}

impl BalanceTracker {
    /// Records are fed oldest first, so on equal dates the later record wins.
    pub fn observe(&mut self, account_id: i64, date: NaiveDate, balance: f64) {
        match self.latest.get(&account_id) {
            Some((tracked, _)) if date < *tracked => {}
            _ => {
                self.latest.insert(account_id, (date, balance));
            }
        }
    }

    pub fn balance(&self, account_id: i64) -> Option<f64> {
        self.latest.get(&account_id).map(|(_, b)| *b)
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn into_balances(self) -> impl Iterator<Item = (i64, f64)> {
        self.latest.into_iter().map(|(id, (_, balance))| (id, balance))
    }
}

#[derive(Debug, PartialEq)]
pub struct ConfirmResult {
    pub promoted: usize,
    pub balances_updated: usize,
}

/// Moves staged records that are not marked for deletion into the ledger,
/// linking each to its account and refreshing account balances from the
/// latest-dated running balance. With no batch id every staged record is in
/// scope. Runs as one write transaction: on error nothing is promoted and
/// staging is left as it was.
pub fn confirm_import(conn: &mut Connection, batch_id: Option<&str>) -> Result<ConfirmResult> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let pending = staging::query(
        &tx,
        &staging::select_sql(
            "WHERE marked_for_deletion = 0 AND (?1 IS NULL OR import_batch_id = ?1)",
            "date ASC, id ASC",
        ),
        [batch_id],
    )?;

    let mut tracker = BalanceTracker::default();
    for record in &pending {
        let account_id = match (record.account_id, record.source.as_deref()) {
            (Some(id), _) => Some(id),
            (None, Some(source)) if !source.trim().is_empty() => {
                Some(accounts::resolve_or_create(&tx, source, record.account.as_deref())?.id)
            }
            _ => None,
        };

        let ledger_id = ledger::insert(&tx, &record.promote(account_id))?;
        tracing::debug!(pending_id = record.id, ledger_id, account_id = ?account_id, "promoted staged record");

        if let (Some(id), Some(balance)) = (account_id, record.running_balance) {
            tracker.observe(id, record.date, balance);
        }
    }

    let balances_updated = tracker.len();
    for (account_id, balance) in tracker.into_balances() {
        accounts::update_balance(&tx, account_id, balance)?;
    }

    tx.execute(
        "DELETE FROM pending_transactions WHERE marked_for_deletion = 0 AND (?1 IS NULL OR import_batch_id = ?1)",
        [batch_id],
    )?;
    tx.commit()?;

    tracing::info!(batch_id = ?batch_id, promoted = pending.len(), balances_updated, "confirmed import");
    Ok(ConfirmResult {
        promoted: pending.len(),
        balances_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use crate::categories::UNCATEGORISED;
    use crate::db::{get_connection, test_db};
    use crate::error::ShaftError;
    use crate::models::{NewTransaction, TransactionType};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn bca(d: u32, details: &str, amount: f64, balance: Option<f64>) -> NewTransaction {
        let mut r = NewTransaction::new(day(d), details, amount);
        r.source = Some("BCA".to_string());
        r.account = Some("123".to_string());
        r.running_balance = balance;
        r
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_tracker_latest_date_wins() {
        let mut t = BalanceTracker::default();
        t.observe(1, day(3), 180.0);
        t.observe(1, day(1), 100.0);
        t.observe(1, day(2), 250.0);
        assert_eq!(t.balance(1), Some(180.0));
        t.observe(1, day(3), 175.0);
        assert_eq!(t.balance(1), Some(175.0));
        assert_eq!(t.balance(2), None);
    }

    #[test]
    fn test_coffee_scenario() {
        let (_dir, mut conn) = test_db();
        staging::insert_batch(&mut conn, &[bca(5, "Coffee", -25_000.0, None)], "batch1").unwrap();

        let result = confirm_import(&mut conn, Some("batch1")).unwrap();
        assert_eq!(result.promoted, 1);

        let txs = ledger::list(&conn, None, None).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].category, UNCATEGORISED);
        assert_eq!(txs[0].transaction_type, TransactionType::Expense);
        let account = accounts::resolve(&conn, "BCA", Some("123")).unwrap().unwrap();
        assert_eq!(txs[0].account_id, Some(account.id));
        assert!(staging::list(&conn, Some("batch1")).unwrap().is_empty());
    }

    #[test]
    fn test_promotes_all_and_clears_batch() {
        let (_dir, mut conn) = test_db();
        let records: Vec<NewTransaction> = (1..=5).map(|d| bca(d, "Txn", -1_000.0, None)).collect();
        staging::insert_batch(&mut conn, &records, "b1").unwrap();
        staging::insert_batch(&mut conn, &[bca(9, "Other batch", -1.0, None)], "b2").unwrap();

        let result = confirm_import(&mut conn, Some("b1")).unwrap();
        assert_eq!(result.promoted, 5);
        assert_eq!(ledger::count(&conn).unwrap(), 5);
        assert!(staging::list(&conn, Some("b1")).unwrap().is_empty());
        assert_eq!(staging::list(&conn, Some("b2")).unwrap().len(), 1);
        assert_eq!(count(&conn, "SELECT count(*) FROM accounts"), 1);
    }

    #[test]
    fn test_no_batch_promotes_everything() {
        let (_dir, mut conn) = test_db();
        staging::insert_batch(&mut conn, &[bca(1, "a", -1.0, None)], "b1").unwrap();
        staging::insert_batch(&mut conn, &[bca(2, "b", -1.0, None)], "b2").unwrap();
        let result = confirm_import(&mut conn, None).unwrap();
        assert_eq!(result.promoted, 2);
        assert_eq!(staging::count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let (_dir, mut conn) = test_db();
        let result = confirm_import(&mut conn, Some("missing")).unwrap();
        assert_eq!(result, ConfirmResult { promoted: 0, balances_updated: 0 });
        assert_eq!(count(&conn, "SELECT count(*) FROM accounts"), 0);
    }

    #[test]
    fn test_fully_flagged_batch_promotes_nothing() {
        let (_dir, mut conn) = test_db();
        staging::insert_batch(
            &mut conn,
            &[bca(1, "a", -1.0, Some(10.0)), bca(2, "b", -1.0, Some(20.0))],
            "b1",
        )
        .unwrap();
        for p in staging::list(&conn, Some("b1")).unwrap() {
            staging::toggle_deletion_flag(&conn, p.id).unwrap();
        }
        let result = confirm_import(&mut conn, Some("b1")).unwrap();
        assert_eq!(result.promoted, 0);
        assert_eq!(result.balances_updated, 0);
        assert_eq!(count(&conn, "SELECT count(*) FROM accounts"), 0);
        assert_eq!(staging::list(&conn, Some("b1")).unwrap().len(), 2);
    }

    #[test]
    fn test_flagged_record_left_untouched() {
        let (_dir, mut conn) = test_db();
        staging::insert_batch(&mut conn, &[bca(1, "keep", -1.0, None), bca(2, "drop", -2.0, None)], "b1").unwrap();
        let flagged = staging::list(&conn, Some("b1"))
            .unwrap()
            .into_iter()
            .find(|p| p.details == "drop")
            .unwrap();
        staging::toggle_deletion_flag(&conn, flagged.id).unwrap();

        let result = confirm_import(&mut conn, Some("b1")).unwrap();
        assert_eq!(result.promoted, 1);
        let remaining = staging::list(&conn, Some("b1")).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, flagged.id);
        assert!(remaining[0].marked_for_deletion);
        assert_eq!(ledger::list(&conn, None, None).unwrap()[0].details, "keep");

        staging::discard(&conn, flagged.id).unwrap();
        assert_eq!(staging::count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_latest_dated_balance_wins_regardless_of_insert_order() {
        let (_dir, mut conn) = test_db();
        staging::insert_batch(
            &mut conn,
            &[
                bca(3, "third", -70.0, Some(180.0)),
                bca(1, "first", 100.0, Some(100.0)),
                bca(2, "second", 150.0, Some(250.0)),
            ],
            "b1",
        )
        .unwrap();
        let result = confirm_import(&mut conn, Some("b1")).unwrap();
        assert_eq!(result.balances_updated, 1);
        let account = accounts::resolve(&conn, "BCA", Some("123")).unwrap().unwrap();
        assert_eq!(account.current_balance, 180.0);
        assert!(account.last_synced.is_some());
    }

    #[test]
    fn test_same_day_ties_go_to_last_staged() {
        let (_dir, mut conn) = test_db();
        staging::insert_batch(
            &mut conn,
            &[bca(4, "morning", -10.0, Some(990.0)), bca(4, "evening", -20.0, Some(970.0))],
            "b1",
        )
        .unwrap();
        confirm_import(&mut conn, Some("b1")).unwrap();
        assert_eq!(accounts::total_balance(&conn).unwrap(), 970.0);
    }

    #[test]
    fn test_balances_tracked_per_account() {
        let (_dir, mut conn) = test_db();
        let mut mega = NewTransaction::new(day(2), "Card payment", -500.0);
        mega.source = Some("Bank Mega".to_string());
        mega.running_balance = Some(-500.0);
        staging::insert_batch(&mut conn, &[bca(1, "Salary", 1_000.0, Some(1_000.0)), mega], "b1").unwrap();
        let result = confirm_import(&mut conn, Some("b1")).unwrap();
        assert_eq!(result.balances_updated, 2);
        let mega = accounts::resolve(&conn, "Bank Mega", None).unwrap().unwrap();
        assert_eq!(mega.current_balance, -500.0);
        assert_eq!(mega.name, "Bank Mega");
        assert_eq!(accounts::total_balance(&conn).unwrap(), 500.0);
    }

    #[test]
    fn test_record_without_source_has_no_account() {
        let (_dir, mut conn) = test_db();
        let mut cash = NewTransaction::new(day(1), "Cash purchase", -20_000.0);
        cash.running_balance = Some(5.0);
        staging::insert_batch(&mut conn, &[cash], "b1").unwrap();
        let result = confirm_import(&mut conn, Some("b1")).unwrap();
        assert_eq!(result.promoted, 1);
        assert_eq!(result.balances_updated, 0);
        assert_eq!(ledger::list(&conn, None, None).unwrap()[0].account_id, None);
        assert_eq!(count(&conn, "SELECT count(*) FROM accounts"), 0);
    }

    #[test]
    fn test_direct_account_reference_is_kept() {
        let (_dir, mut conn) = test_db();
        let ocbc = accounts::resolve_or_create(&conn, "OCBC", Some("777")).unwrap();
        let mut r = bca(1, "Linked", -1.0, Some(42.0));
        r.account_id = Some(ocbc.id);
        staging::insert_batch(&mut conn, &[r], "b1").unwrap();
        confirm_import(&mut conn, Some("b1")).unwrap();
        assert_eq!(ledger::list(&conn, None, None).unwrap()[0].account_id, Some(ocbc.id));
        assert_eq!(accounts::get(&conn, ocbc.id).unwrap().current_balance, 42.0);
        assert!(accounts::resolve(&conn, "BCA", Some("123")).unwrap().is_none());
    }

    #[test]
    fn test_edited_category_is_promoted() {
        let (_dir, mut conn) = test_db();
        let mut r = bca(1, "Indomaret", -80_000.0, None);
        r.category = Some("Dining".to_string());
        staging::insert_batch(&mut conn, &[r], "b1").unwrap();
        let staged = staging::list(&conn, Some("b1")).unwrap();
        assert_eq!(staged[0].category.as_deref(), Some("Dining"));
        staging::update_category(&conn, staged[0].id, "Groceries").unwrap();

        confirm_import(&mut conn, Some("b1")).unwrap();
        let txs = ledger::list(&conn, None, None).unwrap();
        assert_eq!(txs[0].category, "Groceries");
    }

    #[test]
    fn test_failure_rolls_back_everything() {
        let (_dir, mut conn) = test_db();
        conn.execute_batch(
            "CREATE TRIGGER fail_promotion BEFORE INSERT ON transactions WHEN NEW.details = 'BOOM' \
             BEGIN SELECT RAISE(ABORT, 'storage failure'); END;",
        )
        .unwrap();
        staging::insert_batch(
            &mut conn,
            &[bca(1, "fine", -1.0, Some(10.0)), bca(2, "BOOM", -1.0, Some(9.0))],
            "b1",
        )
        .unwrap();

        let err = confirm_import(&mut conn, Some("b1")).unwrap_err();
        assert!(matches!(err, ShaftError::Db(_)));
        assert_eq!(ledger::count(&conn).unwrap(), 0);
        assert_eq!(count(&conn, "SELECT count(*) FROM accounts"), 0);
        let staged = staging::list(&conn, Some("b1")).unwrap();
        assert_eq!(staged.len(), 2);
        assert!(staged.iter().all(|p| !p.marked_for_deletion));
    }

    #[test]
    fn test_reconfirm_reuses_account() {
        let (_dir, mut conn) = test_db();
        staging::insert_batch(&mut conn, &[bca(1, "Jan", -1.0, Some(100.0))], "jan").unwrap();
        confirm_import(&mut conn, Some("jan")).unwrap();
        staging::insert_batch(&mut conn, &[bca(20, "Feb", -1.0, Some(60.0))], "feb").unwrap();
        confirm_import(&mut conn, Some("feb")).unwrap();
        assert_eq!(count(&conn, "SELECT count(*) FROM accounts"), 1);
        assert_eq!(accounts::total_balance(&conn).unwrap(), 60.0);
        assert_eq!(ledger::count(&conn).unwrap(), 2);
    }

    fn staged_and_promoted(conn: &Connection) -> (i64, i64) {
        // One statement, one snapshot.
        conn.query_row(
            "SELECT (SELECT count(*) FROM pending_transactions), (SELECT count(*) FROM transactions)",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap()
    }

    #[test]
    fn test_confirm_waits_for_open_writer() {
        let (dir, mut conn) = test_db();
        let db_path = dir.path().join("test.db");
        staging::insert_batch(
            &mut conn,
            &[
                bca(1, "a", -1.0, Some(100.0)),
                bca(2, "b", -1.0, Some(250.0)),
                bca(3, "c", -1.0, Some(180.0)),
            ],
            "b1",
        )
        .unwrap();

        let mut second = get_connection(&db_path).unwrap();
        let mut holder = get_connection(&db_path).unwrap();
        let lock = holder.transaction_with_behavior(TransactionBehavior::Immediate).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            let result = confirm_import(&mut second, Some("b1")).map_err(|e| e.to_string());
            done_tx.send(()).unwrap();
            result
        });

        thread::sleep(Duration::from_millis(300));
        assert!(done_rx.try_recv().is_err(), "confirm finished while another writer held the lock");
        assert_eq!(staged_and_promoted(&conn), (3, 0));

        lock.commit().unwrap();
        while done_rx.try_recv().is_err() {
            let seen = staged_and_promoted(&conn);
            assert!(seen == (3, 0) || seen == (0, 3), "observed partial promotion: {seen:?}");
            thread::sleep(Duration::from_millis(5));
        }

        let result = worker.join().unwrap().unwrap();
        assert_eq!(result, ConfirmResult { promoted: 3, balances_updated: 1 });
        assert_eq!(staged_and_promoted(&conn), (0, 3));
        assert_eq!(accounts::total_balance(&conn).unwrap(), 180.0);
    }

    #[test]
    fn test_confirm_reports_busy_and_leaves_batch_staged() {
        let (dir, mut conn) = test_db();
        let db_path = dir.path().join("test.db");
        staging::insert_batch(&mut conn, &[bca(1, "a", -1.0, Some(100.0))], "b1").unwrap();

        let mut second = get_connection(&db_path).unwrap();
        second.busy_timeout(Duration::from_millis(50)).unwrap();
        let mut holder = get_connection(&db_path).unwrap();
        let lock = holder.transaction_with_behavior(TransactionBehavior::Immediate).unwrap();

        let err = confirm_import(&mut second, Some("b1")).unwrap_err();
        assert!(matches!(
            err,
            ShaftError::Db(rusqlite::Error::SqliteFailure(ref e, _)) if e.code == rusqlite::ErrorCode::DatabaseBusy
        ));
        drop(lock);

        assert_eq!(staged_and_promoted(&conn), (1, 0));
        assert_eq!(confirm_import(&mut second, Some("b1")).unwrap().promoted, 1);
    }
}
