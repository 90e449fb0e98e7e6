use chrono::{Duration, NaiveDate};
use rusqlite::Connection;

use crate::accounts;
use crate::error::Result;

// Transfers move money between own accounts; they count towards net movement
// but not towards income or expenses.
const NOT_TRANSFER: &str = "(transaction_type IS NULL OR transaction_type != 'transfer')";

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Period {
    Month,
    Quarter,
    Year,
}

impl Period {
    pub fn days(&self) -> i64 {
        match self {
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }

    /// Inclusive range ending today.
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today - Duration::days(self.days()), today)
    }
}

// ---------------------------------------------------------------------------
// Expense breakdown
// ---------------------------------------------------------------------------

pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: i64,
    pub pct: f64,
}

pub fn expenses_by_category(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<Vec<CategoryTotal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT category, SUM(amount) AS total, COUNT(*) FROM transactions \
         WHERE date BETWEEN ?1 AND ?2 AND amount < 0 AND {NOT_TRANSFER} \
         GROUP BY category ORDER BY total ASC"
    ))?;
    let raw: Vec<(String, f64, i64)> = stmt
        .query_map(rusqlite::params![from, to], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let grand_total: f64 = raw.iter().map(|(_, t, _)| t).sum();
    Ok(raw
        .into_iter()
        .map(|(category, total, count)| CategoryTotal {
            category,
            total,
            count,
            pct: if grand_total != 0.0 { total / grand_total * 100.0 } else { 0.0 },
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Monthly totals
// ---------------------------------------------------------------------------

pub struct MonthTotal {
    pub month: String,
    pub income: f64,
    pub expenses: f64,
}

/// Income and expenses (both positive) per `YYYY-MM` of `year`.
pub fn monthly_totals(conn: &Connection, year: i32) -> Result<Vec<MonthTotal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT strftime('%Y-%m', date) AS month, \
            SUM(CASE WHEN amount > 0 AND {NOT_TRANSFER} THEN amount ELSE 0 END), \
            SUM(CASE WHEN amount < 0 AND {NOT_TRANSFER} THEN ABS(amount) ELSE 0 END) \
         FROM transactions WHERE strftime('%Y', date) = ?1 \
         GROUP BY month ORDER BY month"
    ))?;
    let rows = stmt
        .query_map([format!("{year:04}")], |row| {
            Ok(MonthTotal {
                month: row.get(0)?,
                income: row.get(1)?,
                expenses: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Daily series
// ---------------------------------------------------------------------------

pub struct DailyPoint {
    pub date: NaiveDate,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
    /// Net worth at the end of the day: the starting figure plus every
    /// movement so far, transfers included.
    pub balance: f64,
}

pub fn daily_series(conn: &Connection, initial_net_worth: f64) -> Result<Vec<DailyPoint>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT date, \
            SUM(CASE WHEN amount > 0 AND {NOT_TRANSFER} THEN amount ELSE 0 END), \
            SUM(CASE WHEN amount < 0 AND {NOT_TRANSFER} THEN ABS(amount) ELSE 0 END), \
            SUM(amount) \
         FROM transactions GROUP BY date ORDER BY date ASC"
    ))?;
    let raw: Vec<(NaiveDate, f64, f64, f64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut balance = initial_net_worth;
    Ok(raw
        .into_iter()
        .map(|(date, income, expenses, net)| {
            balance += net;
            DailyPoint { date, income, expenses, net, balance }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Net worth
// ---------------------------------------------------------------------------

pub struct NetWorth {
    /// Starting net worth plus the sum of all ledger movements.
    pub ledger: f64,
    /// Sum of the latest statement balances across accounts.
    pub accounts: f64,
    pub savings_target: f64,
    pub progress_pct: f64,
}

pub fn net_worth(conn: &Connection, initial_net_worth: f64, savings_target: f64) -> Result<NetWorth> {
    let movement: f64 = conn.query_row("SELECT COALESCE(SUM(amount), 0.0) FROM transactions", [], |r| r.get(0))?;
    let ledger = initial_net_worth + movement;
    Ok(NetWorth {
        ledger,
        accounts: accounts::total_balance(conn)?,
        savings_target,
        progress_pct: if savings_target > 0.0 { ledger / savings_target * 100.0 } else { 0.0 },
    })
}
