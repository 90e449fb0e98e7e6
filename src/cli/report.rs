use chrono::{Datelike, Local, NaiveDate};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::reports::{self, Period};
use crate::settings::load_settings;

fn amount_cell(val: f64, currency: &str) -> Cell {
    Cell::new(money(val, currency)).set_alignment(CellAlignment::Right)
}

pub fn expenses(period: Period, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let (from, to) = match (from, to) {
        (Some(f), Some(t)) => (f, t),
        _ => period.range(Local::now().date_naive()),
    };
    let rows = reports::expenses_by_category(&conn, from, to)?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "Count", "%"]);
    let mut total = 0.0;
    for row in &rows {
        total += row.total;
        table.add_row(vec![
            Cell::new(&row.category),
            amount_cell(row.total.abs(), &settings.currency),
            Cell::new(row.count),
            Cell::new(format!("{:.1}%", row.pct)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        amount_cell(total.abs(), &settings.currency),
        Cell::new(""),
        Cell::new(""),
    ]);
    println!("Expenses {from} to {to}\n{table}");
    Ok(())
}

pub fn monthly(year: Option<i32>) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let year = year.unwrap_or_else(|| Local::now().year());
    let months = reports::monthly_totals(&conn, year)?;

    let mut table = Table::new();
    table.set_header(vec!["Month", "Income", "Expenses", "Net"]);
    for m in &months {
        let net = m.income - m.expenses;
        let net_text = money(net, &settings.currency);
        table.add_row(vec![
            Cell::new(&m.month),
            amount_cell(m.income, &settings.currency),
            amount_cell(m.expenses, &settings.currency),
            Cell::new(if net >= 0.0 { net_text.green() } else { net_text.red() })
                .set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Monthly totals {year}\n{table}");
    Ok(())
}

pub fn daily(limit: Option<usize>) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let series = reports::daily_series(&conn, settings.initial_net_worth)?;
    let skip = limit.map_or(0, |n| series.len().saturating_sub(n));

    let mut table = Table::new();
    table.set_header(vec!["Date", "Income", "Expenses", "Net", "Net Worth"]);
    for point in series.iter().skip(skip) {
        table.add_row(vec![
            Cell::new(point.date),
            amount_cell(point.income, &settings.currency),
            amount_cell(point.expenses, &settings.currency),
            amount_cell(point.net, &settings.currency),
            amount_cell(point.balance, &settings.currency),
        ]);
    }
    println!("Daily series\n{table}");
    Ok(())
}

pub fn net_worth() -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let nw = reports::net_worth(&conn, settings.initial_net_worth, settings.savings_target)?;

    let mut table = Table::new();
    table.add_row(vec![Cell::new("Net worth (ledger)".bold()), amount_cell(nw.ledger, &settings.currency)]);
    table.add_row(vec![Cell::new("Account balances"), amount_cell(nw.accounts, &settings.currency)]);
    table.add_row(vec![Cell::new("Savings target"), amount_cell(nw.savings_target, &settings.currency)]);
    table.add_row(vec![
        Cell::new("Progress"),
        Cell::new(format!("{:.1}%", nw.progress_pct)).set_alignment(CellAlignment::Right),
    ]);
    println!("Net worth\n{table}");
    Ok(())
}
