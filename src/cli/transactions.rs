use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Color, Table};

use crate::cli::{open_db, truncate};
use crate::error::Result;
use crate::fmt::money;
use crate::ledger;
use crate::models::{NewTransaction, TransactionType};
use crate::settings::load_settings;

pub fn list(from: Option<NaiveDate>, to: Option<NaiveDate>, limit: Option<usize>) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let rows = ledger::list(&conn, from, to)?;
    if rows.is_empty() {
        println!("No transactions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Details", "Amount", "Category", "Type", "Account"]);
    let shown = limit.unwrap_or(rows.len());
    for tx in rows.iter().take(shown) {
        let amount_color = if tx.amount < 0.0 { Color::Red } else { Color::Green };
        table.add_row(vec![
            Cell::new(tx.id),
            Cell::new(tx.date),
            Cell::new(truncate(&tx.details, 40)),
            Cell::new(money(tx.amount, &settings.currency))
                .fg(amount_color)
                .set_alignment(CellAlignment::Right),
            Cell::new(&tx.category),
            Cell::new(tx.transaction_type),
            Cell::new(tx.account.as_deref().unwrap_or("")),
        ]);
    }
    println!("Transactions\n{table}");
    if shown < rows.len() {
        println!("{}", format!("… {} more", rows.len() - shown).dimmed());
    }
    Ok(())
}

pub fn add(
    date: NaiveDate,
    details: &str,
    amount: f64,
    category: Option<&str>,
    kind: Option<&str>,
    account_id: Option<i64>,
) -> Result<()> {
    let settings = load_settings();
    let taxonomy = settings.taxonomy();
    let mut tx = NewTransaction::new(date, details, amount);
    tx.category = category.map(|c| taxonomy.validate(c)).transpose()?.map(str::to_string);
    tx.transaction_type = kind.map(str::parse::<TransactionType>).transpose()?;
    tx.account_id = account_id;
    tx.validate()?;

    let conn = open_db(&settings)?;
    let id = ledger::insert(&conn, &tx)?;
    println!("Added transaction {id}: {} {}", tx.details, money(tx.amount, &settings.currency));
    Ok(())
}

pub fn categorize(id: i64, category: &str) -> Result<()> {
    let settings = load_settings();
    let taxonomy = settings.taxonomy();
    let canonical = taxonomy.validate(category)?;
    let conn = open_db(&settings)?;
    ledger::update_category(&conn, id, canonical)?;
    println!("Transaction {id} -> {canonical}");
    Ok(())
}

pub fn set_type(id: i64, kind: &str) -> Result<()> {
    let kind: TransactionType = kind.parse()?;
    let settings = load_settings();
    let conn = open_db(&settings)?;
    ledger::update_type(&conn, id, kind)?;
    println!("Transaction {id} is now {kind}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    ledger::delete(&conn, id)?;
    println!("Deleted transaction {id}");
    Ok(())
}
