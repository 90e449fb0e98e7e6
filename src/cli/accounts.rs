use comfy_table::{Cell, CellAlignment, Table};

use crate::accounts;
use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::settings::load_settings;

pub fn list() -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let rows = accounts::list_all(&conn)?;
    if rows.is_empty() {
        println!("No accounts yet. They are created when staged records are confirmed.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Bank", "Number", "Balance", "Last Synced"]);
    for account in rows {
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(account.name),
            Cell::new(account.bank_name),
            Cell::new(account.account_number.unwrap_or_default()),
            Cell::new(money(account.current_balance, &account.currency)).set_alignment(CellAlignment::Right),
            Cell::new(account.last_synced.unwrap_or_else(|| "never".to_string())),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn total() -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    println!("{}", money(accounts::total_balance(&conn)?, &settings.currency));
    Ok(())
}
