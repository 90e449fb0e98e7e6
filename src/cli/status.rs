use crate::db::{get_connection, get_stats, init_db};
use crate::error::Result;
use crate::fmt::{format_bytes, money};
use crate::reports;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Currency:   {}", settings.currency);

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        init_db(&conn)?;
        let stats = get_stats(&conn)?;
        let worth = reports::net_worth(&conn, settings.initial_net_worth, settings.savings_target)?;

        println!();
        println!("Accounts:      {}", stats.accounts);
        println!("Transactions:  {}", stats.transactions);
        println!("Staged:        {}", stats.pending);
        println!();
        println!("Net worth:     {}", money(worth.ledger, &settings.currency));
        println!("Target:        {} ({:.1}%)", money(worth.savings_target, &settings.currency), worth.progress_pct);
    } else {
        println!();
        println!("Database not found. Run `shaft init` to set up.");
    }

    Ok(())
}
