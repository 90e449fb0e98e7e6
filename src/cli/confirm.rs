use colored::Colorize;

use crate::cli::open_db;
use crate::error::Result;
use crate::reconciler::confirm_import;
use crate::settings::load_settings;

pub fn run(batch: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let mut conn = open_db(&settings)?;
    let result = confirm_import(&mut conn, batch)?;

    if result.promoted == 0 {
        println!("Nothing to confirm.");
        return Ok(());
    }
    println!(
        "{} {} transaction(s), updated {} account balance(s).",
        "Confirmed".green().bold(),
        result.promoted,
        result.balances_updated
    );
    Ok(())
}
