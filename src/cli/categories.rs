use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::settings::load_settings;

pub fn list() -> Result<()> {
    let taxonomy = load_settings().taxonomy();

    let mut table = Table::new();
    table.set_header(vec!["Category", "Description"]);
    for (group, members) in taxonomy.groups() {
        table.add_row(vec![Cell::new(group.bold()), Cell::new("")]);
        for cat in members {
            table.add_row(vec![
                Cell::new(format!("  {}", cat.name)),
                Cell::new(&cat.description),
            ]);
        }
    }
    println!("Categories\n{table}");
    Ok(())
}
