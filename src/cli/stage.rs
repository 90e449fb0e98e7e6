use std::path::Path;

use chrono::Utc;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Color, Table};

use crate::categories::Taxonomy;
use crate::cli::{open_db, truncate};
use crate::error::Result;
use crate::fmt::money;
use crate::intake::{self, Extractor, ResponseFileCategorizer, ResponseFileExtractor};
use crate::models::{NewTransaction, TransactionType};
use crate::settings::load_settings;
use crate::staging;

/// Canonicalizes every category already present on incoming records.
fn check_categories(records: &mut [NewTransaction], taxonomy: &Taxonomy) -> Result<()> {
    for record in records.iter_mut() {
        if let Some(name) = record.category.as_deref() {
            record.category = Some(taxonomy.validate(name)?.to_string());
        }
    }
    Ok(())
}

fn stage_records(mut records: Vec<NewTransaction>, batch: Option<String>, skipped: usize) -> Result<()> {
    let settings = load_settings();
    check_categories(&mut records, &settings.taxonomy())?;
    let mut conn = open_db(&settings)?;
    let batch_id = batch.unwrap_or_else(|| intake::new_batch_id(Utc::now()));

    let staged = staging::insert_batch(&mut conn, &records, &batch_id)?;
    println!("Staged {staged} record(s) as {}", batch_id.bold());
    if skipped > 0 {
        println!("{}", format!("Skipped {skipped} unreadable row(s)").yellow());
    }
    Ok(())
}

pub fn csv(file: &str, batch: Option<String>) -> Result<()> {
    let intake = intake::parse_csv(Path::new(file))?;
    stage_records(intake.records, batch, intake.skipped)
}

pub fn json(file: &str, batch: Option<String>) -> Result<()> {
    let records = ResponseFileExtractor.extract(Path::new(file))?;
    stage_records(records, batch, 0)
}

pub fn list(batch: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let rows = staging::list(&conn, batch)?;
    if rows.is_empty() {
        println!("Staging area is empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Details", "Amount", "Category", "Type", "Source", "Account", "Batch"]);
    for p in &rows {
        let mut details = Cell::new(truncate(&p.details, 40));
        if p.marked_for_deletion {
            details = details.fg(Color::DarkGrey);
        }
        table.add_row(vec![
            Cell::new(if p.marked_for_deletion { format!("{} ✗", p.id) } else { p.id.to_string() }),
            Cell::new(p.date),
            details,
            Cell::new(money(p.amount, &settings.currency)).set_alignment(CellAlignment::Right),
            Cell::new(p.category.as_deref().unwrap_or("-")),
            Cell::new(p.transaction_type),
            Cell::new(p.source.as_deref().unwrap_or("")),
            Cell::new(p.account.as_deref().unwrap_or("")),
            Cell::new(p.import_batch_id.as_deref().unwrap_or("")),
        ]);
    }
    let flagged = rows.iter().filter(|p| p.marked_for_deletion).count();
    println!("Staged transactions ({} total, {flagged} marked for deletion)\n{table}", rows.len());
    Ok(())
}

pub fn batches() -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let summaries = staging::batches(&conn)?;
    if summaries.is_empty() {
        println!("Staging area is empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Batch", "Records", "Marked", "From", "To"]);
    for b in summaries {
        table.add_row(vec![
            Cell::new(b.batch_id.unwrap_or_else(|| "(none)".to_string())),
            Cell::new(b.records),
            Cell::new(b.marked_for_deletion),
            Cell::new(b.first_date),
            Cell::new(b.last_date),
        ]);
    }
    println!("Import batches\n{table}");
    Ok(())
}

pub fn categorize(batch: &str, response: &str) -> Result<()> {
    let settings = load_settings();
    let mut conn = open_db(&settings)?;
    let categorizer = ResponseFileCategorizer { path: response.into() };
    let updated = intake::apply_categories(&mut conn, batch, &categorizer, &settings.taxonomy())?;
    println!("Categorized {updated} record(s) in {batch}");
    Ok(())
}

pub fn set_category(id: i64, category: &str) -> Result<()> {
    let settings = load_settings();
    let taxonomy = settings.taxonomy();
    let canonical = taxonomy.validate(category)?;
    let conn = open_db(&settings)?;
    staging::update_category(&conn, id, canonical)?;
    println!("Staged record {id} -> {canonical}");
    Ok(())
}

pub fn set_type(id: i64, kind: &str) -> Result<()> {
    let kind: TransactionType = kind.parse()?;
    let settings = load_settings();
    let conn = open_db(&settings)?;
    staging::update_type(&conn, id, kind)?;
    println!("Staged record {id} is now {kind}");
    Ok(())
}

pub fn toggle(id: i64) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    if staging::toggle_deletion_flag(&conn, id)? {
        println!("Staged record {id} marked for deletion");
    } else {
        println!("Staged record {id} unmarked");
    }
    Ok(())
}

pub fn discard(id: i64) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    staging::discard(&conn, id)?;
    println!("Discarded staged record {id}");
    Ok(())
}

pub fn clear(batch: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let removed = match batch {
        Some(batch_id) => staging::discard_batch(&conn, batch_id)?,
        None => staging::discard_all(&conn)?,
    };
    println!("Removed {removed} staged record(s)");
    Ok(())
}

pub fn export(batch: &str, output: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let records: Vec<NewTransaction> = intake::review_order(&conn, batch)?
        .iter()
        .map(|p| p.promote(p.account_id))
        .collect();
    let json = serde_json::to_string_pretty(&records)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))?;
            println!("Wrote {} record(s) to {path}", records.len());
        }
        None => println!("{json}"),
    }
    Ok(())
}
