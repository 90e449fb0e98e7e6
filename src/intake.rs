use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rusqlite::Connection;

use crate::categories::{Taxonomy, UNCATEGORISED};
use crate::error::{Result, ShaftError};
use crate::models::{NewTransaction, PendingTransaction};
use crate::staging;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Turns a statement document into candidate records.
pub trait Extractor {
    fn extract(&self, document: &Path) -> Result<Vec<NewTransaction>>;
}

/// Annotates candidate records with a category and transaction type. Output
/// must be the same records, in the same order.
pub trait Categorizer {
    fn categorize(&self, records: &[NewTransaction]) -> Result<Vec<NewTransaction>>;
}

/// Reads a saved extraction response (the model's raw text output).
pub struct ResponseFileExtractor;

impl Extractor for ResponseFileExtractor {
    fn extract(&self, document: &Path) -> Result<Vec<NewTransaction>> {
        let text = std::fs::read_to_string(document)?;
        parse_extraction_response(&text)
    }
}

/// Reads a saved categorization response from disk.
pub struct ResponseFileCategorizer {
    pub path: PathBuf,
}

impl Categorizer for ResponseFileCategorizer {
    fn categorize(&self, records: &[NewTransaction]) -> Result<Vec<NewTransaction>> {
        let text = std::fs::read_to_string(&self.path)?;
        let categorized = parse_extraction_response(&text)?;
        if categorized.len() != records.len() {
            return Err(ShaftError::InvalidInput(format!(
                "categorizer returned {} records for {} inputs",
                categorized.len(),
                records.len()
            )));
        }
        Ok(categorized)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn new_batch_id(now: DateTime<Utc>) -> String {
    format!("batch_{}", now.timestamp_millis())
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw
        .replace(',', "")
        .replace('"', "")
        .replace("Rp", "")
        .replace('$', "")
        .replace(' ', "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| -v);
    }
    s.parse().ok().filter(|v: &f64| v.is_finite())
}

/// ISO dates, with day-first `DD/MM/YYYY` as used on Indonesian statements.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n(.*?)\n?```$").expect("valid regex"))
}

fn plus_sign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"("\w+"\s*:\s*)\+(\d)"#).expect("valid regex"))
}

/// Parses the JSON array a language model returned, tolerating a Markdown
/// code fence around it and `+123` style numbers as object values.
pub fn parse_extraction_response(text: &str) -> Result<Vec<NewTransaction>> {
    let trimmed = text.trim();
    let unfenced = match fence_re().captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => trimmed,
    };
    let repaired = plus_sign_re().replace_all(unfenced, "${1}${2}");
    let records: Vec<NewTransaction> = serde_json::from_str(&repaired)?;
    for record in &records {
        record.validate()?;
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub struct CsvIntake {
    pub records: Vec<NewTransaction>,
    pub skipped: usize,
}

struct CsvColumns {
    date: usize,
    details: usize,
    amount: usize,
    account: Option<usize>,
    source: Option<usize>,
    category: Option<usize>,
    running_balance: Option<usize>,
    transaction_type: Option<usize>,
}

impl CsvColumns {
    fn from_header(header: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| ShaftError::InvalidInput(format!("CSV header is missing '{name}' column")))
        };
        Ok(Self {
            date: required("date")?,
            details: required("details")?,
            amount: required("amount")?,
            account: find("account"),
            source: find("source"),
            category: find("category"),
            running_balance: find("running_balance"),
            transaction_type: find("transaction_type"),
        })
    }
}

fn optional_field(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads `date,details,amount[,account,category,source,running_balance,transaction_type]`
/// rows. Rows with an unreadable date or amount are skipped.
pub fn parse_csv(file_path: &Path) -> Result<CsvIntake> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let cols = CsvColumns::from_header(rdr.headers()?)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let date = record.get(cols.date).and_then(parse_date);
        let amount = record.get(cols.amount).and_then(parse_amount);
        let details = record.get(cols.details).map(str::trim).unwrap_or_default();
        let (Some(date), Some(amount)) = (date, amount) else {
            tracing::warn!(line = line + 2, "skipping CSV row with unreadable date or amount");
            skipped += 1;
            continue;
        };
        if details.is_empty() {
            tracing::warn!(line = line + 2, "skipping CSV row with empty details");
            skipped += 1;
            continue;
        }

        let mut tx = NewTransaction::new(date, details, amount);
        tx.account = optional_field(&record, cols.account);
        tx.source = optional_field(&record, cols.source);
        tx.category = optional_field(&record, cols.category);
        tx.running_balance = optional_field(&record, cols.running_balance).and_then(|v| parse_amount(&v));
        tx.transaction_type = optional_field(&record, cols.transaction_type)
            .map(|v| v.parse())
            .transpose()?;
        records.push(tx);
    }
    Ok(CsvIntake { records, skipped })
}

// ---------------------------------------------------------------------------
// Categorization
// ---------------------------------------------------------------------------

/// Staged records of a batch in the order they are handed to a categorizer:
/// oldest first.
pub fn review_order(conn: &Connection, batch_id: &str) -> Result<Vec<PendingTransaction>> {
    let mut staged = staging::list(conn, Some(batch_id))?;
    staged.reverse();
    Ok(staged)
}

/// Runs `categorizer` over a staged batch and writes the resulting category
/// and type back onto each staged record. Categories outside `taxonomy` are
/// stored as `Uncategorised`.
pub fn apply_categories(
    conn: &mut Connection,
    batch_id: &str,
    categorizer: &dyn Categorizer,
    taxonomy: &Taxonomy,
) -> Result<usize> {
    let staged = review_order(conn, batch_id)?;
    let inputs: Vec<NewTransaction> = staged.iter().map(|p| p.promote(p.account_id)).collect();
    let categorized = categorizer.categorize(&inputs)?;
    if categorized.len() != staged.len() {
        return Err(ShaftError::InvalidInput(format!(
            "categorizer returned {} records for {} staged",
            categorized.len(),
            staged.len()
        )));
    }

    let tx = conn.transaction()?;
    for (pending, result) in staged.iter().zip(&categorized) {
        let category = match result.category.as_deref() {
            Some(name) => match taxonomy.validate(name) {
                Ok(canonical) => canonical,
                Err(_) => {
                    tracing::warn!(id = pending.id, category = name, "categorizer chose an unknown category");
                    UNCATEGORISED
                }
            },
            None => UNCATEGORISED,
        };
        let kind = result.transaction_type.unwrap_or(pending.transaction_type);
        staging::update_category_and_type(&tx, pending.id, category, kind)?;
    }
    tx.commit()?;
    tracing::info!(batch_id, count = staged.len(), "applied categories");
    Ok(staged.len())
}
