use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ShaftError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    #[default]
    Expense,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ShaftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            other => Err(ShaftError::InvalidInput(format!(
                "unknown transaction type '{other}' (expected income, expense or transfer)"
            ))),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Rows written by older versions may carry kinds this version does not
/// know; those read back as the default kind.
impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Ok(raw.parse().unwrap_or_else(|_: ShaftError| {
            tracing::warn!(value = raw, "unknown transaction type, reading as expense");
            TransactionType::default()
        }))
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_number: Option<String>,
    pub bank_name: String,
    pub current_balance: f64,
    pub currency: String,
    pub last_synced: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row of the permanent ledger.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub details: String,
    pub amount: f64,
    pub account: Option<String>,
    pub source: Option<String>,
    pub category: String,
    pub account_id: Option<i64>,
    pub running_balance: Option<f64>,
    pub transaction_type: TransactionType,
    pub created_at: String,
    pub updated_at: String,
}

/// A row of the staging table, awaiting review and confirmation.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub id: i64,
    pub date: NaiveDate,
    pub details: String,
    pub amount: f64,
    pub account: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub marked_for_deletion: bool,
    pub import_batch_id: Option<String>,
    pub account_id: Option<i64>,
    pub running_balance: Option<f64>,
    pub transaction_type: TransactionType,
    pub created_at: String,
}

impl PendingTransaction {
    /// The ledger record this staged row becomes once its account is known.
    pub fn promote(&self, account_id: Option<i64>) -> NewTransaction {
        NewTransaction {
            date: self.date,
            details: self.details.clone(),
            amount: self.amount,
            account: self.account.clone(),
            source: self.source.clone(),
            category: self.category.clone(),
            account_id,
            running_balance: self.running_balance,
            transaction_type: Some(self.transaction_type),
        }
    }
}

/// Candidate record as produced by statement extraction, CSV intake or
/// manual entry, before it is written anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub details: String,
    pub amount: f64,
    #[serde(default, deserialize_with = "string_or_number")]
    pub account: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub running_balance: Option<f64>,
    #[serde(default)]
    pub transaction_type: Option<TransactionType>,
}

impl NewTransaction {
    pub fn new(date: NaiveDate, details: impl Into<String>, amount: f64) -> Self {
        Self {
            date,
            details: details.into(),
            amount,
            account: None,
            source: None,
            category: None,
            account_id: None,
            running_balance: None,
            transaction_type: None,
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.details.trim().is_empty() {
            return Err(ShaftError::InvalidInput(format!(
                "transaction on {} has empty details",
                self.date
            )));
        }
        if !self.amount.is_finite() {
            return Err(ShaftError::InvalidInput(format!(
                "transaction '{}' has a non-finite amount",
                self.details
            )));
        }
        Ok(())
    }
}

/// Statement account numbers come back from extraction as either JSON
/// strings or bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
