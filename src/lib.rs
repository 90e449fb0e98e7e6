pub mod accounts;
pub mod categories;
pub mod cli;
pub mod db;
pub mod error;
pub mod fmt;
pub mod intake;
pub mod ledger;
pub mod models;
pub mod reconciler;
pub mod reports;
pub mod settings;
pub mod staging;
