use crate::config::{ColumnNames, LedgerConfig};
use crate::error::{LedgerError, Result};
use crate::schema::{IncomeStatus, Month, ReceiptReference};
use crate::sheets::{append_record, FileStore, RowSink};
use crate::table::RawRow;
use chrono::{Datelike, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An expense ready to be appended to a year's expense sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub date: NaiveDate,
    pub purchaser: String,
    pub description: String,
    pub property: String,
    pub category: String,
    pub amount: Decimal,
    pub comments: String,
    pub receipt: Option<ReceiptReference>,
}

impl ExpenseEntry {
    /// Renders the sink row. The description goes under `description_column`
    /// and the category is passed through the alias map.
    pub fn to_row(&self, config: &LedgerConfig, description_column: &str) -> RawRow {
        let cols = &config.columns;
        RawRow::from_pairs([
            (cols.month.clone(), Month::of(self.date).name().to_string()),
            (cols.date.clone(), self.date.format("%Y-%m-%d").to_string()),
            (cols.purchaser.clone(), self.purchaser.clone()),
            (description_column.to_string(), self.description.clone()),
            (cols.property.clone(), self.property.clone()),
            (cols.category.clone(), config.normalize_category(&self.category)),
            (cols.amount.clone(), self.amount.to_string()),
            (cols.comments.clone(), self.comments.clone()),
            (
                cols.receipt.clone(),
                self.receipt
                    .as_ref()
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_default(),
            ),
        ])
    }
}

/// Which description alias a sheet with `headers` uses, or the primary alias
/// when it has none of them.
pub fn description_column<'a>(columns: &'a ColumnNames, headers: &[String]) -> &'a str {
    columns
        .description
        .iter()
        .find(|alias| headers.iter().any(|h| h == *alias))
        .map(String::as_str)
        .unwrap_or_else(|| columns.primary_description())
}

/// Appends `entry` to the expense sheet of its own year.
pub fn log_expense<S: RowSink + ?Sized>(
    config: &LedgerConfig,
    sink: &mut S,
    entry: &ExpenseEntry,
) -> Result<()> {
    let table = config.sheets.expenses_for(entry.date.year());
    let headers = sink
        .header_row(&table)
        .map_err(|e| LedgerError::external("header_row", &table, e))?;
    let column = description_column(&config.columns, &headers);

    append_record(sink, &table, &entry.to_row(config, column))?;
    info!(
        "Logged expense '{}' ({}) to '{}'",
        entry.description, entry.amount, table
    );
    Ok(())
}

/// Lowercases, turns spaces into underscores and drops anything outside
/// `[A-Za-z0-9_.-]`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect()
}

/// Uploads a receipt into the folder configured for `date`'s month.
pub fn store_receipt<F: FileStore + ?Sized>(
    config: &LedgerConfig,
    store: &mut F,
    date: NaiveDate,
    filename: &str,
    bytes: &[u8],
) -> Result<ReceiptReference> {
    let folder = config
        .receipt_folder(date)
        .ok_or_else(|| LedgerError::MissingReceiptFolder {
            year: date.year(),
            month: Month::of(date).name().to_string(),
        })?;
    let filename = sanitize_filename(filename);

    let reference = store
        .upload(folder, &filename, bytes)
        .map_err(|e| LedgerError::external("upload", folder, e))?;
    info!("Stored receipt '{}' in folder {}", filename, folder);
    Ok(ReceiptReference::new(reference))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub received: Decimal,
    pub balance: Decimal,
    pub status: IncomeStatus,
}

/// Applies a new payment to a booking. `None` for a negative payment or one
/// whose totals do not fit a `Decimal`.
pub fn apply_payment(owed: Decimal, received: Decimal, payment: Decimal) -> Option<PaymentUpdate> {
    if payment.is_sign_negative() && !payment.is_zero() {
        return None;
    }
    let received = received.checked_add(payment)?;
    Some(PaymentUpdate {
        received,
        balance: owed.checked_sub(received)?,
        status: IncomeStatus::from_amounts(owed, received),
    })
}

/// Appends `"<date>: <note>"` to a booking's notes, separated by `" | "`.
/// A blank note leaves the notes as they were.
pub fn payment_note(previous: Option<&str>, date: NaiveDate, note: &str) -> String {
    let previous = previous.unwrap_or_default().trim();
    let note = note.trim();
    if note.is_empty() {
        return previous.to_string();
    }
    let stamped = format!("{}: {}", date.format("%Y-%m-%d"), note);
    if previous.is_empty() {
        stamped
    } else {
        format!("{} | {}", previous, stamped)
    }
}
