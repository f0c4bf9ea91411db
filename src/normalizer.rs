use crate::config::LedgerConfig;
use crate::dates::DateExtractor;
use crate::error::{LedgerError, Result, RowError};
use crate::schema::{
    ExpenseDetails, IncomeDetails, IncomeStatus, Month, NormalizedRecord, ReceiptReference,
    RecordDetails, RecordKind,
};
use crate::table::{RawRow, Table};
use chrono::{Datelike, Local, NaiveDate};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A row left out of a normalization pass, kept verbatim for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based position among the sheet's data rows
    pub row_number: usize,
    pub raw: RawRow,
    pub reason: RowError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationOutcome {
    pub records: Vec<NormalizedRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl NormalizationOutcome {
    pub fn skip_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Largest amount magnitude a cell may hold. Anything bigger is a typo, and
/// accepting it could overflow the monthly sums.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Strips `$`, `,` and whitespace and parses what is left. Parenthesised
/// values are read as negatives. Anything else non-numeric is `None`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '"') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    if let Some(inner) = cleaned.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return Decimal::from_str(inner).ok().map(|d| -d);
    }

    Decimal::from_str(&cleaned).ok()
}

/// Trims and capitalises the first letter of every word, lowercasing the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.trim().chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

pub struct RowNormalizer<'a> {
    config: &'a LedgerConfig,
    extractor: DateExtractor,
    fallback_year: i32,
    period: Option<i32>,
}

impl<'a> RowNormalizer<'a> {
    pub fn new(config: &'a LedgerConfig) -> Result<Self> {
        Ok(Self {
            config,
            extractor: config.date_extractor()?,
            fallback_year: Local::now().year(),
            period: None,
        })
    }

    /// Year assumed for dates written without one and for income sheets that
    /// only carry a month. Defaults to the current calendar year.
    pub fn with_fallback_year(mut self, year: i32) -> Self {
        self.fallback_year = year;
        self
    }

    /// Skips records whose resolved year is not `year` with
    /// [`RowError::OutOfPeriod`] instead of returning them.
    pub fn restrict_to_year(mut self, year: i32) -> Self {
        self.period = Some(year);
        self
    }

    fn check_period(&self, record: NormalizedRecord) -> std::result::Result<NormalizedRecord, RowError> {
        match self.period {
            Some(expected) if record.year != expected => Err(RowError::OutOfPeriod {
                expected,
                found: record.year,
            }),
            _ => Ok(record),
        }
    }

    fn warn_unknown_property(&self, table: &Table, property: &str) {
        if !property.is_empty() && !self.config.is_known_property(property) {
            warn!("Unknown property '{}' in '{}'", property, table.name);
        }
    }

    pub fn normalize(&self, table: &Table, kind: RecordKind) -> Result<NormalizationOutcome> {
        match kind {
            RecordKind::Income => self.normalize_income(table),
            RecordKind::Expense => self.normalize_expenses(table),
        }
    }

    pub fn normalize_expenses(&self, table: &Table) -> Result<NormalizationOutcome> {
        let cols = &self.config.columns;
        table.require_column(&cols.date)?;
        table.require_column(&cols.amount)?;
        let description_col = table.require_any(&cols.description)?;

        let outcome = collect(table, |row| {
            let record = self.expense_record(row, description_col)?;
            self.warn_unknown_property(table, &record.property);
            if let Some(expense) = record.as_expense() {
                if !expense.category.is_empty() && !self.config.is_known_category(&expense.category) {
                    warn!("Unknown category '{}' in '{}'", expense.category, table.name);
                }
            }
            self.check_period(record)
        });

        info!(
            "Normalized expense sheet '{}': {} records, {} skipped",
            table.name,
            outcome.records.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Normalizes one expense row, reading the description from
    /// `description_column`.
    pub fn expense_record(
        &self,
        row: &RawRow,
        description_column: &str,
    ) -> std::result::Result<NormalizedRecord, RowError> {
        let cols = &self.config.columns;
        let date = self.read_date(row, &cols.date)?;
        let amount = read_amount(row, &cols.amount)?;

        let expense = ExpenseDetails {
            date,
            category: row
                .text(&cols.category)
                .map(|c| self.config.normalize_category(c))
                .unwrap_or_default(),
            purchaser: row.text(&cols.purchaser).unwrap_or_default().to_string(),
            description: row.text(description_column).unwrap_or_default().to_string(),
            comments: row.text(&cols.comments).map(str::to_string),
            receipt_reference: row.text(&cols.receipt).map(ReceiptReference::new),
        };

        Ok(NormalizedRecord {
            property: title_case(row.get(&cols.property).unwrap_or_default()),
            amount,
            month: Month::of(date),
            year: date.year(),
            details: RecordDetails::Expense(expense),
        })
    }

    pub fn normalize_income(&self, table: &Table) -> Result<NormalizationOutcome> {
        let cols = &self.config.columns;
        let amount_col = table.require_any(&cols.income_amount)?;

        // The rental range wins whenever the column exists; the month column is
        // only a fallback for sheets that never had one.
        let use_rental_range = table.has_column(&cols.rental_dates);
        if !use_rental_range {
            table.require_column(&cols.month).map_err(|_| {
                LedgerError::missing_column(&table.name, &cols.rental_dates)
            })?;
        }
        let renter_col = table.find_column(&cols.renter_name);

        let outcome = collect(table, |row| {
            let (rental_start, range_end) = if use_rental_range {
                self.read_rental_range(row)?
            } else {
                (self.read_month_start(row)?, None)
            };
            let amount = read_amount(row, amount_col)?;

            let rental_end = row
                .text(&cols.check_out)
                .and_then(|text| self.extractor.extract_with_year(text, self.fallback_year))
                .or(range_end);
            let amount_owed = row.text(&cols.amount_owed).and_then(parse_amount);
            let status = row
                .text(&cols.status)
                .and_then(IncomeStatus::parse)
                .unwrap_or_else(|| match amount_owed {
                    Some(owed) => IncomeStatus::from_amounts(owed, amount),
                    None => IncomeStatus::PmtDue,
                });

            let income = IncomeDetails {
                rental_start,
                rental_end,
                renter_name: renter_col.and_then(|c| row.text(c)).map(str::to_string),
                status,
                amount_owed,
            };

            let record = NormalizedRecord {
                property: title_case(row.get(&cols.property).unwrap_or_default()),
                amount,
                month: Month::of(rental_start),
                year: rental_start.year(),
                details: RecordDetails::Income(income),
            };
            self.warn_unknown_property(table, &record.property);
            self.check_period(record)
        });

        info!(
            "Normalized income sheet '{}': {} records, {} skipped",
            table.name,
            outcome.records.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Reads a date cell with the configured patterns.
    pub fn read_date(&self, row: &RawRow, column: &str) -> std::result::Result<NaiveDate, RowError> {
        let text = row.text(column).ok_or_else(|| RowError::MissingValue {
            column: column.to_string(),
        })?;
        self.extractor
            .extract_with_year(text, self.fallback_year)
            .ok_or_else(|| RowError::UnparsableDate {
                column: column.to_string(),
                value: text.to_string(),
            })
    }

    fn read_rental_range(
        &self,
        row: &RawRow,
    ) -> std::result::Result<(NaiveDate, Option<NaiveDate>), RowError> {
        let column = &self.config.columns.rental_dates;
        let text = row.text(column).ok_or_else(|| RowError::MissingValue {
            column: column.clone(),
        })?;
        self.extractor
            .extract_range_with_year(text, self.fallback_year)
            .ok_or_else(|| RowError::UnparsableDate {
                column: column.clone(),
                value: text.to_string(),
            })
    }

    fn read_month_start(&self, row: &RawRow) -> std::result::Result<NaiveDate, RowError> {
        let cols = &self.config.columns;
        let text = row.text(&cols.month).ok_or_else(|| RowError::MissingValue {
            column: cols.month.clone(),
        })?;
        let year = row
            .text(&cols.year)
            .and_then(|y| y.parse::<i32>().ok())
            .unwrap_or(self.fallback_year);

        text.parse::<Month>()
            .ok()
            .and_then(|month| month.first_day(year))
            .ok_or_else(|| RowError::UnparsableDate {
                column: cols.month.clone(),
                value: text.to_string(),
            })
    }
}

fn read_amount(row: &RawRow, column: &str) -> std::result::Result<Decimal, RowError> {
    let text = row.text(column).ok_or_else(|| RowError::MissingValue {
        column: column.to_string(),
    })?;
    let amount = parse_amount(text).ok_or_else(|| RowError::UnparsableAmount {
        column: column.to_string(),
        value: text.to_string(),
    })?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(RowError::NegativeAmount {
            column: column.to_string(),
            value: text.to_string(),
        });
    }
    if amount > Decimal::from(MAX_AMOUNT) {
        return Err(RowError::AmountOutOfRange {
            column: column.to_string(),
            value: text.to_string(),
        });
    }
    Ok(amount)
}

fn collect<F>(table: &Table, mut normalize_row: F) -> NormalizationOutcome
where
    F: FnMut(&RawRow) -> std::result::Result<NormalizedRecord, RowError>,
{
    let mut outcome = NormalizationOutcome::default();
    for (idx, row) in table.rows.iter().enumerate() {
        match normalize_row(row) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => {
                debug!("Skipping row {} of '{}': {}", idx + 1, table.name, reason);
                outcome.skipped.push(SkippedRow {
                    row_number: idx + 1,
                    raw: row.clone(),
                    reason,
                });
            }
        }
    }
    outcome
}
