//! # Rental Ledger
//!
//! A library for cleaning the hand-kept spreadsheets of a short-term-rental
//! business into typed records, rolling them up by month, and keeping a year's
//! expense sheet in sync with its recurring-expense template.
//!
//! ## Core Concepts
//!
//! - **Raw rows**: string-keyed spreadsheet rows, read through a [`RowSource`]
//! - **Normalized records**: income or expense rows with a parsed amount and
//!   exactly one month and year; rows that cannot be read are kept in a skip
//!   report instead of being dropped
//! - **Monthly aggregates**: income, expense and profit per property and
//!   calendar month
//! - **Recurring reconciliation**: template rows are matched to the ledger on
//!   date plus description, so injecting twice never inserts twice
//!
//! ## Example
//!
//! ```rust,ignore
//! use rental_ledger::*;
//!
//! let config = LedgerConfig::default();
//! let mut workbook = MemoryWorkbook::new()
//!     .with_table("2025 OPP Income", &["Rental Dates", "Property", "Amount"])
//!     .with_table("2025 OPP Expenses", &["Month", "Date", "Purchaser", "Description",
//!         "Property", "Category", "Amount", "Comments", "Receipt Link"])
//!     .with_table("2025 Recurring Expenses", &["Date", "Description", "Property", "Amount"]);
//!
//! let report = inject_recurring_expenses(&config, &mut workbook, 2025).unwrap();
//! println!("inserted {} recurring rows", report.inserted);
//!
//! let dashboard = build_dashboard(&config, &workbook, 2025).unwrap();
//! for row in &dashboard.aggregates {
//!     println!("{} {}: {}", row.property, row.month, row.profit);
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod dates;
pub mod entries;
pub mod error;
pub mod normalizer;
pub mod reconciler;
pub mod schema;
pub mod sheets;
pub mod table;

pub use aggregator::{
    aggregate_monthly, expense_type_summary, outstanding_balances, overdue, property_totals,
    records_for_year, ExpenseType, MonthlyExpenseTypes, OutstandingBalance, PropertyTotals,
};
pub use config::{ColumnNames, LedgerConfig, ReconcilerOptions, SheetNames};
pub use dates::{extract_first_valid_date, normalize_dashes, DateExtractor, DatePattern};
pub use entries::{
    apply_payment, log_expense, payment_note, sanitize_filename, store_receipt, ExpenseEntry,
    PaymentUpdate,
};
pub use error::{CollaboratorError, LedgerError, Result, RowError};
pub use normalizer::{parse_amount, NormalizationOutcome, RowNormalizer, SkippedRow};
pub use reconciler::{
    inject_recurring_expenses, ReconciliationPlan, ReconciliationReport, RecurringReconciler,
};
pub use schema::*;
pub use sheets::{
    align_to_headers, append_record, FileStore, MemoryFileStore, MemoryWorkbook, RowSink,
    RowSource,
};
pub use table::{RawRow, Table};

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything the dashboard shows for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub year: i32,
    pub aggregates: Vec<MonthlyAggregate>,
    pub expense_types: Vec<MonthlyExpenseTypes>,
    pub balances: Vec<OutstandingBalance>,
    pub income_skipped: Vec<SkippedRow>,
    pub expense_skipped: Vec<SkippedRow>,
}

impl DashboardReport {
    pub fn total_profit(&self) -> rust_decimal::Decimal {
        self.aggregates.iter().map(|a| a.profit).sum()
    }

    pub fn skip_count(&self) -> usize {
        self.income_skipped.len() + self.expense_skipped.len()
    }
}

pub struct LedgerProcessor;

impl LedgerProcessor {
    /// Normalizes a year's income and expense sheets.
    pub fn load_year<S: RowSource + ?Sized>(
        config: &LedgerConfig,
        source: &S,
        year: i32,
    ) -> Result<(NormalizationOutcome, NormalizationOutcome)> {
        let income_table = source.fetch_rows(&config.sheets.income_for(year))?;
        let expense_table = source.fetch_rows(&config.sheets.expenses_for(year))?;
        debug!(
            "Loaded {} income rows and {} expense rows for {}",
            income_table.len(),
            expense_table.len(),
            year
        );

        let normalizer = RowNormalizer::new(config)?
            .with_fallback_year(year)
            .restrict_to_year(year);
        let income = normalizer.normalize(&income_table, RecordKind::Income)?;
        let expenses = normalizer.normalize(&expense_table, RecordKind::Expense)?;
        Ok((income, expenses))
    }

    pub fn dashboard<S: RowSource + ?Sized>(
        config: &LedgerConfig,
        source: &S,
        year: i32,
    ) -> Result<DashboardReport> {
        info!(
            "Building {} dashboard for {}",
            year, config.business_name
        );

        let (income, expenses) = Self::load_year(config, source, year)?;
        let records: Vec<NormalizedRecord> = income
            .records
            .into_iter()
            .chain(expenses.records)
            .collect();

        let report = DashboardReport {
            year,
            aggregates: aggregate_monthly(&records),
            expense_types: expense_type_summary(&records),
            balances: outstanding_balances(&records),
            income_skipped: income.skipped,
            expense_skipped: expenses.skipped,
        };

        info!(
            "Dashboard for {}: {} groups from {} records, {} rows skipped",
            year,
            report.aggregates.len(),
            records.len(),
            report.skip_count()
        );
        Ok(report)
    }

    pub fn inject_recurring_expenses<W: RowSource + RowSink + ?Sized>(
        config: &LedgerConfig,
        workbook: &mut W,
        year: i32,
    ) -> Result<ReconciliationReport> {
        config.validate()?;
        reconciler::inject_recurring_expenses(config, workbook, year)
    }
}

pub fn build_dashboard<S: RowSource + ?Sized>(
    config: &LedgerConfig,
    source: &S,
    year: i32,
) -> Result<DashboardReport> {
    LedgerProcessor::dashboard(config, source, year)
}
