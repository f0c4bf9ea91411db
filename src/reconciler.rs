use crate::config::LedgerConfig;
use crate::entries::ExpenseEntry;
use crate::error::{Result, RowError};
use crate::normalizer::{RowNormalizer, SkippedRow};
use crate::schema::{DuplicateKey, RecordDetails};
use crate::sheets::{append_record, RowSink, RowSource};
use crate::table::Table;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const RECURRING_TAG: &str = "Recurring";

/// Rows a reconciliation pass would insert, decided without touching the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub new_entries: Vec<ExpenseEntry>,
    /// Template rows whose key is already in the target ledger
    pub already_present: usize,
    /// Template rows dropped because an earlier template row had the same key
    pub collapsed: usize,
    pub skipped: Vec<SkippedRow>,
    /// Target sheet header the description is written under
    pub description_column: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub inserted: usize,
    pub already_present: usize,
    pub collapsed: usize,
    pub skipped: Vec<SkippedRow>,
}

/// `"Recurring"` for empty comments, otherwise the comments tagged
/// `" (Recurring)"`.
pub fn recurring_comment(comments: Option<&str>) -> String {
    match comments.map(str::trim).filter(|c| !c.is_empty()) {
        Some(text) => format!("{} ({})", text, RECURRING_TAG),
        None => RECURRING_TAG.to_string(),
    }
}

/// Finds the recurring template rows missing from a period's expense ledger.
///
/// Rows are matched on [`DuplicateKey`] (ISO date plus trimmed, lowercased
/// description), so a second pass over an unchanged ledger inserts nothing.
pub struct RecurringReconciler<'a> {
    config: &'a LedgerConfig,
    normalizer: RowNormalizer<'a>,
}

impl<'a> RecurringReconciler<'a> {
    pub fn new(config: &'a LedgerConfig) -> Result<Self> {
        Ok(Self {
            config,
            normalizer: RowNormalizer::new(config)?,
        })
    }

    /// Year assumed for template or ledger dates written without one.
    pub fn with_fallback_year(mut self, year: i32) -> Self {
        self.normalizer = self.normalizer.with_fallback_year(year);
        self
    }

    /// Keys of every target row with a readable date and description. The
    /// amount is not needed to block a re-insert.
    pub fn ledger_keys(&self, target: &Table) -> Result<HashSet<DuplicateKey>> {
        let cols = &self.config.columns;
        target.require_column(&cols.date)?;
        let description_col = target.require_any(&cols.description)?;

        let mut keys = HashSet::with_capacity(target.len());
        for (idx, row) in target.rows.iter().enumerate() {
            let date = self.normalizer.read_date(row, &cols.date);
            match (date, row.text(description_col)) {
                (Ok(date), Some(description)) => {
                    keys.insert(DuplicateKey::new(date, description));
                }
                _ => warn!(
                    "Row {} of '{}' has no readable date and description; it cannot match a template",
                    idx + 1,
                    target.name
                ),
            }
        }
        Ok(keys)
    }

    /// Works out which template rows are new. Schema problems in either sheet
    /// fail the whole plan; bad template rows are skipped individually.
    pub fn plan(&self, template: &Table, target: &Table) -> Result<ReconciliationPlan> {
        let cols = &self.config.columns;
        template.require_column(&cols.date)?;
        template.require_column(&cols.amount)?;
        let template_description = template.require_any(&cols.description)?;

        let existing = self.ledger_keys(target)?;
        let description_column = target
            .find_column(&cols.description)
            .unwrap_or_else(|| cols.primary_description())
            .to_string();

        let collapse = self.config.reconciler.collapse_duplicate_templates;
        let mut plan = ReconciliationPlan {
            description_column,
            ..Default::default()
        };
        let mut planned: HashSet<DuplicateKey> = HashSet::new();

        for (idx, row) in template.rows.iter().enumerate() {
            let row_number = idx + 1;
            let parsed = match row.text(template_description) {
                None => Err(RowError::MissingValue {
                    column: template_description.to_string(),
                }),
                Some(_) => self.normalizer.expense_record(row, template_description),
            };

            let record = match parsed {
                Ok(record) => record,
                Err(reason) => {
                    debug!("Skipping template row {} of '{}': {}", row_number, template.name, reason);
                    plan.skipped.push(SkippedRow {
                        row_number,
                        raw: row.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let Some(key) = record.duplicate_key() else {
                continue;
            };
            let RecordDetails::Expense(expense) = record.details else {
                continue;
            };

            if existing.contains(&key) {
                plan.already_present += 1;
                continue;
            }

            if !planned.insert(key.clone()) {
                warn!(
                    "Template '{}' repeats {} '{}'",
                    template.name, key.iso_date, expense.description
                );
                if collapse {
                    plan.collapsed += 1;
                    continue;
                }
            }

            plan.new_entries.push(ExpenseEntry {
                date: expense.date,
                purchaser: expense.purchaser,
                description: expense.description,
                property: record.property,
                category: expense.category,
                amount: record.amount,
                comments: recurring_comment(expense.comments.as_deref()),
                receipt: None,
            });
        }

        Ok(plan)
    }
}

/// Copies the year's recurring template rows that are missing from its
/// expense sheet into that sheet.
///
/// Both sheets are read and checked before anything is written, so a schema
/// problem inserts nothing. A sink failure part way through is returned as is;
/// rows appended before it stay appended.
pub fn inject_recurring_expenses<W>(
    config: &LedgerConfig,
    workbook: &mut W,
    year: i32,
) -> Result<ReconciliationReport>
where
    W: RowSource + RowSink + ?Sized,
{
    let template_name = config.sheets.recurring_for(year);
    let target_name = config.sheets.expenses_for(year);
    info!(
        "Reconciling '{}' against '{}'",
        template_name, target_name
    );

    let template = workbook.fetch_rows(&template_name)?;
    let target = workbook.fetch_rows(&target_name)?;

    let plan = RecurringReconciler::new(config)?
        .with_fallback_year(year)
        .plan(&template, &target)?;

    for entry in &plan.new_entries {
        let row = entry.to_row(config, &plan.description_column);
        append_record(workbook, &target_name, &row)?;
    }

    let report = ReconciliationReport {
        inserted: plan.new_entries.len(),
        already_present: plan.already_present,
        collapsed: plan.collapsed,
        skipped: plan.skipped,
    };
    info!(
        "Recurring expenses for {}: {} inserted, {} already present, {} skipped",
        year,
        report.inserted,
        report.already_present,
        report.skipped.len()
    );
    Ok(report)
}
