use crate::schema::{Month, MonthlyAggregate, NormalizedRecord, RecordKind};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Default)]
struct Totals {
    income: Decimal,
    expense: Decimal,
}

/// Rolls records into per-(property, month) income, expense and profit.
///
/// Output is ordered January to December; properties sharing a month are
/// ordered by name. Months with activity on only one side get zero on the
/// other. Records from different years that share a month land in the same
/// bucket, so callers reporting a single year filter first with
/// [`records_for_year`].
pub fn aggregate_monthly<'a, I>(records: I) -> Vec<MonthlyAggregate>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut groups: BTreeMap<(Month, String), Totals> = BTreeMap::new();

    for record in records {
        let totals = groups
            .entry((record.month, record.property.clone()))
            .or_default();
        match record.kind() {
            RecordKind::Income => totals.income += record.amount,
            RecordKind::Expense => totals.expense += record.amount,
        }
    }

    debug!("Aggregated records into {} (property, month) groups", groups.len());

    groups
        .into_iter()
        .map(|((month, property), totals)| MonthlyAggregate {
            property,
            month,
            income: totals.income,
            expense: totals.expense,
            profit: totals.income - totals.expense,
        })
        .collect()
}

pub fn records_for_year(
    records: &[NormalizedRecord],
    year: i32,
) -> impl Iterator<Item = &NormalizedRecord> {
    records.iter().filter(move |r| r.year == year)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseType {
    Recurring,
    OneTime,
}

impl ExpenseType {
    /// Recurring when the comments mention "recurring" in any case.
    pub fn classify(comments: Option<&str>) -> ExpenseType {
        match comments {
            Some(text) if text.to_lowercase().contains("recurring") => ExpenseType::Recurring,
            _ => ExpenseType::OneTime,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyExpenseTypes {
    pub month: Month,
    pub recurring: Decimal,
    pub one_time: Decimal,
}

/// Expense totals split by [`ExpenseType`], one entry per calendar month
/// (zero-filled).
pub fn expense_type_summary<'a, I>(records: I) -> Vec<MonthlyExpenseTypes>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut summary: Vec<MonthlyExpenseTypes> = Month::ALL
        .iter()
        .map(|&month| MonthlyExpenseTypes {
            month,
            recurring: Decimal::ZERO,
            one_time: Decimal::ZERO,
        })
        .collect();

    for record in records {
        let Some(expense) = record.as_expense() else {
            continue;
        };
        let slot = &mut summary[record.month.number() as usize - 1];
        match ExpenseType::classify(expense.comments.as_deref()) {
            ExpenseType::Recurring => slot.recurring += record.amount,
            ExpenseType::OneTime => slot.one_time += record.amount,
        }
    }

    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingBalance {
    pub property: String,
    pub month: Month,
    pub owed: Decimal,
    pub received: Decimal,
    pub due: Decimal,
}

/// Owed vs received per (property, month) for income records, ordered by
/// property then calendar month. Bookings without an owed amount count as
/// owing nothing.
pub fn outstanding_balances<'a, I>(records: I) -> Vec<OutstandingBalance>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut groups: BTreeMap<(String, Month), (Decimal, Decimal)> = BTreeMap::new();

    for record in records {
        let Some(income) = record.as_income() else {
            continue;
        };
        let entry = groups
            .entry((record.property.clone(), record.month))
            .or_default();
        entry.0 += income.amount_owed.unwrap_or(Decimal::ZERO);
        entry.1 += record.amount;
    }

    groups
        .into_iter()
        .map(|((property, month), (owed, received))| OutstandingBalance {
            property,
            month,
            owed,
            received,
            due: owed - received,
        })
        .collect()
}

pub fn overdue(balances: &[OutstandingBalance]) -> Vec<&OutstandingBalance> {
    balances.iter().filter(|b| b.due > Decimal::ZERO).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTotals {
    pub property: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub profit: Decimal,
    pub active_months: usize,
}

/// Sums monthly aggregates per property, ordered by property name.
pub fn property_totals(aggregates: &[MonthlyAggregate]) -> Vec<PropertyTotals> {
    let mut by_property: BTreeMap<&str, PropertyTotals> = BTreeMap::new();

    for row in aggregates {
        let totals = by_property
            .entry(row.property.as_str())
            .or_insert_with(|| PropertyTotals {
                property: row.property.clone(),
                income: Decimal::ZERO,
                expense: Decimal::ZERO,
                profit: Decimal::ZERO,
                active_months: 0,
            });
        totals.income += row.income;
        totals.expense += row.expense;
        totals.profit += row.profit;
        totals.active_months += 1;
    }

    by_property.into_values().collect()
}
