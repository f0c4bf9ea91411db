use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar month. Declaration order is calendar order, so `Ord` sorts
/// January through December rather than alphabetically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// 1-based month number (January = 1).
    pub fn from_number(number: u32) -> Option<Month> {
        number
            .checked_sub(1)
            .and_then(|idx| Self::ALL.get(idx as usize))
            .copied()
    }

    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    pub fn of(date: NaiveDate) -> Month {
        // NaiveDate::month() is always 1..=12
        Self::ALL[date.month0() as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }

    pub fn first_day(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.number(), 1)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Month {
    type Err = String;

    /// Accepts full names, three-letter abbreviations and month numbers,
    /// ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim().to_lowercase();
        if let Ok(number) = cleaned.parse::<u32>() {
            return Month::from_number(number).ok_or_else(|| format!("Invalid month: {}", s));
        }
        Month::ALL
            .iter()
            .find(|m| {
                let name = m.name().to_lowercase();
                name == cleaned || (cleaned.len() == 3 && name.starts_with(&cleaned))
            })
            .copied()
            .ok_or_else(|| format!("Invalid month: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeStatus {
    Paid,
    #[serde(rename = "PMTDue")]
    PmtDue,
    DownpaymentReceived,
    Cancelled,
}

impl IncomeStatus {
    /// Lenient parse of the free-text status column. Returns `None` for blank
    /// or unknown text so the caller can fall back to [`IncomeStatus::from_amounts`].
    pub fn parse(text: &str) -> Option<IncomeStatus> {
        let key: String = text
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match key.as_str() {
            "paid" | "paidinfull" => Some(IncomeStatus::Paid),
            "pmtdue" | "paymentdue" | "due" => Some(IncomeStatus::PmtDue),
            "downpaymentreceived" | "downpayment" | "deposit" | "partialdeposit" | "partial" => {
                Some(IncomeStatus::DownpaymentReceived)
            }
            "cancelled" | "canceled" => Some(IncomeStatus::Cancelled),
            _ => None,
        }
    }

    pub fn from_amounts(owed: Decimal, received: Decimal) -> IncomeStatus {
        if received >= owed {
            IncomeStatus::Paid
        } else if received > Decimal::ZERO {
            IncomeStatus::DownpaymentReceived
        } else {
            IncomeStatus::PmtDue
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IncomeStatus::Paid => "Paid",
            IncomeStatus::PmtDue => "PMT due",
            IncomeStatus::DownpaymentReceived => "Downpayment received",
            IncomeStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for IncomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque identifier returned by the file store for an uploaded receipt.
/// Never parsed or rewritten here; the UI layer resolves it to a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptReference(String);

impl ReceiptReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeDetails {
    pub rental_start: NaiveDate,
    pub rental_end: Option<NaiveDate>,
    pub renter_name: Option<String>,
    pub status: IncomeStatus,
    /// Total owed for the booking, when the sheet tracks it
    pub amount_owed: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDetails {
    pub date: NaiveDate,
    pub category: String,
    pub purchaser: String,
    pub description: String,
    pub comments: Option<String>,
    pub receipt_reference: Option<ReceiptReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RecordDetails {
    Income(IncomeDetails),
    Expense(ExpenseDetails),
}

/// A cleaned ledger row with exactly one resolved month and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub property: String,
    pub amount: Decimal,
    pub month: Month,
    pub year: i32,
    pub details: RecordDetails,
}

impl NormalizedRecord {
    pub fn kind(&self) -> RecordKind {
        match self.details {
            RecordDetails::Income(_) => RecordKind::Income,
            RecordDetails::Expense(_) => RecordKind::Expense,
        }
    }

    pub fn as_income(&self) -> Option<&IncomeDetails> {
        match &self.details {
            RecordDetails::Income(income) => Some(income),
            RecordDetails::Expense(_) => None,
        }
    }

    pub fn as_expense(&self) -> Option<&ExpenseDetails> {
        match &self.details {
            RecordDetails::Expense(expense) => Some(expense),
            RecordDetails::Income(_) => None,
        }
    }

    /// Duplicate key for expense records; income records have none.
    pub fn duplicate_key(&self) -> Option<DuplicateKey> {
        self.as_expense()
            .map(|expense| DuplicateKey::new(expense.date, &expense.description))
    }
}

/// Identity of a ledger transaction for reconciliation: ISO date plus the
/// trimmed, lowercased description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub iso_date: String,
    pub description: String,
}

impl DuplicateKey {
    pub fn new(date: NaiveDate, description: &str) -> Self {
        Self {
            iso_date: date.format("%Y-%m-%d").to_string(),
            description: normalize_description(description),
        }
    }
}

pub fn normalize_description(description: &str) -> String {
    description.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub property: String,
    pub month: Month,
    pub income: Decimal,
    pub expense: Decimal,
    pub profit: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_order_is_calendar_order() {
        let mut months = vec![Month::December, Month::April, Month::August, Month::January];
        months.sort();
        assert_eq!(
            months,
            vec![Month::January, Month::April, Month::August, Month::December]
        );
    }

    #[test]
    fn test_month_parsing() {
        assert_eq!("August".parse::<Month>().unwrap(), Month::August);
        assert_eq!("  august ".parse::<Month>().unwrap(), Month::August);
        assert_eq!("sep".parse::<Month>().unwrap(), Month::September);
        assert_eq!("3".parse::<Month>().unwrap(), Month::March);
        assert!("13".parse::<Month>().is_err());
        assert!("Augustus".parse::<Month>().is_err());
    }

    #[test]
    fn test_month_of_date() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        assert_eq!(Month::of(date), Month::August);
        assert_eq!(Month::of(date).number(), 8);
    }

    #[test]
    fn test_income_status_parse() {
        assert_eq!(IncomeStatus::parse("Paid"), Some(IncomeStatus::Paid));
        assert_eq!(IncomeStatus::parse("PMT due"), Some(IncomeStatus::PmtDue));
        assert_eq!(
            IncomeStatus::parse("Partial / Deposit"),
            Some(IncomeStatus::DownpaymentReceived)
        );
        assert_eq!(IncomeStatus::parse("canceled"), Some(IncomeStatus::Cancelled));
        assert_eq!(IncomeStatus::parse(""), None);
        assert_eq!(IncomeStatus::parse("pending review"), None);
    }

    #[test]
    fn test_income_status_from_amounts() {
        let owed = Decimal::new(1000, 0);
        assert_eq!(IncomeStatus::from_amounts(owed, owed), IncomeStatus::Paid);
        assert_eq!(
            IncomeStatus::from_amounts(owed, Decimal::new(250, 0)),
            IncomeStatus::DownpaymentReceived
        );
        assert_eq!(
            IncomeStatus::from_amounts(owed, Decimal::ZERO),
            IncomeStatus::PmtDue
        );
    }

    #[test]
    fn test_duplicate_key_ignores_case_and_padding() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            DuplicateKey::new(date, "  MORTGAGE "),
            DuplicateKey::new(date, "mortgage")
        );
        assert_eq!(DuplicateKey::new(date, "x").iso_date, "2025-06-01");
    }
}
