use crate::dates::{DateExtractor, DatePattern};
use crate::error::{LedgerError, Result};
use crate::schema::Month;
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const YEAR_PLACEHOLDER: &str = "{year}";

/// Everything the core needs to know about a particular workbook, passed in
/// explicitly by the caller.
///
/// Fields missing from a JSON config take their values from
/// [`LedgerConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LedgerConfig {
    #[schemars(description = "Display name of the business that owns the workbook")]
    pub business_name: String,

    pub sheets: SheetNames,

    pub columns: ColumnNames,

    #[schemars(description = "Known rental properties, in display order")]
    pub properties: Vec<String>,

    #[schemars(description = "Canonical expense categories")]
    pub expense_categories: Vec<String>,

    #[schemars(
        description = "Lowercased free-text category spellings mapped to a canonical category"
    )]
    pub category_aliases: BTreeMap<String, String>,

    #[schemars(description = "Receipt folder identifiers by year, then by month")]
    pub receipt_folders: BTreeMap<i32, BTreeMap<Month, String>>,

    #[schemars(description = "Date shapes tried in order when reading date cells")]
    pub date_patterns: Vec<DatePattern>,

    pub reconciler: ReconcilerOptions,
}

/// Sheet (tab) names. Each must contain `{year}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SheetNames {
    pub income: String,
    pub expenses: String,
    pub recurring_expenses: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            income: "{year} OPP Income".to_string(),
            expenses: "{year} OPP Expenses".to_string(),
            recurring_expenses: "{year} Recurring Expenses".to_string(),
        }
    }
}

impl SheetNames {
    pub fn income_for(&self, year: i32) -> String {
        self.income.replace(YEAR_PLACEHOLDER, &year.to_string())
    }

    pub fn expenses_for(&self, year: i32) -> String {
        self.expenses.replace(YEAR_PLACEHOLDER, &year.to_string())
    }

    pub fn recurring_for(&self, year: i32) -> String {
        self.recurring_expenses
            .replace(YEAR_PLACEHOLDER, &year.to_string())
    }
}

/// Column headers read from and written to the sheets. Fields holding a list
/// are alias lists: the first header present in a sheet is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnNames {
    pub property: String,
    pub month: String,
    pub year: String,
    pub date: String,
    pub description: Vec<String>,
    pub purchaser: String,
    pub category: String,
    pub amount: String,
    pub comments: String,
    pub receipt: String,
    pub rental_dates: String,
    pub check_out: String,
    pub income_amount: Vec<String>,
    pub amount_owed: String,
    pub renter_name: Vec<String>,
    pub status: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            property: "Property".to_string(),
            month: "Month".to_string(),
            year: "Year".to_string(),
            date: "Date".to_string(),
            description: vec![
                "Description".to_string(),
                "Item/Description".to_string(),
                "Item".to_string(),
            ],
            purchaser: "Purchaser".to_string(),
            category: "Category".to_string(),
            amount: "Amount".to_string(),
            comments: "Comments".to_string(),
            receipt: "Receipt Link".to_string(),
            rental_dates: "Rental Dates".to_string(),
            check_out: "Check-out".to_string(),
            income_amount: vec![
                "Amount".to_string(),
                "Income Amount".to_string(),
                "Amount Received".to_string(),
            ],
            amount_owed: "Amount Owed".to_string(),
            renter_name: vec!["Renter Name".to_string(), "Name".to_string()],
            status: "Status".to_string(),
        }
    }
}

impl ColumnNames {
    /// Header used when writing a description into a sheet that has none of
    /// the aliases.
    pub fn primary_description(&self) -> &str {
        self.description
            .first()
            .map(String::as_str)
            .unwrap_or("Description")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReconcilerOptions {
    #[schemars(
        description = "Insert only the first of several template rows that share a date and description. Off by default: such rows are each checked against the ledger only."
    )]
    #[serde(default)]
    pub collapse_duplicate_templates: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let category_aliases = [
            ("property expense", "Property Expense"),
            ("prop. exp", "Property Expense"),
            ("propertyexpenses", "Property Expense"),
            ("furnishings & supplies", "Furnishings & Supplies"),
            ("supplies", "Furnishings & Supplies"),
            ("guest expenses", "Guest & Operational Expenses"),
            ("misc", "Misc & Other"),
            ("miscellaneous", "Misc & Other"),
            ("legal", "Legal & Professional Services"),
            ("food", "Food & Beverage"),
            ("tax", "Taxes & Compliance"),
            ("improvements", "Business Expansion & Improvements"),
        ]
        .into_iter()
        .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
        .collect();

        Self {
            business_name: "Oceanview Property Partners".to_string(),
            sheets: SheetNames::default(),
            columns: ColumnNames::default(),
            properties: vec!["Islamorada".to_string(), "Standish".to_string()],
            expense_categories: [
                "Property Expense",
                "Furnishings & Supplies",
                "Guest & Operational Expenses",
                "Travel & Transportation",
                "Legal & Professional Services",
                "Food & Beverage",
                "Taxes & Compliance",
                "Business Expansion & Improvements",
                "Misc & Other",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            category_aliases,
            receipt_folders: BTreeMap::new(),
            date_patterns: DatePattern::defaults(),
            reconciler: ReconcilerOptions::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        for (label, name) in [
            ("income", &self.sheets.income),
            ("expenses", &self.sheets.expenses),
            ("recurring_expenses", &self.sheets.recurring_expenses),
        ] {
            if !name.contains(YEAR_PLACEHOLDER) {
                return Err(LedgerError::InvalidConfig(format!(
                    "sheet name for {} ('{}') must contain {}",
                    label, name, YEAR_PLACEHOLDER
                )));
            }
        }

        if self.columns.description.is_empty() || self.columns.income_amount.is_empty() {
            return Err(LedgerError::InvalidConfig(
                "description and income amount columns need at least one header".to_string(),
            ));
        }

        for alias in self.category_aliases.keys() {
            if alias.trim().to_lowercase() != *alias {
                return Err(LedgerError::InvalidConfig(format!(
                    "category alias '{}' must be lowercase and trimmed",
                    alias
                )));
            }
        }

        self.date_extractor().map(|_| ())
    }

    pub fn date_extractor(&self) -> Result<DateExtractor> {
        DateExtractor::new(&self.date_patterns)
    }

    /// Canonical category for free text, or the trimmed text when no alias
    /// matches.
    pub fn normalize_category(&self, category: &str) -> String {
        let trimmed = category.trim();
        self.category_aliases
            .get(&trimmed.to_lowercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// True when `property` is in the vocabulary (ignoring case) or the
    /// vocabulary is empty.
    pub fn is_known_property(&self, property: &str) -> bool {
        in_vocabulary(&self.properties, property)
    }

    pub fn is_known_category(&self, category: &str) -> bool {
        in_vocabulary(&self.expense_categories, category)
    }

    pub fn receipt_folder(&self, date: NaiveDate) -> Option<&str> {
        self.receipt_folders
            .get(&date.year())
            .and_then(|months| months.get(&Month::of(date)))
            .map(String::as_str)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(LedgerConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

fn in_vocabulary(vocabulary: &[String], value: &str) -> bool {
    let value = value.trim();
    vocabulary.is_empty() || vocabulary.iter().any(|known| known.eq_ignore_ascii_case(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sheets.income_for(2025), "2025 OPP Income");
        assert_eq!(config.sheets.expenses_for(2026), "2026 OPP Expenses");
        assert_eq!(config.sheets.recurring_for(2025), "2025 Recurring Expenses");
    }

    #[test]
    fn test_json_round_trip_with_partial_input() {
        let json = r#"{
            "business_name": "Test Rentals",
            "properties": ["Standish"],
            "receipt_folders": { "2025": { "June": "folder-june" } }
        }"#;
        let config = LedgerConfig::from_json(json).unwrap();
        assert_eq!(config.business_name, "Test Rentals");
        assert_eq!(config.date_patterns, DatePattern::defaults());
        assert_eq!(config.columns.date, "Date");

        let date = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        assert_eq!(config.receipt_folder(date), Some("folder-june"));
        let july = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(config.receipt_folder(july), None);
    }

    #[test]
    fn test_sheet_names_need_year_placeholder() {
        let mut config = LedgerConfig::default();
        config.sheets.expenses = "OPP Expenses".to_string();
        assert!(matches!(
            config.validate(),
            Err(LedgerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_pattern_list_rejected() {
        let mut config = LedgerConfig::default();
        config.date_patterns.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_category() {
        let config = LedgerConfig::default();
        assert_eq!(config.normalize_category("  Supplies "), "Furnishings & Supplies");
        assert_eq!(config.normalize_category("MISC"), "Misc & Other");
        assert_eq!(config.normalize_category(" Utilities "), "Utilities");
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = LedgerConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("business_name"));
        assert!(schema_json.contains("date_patterns"));
        assert!(schema_json.contains("collapse_duplicate_templates"));
    }

    #[test]
    fn test_vocabulary_checks() {
        let mut config = LedgerConfig::default();
        assert!(config.is_known_property("standish"));
        assert!(!config.is_known_property("Key West"));
        assert!(config.is_known_category("Food & Beverage"));
        assert!(!config.is_known_category("Utilities"));

        config.properties.clear();
        assert!(config.is_known_property("Key West"));
    }
}
