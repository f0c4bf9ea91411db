use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error handed back by spreadsheet, drive and other collaborators.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Sheet '{table}' is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error("Sheet '{table}' has no header row to align with")]
    MissingHeaderRow { table: String },

    #[error("{operation} failed for '{table}': {source}")]
    ExternalIo {
        operation: &'static str,
        table: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("Invalid date pattern {pattern}: {details}")]
    InvalidDatePattern { pattern: String, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No receipt folder configured for {month} {year}")]
    MissingReceiptFolder { year: i32, month: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl LedgerError {
    pub(crate) fn external(
        operation: &'static str,
        table: &str,
        source: CollaboratorError,
    ) -> Self {
        LedgerError::ExternalIo {
            operation,
            table: table.to_string(),
            source,
        }
    }

    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        LedgerError::Schema {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Why a single row was left out of a normalization pass.
///
/// These never abort a batch; they are collected into the skip report.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RowError {
    #[error("'{column}' is empty")]
    MissingValue { column: String },

    #[error("'{column}' value '{value}' is not a number")]
    UnparsableAmount { column: String, value: String },

    #[error("'{column}' value '{value}' is negative")]
    NegativeAmount { column: String, value: String },

    #[error("'{column}' value '{value}' is beyond the largest accepted amount")]
    AmountOutOfRange { column: String, value: String },

    #[error("'{column}' value '{value}' has no readable date")]
    UnparsableDate { column: String, value: String },

    #[error("dated {found}, outside the {expected} sheet's year")]
    OutOfPeriod { expected: i32, found: i32 },
}
