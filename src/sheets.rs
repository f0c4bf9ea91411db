use crate::error::{CollaboratorError, LedgerError, Result};
use crate::table::{RawRow, Table};
use log::debug;
use std::collections::BTreeMap;
use thiserror::Error;

/// Reads raw cell values from a spreadsheet-like store.
pub trait RowSource {
    /// Every row of `table` as text, header row included.
    fn fetch_values(&self, table: &str) -> std::result::Result<Vec<Vec<String>>, CollaboratorError>;

    /// Fetches `table` and turns it into a [`Table`]. Collaborator failures are
    /// surfaced as [`LedgerError::ExternalIo`] without retrying.
    fn fetch_rows(&self, table: &str) -> Result<Table> {
        let grid = self
            .fetch_values(table)
            .map_err(|e| LedgerError::external("fetch_rows", table, e))?;
        Ok(Table::from_grid(table, grid))
    }
}

/// Appends rows to a spreadsheet-like store.
pub trait RowSink {
    /// The sheet's header row, or an empty vector when it has none.
    fn header_row(&self, table: &str) -> std::result::Result<Vec<String>, CollaboratorError>;

    fn append_values(
        &mut self,
        table: &str,
        values: Vec<String>,
    ) -> std::result::Result<(), CollaboratorError>;
}

/// Stores uploaded files and hands back an opaque reference.
pub trait FileStore {
    fn upload(
        &mut self,
        folder_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> std::result::Result<String, CollaboratorError>;
}

/// Orders `record`'s values by `headers`; headers the record lacks become
/// empty strings and record fields outside the headers are dropped.
pub fn align_to_headers(headers: &[String], record: &RawRow) -> Vec<String> {
    headers
        .iter()
        .map(|h| record.get(h).unwrap_or_default().to_string())
        .collect()
}

/// Appends `record` to `table`, aligned to the sink's existing header row.
pub fn append_record<S: RowSink + ?Sized>(sink: &mut S, table: &str, record: &RawRow) -> Result<()> {
    let headers = sink
        .header_row(table)
        .map_err(|e| LedgerError::external("header_row", table, e))?;

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LedgerError::MissingHeaderRow {
            table: table.to_string(),
        });
    }

    let values = align_to_headers(&headers, record);
    debug!("Appending {} values to '{}'", values.len(), table);
    sink.append_values(table, values)
        .map_err(|e| LedgerError::external("append_row", table, e))
}

#[derive(Error, Debug)]
#[error("Worksheet '{0}' not found")]
pub struct UnknownSheet(pub String);

/// Sheets held in memory as raw value grids. Serves as both source and sink,
/// so rows appended are visible to the next fetch.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: BTreeMap<String, Vec<Vec<String>>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty sheet carrying only a header row.
    pub fn with_table(mut self, name: &str, headers: &[&str]) -> Self {
        self.insert_grid(name, vec![headers.iter().map(|h| h.to_string()).collect()]);
        self
    }

    pub fn insert_grid(&mut self, name: &str, grid: Vec<Vec<String>>) {
        self.sheets.insert(name.to_string(), grid);
    }

    pub fn grid(&self, name: &str) -> Option<&[Vec<String>]> {
        self.sheets.get(name).map(Vec::as_slice)
    }
}

impl RowSource for MemoryWorkbook {
    fn fetch_values(&self, table: &str) -> std::result::Result<Vec<Vec<String>>, CollaboratorError> {
        self.sheets
            .get(table)
            .cloned()
            .ok_or_else(|| UnknownSheet(table.to_string()).into())
    }
}

impl RowSink for MemoryWorkbook {
    fn header_row(&self, table: &str) -> std::result::Result<Vec<String>, CollaboratorError> {
        let grid = self
            .sheets
            .get(table)
            .ok_or_else(|| UnknownSheet(table.to_string()))?;
        Ok(grid
            .iter()
            .find(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .cloned()
            .unwrap_or_default())
    }

    fn append_values(
        &mut self,
        table: &str,
        values: Vec<String>,
    ) -> std::result::Result<(), CollaboratorError> {
        let grid = self
            .sheets
            .get_mut(table)
            .ok_or_else(|| UnknownSheet(table.to_string()))?;
        grid.push(values);
        Ok(())
    }
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub folder_id: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// File store keeping uploads in memory; references are `file-<n>`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: BTreeMap<String, StoredFile>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &str) -> Option<&StoredFile> {
        self.files.get(reference)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileStore for MemoryFileStore {
    fn upload(
        &mut self,
        folder_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> std::result::Result<String, CollaboratorError> {
        let reference = format!("file-{}", self.files.len() + 1);
        self.files.insert(
            reference.clone(),
            StoredFile {
                folder_id: folder_id.to_string(),
                filename: filename.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to_headers_fills_missing_with_empty() {
        let headers: Vec<String> = ["Month", "Date", "Amount", "Receipt Link"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let record = RawRow::from_pairs([("Amount", "12"), ("Date", "2025-06-01"), ("Extra", "x")]);
        assert_eq!(
            align_to_headers(&headers, &record),
            vec!["", "2025-06-01", "12", ""]
        );
    }

    #[test]
    fn test_append_record_round_trips_through_workbook() {
        let mut book = MemoryWorkbook::new().with_table("2025 OPP Expenses", &["Date", "Amount"]);
        let record = RawRow::from_pairs([("Amount", "40"), ("Date", "2025-01-03")]);
        append_record(&mut book, "2025 OPP Expenses", &record).unwrap();

        let table = book.fetch_rows("2025 OPP Expenses").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].get("Amount"), Some("40"));
    }

    #[test]
    fn test_append_without_header_row_fails() {
        let mut book = MemoryWorkbook::new();
        book.insert_grid("blank", vec![vec![String::new(), " ".to_string()]]);
        let err = append_record(&mut book, "blank", &RawRow::new()).unwrap_err();
        assert!(matches!(err, LedgerError::MissingHeaderRow { .. }));
        assert_eq!(book.grid("blank").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_sheet_is_external_io() {
        let book = MemoryWorkbook::new();
        let err = book.fetch_rows("2030 OPP Income").unwrap_err();
        match err {
            LedgerError::ExternalIo { operation, table, .. } => {
                assert_eq!(operation, "fetch_rows");
                assert_eq!(table, "2030 OPP Income");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_memory_file_store_references() {
        let mut store = MemoryFileStore::new();
        let first = store.upload("folder-june", "a.pdf", b"one").unwrap();
        let second = store.upload("folder-june", "b.pdf", b"two").unwrap();
        assert_ne!(first, second);
        assert_eq!(store.get(&second).unwrap().filename, "b.pdf");
        assert_eq!(store.len(), 2);
    }
}
