use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One spreadsheet row as ordered `(column, value)` pairs. Values are always
/// text, exactly as the sheet returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Sets `column`, replacing an existing value or appending a new field.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(field) => field.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `column` when present and not blank, trimmed.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(c, _)| c == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A sheet after header cleaning: unique, non-blank headers and rows keyed by
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Table {
    /// Builds a table from the raw value grid a sheet returns.
    ///
    /// The header is the first row with any non-blank cell. Columns under a
    /// blank header are dropped, repeated headers get `_1`, `_2`, ... suffixes,
    /// short rows are padded with empty strings and fully blank rows are
    /// discarded.
    pub fn from_grid(name: impl Into<String>, grid: Vec<Vec<String>>) -> Self {
        let name = name.into();
        let header_idx = grid
            .iter()
            .position(|row| row.iter().any(|cell| !cell.trim().is_empty()));

        let Some(header_idx) = header_idx else {
            return Table {
                name,
                headers: Vec::new(),
                rows: Vec::new(),
            };
        };

        let mut grid = grid.into_iter().skip(header_idx);
        let raw_headers = grid.next().unwrap_or_default();
        let cleaned = clean_headers(&raw_headers);
        let headers: Vec<String> = cleaned.iter().flatten().cloned().collect();

        let rows = grid
            .map(|cells| {
                RawRow::from_pairs(cleaned.iter().enumerate().filter_map(|(idx, header)| {
                    header.as_ref().map(|h| {
                        let value = cells.get(idx).cloned().unwrap_or_default();
                        (h.clone(), value)
                    })
                }))
            })
            .filter(|row| !row.is_blank())
            .collect();

        Table {
            name,
            headers,
            rows,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// First of `candidates` that is a header of this table.
    pub fn find_column<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        candidates
            .iter()
            .find(|c| self.has_column(c))
            .map(String::as_str)
    }

    pub fn require_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(LedgerError::missing_column(&self.name, column))
        }
    }

    /// Like [`Table::find_column`], failing with a schema error that names the
    /// preferred alias.
    pub fn require_any<'a>(&self, candidates: &'a [String]) -> Result<&'a str> {
        self.find_column(candidates).ok_or_else(|| {
            let wanted = candidates.join(" | ");
            LedgerError::missing_column(&self.name, &wanted)
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Drops blank headers (as `None`) and suffixes repeats with `_1`, `_2`, ...
/// in order of appearance, skipping any suffixed name the sheet already uses
/// as a header. The result is index-aligned with the input.
pub fn clean_headers(headers: &[String]) -> Vec<Option<String>> {
    let reserved: HashSet<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|h| !h.trim().is_empty())
        .collect();
    let mut used: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<&str, usize> = HashMap::new();

    headers
        .iter()
        .map(|header| {
            if header.trim().is_empty() {
                return None;
            }
            if used.insert(header.clone()) {
                return Some(header.clone());
            }
            let n = next_suffix.entry(header.as_str()).or_insert(1);
            let cleaned = loop {
                let candidate = format!("{}_{}", header, n);
                *n += 1;
                if !reserved.contains(candidate.as_str()) && !used.contains(&candidate) {
                    break candidate;
                }
            };
            used.insert(cleaned.clone());
            Some(cleaned)
        })
        .collect()
}
