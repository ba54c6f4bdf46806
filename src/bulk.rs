//! Tabular export of search results.

use std::path::Path;

use serde_json::Value;

use crate::domain::{SearchResult, value_to_cell};
use crate::error::CatalogError;

/// `start` offsets for every page of a result set of `total` entries.
///
/// The first page is always included since that request is what reports
/// the total.
pub fn page_offsets(total: u64, page_size: u64) -> Vec<u64> {
    let page_size = page_size.max(1);
    let pages = total.div_ceil(page_size).max(1);
    (0..pages).map(|page| page * page_size).collect()
}

/// Flat rows of string cells with a shared header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResourceTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    /// One row per resource of every result that has resources. Each row
    /// carries the resource's own fields followed by the parent's `rid`,
    /// `rauthor`, `rspatial` and `type`; the parent type replaces a resource
    /// field of the same name. Columns appear in first-seen order.
    pub fn from_results(results: &[SearchResult]) -> Self {
        let mut table = Self::default();
        for result in results {
            for resource in &result.resources {
                let mut fields: Vec<(&str, &Value)> = resource
                    .iter()
                    .filter(|(key, _)| key.as_str() != "type")
                    .map(|(key, value)| (key.as_str(), value))
                    .collect();
                fields.push(("rid", &result.id));
                fields.push(("rauthor", &result.author));
                fields.push(("rspatial", &result.spatial));
                // A resource's own "type" keeps its column position.
                match resource.keys().position(|key| key == "type") {
                    Some(index) => fields.insert(index, ("type", &result.kind)),
                    None => fields.push(("type", &result.kind)),
                }
                table.push_row(&fields);
            }
        }
        table
    }

    fn push_row(&mut self, fields: &[(&str, &Value)]) {
        let mut row = vec![String::new(); self.columns.len()];
        for (key, value) in fields {
            let index = match self.column_index(key) {
                Some(index) => index,
                None => {
                    self.columns.push((*key).to_string());
                    for existing in &mut self.rows {
                        existing.push(String::new());
                    }
                    row.push(String::new());
                    self.columns.len() - 1
                }
            };
            row[index] = value_to_cell(value);
        }
        self.rows.push(row);
    }

    /// Rows whose `column` equals `value` exactly. Unknown columns match
    /// nothing.
    pub fn filter_eq(&self, column: &str, value: &str) -> Self {
        let rows = match self.column_index(column) {
            Some(index) => self
                .rows
                .iter()
                .filter(|row| row[index] == value)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), CatalogError> {
        let mut writer = csv::Writer::from_path(path)
            .map_err(|err| CatalogError::CsvWrite(format!("{}: {err}", path.display())))?;
        writer
            .write_record(&self.columns)
            .map_err(|err| CatalogError::CsvWrite(err.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|err| CatalogError::CsvWrite(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| CatalogError::CsvWrite(err.to_string()))
    }
}
