use std::path::Path;

use csv::ReaderBuilder;

use crate::domain::DatasetId;
use crate::error::CatalogError;

/// Reads dataset identifiers from the `column` field of a headered CSV file.
pub fn read_identifiers(path: &Path, column: &str) -> Result<Vec<DatasetId>, CatalogError> {
    let csv_error = |err: csv::Error| CatalogError::CsvRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let index = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .position(|header| header == column)
        .ok_or_else(|| CatalogError::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
        })?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let value = record.get(index).ok_or_else(|| CatalogError::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
        })?;
        ids.push(value.parse()?);
    }
    Ok(ids)
}
