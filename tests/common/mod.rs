#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use serde_json::Value;

use ckan_fetch::app::{ProgressEvent, ProgressSink};
use ckan_fetch::catalog::{ApiResponse, CatalogClient};
use ckan_fetch::domain::{DatasetId, DatasetRecord, SearchPage};
use ckan_fetch::error::CatalogError;

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Show(String),
    Search { query: String, rows: u64, start: u64 },
    Fetch(String),
    Stream { url: String, chunk_size: usize },
}

/// Catalog stand-in keyed by dataset id and URL. Unknown ids and URLs
/// answer 404.
#[derive(Default)]
pub struct MockCatalog {
    pub datasets: HashMap<String, Value>,
    pub files: HashMap<String, Vec<u8>>,
    pub search_total: u64,
    pub search_pages: HashMap<u64, Value>,
    pub calls: Mutex<Vec<Call>>,
}

impl MockCatalog {
    pub fn with_dataset(mut self, id: &str, record: Value) -> Self {
        self.datasets.insert(id.to_string(), record);
        self
    }

    pub fn with_file(mut self, url: &str, content: &[u8]) -> Self {
        self.files.insert(url.to_string(), content.to_vec());
        self
    }

    pub fn with_search_page(mut self, start: u64, results: Value) -> Self {
        self.search_pages.insert(start, results);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl CatalogClient for MockCatalog {
    fn package_show(&self, id: &DatasetId) -> Result<ApiResponse<DatasetRecord>, CatalogError> {
        self.record(Call::Show(id.to_string()));
        match self.datasets.get(id.as_str()) {
            Some(value) => serde_json::from_value(value.clone())
                .map(ApiResponse::Ok)
                .map_err(|err| CatalogError::CatalogPayload(err.to_string())),
            None => Ok(ApiResponse::Status(404)),
        }
    }

    fn package_search(
        &self,
        query: &str,
        rows: u64,
        start: u64,
    ) -> Result<ApiResponse<SearchPage>, CatalogError> {
        self.record(Call::Search {
            query: query.to_string(),
            rows,
            start,
        });
        let results = self
            .search_pages
            .get(&start)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let page = serde_json::json!({"count": self.search_total, "results": results});
        serde_json::from_value(page)
            .map(ApiResponse::Ok)
            .map_err(|err| CatalogError::CatalogPayload(err.to_string()))
    }

    fn fetch_bytes(&self, url: &str) -> Result<ApiResponse<Vec<u8>>, CatalogError> {
        self.record(Call::Fetch(url.to_string()));
        Ok(match self.files.get(url) {
            Some(content) => ApiResponse::Ok(content.clone()),
            None => ApiResponse::Status(404),
        })
    }

    fn stream_to(
        &self,
        url: &str,
        writer: &mut dyn Write,
        chunk_size: usize,
    ) -> Result<ApiResponse<u64>, CatalogError> {
        self.record(Call::Stream {
            url: url.to_string(),
            chunk_size,
        });
        let Some(content) = self.files.get(url) else {
            return Ok(ApiResponse::Status(404));
        };
        for chunk in content.chunks(chunk_size.max(1)) {
            writer
                .write_all(chunk)
                .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        }
        Ok(ApiResponse::Ok(content.len() as u64))
    }
}

pub fn temp_root(temp: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join(name)).unwrap()
}
