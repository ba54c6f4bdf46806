use std::time::{Duration, Instant};

use camino::Utf8Path;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::bulk::{ResourceTable, page_offsets};
use crate::catalog::{ApiResponse, CatalogClient};
use crate::config::BulkSettings;
use crate::domain::{DatasetId, DownloadRecord, SearchPage, SearchResult};
use crate::error::CatalogError;
use crate::resolve::{is_safe_filename, last_segment, resolve_filename, select_download_link};
use crate::store::{self, LazyFile, Store};

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub started_at: String,
    pub finished_at: String,
    pub datasets: Vec<DatasetResult>,
}

impl FetchResult {
    pub fn downloaded_files(&self) -> usize {
        self.datasets.iter().map(|item| item.files.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetResult {
    pub id: String,
    pub outcome: DatasetOutcome,
    pub directory: Option<String>,
    pub files: Vec<String>,
    pub skipped: Vec<SkippedResource>,
    pub metadata_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetOutcome {
    Downloaded,
    NothingDownloaded,
    NoResources,
    LookupFailed { status: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedResource {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoDownloadLink,
    UnsafeFilename { filename: String },
    DownloadFailed { status: u16 },
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub started_at: String,
    pub finished_at: String,
    pub total_results: u64,
    pub pages: usize,
    pub rows: usize,
    pub export_path: String,
    pub matching_rows: usize,
    pub downloads: BulkDownloadSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDownloadSummary {
    pub directory: String,
    pub files: Vec<String>,
    pub bytes: u64,
    pub failed: Vec<FailedUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUrl {
    pub url: String,
    pub status: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub total: u64,
    pub pages: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Fetch,
    Bulk,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

fn emit_timed(sink: &dyn ProgressSink, message: String, started: Instant) {
    sink.event(ProgressEvent {
        message,
        elapsed: Some(started.elapsed()),
    });
}

#[derive(Clone)]
pub struct App<C: CatalogClient> {
    store: Store,
    client: C,
}

impl<C: CatalogClient> App<C> {
    pub fn new(store: Store, client: C) -> Self {
        Self { store, client }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Downloads every resource of every dataset in `ids`, one after the
    /// other. Lookup and download failures are recorded and skipped;
    /// transport and filesystem errors abort the run.
    pub fn fetch(
        &self,
        ids: &[DatasetId],
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, CatalogError> {
        let started_at = Utc::now().to_rfc3339();
        self.store.ensure_root()?;

        let mut datasets = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            emit(
                sink,
                format!("phase=Resolve; dataset {} ({}/{})", id, index + 1, ids.len()),
            );
            datasets.push(self.fetch_dataset(id, sink)?);
        }

        info!(datasets = datasets.len(), "fetch complete");
        emit(sink, format!("phase=Done; {} datasets processed", datasets.len()));
        Ok(FetchResult {
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            datasets,
        })
    }

    pub fn fetch_dataset(
        &self,
        id: &DatasetId,
        sink: &dyn ProgressSink,
    ) -> Result<DatasetResult, CatalogError> {
        info!(dataset = %id, "starting dataset");
        let mut result = DatasetResult {
            id: id.to_string(),
            outcome: DatasetOutcome::NothingDownloaded,
            directory: None,
            files: Vec::new(),
            skipped: Vec::new(),
            metadata_path: None,
        };

        let started = Instant::now();
        let record = match self.client.package_show(id)? {
            ApiResponse::Ok(record) => record,
            ApiResponse::Status(status) => {
                warn!(dataset = %id, status, "there was an issue retrieving the dataset");
                emit(sink, format!("lookup {id} failed with status {status}"));
                result.outcome = DatasetOutcome::LookupFailed { status };
                return Ok(result);
            }
        };
        emit_timed(sink, format!("catalog.request package_show {id}"), started);

        if record.num_resources == 0 {
            info!(dataset = %id, "there are no resources available to download");
            emit(sink, format!("{id} has no resources"));
            result.outcome = DatasetOutcome::NoResources;
            return Ok(result);
        }

        let dir = self.store.ensure_dataset_dir(id)?;
        result.directory = Some(dir.to_string());

        let mut records = Vec::new();
        for resource in &record.resources {
            let Some(link) = select_download_link(resource) else {
                warn!(dataset = %id, resource = resource.name(), "no available download link");
                result.skipped.push(SkippedResource {
                    name: resource.name().to_string(),
                    reason: SkipReason::NoDownloadLink,
                });
                continue;
            };
            let filename = resolve_filename(resource);
            if !is_safe_filename(&filename) {
                warn!(dataset = %id, resource = resource.name(), filename, "unusable file name");
                emit(sink, format!("{id}: file name {filename:?} failed validation"));
                result.skipped.push(SkippedResource {
                    name: resource.name().to_string(),
                    reason: SkipReason::UnsafeFilename { filename },
                });
                continue;
            }

            emit(sink, format!("phase=Fetch; {} ({link})", resource.name()));
            let started = Instant::now();
            match self.client.fetch_bytes(link)? {
                ApiResponse::Ok(bytes) => {
                    let path = self.store.write_resource(id, &filename, &bytes)?;
                    info!(
                        dataset = %id,
                        resource = resource.name(),
                        link,
                        path = %path,
                        "downloaded"
                    );
                    emit_timed(
                        sink,
                        format!("phase=Store; {path}"),
                        started,
                    );
                    records.push(DownloadRecord::new(&filename, resource, link));
                    result.files.push(filename);
                }
                ApiResponse::Status(status) => {
                    warn!(dataset = %id, link, status, "there was an issue with the download");
                    emit(sink, format!("download {link} failed with status {status}"));
                    result.skipped.push(SkippedResource {
                        name: resource.name().to_string(),
                        reason: SkipReason::DownloadFailed { status },
                    });
                }
            }
        }

        if !records.is_empty() {
            let path = self.store.write_metadata(id, &records)?;
            emit(sink, format!("phase=Store; {path}"));
            result.metadata_path = Some(path.to_string());
            result.outcome = DatasetOutcome::Downloaded;
        }
        Ok(result)
    }

    /// Pages through `package_search` for `query`. The first page reports
    /// the total; the remaining pages are requested in order.
    pub fn search_all(
        &self,
        query: &str,
        page_size: u64,
        sink: &dyn ProgressSink,
    ) -> Result<SearchOutcome, CatalogError> {
        emit(sink, format!("phase=Resolve; searching {query:?}"));
        let first = self.search_page(query, page_size, 0, sink)?;
        let total = first.count;
        let offsets = page_offsets(total, page_size);
        info!(query, total, pages = offsets.len(), "search started");

        let mut results = first.results;
        for (page, start) in offsets.iter().enumerate().skip(1) {
            emit(
                sink,
                format!("phase=Fetch; search page {}/{}", page + 1, offsets.len()),
            );
            let next = self.search_page(query, page_size, *start, sink)?;
            results.extend(next.results);
        }

        Ok(SearchOutcome {
            total,
            pages: offsets.len(),
            results,
        })
    }

    fn search_page(
        &self,
        query: &str,
        rows: u64,
        start: u64,
        sink: &dyn ProgressSink,
    ) -> Result<SearchPage, CatalogError> {
        let started = Instant::now();
        match self.client.package_search(query, rows, start)? {
            ApiResponse::Ok(page) => {
                emit_timed(
                    sink,
                    format!("catalog.request package_search start={start}"),
                    started,
                );
                Ok(page)
            }
            ApiResponse::Status(status) => Err(CatalogError::CatalogHttp(format!(
                "package_search start={start} returned status {status}"
            ))),
        }
    }

    /// Streams the URL of every row into `dir`, named after the URL's last
    /// path segment. Existing files are overwritten.
    pub fn download_rows(
        &self,
        table: &ResourceTable,
        url_column: &str,
        dir: &Utf8Path,
        chunk_size: usize,
        sink: &dyn ProgressSink,
    ) -> Result<BulkDownloadSummary, CatalogError> {
        store::ensure_dir(dir)?;
        let mut summary = BulkDownloadSummary {
            directory: dir.to_string(),
            ..Default::default()
        };
        let Some(index) = table.column_index(url_column) else {
            warn!(column = url_column, "url column not present in table");
            return Ok(summary);
        };

        let total = table.len();
        for (position, row) in table.rows().enumerate() {
            let url = row[index].as_str();
            let name = last_segment(url);
            if url.is_empty() || !is_safe_filename(name) {
                warn!(row = position, url, "row has no usable url");
                summary.failed.push(FailedUrl {
                    url: url.to_string(),
                    status: None,
                });
                continue;
            }

            emit(
                sink,
                format!("phase=Fetch; {name} ({}/{total})", position + 1),
            );
            let started = Instant::now();
            let mut file = LazyFile::new(dir.join(name));
            match self.client.stream_to(url, &mut file, chunk_size)? {
                ApiResponse::Ok(bytes) => {
                    let path = file.finish()?;
                    info!(url, path = %path, bytes, "downloaded");
                    emit_timed(
                        sink,
                        format!("phase=Store; {path}"),
                        started,
                    );
                    summary.bytes += bytes;
                    summary.files.push(name.to_string());
                }
                ApiResponse::Status(status) => {
                    warn!(url, status, "there was an issue with the download");
                    summary.failed.push(FailedUrl {
                        url: url.to_string(),
                        status: Some(status),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Search, export every resource row to CSV, then download the rows
    /// whose format column matches.
    pub fn bulk(
        &self,
        settings: &BulkSettings,
        sink: &dyn ProgressSink,
    ) -> Result<BulkResult, CatalogError> {
        let started_at = Utc::now().to_rfc3339();
        let search = self.search_all(&settings.query, settings.page_size, sink)?;

        let table = ResourceTable::from_results(&search.results);
        table.write_csv(settings.export_csv.as_std_path())?;
        info!(rows = table.len(), path = %settings.export_csv, "exported resource table");
        emit(
            sink,
            format!("phase=Store; {} rows -> {}", table.len(), settings.export_csv),
        );

        let matching = table.filter_eq(&settings.format_column, &settings.format);
        info!(
            column = %settings.format_column,
            format = %settings.format,
            rows = matching.len(),
            "filtered resources"
        );
        let downloads = self.download_rows(
            &matching,
            &settings.url_column,
            &settings.download_dir,
            settings.chunk_size,
            sink,
        )?;

        emit(
            sink,
            format!("phase=Done; {} files downloaded", downloads.files.len()),
        );
        Ok(BulkResult {
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            total_results: search.total,
            pages: search.pages,
            rows: table.len(),
            export_path: settings.export_csv.to_string(),
            matching_rows: matching.len(),
            downloads,
        })
    }
}
