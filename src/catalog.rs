use std::io::{Read, Write};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::{DatasetId, DatasetRecord, SearchPage};
use crate::error::CatalogError;

pub const DEFAULT_API_BASE: &str = "https://geoscience.data.qld.gov.au/api/action/";

/// Outcome of a request that reached the server.
///
/// A non-success HTTP status is an expected outcome that callers log and
/// skip; transport and decoding failures are errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse<T> {
    Ok(T),
    Status(u16),
}

pub trait CatalogClient: Send + Sync {
    fn package_show(&self, id: &DatasetId) -> Result<ApiResponse<DatasetRecord>, CatalogError>;

    fn package_search(
        &self,
        query: &str,
        rows: u64,
        start: u64,
    ) -> Result<ApiResponse<SearchPage>, CatalogError>;

    fn fetch_bytes(&self, url: &str) -> Result<ApiResponse<Vec<u8>>, CatalogError>;

    /// Copies the body of `url` into `writer` `chunk_size` bytes at a time
    /// and returns the number of bytes written.
    fn stream_to(
        &self,
        url: &str,
        writer: &mut dyn Write,
        chunk_size: usize,
    ) -> Result<ApiResponse<u64>, CatalogError>;
}

#[derive(Deserialize)]
struct ActionEnvelope<T> {
    result: Option<T>,
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    api_base: String,
}

impl CatalogHttpClient {
    pub fn new(api_base: &str, user_agent: &str) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| CatalogError::InvalidConfig(format!("user_agent: {err}")))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| CatalogError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            api_base: normalize_base(api_base),
        })
    }

    pub fn action_url(&self, action: &str) -> String {
        format!("{}{action}", self.api_base)
    }

    fn get_action<T: DeserializeOwned + Default>(
        &self,
        action: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse<T>, CatalogError> {
        let response = self
            .client
            .get(self.action_url(action))
            .query(query)
            .send()
            .map_err(|err| CatalogError::CatalogHttp(err.to_string()))?;
        if let Some(status) = failed_status(&response) {
            return Ok(ApiResponse::Status(status));
        }
        let envelope: ActionEnvelope<T> = response
            .json()
            .map_err(|err| CatalogError::CatalogPayload(err.to_string()))?;
        Ok(ApiResponse::Ok(envelope.result.unwrap_or_default()))
    }

    fn get(&self, url: &str) -> Result<Response, CatalogError> {
        self.client
            .get(url)
            .send()
            .map_err(|err| CatalogError::DownloadHttp(err.to_string()))
    }
}

impl CatalogClient for CatalogHttpClient {
    fn package_show(&self, id: &DatasetId) -> Result<ApiResponse<DatasetRecord>, CatalogError> {
        self.get_action("package_show", &[("id", id.as_str().to_string())])
    }

    fn package_search(
        &self,
        query: &str,
        rows: u64,
        start: u64,
    ) -> Result<ApiResponse<SearchPage>, CatalogError> {
        self.get_action(
            "package_search",
            &[
                ("q", query.to_string()),
                ("rows", rows.to_string()),
                ("start", start.to_string()),
            ],
        )
    }

    fn fetch_bytes(&self, url: &str) -> Result<ApiResponse<Vec<u8>>, CatalogError> {
        let response = self.get(url)?;
        if let Some(status) = failed_status(&response) {
            return Ok(ApiResponse::Status(status));
        }
        let bytes = response
            .bytes()
            .map_err(|err| CatalogError::DownloadHttp(err.to_string()))?;
        Ok(ApiResponse::Ok(bytes.to_vec()))
    }

    fn stream_to(
        &self,
        url: &str,
        writer: &mut dyn Write,
        chunk_size: usize,
    ) -> Result<ApiResponse<u64>, CatalogError> {
        let mut response = self.get(url)?;
        if let Some(status) = failed_status(&response) {
            return Ok(ApiResponse::Status(status));
        }
        let mut buffer = vec![0u8; chunk_size.max(1)];
        let mut written = 0u64;
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| CatalogError::DownloadHttp(err.to_string()))?;
            if read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..read])
                .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
            written += read as u64;
        }
        writer
            .flush()
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        Ok(ApiResponse::Ok(written))
    }
}

fn failed_status(response: &Response) -> Option<u16> {
    let status = response.status();
    (!status.is_success()).then(|| status.as_u16())
}

fn normalize_base(api_base: &str) -> String {
    if api_base.ends_with('/') {
        api_base.to_string()
    } else {
        format!("{api_base}/")
    }
}
