use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_API_BASE;
use crate::error::CatalogError;

pub const DEFAULT_CONFIG_FILE: &str = "ckan-fetch.json";
pub const DEFAULT_PAGE_SIZE: u64 = 1000;
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub csv_file: Option<String>,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub bulk: BulkEntry,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BulkEntry {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub export_csv: Option<String>,
    #[serde(default)]
    pub format_column: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub url_column: Option<String>,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api_base: String,
    pub csv_file: Utf8PathBuf,
    pub id_field: String,
    pub data_dir: Utf8PathBuf,
    pub user_agent: String,
    pub bulk: BulkSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkSettings {
    pub query: String,
    pub page_size: u64,
    pub export_csv: Utf8PathBuf,
    pub format_column: String,
    pub format: String,
    pub url_column: String,
    pub download_dir: Utf8PathBuf,
    pub chunk_size: usize,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `ckan-fetch.json` from the working directory when no
    /// path is given. Only an explicit path has to exist.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CatalogError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CatalogError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CatalogError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CatalogError> {
        let bulk = config.bulk;
        let page_size = bulk.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(CatalogError::InvalidConfig(
                "bulk.page_size must be at least 1".to_string(),
            ));
        }
        let chunk_size = bulk.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(CatalogError::InvalidConfig(
                "bulk.chunk_size must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            csv_file: config
                .csv_file
                .unwrap_or_else(|| "Datasets.csv".to_string())
                .into(),
            id_field: config.id_field.unwrap_or_else(|| "PID".to_string()),
            data_dir: config
                .data_dir
                .unwrap_or_else(|| "downloads".to_string())
                .into(),
            user_agent: config.user_agent.unwrap_or_else(default_user_agent),
            bulk: BulkSettings {
                query: bulk.query.unwrap_or_else(|| "reports".to_string()),
                page_size,
                export_csv: bulk
                    .export_csv
                    .unwrap_or_else(|| "GSQ_Report_Datasets.csv".to_string())
                    .into(),
                format_column: bulk
                    .format_column
                    .unwrap_or_else(|| "resource:format".to_string()),
                format: bulk.format.unwrap_or_else(|| "DOCX".to_string()),
                url_column: bulk.url_column.unwrap_or_else(|| "url".to_string()),
                download_dir: bulk
                    .download_dir
                    .unwrap_or_else(|| "qld".to_string())
                    .into(),
                chunk_size,
            },
        })
    }
}

pub fn default_user_agent() -> String {
    format!("ckan-fetch/{}", env!("CARGO_PKG_VERSION"))
}
