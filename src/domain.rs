use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        // The id becomes a directory name under the data root.
        let is_valid = !trimmed.is_empty()
            && trimmed != "."
            && trimmed != ".."
            && !trimmed.contains(['/', '\\']);
        if !is_valid {
            return Err(CatalogError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Result object of the `package_show` action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub num_resources: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<ResourceDescriptor>,
}

/// One downloadable entry of a dataset.
///
/// Every field is optional on the wire. Empty strings are treated the same
/// as missing values by the accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default, rename = "resource:description")]
    pub resource_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ResourceDescriptor {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or_default()
    }

    pub fn url(&self) -> Option<&str> {
        non_empty(self.url.as_deref())
    }

    pub fn download_url(&self) -> Option<&str> {
        non_empty(self.download_url.as_deref())
    }

    pub fn description(&self) -> &str {
        self.resource_description
            .as_deref()
            .or(self.description.as_deref())
            .unwrap_or_default()
    }
}

/// Result object of the `package_search` action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<SearchResult>,
}

/// A dataset as returned by search. Resources stay as raw JSON objects so
/// that every field survives flattening.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub author: Value,
    #[serde(default)]
    pub spatial: Value,
    #[serde(default, rename = "type")]
    pub kind: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<Map<String, Value>>,
}

/// Entry of a dataset's `metadata.json`, serialized as
/// `{"<filename>": {"name": ..., "description": ..., "download_link": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "std::collections::BTreeMap<String, DownloadDetails>")]
pub struct DownloadRecord {
    pub filename: String,
    pub details: DownloadDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDetails {
    pub name: String,
    pub description: String,
    pub download_link: String,
}

impl DownloadRecord {
    pub fn new(filename: &str, resource: &ResourceDescriptor, download_link: &str) -> Self {
        Self {
            filename: filename.to_string(),
            details: DownloadDetails {
                name: resource.name().to_string(),
                description: resource.description().to_string(),
                download_link: download_link.to_string(),
            },
        }
    }
}

impl Serialize for DownloadRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.filename, &self.details)?;
        map.end()
    }
}

impl TryFrom<std::collections::BTreeMap<String, DownloadDetails>> for DownloadRecord {
    type Error = String;

    fn try_from(
        value: std::collections::BTreeMap<String, DownloadDetails>,
    ) -> Result<Self, Self::Error> {
        if value.len() != 1 {
            return Err(format!(
                "metadata entry must have exactly one key, found {}",
                value.len()
            ));
        }
        let (filename, details) = value
            .into_iter()
            .next()
            .ok_or_else(|| "empty metadata entry".to_string())?;
        Ok(Self { filename, details })
    }
}

/// Renders a cell for tabular export.
pub fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
