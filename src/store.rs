use std::fs::{self, File};
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::domain::{DatasetId, DownloadRecord};
use crate::error::CatalogError;

pub const METADATA_FILE: &str = "metadata.json";

/// On-disk layout: `<root>/<dataset_id>/<filename>` plus one
/// `metadata.json` per dataset directory.
///
/// Writes go straight to the final path and overwrite whatever is there.
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn dataset_dir(&self, id: &DatasetId) -> Utf8PathBuf {
        self.root.join(id.as_str())
    }

    pub fn resource_path(&self, id: &DatasetId, filename: &str) -> Utf8PathBuf {
        self.dataset_dir(id).join(filename)
    }

    pub fn metadata_path(&self, id: &DatasetId) -> Utf8PathBuf {
        self.dataset_dir(id).join(METADATA_FILE)
    }

    pub fn ensure_root(&self) -> Result<(), CatalogError> {
        ensure_dir(&self.root)
    }

    pub fn ensure_dataset_dir(&self, id: &DatasetId) -> Result<Utf8PathBuf, CatalogError> {
        let dir = self.dataset_dir(id);
        ensure_dir(&dir)?;
        Ok(dir)
    }

    pub fn write_resource(
        &self,
        id: &DatasetId,
        filename: &str,
        content: &[u8],
    ) -> Result<Utf8PathBuf, CatalogError> {
        let path = self.resource_path(id, filename);
        fs::write(path.as_std_path(), content)
            .map_err(|err| CatalogError::Filesystem(format!("write {path}: {err}")))?;
        Ok(path)
    }

    pub fn write_metadata(
        &self,
        id: &DatasetId,
        records: &[DownloadRecord],
    ) -> Result<Utf8PathBuf, CatalogError> {
        let path = self.metadata_path(id);
        let content = to_json_indented(records)?;
        fs::write(path.as_std_path(), content)
            .map_err(|err| CatalogError::Filesystem(format!("write {path}: {err}")))?;
        Ok(path)
    }

    pub fn read_metadata(&self, id: &DatasetId) -> Result<Vec<DownloadRecord>, CatalogError> {
        let path = self.metadata_path(id);
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| CatalogError::Filesystem(format!("read {path}: {err}")))?;
        serde_json::from_str(&content).map_err(|err| CatalogError::Filesystem(err.to_string()))
    }
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), CatalogError> {
    if path.as_std_path().is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| CatalogError::Filesystem(format!("create {path}: {err}")))
}

/// File writer that only creates (and truncates) its target on the first
/// write, so a rejected download leaves an existing file untouched.
pub struct LazyFile {
    path: Utf8PathBuf,
    file: Option<File>,
}

impl LazyFile {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path, file: None }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Creates the file if nothing was written, e.g. for an empty body.
    pub fn finish(mut self) -> Result<Utf8PathBuf, CatalogError> {
        let opened = self.open().map(|_| ());
        opened.map_err(|err| CatalogError::Filesystem(format!("create {}: {err}", self.path)))?;
        Ok(self.path)
    }

    fn open(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            self.file = Some(File::create(self.path.as_std_path())?);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("file not open"))
    }
}

impl Write for LazyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.open()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// JSON with four-space indentation.
fn to_json_indented<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CatalogError> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut serializer)
        .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    Ok(out)
}
