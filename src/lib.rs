//! Download datasets and their resources from CKAN-style open-data catalogs.
//!
//! [`app::App`] drives both workflows over an injected
//! [`catalog::CatalogClient`]: per-dataset downloads with a `metadata.json`
//! sidecar, and paginated search with a flat CSV export of every resource.

pub mod app;
pub mod bulk;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod input;
pub mod output;
pub mod resolve;
pub mod store;
pub mod tui;
