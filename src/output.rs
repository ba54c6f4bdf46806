use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BulkResult, FetchResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_bulk(result: &BulkResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::app::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::app::ProgressEvent) {}
}

pub fn print_fetch_summary(result: &FetchResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}ckan-fetch summary{reset}");
    println!(
        "{green}Downloaded files: {} across {} datasets{reset}",
        result.downloaded_files(),
        result.datasets.len()
    );
    for item in &result.datasets {
        let (label, color) = match item.outcome {
            crate::app::DatasetOutcome::Downloaded => ("downloaded".to_string(), green),
            crate::app::DatasetOutcome::NothingDownloaded => {
                ("nothing downloaded".to_string(), yellow)
            }
            crate::app::DatasetOutcome::NoResources => ("no resources".to_string(), yellow),
            crate::app::DatasetOutcome::LookupFailed { status } => {
                (format!("lookup failed ({status})"), red)
            }
        };
        println!("{color}  {} {} ({label}){reset}", item.id, item.files.len());
        if let Some(path) = &item.metadata_path {
            println!("{color}     metadata: {path}{reset}");
        }
        for skipped in &item.skipped {
            println!("{yellow}     skipped: {}{reset}", skipped.name);
        }
    }
}

pub fn print_bulk_summary(result: &BulkResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}ckan-fetch bulk summary{reset}");
    println!(
        "{green}Search results: {} in {} pages, {} resource rows -> {}{reset}",
        result.total_results, result.pages, result.rows, result.export_path
    );
    println!(
        "{green}Matching rows: {}, downloaded {} files ({} bytes) to {}{reset}",
        result.matching_rows,
        result.downloads.files.len(),
        result.downloads.bytes,
        result.downloads.directory
    );
    for failed in &result.downloads.failed {
        match failed.status {
            Some(status) => println!("{yellow}  failed: {} ({status}){reset}", failed.url),
            None => println!("{yellow}  failed: {:?} (no url){reset}", failed.url),
        }
    }
}
