mod common;

use std::fs;

use assert_matches::assert_matches;
use serde_json::json;

use ckan_fetch::app::{App, DatasetOutcome, SkipReason};
use ckan_fetch::domain::DatasetId;
use ckan_fetch::error::CatalogError;
use ckan_fetch::store::Store;

use common::{Call, MockCatalog, NoopSink, temp_root};

fn ids(values: &[&str]) -> Vec<DatasetId> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

#[test]
fn fetch_downloads_resources_and_writes_metadata() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "downloads");
    let catalog = MockCatalog::default()
        .with_dataset(
            "CR0001",
            json!({
                "id": "CR0001",
                "num_resources": 2,
                "resources": [
                    {
                        "name": "Report",
                        "format": "PDF",
                        "url": "https://portal/dataset/CR0001/resource/1/download/cr0001%252Freport.pdf",
                        "download_url": "https://files/cr0001/report.pdf",
                        "resource:description": "Final report"
                    },
                    {
                        "name": "Appendix",
                        "format": "ZIP",
                        "download_url": "https://files/cr0001/appendix",
                        "description": "Raw data"
                    }
                ]
            }),
        )
        .with_file("https://files/cr0001/report.pdf", b"%PDF")
        .with_file("https://files/cr0001/appendix", b"PK");

    let app = App::new(Store::new(root.clone()), catalog);
    let result = app.fetch(&ids(&["CR0001"]), &NoopSink).unwrap();

    let item = &result.datasets[0];
    assert_eq!(item.outcome, DatasetOutcome::Downloaded);
    assert_eq!(item.files, vec!["report.pdf", "Appendix.zip"]);

    let dir = root.join("CR0001");
    assert_eq!(fs::read(dir.join("report.pdf").as_std_path()).unwrap(), b"%PDF");
    assert_eq!(fs::read(dir.join("Appendix.zip").as_std_path()).unwrap(), b"PK");

    let id: DatasetId = "CR0001".parse().unwrap();
    let records = app.store().read_metadata(&id).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].filename, "report.pdf");
    assert_eq!(records[0].details.name, "Report");
    assert_eq!(records[0].details.description, "Final report");
    assert_eq!(
        records[0].details.download_link,
        "https://files/cr0001/report.pdf"
    );
    assert_eq!(records[1].details.description, "Raw data");

    for record in &records {
        assert!(dir.join(&record.filename).as_std_path().is_file());
    }
}

#[test]
fn dataset_without_resources_creates_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "downloads");
    let catalog = MockCatalog::default().with_dataset(
        "EMPTY",
        json!({"id": "EMPTY", "num_resources": 0, "resources": []}),
    );

    let app = App::new(Store::new(root.clone()), catalog);
    let result = app.fetch(&ids(&["EMPTY"]), &NoopSink).unwrap();

    assert_eq!(result.datasets[0].outcome, DatasetOutcome::NoResources);
    assert!(root.as_std_path().is_dir());
    assert!(!root.join("EMPTY").as_std_path().exists());
}

#[test]
fn dataset_without_resources_makes_a_single_call() {
    let temp = tempfile::tempdir().unwrap();
    let catalog = MockCatalog::default().with_dataset("EMPTY", json!({"num_resources": 0}));
    let app = App::new(Store::new(temp_root(&temp, "downloads")), catalog);
    let id: DatasetId = "EMPTY".parse().unwrap();

    app.fetch_dataset(&id, &NoopSink).unwrap();

    assert_eq!(app.client().calls(), vec![Call::Show("EMPTY".to_string())]);
}

#[test]
fn resources_without_links_produce_no_metadata() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "downloads");
    let catalog = MockCatalog::default().with_dataset(
        "NOLINK",
        json!({
            "num_resources": 2,
            "resources": [
                {"name": "First", "format": "PDF"},
                {"name": "Second", "format": "PDF", "url": "", "download_url": null}
            ]
        }),
    );

    let app = App::new(Store::new(root.clone()), catalog);
    let result = app.fetch(&ids(&["NOLINK"]), &NoopSink).unwrap();

    let item = &result.datasets[0];
    assert_eq!(item.outcome, DatasetOutcome::NothingDownloaded);
    assert_eq!(item.skipped.len(), 2);
    assert!(
        item.skipped
            .iter()
            .all(|skipped| skipped.reason == SkipReason::NoDownloadLink)
    );
    assert!(root.join("NOLINK").as_std_path().is_dir());
    assert!(!root.join("NOLINK/metadata.json").as_std_path().exists());
}

#[test]
fn lookup_failure_skips_to_next_dataset() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "downloads");
    let catalog = MockCatalog::default()
        .with_dataset(
            "GOOD",
            json!({
                "num_resources": 1,
                "resources": [{"name": "A", "format": "CSV", "url": "https://files/a.csv"}]
            }),
        )
        .with_file("https://files/a.csv", b"x,y\n");

    let app = App::new(Store::new(root.clone()), catalog);
    let result = app.fetch(&ids(&["MISSING", "GOOD"]), &NoopSink).unwrap();

    assert_eq!(
        result.datasets[0].outcome,
        DatasetOutcome::LookupFailed { status: 404 }
    );
    assert!(!root.join("MISSING").as_std_path().exists());
    assert_eq!(result.datasets[1].outcome, DatasetOutcome::Downloaded);
    assert!(root.join("GOOD/a.csv").as_std_path().is_file());
}

#[test]
fn failed_download_is_left_out_of_metadata() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "downloads");
    let catalog = MockCatalog::default()
        .with_dataset(
            "MIXED",
            json!({
                "num_resources": 2,
                "resources": [
                    {"name": "Gone", "format": "PDF", "url": "https://files/gone.pdf"},
                    {"name": "Here", "format": "PDF", "url": "https://files/here.pdf"}
                ]
            }),
        )
        .with_file("https://files/here.pdf", b"here");

    let app = App::new(Store::new(root.clone()), catalog);
    let result = app.fetch(&ids(&["MIXED"]), &NoopSink).unwrap();

    let item = &result.datasets[0];
    assert_eq!(item.files, vec!["here.pdf"]);
    assert_eq!(
        item.skipped[0].reason,
        SkipReason::DownloadFailed { status: 404 }
    );

    let id: DatasetId = "MIXED".parse().unwrap();
    let records = app.store().read_metadata(&id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "here.pdf");
    assert!(!root.join("MIXED/gone.pdf").as_std_path().exists());
}

#[test]
fn rerun_reuses_directory_and_overwrites_files() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "downloads");
    let dir = root.join("AGAIN");
    fs::create_dir_all(dir.as_std_path()).unwrap();
    fs::write(dir.join("data.csv").as_std_path(), b"stale").unwrap();
    fs::write(dir.join("metadata.json").as_std_path(), b"[]").unwrap();

    let catalog = MockCatalog::default()
        .with_dataset(
            "AGAIN",
            json!({
                "num_resources": 1,
                "resources": [{"name": "Data", "url": "https://files/data.csv"}]
            }),
        )
        .with_file("https://files/data.csv", b"fresh");

    let app = App::new(Store::new(root.clone()), catalog);
    app.fetch(&ids(&["AGAIN"]), &NoopSink).unwrap();

    assert_eq!(fs::read(dir.join("data.csv").as_std_path()).unwrap(), b"fresh");
    let id: DatasetId = "AGAIN".parse().unwrap();
    assert_eq!(app.store().read_metadata(&id).unwrap().len(), 1);
}

#[test]
fn same_filename_overwrites_within_dataset() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "downloads");
    let catalog = MockCatalog::default()
        .with_dataset(
            "DUP",
            json!({
                "num_resources": 2,
                "resources": [
                    {"name": "One", "url": "https://a/file.txt"},
                    {"name": "Two", "url": "https://b/file.txt"}
                ]
            }),
        )
        .with_file("https://a/file.txt", b"one")
        .with_file("https://b/file.txt", b"two");

    let app = App::new(Store::new(root.clone()), catalog);
    let result = app.fetch(&ids(&["DUP"]), &NoopSink).unwrap();

    assert_eq!(result.downloaded_files(), 2);
    assert_eq!(
        fs::read(root.join("DUP/file.txt").as_std_path()).unwrap(),
        b"two"
    );
}

#[test]
fn malformed_record_aborts_run() {
    let temp = tempfile::tempdir().unwrap();
    let catalog =
        MockCatalog::default().with_dataset("BAD", json!({"num_resources": "several"}));
    let app = App::new(Store::new(temp_root(&temp, "downloads")), catalog);

    let err = app.fetch(&ids(&["BAD", "NEVER"]), &NoopSink).unwrap_err();
    assert_matches!(err, CatalogError::CatalogPayload(_));
}

#[test]
fn calls_follow_resource_order() {
    let temp = tempfile::tempdir().unwrap();
    let catalog = MockCatalog::default()
        .with_dataset(
            "ORDER",
            json!({
                "num_resources": 3,
                "resources": [
                    {"name": "a", "url": "https://f/a"},
                    {"name": "b"},
                    {"name": "c", "url": "https://f/c"}
                ]
            }),
        )
        .with_file("https://f/a", b"a")
        .with_file("https://f/c", b"c");
    let app = App::new(Store::new(temp_root(&temp, "downloads")), catalog);
    let id: DatasetId = "ORDER".parse().unwrap();

    let result = app.fetch_dataset(&id, &NoopSink).unwrap();

    assert_eq!(
        app.client().calls(),
        vec![
            Call::Show("ORDER".to_string()),
            Call::Fetch("https://f/a".to_string()),
            Call::Fetch("https://f/c".to_string()),
        ]
    );
    assert_eq!(result.files, vec!["a", "c"]);
    assert_eq!(result.skipped[0].name, "b");
}

#[test]
fn unusable_file_names_are_skipped_and_the_run_continues() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "downloads");
    let catalog = MockCatalog::default()
        .with_dataset(
            "DS",
            json!({
                "num_resources": 3,
                "resources": [
                    {"name": "../../escaped", "format": "PDF", "download_url": "https://f/x"},
                    {"name": "Map 1/2", "format": "PDF", "download_url": "https://f/y"},
                    {"name": "Legend", "format": "PDF", "download_url": "https://f/z"}
                ]
            }),
        )
        .with_dataset(
            "NEXT",
            json!({
                "num_resources": 1,
                "resources": [{"name": "Next", "format": "PDF", "download_url": "https://f/n"}]
            }),
        )
        .with_file("https://f/x", b"x")
        .with_file("https://f/y", b"y")
        .with_file("https://f/z", b"z")
        .with_file("https://f/n", b"n");
    let app = App::new(Store::new(root.clone()), catalog);

    let result = app.fetch(&ids(&["DS", "NEXT"]), &NoopSink).unwrap();

    let first = &result.datasets[0];
    assert_eq!(first.files, vec!["Legend.pdf"]);
    assert_eq!(first.skipped.len(), 2);
    assert_matches!(
        &first.skipped[0].reason,
        SkipReason::UnsafeFilename { filename } if filename == "../../escaped.pdf"
    );
    assert_matches!(&first.skipped[1].reason, SkipReason::UnsafeFilename { .. });
    assert!(!temp.path().join("escaped.pdf").exists());

    let id: DatasetId = "DS".parse().unwrap();
    let records = app.store().read_metadata(&id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "Legend.pdf");

    assert_eq!(result.datasets[1].files, vec!["Next.pdf"]);
    assert!(
        !app.client()
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Fetch(url) if url == "https://f/x" || url == "https://f/y"))
    );
}

#[test]
fn results_carry_rfc3339_timestamps_and_serialize() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(Store::new(temp_root(&temp, "downloads")), MockCatalog::default());

    let result = app.fetch(&ids(&["MISSING"]), &NoopSink).unwrap();

    assert!(chrono::DateTime::parse_from_rfc3339(&result.started_at).is_ok());
    assert!(chrono::DateTime::parse_from_rfc3339(&result.finished_at).is_ok());
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(
        value["datasets"][0]["outcome"],
        json!({"lookup_failed": {"status": 404}})
    );
}
