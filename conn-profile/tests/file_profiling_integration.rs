//! Integration tests for profiling connection-log files end to end.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{write_capture, write_file, HEADER};
use conn_profile::error::ProfileError;
use conn_profile::formatters::{HumanFormatter, JsonFormatter, ReportFormatter};
use conn_profile::prelude::*;
use conn_profile::sink::{MemoryReportSink, DATASET_DIR, REPORTS_DIR};
use conn_profile::snapshot::MERGED_SOURCE;
use conn_profile::sources::discover_inputs;

fn config(batch_size: usize) -> ProfilerConfig {
    ProfilerConfig::builder()
        .batch_size(batch_size)
        .max_concurrent_files(2)
        .build()
        .unwrap()
}

#[test]
fn test_profile_full_capture() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(dir.path(), "capture-1.csv", 10);

    let snapshot = ProfileRunner::new(config(4)).profile_file(&path).unwrap();

    assert_eq!(snapshot.source(), "capture-1.csv");
    assert_eq!(snapshot.rows(), 10);
    assert_eq!(snapshot.batches(), 3);
    assert_eq!(snapshot.schema().len(), 23);
    assert_eq!(snapshot.lifecycle(), LifecycleState::Finalized);

    // Distinct originators across three batches equal the global count
    assert_eq!(snapshot.cardinality(ConnColumn::OrigHost), Some(4));
    assert_eq!(snapshot.cardinality(ConnColumn::Proto), Some(2));

    assert_eq!(snapshot.null_count("duration"), Some(2));
    assert_eq!(snapshot.null_count("local_orig"), Some(10));
    assert_eq!(snapshot.null_count("detailed-label"), Some(5));
    assert_eq!(snapshot.null_count("uid"), Some(0));
    assert_eq!(snapshot.malformed_count("local_orig"), Some(0));

    let pkts = snapshot.numeric_summary(ConnColumn::OrigPkts).unwrap();
    assert_eq!(pkts.count, 10);
    assert_eq!(pkts.sum, 23.0);
    assert_eq!(pkts.min, Some(1.0));
    assert_eq!(pkts.max, Some(4.0));

    let orig_bytes = snapshot.numeric_summary(ConnColumn::OrigBytes).unwrap();
    assert_eq!(orig_bytes.count, 8);

    assert_eq!(
        snapshot.frequency_table(CategoricalField::Proto).unwrap(),
        vec![("tcp".to_string(), 7), ("udp".to_string(), 3)]
    );
    assert_eq!(
        snapshot.frequency_table(CategoricalField::Label).unwrap(),
        vec![("Benign".to_string(), 5), ("Malicious".to_string(), 5)]
    );
    assert_eq!(
        snapshot
            .frequency_table(CategoricalField::DetailedLabel)
            .unwrap(),
        vec![("PartOfAHorizontalPortScan".to_string(), 5)]
    );
}

#[test]
fn test_batch_size_does_not_change_the_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(dir.path(), "capture.csv", 37);

    let reference = ProfileRunner::new(config(100)).profile_file(&path).unwrap();
    for batch_size in [1, 2, 5, 36] {
        let snapshot = ProfileRunner::new(config(batch_size))
            .profile_file(&path)
            .unwrap();
        assert_eq!(snapshot.state(), reference.state(), "batch size {batch_size}");
    }
}

#[test]
fn test_empty_and_header_only_files() {
    let dir = tempfile::tempdir().unwrap();
    let empty = write_file(dir.path(), "empty.csv", "");
    let header_only = write_file(dir.path(), "header.csv", &format!("{HEADER}\n"));
    let runner = ProfileRunner::new(config(10));

    let err = runner.profile_file(&empty).unwrap_err();
    assert_eq!(err.path(), Some(empty.as_path()));
    match err {
        ProfileError::File { source, .. } => assert!(matches!(*source, ProfileError::EmptyFile)),
        other => panic!("expected a file error, got {other:?}"),
    }

    let snapshot = runner.profile_file(&header_only).unwrap();
    assert_eq!(snapshot.rows(), 0);
    assert_eq!(snapshot.batches(), 0);
    assert!(snapshot
        .numeric_summaries()
        .iter()
        .all(|summary| !summary.has_data()));
    assert_eq!(
        snapshot.frequency_table(CategoricalField::Proto),
        Some(vec![])
    );
}

#[test]
fn test_partial_header_and_short_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "partial.csv",
        "id.orig_h|proto|Label|sensor\n10.0.0.1|tcp|Benign|a\n10.0.0.2|udp\n-|tcp|-|b\n",
    );

    let snapshot = ProfileRunner::new(config(2)).profile_file(&path).unwrap();
    assert_eq!(snapshot.rows(), 3);
    // `Label` is matched case-insensitively and reported under its own name
    assert_eq!(snapshot.column_name(ConnColumn::Label), Some("Label"));
    assert_eq!(snapshot.null_count("Label"), Some(2));
    assert_eq!(snapshot.null_count("sensor"), Some(1));
    assert_eq!(snapshot.cardinality(ConnColumn::OrigHost), Some(2));
    assert!(snapshot.numeric_summary(ConnColumn::Duration).is_none());
    assert!(snapshot
        .frequency_table(CategoricalField::ConnState)
        .is_none());
}

#[test]
fn test_custom_delimiter_and_sentinels() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "comma.csv",
        "proto,duration\ntcp,1.0\nn/a,2.0\nudp,n/a\n",
    );
    let config = ProfilerConfig::builder()
        .delimiter(',')
        .null_tokens(["", "-", "n/a"])
        .build()
        .unwrap();

    let snapshot = ProfileRunner::new(config).profile_file(&path).unwrap();
    assert_eq!(snapshot.null_count("proto"), Some(1));
    assert_eq!(snapshot.null_count("duration"), Some(1));
    assert_eq!(snapshot.malformed_count("duration"), Some(0));
    assert_eq!(
        snapshot.numeric_summary(ConnColumn::Duration).unwrap().sum,
        3.0
    );
}

#[tokio::test]
async fn test_failed_file_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_capture(dir.path(), "a.csv", 10);
    write_file(dir.path(), "b.csv", "");
    write_capture(dir.path(), "c.csv", 6);

    let inputs = discover_inputs(&[dir.path()]).unwrap();
    assert_eq!(inputs.len(), 3);

    let progressed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&progressed);
    let summary = ProfileRunner::new(config(4))
        .on_progress(move |progress| {
            assert!(progress.completed <= progress.total);
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .profile_paths(inputs)
        .await;

    assert_eq!(progressed.load(Ordering::SeqCst), 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(summary.any_succeeded());

    // Outcomes keep input order
    let names: Vec<String> = summary
        .outcomes()
        .iter()
        .map(|o| o.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.csv", "b.csv", "c.csv"]);

    let (failed_path, error) = summary.failures().next().unwrap();
    assert!(failed_path.ends_with("b.csv"));
    assert!(error.to_string().contains("b.csv"));

    let merged = summary.merged().unwrap();
    assert_eq!(merged.source(), MERGED_SOURCE);
    assert_eq!(merged.rows(), 16);
    assert_eq!(merged.files(), &["a.csv".to_string(), "c.csv".to_string()]);
    assert_eq!(merged.cardinality(ConnColumn::OrigHost), Some(4));
}

#[tokio::test]
async fn test_run_with_only_failures() {
    let dir = tempfile::tempdir().unwrap();
    let empty = write_file(dir.path(), "empty.csv", "");

    let summary = ProfileRunner::new(config(4))
        .profile_paths(vec![empty, dir.path().join("missing.csv")])
        .await;

    assert!(!summary.any_succeeded());
    assert_eq!(summary.failed(), 2);
    assert!(summary.merged().is_err());
}

#[tokio::test]
async fn test_reports_written_beside_dataset_directory() {
    let root = tempfile::tempdir().unwrap();
    let dataset = root.path().join(DATASET_DIR);
    std::fs::create_dir(&dataset).unwrap();
    let path = write_capture(&dataset, "capture-7.csv", 10);

    let snapshot = ProfileRunner::new(config(4)).profile_file(&path).unwrap();
    let formatter = HumanFormatter::new();
    let report = formatter.format(&snapshot).unwrap();

    let written = DirectoryReportSink::new()
        .write_report(&path, formatter.extension(), &report)
        .await
        .unwrap();

    assert_eq!(
        written,
        root.path().join(REPORTS_DIR).join("capture-7_analysis.txt")
    );
    let contents = std::fs::read_to_string(&written).unwrap();
    assert!(contents.contains("File analyzed: capture-7.csv"));
    assert!(contents.contains("id.orig_h: 4 unique"));
    assert!(contents.contains("orig_pkts: mean=2.30, min=1.0, max=4.0"));
    assert!(contents.contains("Most frequent connection states (conn_state):"));
}

#[tokio::test]
async fn test_json_report_to_memory_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(dir.path(), "capture.csv", 5);

    let snapshot = ProfileRunner::new(config(2)).profile_file(&path).unwrap();
    let formatter = JsonFormatter::new();
    let sink = MemoryReportSink::with_output_dir("/reports");
    let key = sink
        .write_report(&path, formatter.extension(), &formatter.format(&snapshot).unwrap())
        .await
        .unwrap();

    assert_eq!(key, std::path::PathBuf::from("/reports/capture_analysis.json"));
    let stored = sink.get(&key).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(value["rows"], 5);
    assert_eq!(value["batches"], 3);
}
