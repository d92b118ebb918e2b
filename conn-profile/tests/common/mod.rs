//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

/// Full header of a labeled IoT-23 connection log.
pub const HEADER: &str = "ts|uid|id.orig_h|id.orig_p|id.resp_h|id.resp_p|proto|service|duration|\
orig_bytes|resp_bytes|conn_state|local_orig|local_resp|missed_bytes|history|orig_pkts|\
orig_ip_bytes|resp_pkts|resp_ip_bytes|tunnel_parents|label|detailed-label";

/// A deterministic connection record.
///
/// Over rows `0..10`: 4 distinct originators, protocols tcp x7 / udp x3,
/// labels split evenly, `duration` null on rows 4 and 9, and `orig_pkts`
/// cycling 1..=4.
pub fn conn_row(i: usize) -> String {
    let missing = i % 5 == 4;
    let fields = [
        format!("{}.{:06}", 1_525_879_831 + i, i * 7),
        format!("C{i:05}"),
        format!("192.168.100.{}", i % 4 + 1),
        format!("{}", 40_000 + i),
        format!("10.0.0.{}", i % 3),
        ["80", "443", "53"][i % 3].to_string(),
        ["tcp", "tcp", "udp"][i % 3].to_string(),
        ["http", "-", "dns"][i % 3].to_string(),
        if missing { "-".to_string() } else { format!("{i}.5") },
        if missing { "-".to_string() } else { format!("{}", i * 10) },
        if missing { "-".to_string() } else { format!("{}", i * 20) },
        ["S0", "SF", "REJ"][i % 3].to_string(),
        "-".to_string(),
        "-".to_string(),
        "0".to_string(),
        "S".to_string(),
        format!("{}", i % 4 + 1),
        format!("{}", (i % 4 + 1) * 60),
        "0".to_string(),
        "0".to_string(),
        "-".to_string(),
        if i % 2 == 0 { "Malicious" } else { "Benign" }.to_string(),
        if i % 2 == 0 { "PartOfAHorizontalPortScan" } else { "-" }.to_string(),
    ];
    fields.join("|")
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Writes a full-header capture with `rows` records.
pub fn write_capture(dir: &Path, name: &str, rows: usize) -> PathBuf {
    let mut contents = String::from(HEADER);
    contents.push('\n');
    for i in 0..rows {
        contents.push_str(&conn_row(i));
        contents.push('\n');
    }
    write_file(dir, name, &contents)
}

/// Builds a raw all-`Utf8` batch. An empty string cell becomes a null.
pub fn raw_batch(headers: &[&str], rows: &[Vec<String>]) -> RecordBatch {
    let fields: Vec<Field> = headers
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = (0..headers.len())
        .map(|col| {
            let values: StringArray = rows
                .iter()
                .map(|row| row.get(col).map(String::as_str).filter(|v| !v.is_empty()))
                .collect();
            Arc::new(values) as ArrayRef
        })
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
}
