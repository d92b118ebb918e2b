//! # conn-profile - Streaming profiler for labeled connection logs
//!
//! conn-profile computes a one-pass statistical profile of connection logs
//! in the Zeek `conn.log` layout extended with `label` and
//! `detailed-label` columns (the CTU IoT-23 capture format). Files are read
//! in fixed-size batches, so memory stays bounded by the cardinality of the
//! tracked columns rather than by the size of the capture.
//!
//! ## Overview
//!
//! For every file the profiler reports:
//!
//! - null counts per column, treating `-` and empty cells as null
//! - malformed counts for boolean, float and counter columns
//! - the number of distinct values of the key columns
//! - count, sum, mean, min and max of the byte and packet counters
//! - frequency tables of `label`, `detailed-label`, `proto` and `conn_state`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conn_profile::prelude::*;
//! use conn_profile::formatters::HumanFormatter;
//!
//! # async fn example() -> Result<()> {
//! let runner = ProfileRunner::new(ProfilerConfig::default());
//! let summary = runner
//!     .profile_paths(vec!["kaggle_dataset/capture-1.csv".into()])
//!     .await;
//!
//! let formatter = HumanFormatter::new();
//! for snapshot in summary.snapshots() {
//!     println!("{}", formatter.format(snapshot)?);
//! }
//! for (path, error) in summary.failures() {
//!     eprintln!("{}: {error}", path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Data flows one way through the pipeline:
//!
//! - **`sources`**: input discovery, schema discovery from a header sample,
//!   and batch reading with Arrow's CSV reader
//! - **`coercion`**: raw `Utf8` batches to typed batches; never fails on
//!   cell contents
//! - **`aggregator`**: per-file accumulator state folded batch by batch
//! - **`snapshot`**: the immutable result of a file, mergeable across files
//! - **`formatters`** and **`sink`**: report rendering and delivery
//! - **`runner`**: per-file lifecycle and concurrent multi-file runs

pub mod accumulator;
pub mod aggregator;
pub mod coercion;
pub mod config;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod runner;
pub mod schema;
pub mod sink;
pub mod snapshot;
pub mod sources;

#[cfg(test)]
mod test_helpers;
