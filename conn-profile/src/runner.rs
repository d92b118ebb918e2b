//! Per-file lifecycle driver and multi-file orchestration.
//!
//! Each file runs through its own sequential pipeline (schema discovery,
//! batch reading, coercion, aggregation, finalize) on a blocking task.
//! Files are processed concurrently up to
//! [`ProfilerConfig::max_concurrent_files`]; a failing file is reported in
//! the [`RunSummary`] and never stops the others.
//!
//! # Example
//!
//! ```rust,no_run
//! use conn_profile::config::ProfilerConfig;
//! use conn_profile::runner::ProfileRunner;
//!
//! # async fn example() -> conn_profile::error::Result<()> {
//! let runner = ProfileRunner::new(ProfilerConfig::default()).on_progress(|progress| {
//!     println!("{}/{} files profiled", progress.completed, progress.total);
//! });
//!
//! let summary = runner.profile_paths(vec!["kaggle_dataset/CTU-IoT-Malware-Capture-1-1.csv".into()]).await;
//! for snapshot in summary.snapshots() {
//!     println!("{}: {} rows", snapshot.source(), snapshot.rows());
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;
use futures::{stream, StreamExt};
use tracing::{error, info, instrument};

use crate::aggregator::{LifecycleState, ProfileAggregator};
use crate::coercion::{NullTokens, TypeCoercer};
use crate::config::ProfilerConfig;
use crate::error::{ProfileError, Result};
use crate::logging::{truncate_field, LogConfig};
use crate::schema::ConnSchema;
use crate::snapshot::ProfileSnapshot;
use crate::sources::{discover_schema, CsvBatchReader};

/// Progress reported after each file completes.
#[derive(Debug, Clone)]
pub struct RunProgress {
    /// Files finished so far, failures included
    pub completed: usize,
    /// Files in the run
    pub total: usize,
    /// File that just finished
    pub path: PathBuf,
    /// Whether it produced a snapshot
    pub succeeded: bool,
}

impl RunProgress {
    /// Completed fraction between 0.0 and 1.0.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Type alias for progress callback function.
pub type ProgressCallback = Arc<dyn Fn(&RunProgress) + Send + Sync>;

/// Result of profiling one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<ProfileSnapshot>,
}

/// Outcomes of a run, in input order.
#[derive(Debug)]
pub struct RunSummary {
    outcomes: Vec<FileOutcome>,
    elapsed: Duration,
}

impl RunSummary {
    /// Per-file outcomes in input order.
    pub fn outcomes(&self) -> &[FileOutcome] {
        &self.outcomes
    }

    /// Consumes the summary, returning its outcomes.
    pub fn into_outcomes(self) -> Vec<FileOutcome> {
        self.outcomes
    }

    /// Snapshots of the files that succeeded.
    pub fn snapshots(&self) -> impl Iterator<Item = &ProfileSnapshot> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Files that failed with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ProfileError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.path.as_path(), e)))
    }

    pub fn succeeded(&self) -> usize {
        self.snapshots().count()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Whether at least one file was profiled.
    pub fn any_succeeded(&self) -> bool {
        self.succeeded() > 0
    }

    /// Wall time of the whole run.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Merges the snapshots of every successful file.
    pub fn merged(&self) -> Result<ProfileSnapshot> {
        let snapshots: Vec<ProfileSnapshot> = self.snapshots().cloned().collect();
        if snapshots.is_empty() {
            return Err(ProfileError::Internal(
                "no file was profiled successfully".to_string(),
            ));
        }
        ProfileSnapshot::merge(&snapshots)
    }
}

/// Drives files through the profiling pipeline.
#[derive(Clone)]
pub struct ProfileRunner {
    config: Arc<ProfilerConfig>,
    log: LogConfig,
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for ProfileRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileRunner")
            .field("config", &self.config)
            .field("log", &self.log)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl ProfileRunner {
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config: Arc::new(config),
            log: LogConfig::default(),
            on_progress: None,
        }
    }

    /// Sets the logging verbosity knobs.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Sets a callback invoked after each file completes.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RunProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Profiles one file from header to snapshot.
    ///
    /// Any failure is returned as [`ProfileError::File`] naming the path.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn profile_file(&self, path: &Path) -> Result<ProfileSnapshot> {
        let start = Instant::now();
        crate::perf_debug!(self.log, state = ?LifecycleState::Idle);

        let result = discover_schema(path, &self.config).and_then(|schema| {
            let schema = Arc::new(schema);
            crate::perf_debug!(
                self.log,
                state = ?LifecycleState::SchemaDiscovered,
                columns = schema.len()
            );
            let reader = CsvBatchReader::open(path, &schema, &self.config)?;
            self.profile_batches(schema, reader, source_name(path))
        });

        match result {
            Ok(snapshot) => {
                crate::log_file_op!(
                    self.log,
                    rows = snapshot.rows(),
                    batches = snapshot.batches(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Profiled file in {:.2}s",
                    start.elapsed().as_secs_f64()
                );
                Ok(snapshot)
            }
            Err(e) => {
                error!(
                    error = %truncate_field(&e.to_string(), self.log.max_field_length),
                    "Failed to profile file"
                );
                Err(ProfileError::file(path, e))
            }
        }
    }

    /// Folds an arbitrary batch source into a snapshot.
    ///
    /// The first failing batch aborts the source and its partial state is
    /// discarded.
    pub fn profile_batches<I>(
        &self,
        schema: Arc<ConnSchema>,
        batches: I,
        source: impl Into<String>,
    ) -> Result<ProfileSnapshot>
    where
        I: IntoIterator<Item = Result<RecordBatch>>,
    {
        let coercer = TypeCoercer::new(
            Arc::clone(&schema),
            NullTokens::new(&self.config.null_tokens),
        );
        let mut aggregator = ProfileAggregator::new(schema, &self.config);

        for batch in batches {
            let batch = batch?;
            aggregator.observe_batch(&coercer.coerce(&batch));
            crate::log_batch!(
                self.log,
                batch = aggregator.batches_observed(),
                rows = batch.num_rows(),
                total_rows = aggregator.rows_observed(),
                "Observed batch"
            );
        }

        crate::perf_debug!(
            self.log,
            state = ?LifecycleState::Finalized,
            rows = aggregator.rows_observed(),
            batches = aggregator.batches_observed()
        );
        Ok(aggregator.finalize(source))
    }

    /// Profiles files concurrently, returning outcomes in input order.
    #[instrument(skip(self, paths), fields(files = paths.len(), jobs = self.config.max_concurrent_files))]
    pub async fn profile_paths(&self, paths: Vec<PathBuf>) -> RunSummary {
        let start = Instant::now();
        let total = paths.len();
        let completed = Arc::new(AtomicUsize::new(0));
        info!("Starting profiling of {total} files");

        let outcomes = stream::iter(paths.into_iter().map(|path| {
            let runner = self.clone();
            let completed = Arc::clone(&completed);
            async move {
                let task_path = path.clone();
                let task_runner = runner.clone();
                let result = tokio::task::spawn_blocking(move || {
                    task_runner.profile_file(&task_path)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(ProfileError::file(
                        &path,
                        ProfileError::Internal(format!("profiling task failed: {e}")),
                    ))
                });

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = &runner.on_progress {
                    callback(&RunProgress {
                        completed: done,
                        total,
                        path: path.clone(),
                        succeeded: result.is_ok(),
                    });
                }

                FileOutcome { path, result }
            }
        }))
        .buffered(self.config.max_concurrent_files.max(1))
        .collect::<Vec<_>>()
        .await;

        let summary = RunSummary {
            outcomes,
            elapsed: start.elapsed(),
        };
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Profiling completed in {:.2}s",
            summary.elapsed.as_secs_f64()
        );
        summary
    }
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
