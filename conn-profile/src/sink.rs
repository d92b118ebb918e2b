//! Destinations for rendered reports.
//!
//! Reports are named `<stem>_analysis.<ext>` after the file they describe
//! and, by default, written to an `analysis_reports/` directory placed
//! beside the input's directory:
//!
//! ```text
//! project/
//! ├── analysis_reports/
//! │   └── capture-1_analysis.txt
//! └── kaggle_dataset/
//!     └── capture-1.csv
//! ```
//!
//! Inputs outside a `kaggle_dataset` directory get `analysis_reports/`
//! inside their own directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{ErrorContext, Result};

/// Name of the directory reports are written to.
pub const REPORTS_DIR: &str = "analysis_reports";

/// Input directory whose reports go one level up.
pub const DATASET_DIR: &str = "kaggle_dataset";

/// Where a report for `input` is written.
///
/// `output_dir` replaces the derived `analysis_reports/` directory.
pub fn report_path(input: &Path, output_dir: Option<&Path>, extension: &str) -> PathBuf {
    let reports_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let parent = input.parent().unwrap_or_else(|| Path::new(""));
            let base = if parent.file_name().is_some_and(|name| name == DATASET_DIR) {
                parent.parent().unwrap_or_else(|| Path::new(""))
            } else {
                parent
            };
            base.join(REPORTS_DIR)
        }
    };

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    reports_dir.join(format!("{stem}_analysis.{extension}"))
}

/// Receives rendered reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Stores the report for an input file and returns where it went.
    async fn write_report(&self, input: &Path, extension: &str, contents: &str)
        -> Result<PathBuf>;
}

/// Writes reports to the file system.
#[derive(Debug, Clone, Default)]
pub struct DirectoryReportSink {
    output_dir: Option<PathBuf>,
}

impl DirectoryReportSink {
    /// Sink that derives the report directory from each input path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that writes every report into one directory.
    pub fn with_output_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(dir.into()),
        }
    }
}

#[async_trait]
impl ReportSink for DirectoryReportSink {
    #[instrument(skip(self, contents), fields(input = %input.display(), bytes = contents.len()))]
    async fn write_report(
        &self,
        input: &Path,
        extension: &str,
        contents: &str,
    ) -> Result<PathBuf> {
        let path = report_path(input, self.output_dir.as_deref(), extension);

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create report directory '{}'", dir.display()))?;
        }
        fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write report '{}'", path.display()))?;

        debug!(report = %path.display(), "Wrote report");
        Ok(path)
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    output_dir: Option<PathBuf>,
    reports: Mutex<Vec<(PathBuf, String)>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports keyed as if written under `dir`.
    pub fn with_output_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(dir.into()),
            reports: Mutex::default(),
        }
    }

    /// Reports received so far, in arrival order.
    pub async fn reports(&self) -> Vec<(PathBuf, String)> {
        self.reports.lock().await.clone()
    }

    /// Contents of the report stored under `path`.
    pub async fn get(&self, path: &Path) -> Option<String> {
        self.reports
            .lock()
            .await
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, contents)| contents.clone())
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn write_report(
        &self,
        input: &Path,
        extension: &str,
        contents: &str,
    ) -> Result<PathBuf> {
        let path = report_path(input, self.output_dir.as_deref(), extension);
        let mut reports = self.reports.lock().await;
        match reports.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = contents.to_string(),
            None => reports.push((path.clone(), contents.to_string())),
        }
        Ok(path)
    }
}
