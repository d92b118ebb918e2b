//! Input discovery and batch reading.
//!
//! Paths given by the user are expanded into a sorted list of files: a
//! directory stands for every `*.csv` directly inside it, anything that is
//! not an existing path is treated as a glob pattern.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ProfileError, Result};

mod csv;

pub use csv::{discover_schema, CsvBatchReader};

/// Expands input paths into the files to profile.
///
/// Files keep the order in which they were given; each directory or
/// pattern contributes its matches sorted by path. Duplicates are dropped.
pub fn discover_inputs<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        let matches = if input.is_dir() {
            let dir = glob::Pattern::escape(&input.to_string_lossy());
            expand_glob(&format!("{dir}/*.csv"))?
        } else if input.is_file() {
            vec![input.to_path_buf()]
        } else {
            expand_glob(&input.to_string_lossy())?
        };

        if matches.is_empty() {
            warn!(input = %input.display(), "No CSV files found for input");
        }
        for path in matches {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        return Err(ProfileError::configuration(
            "No CSV files found for the given inputs",
        ));
    }

    debug!(files = files.len(), "Discovered input files");
    Ok(files)
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|e| {
        ProfileError::configuration(format!("Invalid glob pattern '{pattern}': {e}"))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ProfileError::Io(e.into()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
