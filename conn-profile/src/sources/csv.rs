//! Delimited text reader for connection logs.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::csv::reader::Format;
use arrow::csv::{Reader, ReaderBuilder};
use arrow::record_batch::RecordBatch;
use tracing::{debug, instrument};

use crate::config::ProfilerConfig;
use crate::error::{ProfileError, Result};
use crate::schema::ConnSchema;

/// Reads the header and a sample of leading rows to fix the file schema.
///
/// Returns [`ProfileError::EmptyFile`] when the file has no header row.
#[instrument(skip(config), fields(path = %path.display(), sample_rows = config.schema_sample_rows))]
pub fn discover_schema(path: &Path, config: &ProfilerConfig) -> Result<ConnSchema> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(ProfileError::EmptyFile);
    }

    let format = Format::default()
        .with_header(true)
        .with_delimiter(config.delimiter_byte())
        .with_truncated_rows(true);
    let (sampled, records) = format.infer_schema(file, Some(config.schema_sample_rows))?;

    let schema = ConnSchema::from_headers(sampled.fields().iter().map(|f| f.name().as_str()))?;
    debug!(
        columns = schema.len(),
        sampled_records = records,
        unknown = schema.unknown_columns().count(),
        "Discovered schema"
    );
    Ok(schema)
}

/// Iterator over the raw batches of one file.
///
/// Every column is read as nullable `Utf8`; rows shorter than the header
/// have their missing trailing cells read as null.
pub struct CsvBatchReader {
    path: PathBuf,
    reader: Reader<File>,
    batches: u64,
}

impl std::fmt::Debug for CsvBatchReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvBatchReader")
            .field("path", &self.path)
            .field("batches", &self.batches)
            .finish()
    }
}

impl CsvBatchReader {
    /// Opens a file for batch reading against a discovered schema.
    pub fn open(path: &Path, schema: &ConnSchema, config: &ProfilerConfig) -> Result<Self> {
        let file = File::open(path)?;
        let reader = ReaderBuilder::new(schema.raw_arrow_schema())
            .with_header(true)
            .with_delimiter(config.delimiter_byte())
            .with_batch_size(config.batch_size)
            .with_truncated_rows(true)
            .build(file)?;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            batches: 0,
        })
    }

    /// Path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Batches read so far.
    pub fn batches_read(&self) -> u64 {
        self.batches
    }
}

impl Iterator for CsvBatchReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.reader.next()?;
        self.batches += 1;
        Some(next.map_err(ProfileError::from))
    }
}
