//! Profiler configuration.
//!
//! Defaults reproduce the reference analysis of the CTU IoT-23 connection
//! logs: `|`-separated files read in batches of 100 000 rows, a 100-row
//! header sample, `-` as the null sentinel, and the key columns tracked for
//! uniqueness and numeric summaries.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};
use crate::schema::ConnColumn;

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Default number of leading rows sampled for schema discovery.
pub const DEFAULT_SCHEMA_SAMPLE_ROWS: usize = 100;

/// Default field delimiter.
pub const DEFAULT_DELIMITER: char = '|';

/// Columns whose exact distinct values are tracked by default.
pub const DEFAULT_UNIQUE_COLUMNS: [ConnColumn; 18] = [
    ConnColumn::OrigHost,
    ConnColumn::OrigPort,
    ConnColumn::RespHost,
    ConnColumn::RespPort,
    ConnColumn::Proto,
    ConnColumn::Service,
    ConnColumn::Duration,
    ConnColumn::OrigBytes,
    ConnColumn::RespBytes,
    ConnColumn::ConnState,
    ConnColumn::MissedBytes,
    ConnColumn::History,
    ConnColumn::OrigPkts,
    ConnColumn::OrigIpBytes,
    ConnColumn::RespPkts,
    ConnColumn::RespIpBytes,
    ConnColumn::Label,
    ConnColumn::DetailedLabel,
];

/// Columns summarized numerically by default.
pub const DEFAULT_NUMERIC_COLUMNS: [ConnColumn; 8] = [
    ConnColumn::Duration,
    ConnColumn::OrigBytes,
    ConnColumn::RespBytes,
    ConnColumn::MissedBytes,
    ConnColumn::OrigPkts,
    ConnColumn::OrigIpBytes,
    ConnColumn::RespPkts,
    ConnColumn::RespIpBytes,
];

/// Configuration for one profiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Rows per batch handed to the aggregator
    pub batch_size: usize,
    /// Leading rows read when discovering the schema
    pub schema_sample_rows: usize,
    /// Field delimiter (single ASCII character)
    pub delimiter: char,
    /// Tokens treated as null in every column
    pub null_tokens: Vec<String>,
    /// Columns whose distinct values are retained
    pub unique_columns: Vec<ConnColumn>,
    /// Columns summarized with sum/count/min/max
    pub numeric_columns: Vec<ConnColumn>,
    /// Files profiled concurrently by the runner
    pub max_concurrent_files: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            schema_sample_rows: DEFAULT_SCHEMA_SAMPLE_ROWS,
            delimiter: DEFAULT_DELIMITER,
            null_tokens: vec![String::new(), "-".to_string()],
            unique_columns: DEFAULT_UNIQUE_COLUMNS.to_vec(),
            numeric_columns: DEFAULT_NUMERIC_COLUMNS.to_vec(),
            max_concurrent_files: num_cpus::get().max(1),
        }
    }
}

impl ProfilerConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> ProfilerConfigBuilder {
        ProfilerConfigBuilder {
            config: ProfilerConfig::default(),
        }
    }

    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: ProfilerConfig = serde_json::from_str(&contents).map_err(|e| {
            ProfileError::configuration(format!("Invalid config '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the reader cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ProfileError::configuration("batch_size must be positive"));
        }
        if self.schema_sample_rows == 0 {
            return Err(ProfileError::configuration(
                "schema_sample_rows must be positive",
            ));
        }
        if self.max_concurrent_files == 0 {
            return Err(ProfileError::configuration(
                "max_concurrent_files must be positive",
            ));
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(ProfileError::configuration(format!(
                "delimiter {:?} must be a single ASCII character other than a quote or newline",
                self.delimiter
            )));
        }
        Ok(())
    }

    /// Delimiter as the byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.delimiter as u8
    }
}

/// Builder for [`ProfilerConfig`].
#[derive(Debug, Clone)]
pub struct ProfilerConfigBuilder {
    config: ProfilerConfig,
}

impl ProfilerConfigBuilder {
    /// Set the number of rows per batch
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the number of rows sampled for schema discovery
    pub fn schema_sample_rows(mut self, rows: usize) -> Self {
        self.config.schema_sample_rows = rows;
        self
    }

    /// Set the field delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// Replace the null sentinel tokens
    pub fn null_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.null_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the unique-tracking columns
    pub fn unique_columns(mut self, columns: impl IntoIterator<Item = ConnColumn>) -> Self {
        self.config.unique_columns = columns.into_iter().collect();
        self
    }

    /// Replace the numerically summarized columns
    pub fn numeric_columns(mut self, columns: impl IntoIterator<Item = ConnColumn>) -> Self {
        self.config.numeric_columns = columns.into_iter().collect();
        self
    }

    /// Set how many files are profiled at once
    pub fn max_concurrent_files(mut self, files: usize) -> Self {
        self.config.max_concurrent_files = files;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<ProfilerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
