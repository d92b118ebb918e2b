//! Error types for the connection-log profiler.
//!
//! Only file-level failures are represented here. Cell- and column-level
//! anomalies never become errors; they are absorbed into null and malformed
//! counts by the coercion layer and the aggregator.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for the profiler.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// A file could not be profiled. Wraps the underlying cause together
    /// with the offending path so callers can report it and move on.
    #[error("Failed to profile '{}': {source}", path.display())]
    File {
        /// Path of the file that failed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: Box<ProfileError>,
    },

    /// The file has no header row, so no schema can be discovered.
    #[error("File is empty: no header row to discover a schema from")]
    EmptyFile,

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Arrow operations, including CSV decoding.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Two accumulators or snapshots built over incompatible schemas.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, ProfileError>`.
///
/// # Examples
///
/// ```rust
/// use conn_profile::error::Result;
///
/// fn discover() -> Result<usize> {
///     Ok(23)
/// }
/// ```
pub type Result<T> = std::result::Result<T, ProfileError>;

impl ProfileError {
    /// Wraps an error with the path of the file it occurred in.
    ///
    /// Already-wrapped errors are returned unchanged so the path is never
    /// reported twice.
    pub fn file(path: impl Into<PathBuf>, source: ProfileError) -> Self {
        match source {
            already @ Self::File { .. } => already,
            other => Self::File {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new schema mismatch error.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch(message.into())
    }

    /// Returns the path of the failed file, if this is a file-level error.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ProfileError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| add_context(e.into(), msg))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| add_context(e.into(), &f()))
    }
}

/// I/O failures keep their variant and kind; everything else becomes internal.
fn add_context(err: ProfileError, msg: &str) -> ProfileError {
    match err {
        ProfileError::Io(inner) => {
            ProfileError::Io(std::io::Error::new(inner.kind(), format!("{msg}: {inner}")))
        }
        ProfileError::Internal(inner) => ProfileError::Internal(format!("{msg}: {inner}")),
        other => ProfileError::Internal(format!("{msg}: {other}")),
    }
}
