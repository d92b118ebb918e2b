//! Prelude for commonly used types and traits in conn-profile.

pub use crate::aggregator::{LifecycleState, ProfileAggregator};
pub use crate::config::ProfilerConfig;
pub use crate::error::{ErrorContext, ProfileError, Result};
pub use crate::formatters::{FormatterConfig, ReportFormat, ReportFormatter};
pub use crate::logging::LogConfig;
pub use crate::runner::{ProfileRunner, RunSummary};
pub use crate::schema::{CategoricalField, ConnColumn, ConnSchema};
pub use crate::sink::{DirectoryReportSink, ReportSink};
pub use crate::snapshot::ProfileSnapshot;
