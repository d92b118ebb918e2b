//! Report formatting for profile snapshots.
//!
//! Three formatters render a [`ProfileSnapshot`]: a plain-text report for
//! the console and for report files, Markdown for documentation, and JSON
//! for programmatic consumption.
//!
//! # Examples
//!
//! ```rust
//! use conn_profile::formatters::{formatter_for, FormatterConfig, ReportFormat};
//!
//! let formatter = formatter_for(ReportFormat::Markdown, FormatterConfig::minimal());
//! assert_eq!(formatter.extension(), "md");
//! ```

use std::fmt::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};
use crate::schema::{CategoricalField, ConnColumn};
use crate::snapshot::{NumericSummary, ProfileSnapshot};

/// Configuration options for rendering a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterConfig {
    /// Maximum rows shown per frequency table (`None` for all)
    pub max_categories: Option<usize>,
    /// Include the column and declared type section
    pub include_schema: bool,
    /// Include the time the snapshot was finalized
    pub include_timestamps: bool,
    /// Include malformed counts per column
    pub include_malformed: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            max_categories: None,
            include_schema: true,
            include_timestamps: true,
            include_malformed: true,
        }
    }
}

impl FormatterConfig {
    /// Creates a compact configuration for console output.
    pub fn minimal() -> Self {
        Self {
            max_categories: Some(10),
            include_schema: false,
            include_timestamps: false,
            include_malformed: false,
        }
    }

    /// Creates a configuration showing everything.
    pub fn detailed() -> Self {
        Self::default()
    }

    /// Sets the maximum rows per frequency table.
    pub fn with_max_categories(mut self, max: Option<usize>) -> Self {
        self.max_categories = max;
        self
    }

    /// Sets whether to include the schema section.
    pub fn with_schema(mut self, include: bool) -> Self {
        self.include_schema = include;
        self
    }

    /// Sets whether to include timestamps.
    pub fn with_timestamps(mut self, include: bool) -> Self {
        self.include_timestamps = include;
        self
    }

    /// Sets whether to include malformed counts.
    pub fn with_malformed(mut self, include: bool) -> Self {
        self.include_malformed = include;
        self
    }

    fn visible<'a, T>(&self, rows: &'a [T]) -> (&'a [T], usize) {
        match self.max_categories {
            Some(max) if rows.len() > max => (&rows[..max], rows.len() - max),
            _ => (rows, 0),
        }
    }
}

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Human,
    Markdown,
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Human => write!(f, "human"),
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" | "txt" => Ok(ReportFormat::Human),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(ProfileError::configuration(format!(
                "Unknown report format '{other}'"
            ))),
        }
    }
}

/// Renders a snapshot into a report.
pub trait ReportFormatter: Send + Sync {
    /// Formats a snapshot with the formatter's own configuration.
    fn format(&self, snapshot: &ProfileSnapshot) -> Result<String>;

    /// Formats a snapshot with a custom configuration.
    fn format_with_config(
        &self,
        snapshot: &ProfileSnapshot,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(snapshot)
    }

    /// File extension of written reports, without the dot.
    fn extension(&self) -> &'static str;
}

/// Builds the formatter for a format.
pub fn formatter_for(format: ReportFormat, config: FormatterConfig) -> Box<dyn ReportFormatter> {
    match format {
        ReportFormat::Human => Box::new(HumanFormatter::with_config(config)),
        ReportFormat::Markdown => Box::new(MarkdownFormatter::with_config(config)),
        ReportFormat::Json => Box::new(JsonFormatter::with_config(config)),
    }
}

fn render_error(e: fmt::Error) -> ProfileError {
    ProfileError::Internal(format!("Failed to render report: {e}"))
}

fn distribution_title(field: CategoricalField, column: &str) -> String {
    match field {
        CategoricalField::Label | CategoricalField::DetailedLabel => {
            format!("Distribution of column '{column}'")
        }
        CategoricalField::Proto => format!("Most frequent protocols ({column})"),
        CategoricalField::ConnState => format!("Most frequent connection states ({column})"),
    }
}

/// Label columns are always reported, even when absent from the file.
fn reported_when_absent(field: CategoricalField) -> bool {
    matches!(
        field,
        CategoricalField::Label | CategoricalField::DetailedLabel
    )
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn numeric_line(summary: &NumericSummary) -> String {
    match (summary.mean, summary.min, summary.max) {
        (Some(mean), Some(min), Some(max)) => format!(
            "mean={mean:.2}, min={}, max={}",
            format_value(min),
            format_value(max)
        ),
        _ => "no data".to_string(),
    }
}

/// Formats a snapshot as a plain-text report.
///
/// # Examples
///
/// ```rust
/// use conn_profile::formatters::{HumanFormatter, ReportFormatter};
///
/// let formatter = HumanFormatter::new();
/// assert_eq!(formatter.extension(), "txt");
/// ```
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn render(
        &self,
        out: &mut String,
        snapshot: &ProfileSnapshot,
        config: &FormatterConfig,
    ) -> fmt::Result {
        writeln!(out, "File analyzed: {}", snapshot.source())?;
        if snapshot.files().len() > 1 {
            writeln!(out, "Files merged: {}", snapshot.files().join(", "))?;
        }
        writeln!(
            out,
            "Rows: {} ({} batches)",
            snapshot.rows(),
            snapshot.batches()
        )?;
        if config.include_timestamps {
            writeln!(out, "Finalized at: {}", snapshot.finalized_at().to_rfc3339())?;
        }

        let counts = snapshot.column_counts();
        let width = counts.iter().map(|c| c.name.len()).max().unwrap_or(0);

        if config.include_schema {
            writeln!(out)?;
            writeln!(out, "Columns and data types:")?;
            for column in &counts {
                writeln!(out, "{:<width$}    {}", column.name, column.declared)?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Null values per column:")?;
        for column in &counts {
            writeln!(out, "{:<width$}    {}", column.name, column.nulls)?;
        }

        if config.include_malformed && counts.iter().any(|c| c.malformed > 0) {
            writeln!(out)?;
            writeln!(out, "Malformed values per column:")?;
            for column in counts.iter().filter(|c| c.malformed > 0) {
                writeln!(out, "{:<width$}    {}", column.name, column.malformed)?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Unique values per relevant column:")?;
        for column in snapshot.tracked_columns() {
            let name = snapshot.column_name(column).unwrap_or(column.name());
            let unique = snapshot.cardinality(column).unwrap_or(0);
            writeln!(out, "{name}: {unique} unique")?;
        }

        writeln!(out)?;
        writeln!(out, "Descriptive statistics (numeric):")?;
        for summary in snapshot.numeric_summaries() {
            let name = snapshot
                .column_name(summary.column)
                .unwrap_or(summary.column.name());
            writeln!(out, "{name}: {}", numeric_line(&summary))?;
        }

        for field in CategoricalField::ALL {
            let column = field.column();
            match snapshot.frequency_table(field) {
                Some(table) => {
                    let name = snapshot.column_name(column).unwrap_or(column.name());
                    writeln!(out)?;
                    writeln!(out, "{}:", distribution_title(field, name))?;
                    self.render_table(out, &table, config)?;
                }
                None if reported_when_absent(field) => {
                    writeln!(out)?;
                    writeln!(out, "Column '{}' not found.", column.name())?;
                }
                None => {}
            }
        }

        Ok(())
    }

    fn render_table(
        &self,
        out: &mut String,
        table: &[(String, u64)],
        config: &FormatterConfig,
    ) -> fmt::Result {
        let (shown, hidden) = config.visible(table);
        let value_width = shown.iter().map(|(v, _)| v.len()).max().unwrap_or(0);
        let count_width = shown
            .iter()
            .map(|(_, c)| c.to_string().len())
            .max()
            .unwrap_or(0);
        for (value, count) in shown {
            writeln!(out, "{value:<value_width$}    {count:>count_width$}")?;
        }
        if hidden > 0 {
            writeln!(out, "... and {hidden} more categories")?;
        }
        Ok(())
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, snapshot: &ProfileSnapshot) -> Result<String> {
        self.format_with_config(snapshot, &self.config)
    }

    fn format_with_config(
        &self,
        snapshot: &ProfileSnapshot,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        self.render(&mut output, snapshot, config)
            .map_err(render_error)?;
        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}

/// Formats a snapshot as Markdown.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::with_config(FormatterConfig::default())
    }
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the base heading level for the output.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 5);
        self
    }

    fn render(
        &self,
        out: &mut String,
        snapshot: &ProfileSnapshot,
        config: &FormatterConfig,
    ) -> fmt::Result {
        let h = "#".repeat(self.heading_level as usize);

        writeln!(out, "{h} Connection log profile: {}", snapshot.source())?;
        writeln!(out)?;
        writeln!(out, "**Rows:** {}  ", snapshot.rows())?;
        writeln!(out, "**Batches:** {}  ", snapshot.batches())?;
        if snapshot.files().len() > 1 {
            writeln!(out, "**Files:** {}  ", snapshot.files().join(", "))?;
        }
        if config.include_timestamps {
            writeln!(
                out,
                "**Finalized:** {}  ",
                snapshot.finalized_at().to_rfc3339()
            )?;
        }

        writeln!(out)?;
        writeln!(out, "{h}# Columns")?;
        writeln!(out)?;
        let mut header = String::from("| Column |");
        let mut rule = String::from("|--------|");
        if config.include_schema {
            header.push_str(" Type |");
            rule.push_str("------|");
        }
        header.push_str(" Nulls |");
        rule.push_str("-------|");
        if config.include_malformed {
            header.push_str(" Malformed |");
            rule.push_str("-----------|");
        }
        writeln!(out, "{header}")?;
        writeln!(out, "{rule}")?;
        for column in snapshot.column_counts() {
            write!(out, "| `{}` |", column.name)?;
            if config.include_schema {
                write!(out, " {} |", column.declared)?;
            }
            write!(out, " {} |", column.nulls)?;
            if config.include_malformed {
                write!(out, " {} |", column.malformed)?;
            }
            writeln!(out)?;
        }

        writeln!(out)?;
        writeln!(out, "{h}# Unique values")?;
        writeln!(out)?;
        writeln!(out, "| Column | Unique |")?;
        writeln!(out, "|--------|--------|")?;
        for column in snapshot.tracked_columns() {
            writeln!(
                out,
                "| `{}` | {} |",
                self.column_label(snapshot, column),
                snapshot.cardinality(column).unwrap_or(0)
            )?;
        }

        writeln!(out)?;
        writeln!(out, "{h}# Numeric statistics")?;
        writeln!(out)?;
        writeln!(out, "| Column | Count | Mean | Min | Max |")?;
        writeln!(out, "|--------|-------|------|-----|-----|")?;
        for summary in snapshot.numeric_summaries() {
            let label = self.column_label(snapshot, summary.column);
            match (summary.mean, summary.min, summary.max) {
                (Some(mean), Some(min), Some(max)) => writeln!(
                    out,
                    "| `{label}` | {} | {mean:.2} | {} | {} |",
                    summary.count,
                    format_value(min),
                    format_value(max)
                )?,
                _ => writeln!(out, "| `{label}` | 0 | no data | - | - |")?,
            }
        }

        for field in CategoricalField::ALL {
            let column = field.column();
            match snapshot.frequency_table(field) {
                Some(table) => {
                    let name = self.column_label(snapshot, column);
                    writeln!(out)?;
                    writeln!(out, "{h}# {}", distribution_title(field, name))?;
                    writeln!(out)?;
                    writeln!(out, "| Value | Count |")?;
                    writeln!(out, "|-------|-------|")?;
                    let (shown, hidden) = config.visible(&table);
                    for (value, count) in shown {
                        writeln!(out, "| {} | {count} |", value.replace('|', "\\|"))?;
                    }
                    if hidden > 0 {
                        writeln!(out)?;
                        writeln!(out, "*... and {hidden} more categories*")?;
                    }
                }
                None if reported_when_absent(field) => {
                    writeln!(out)?;
                    writeln!(out, "*Column `{}` not found.*", column.name())?;
                }
                None => {}
            }
        }

        Ok(())
    }

    fn column_label<'a>(&self, snapshot: &'a ProfileSnapshot, column: ConnColumn) -> &'a str {
        snapshot.column_name(column).unwrap_or(column.name())
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, snapshot: &ProfileSnapshot) -> Result<String> {
        self.format_with_config(snapshot, &self.config)
    }

    fn format_with_config(
        &self,
        snapshot: &ProfileSnapshot,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        self.render(&mut output, snapshot, config)
            .map_err(render_error)?;
        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

/// Formats a snapshot as structured JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::with_config(FormatterConfig::default())
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, snapshot: &ProfileSnapshot) -> Result<String> {
        self.format_with_config(snapshot, &self.config)
    }

    fn format_with_config(
        &self,
        snapshot: &ProfileSnapshot,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut report = snapshot.report();
        if let Some(max) = config.max_categories {
            for (_, rows) in &mut report.distributions {
                rows.truncate(max);
            }
        }

        let mut value = serde_json::to_value(&report)?;
        if let Some(object) = value.as_object_mut() {
            if !config.include_timestamps {
                object.remove("finalized_at");
            }
            if let Some(columns) = object.get_mut("columns").and_then(|c| c.as_array_mut()) {
                for column in columns.iter_mut().filter_map(|c| c.as_object_mut()) {
                    if !config.include_schema {
                        column.remove("declared");
                    }
                    if !config.include_malformed {
                        column.remove("malformed");
                    }
                }
            }
        }

        let rendered = if self.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(rendered)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
