//! Fixed column schema for labeled connection logs.
//!
//! Connection logs follow the Zeek `conn.log` layout extended with the
//! `label` and `detailed-label` columns. Every column the profiler knows
//! about is a variant of [`ConnColumn`] with a declared type, so
//! accumulators are keyed by a closed identifier rather than by free-form
//! strings. Header columns outside that set are kept as free-text columns
//! and only take part in null accounting.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ProfileError, Result};

/// Declared type of a column, decided once at schema time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    /// Floating point number
    Float,
    /// Unsigned integer counter or port
    UnsignedInt,
    /// `T`/`F` flag
    Boolean,
    /// Low-cardinality category
    Categorical,
    /// Free-form text
    Text,
}

impl DeclaredType {
    /// Whether the coercion layer converts this type away from raw strings.
    pub fn is_coerced(&self) -> bool {
        matches!(
            self,
            DeclaredType::Float | DeclaredType::UnsignedInt | DeclaredType::Boolean
        )
    }

    /// Short lowercase name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclaredType::Float => "float",
            DeclaredType::UnsignedInt => "uint",
            DeclaredType::Boolean => "bool",
            DeclaredType::Categorical => "category",
            DeclaredType::Text => "text",
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known connection-log columns.
///
/// Variant order is the canonical Zeek column order and is used whenever
/// the profiler lists columns in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConnColumn {
    #[serde(rename = "ts")]
    Ts,
    #[serde(rename = "uid")]
    Uid,
    #[serde(rename = "id.orig_h")]
    OrigHost,
    #[serde(rename = "id.orig_p")]
    OrigPort,
    #[serde(rename = "id.resp_h")]
    RespHost,
    #[serde(rename = "id.resp_p")]
    RespPort,
    #[serde(rename = "proto")]
    Proto,
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "duration")]
    Duration,
    #[serde(rename = "orig_bytes")]
    OrigBytes,
    #[serde(rename = "resp_bytes")]
    RespBytes,
    #[serde(rename = "conn_state")]
    ConnState,
    #[serde(rename = "local_orig")]
    LocalOrig,
    #[serde(rename = "local_resp")]
    LocalResp,
    #[serde(rename = "missed_bytes")]
    MissedBytes,
    #[serde(rename = "history")]
    History,
    #[serde(rename = "orig_pkts")]
    OrigPkts,
    #[serde(rename = "orig_ip_bytes")]
    OrigIpBytes,
    #[serde(rename = "resp_pkts")]
    RespPkts,
    #[serde(rename = "resp_ip_bytes")]
    RespIpBytes,
    #[serde(rename = "tunnel_parents")]
    TunnelParents,
    #[serde(rename = "label")]
    Label,
    #[serde(rename = "detailed-label")]
    DetailedLabel,
}

static COLUMNS_BY_NAME: Lazy<HashMap<&'static str, ConnColumn>> = Lazy::new(|| {
    ConnColumn::ALL
        .iter()
        .map(|column| (column.name(), *column))
        .collect()
});

impl ConnColumn {
    /// Every known column in canonical order.
    pub const ALL: [ConnColumn; 23] = [
        ConnColumn::Ts,
        ConnColumn::Uid,
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
        ConnColumn::LocalOrig,
        ConnColumn::LocalResp,
        ConnColumn::MissedBytes,
        ConnColumn::History,
        ConnColumn::OrigPkts,
        ConnColumn::OrigIpBytes,
        ConnColumn::RespPkts,
        ConnColumn::RespIpBytes,
        ConnColumn::TunnelParents,
        ConnColumn::Label,
        ConnColumn::DetailedLabel,
    ];

    /// Canonical header name.
    pub fn name(&self) -> &'static str {
        match self {
            ConnColumn::Ts => "ts",
            ConnColumn::Uid => "uid",
            ConnColumn::OrigHost => "id.orig_h",
            ConnColumn::OrigPort => "id.orig_p",
            ConnColumn::RespHost => "id.resp_h",
            ConnColumn::RespPort => "id.resp_p",
            ConnColumn::Proto => "proto",
            ConnColumn::Service => "service",
            ConnColumn::Duration => "duration",
            ConnColumn::OrigBytes => "orig_bytes",
            ConnColumn::RespBytes => "resp_bytes",
            ConnColumn::ConnState => "conn_state",
            ConnColumn::LocalOrig => "local_orig",
            ConnColumn::LocalResp => "local_resp",
            ConnColumn::MissedBytes => "missed_bytes",
            ConnColumn::History => "history",
            ConnColumn::OrigPkts => "orig_pkts",
            ConnColumn::OrigIpBytes => "orig_ip_bytes",
            ConnColumn::RespPkts => "resp_pkts",
            ConnColumn::RespIpBytes => "resp_ip_bytes",
            ConnColumn::TunnelParents => "tunnel_parents",
            ConnColumn::Label => "label",
            ConnColumn::DetailedLabel => "detailed-label",
        }
    }

    /// Declared type of the column.
    pub fn declared_type(&self) -> DeclaredType {
        match self {
            ConnColumn::Ts | ConnColumn::Duration | ConnColumn::OrigBytes | ConnColumn::RespBytes => {
                DeclaredType::Float
            }
            ConnColumn::OrigPort
            | ConnColumn::RespPort
            | ConnColumn::MissedBytes
            | ConnColumn::OrigPkts
            | ConnColumn::OrigIpBytes
            | ConnColumn::RespPkts
            | ConnColumn::RespIpBytes => DeclaredType::UnsignedInt,
            ConnColumn::LocalOrig | ConnColumn::LocalResp => DeclaredType::Boolean,
            ConnColumn::Proto
            | ConnColumn::Service
            | ConnColumn::ConnState
            | ConnColumn::Label
            | ConnColumn::DetailedLabel => DeclaredType::Categorical,
            ConnColumn::Uid
            | ConnColumn::OrigHost
            | ConnColumn::RespHost
            | ConnColumn::History
            | ConnColumn::TunnelParents => DeclaredType::Text,
        }
    }

    /// Resolves a header name to a known column.
    ///
    /// Names match exactly, except the label columns which are located
    /// case-insensitively and accept `detailed_label` as well.
    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.trim();
        if let Some(column) = COLUMNS_BY_NAME.get(header) {
            return Some(*column);
        }
        let lowered = header.to_ascii_lowercase();
        match lowered.as_str() {
            "label" => Some(ConnColumn::Label),
            "detailed-label" | "detailed_label" => Some(ConnColumn::DetailedLabel),
            _ => None,
        }
    }
}

impl fmt::Display for ConnColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConnColumn {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        ConnColumn::from_header(s)
            .ok_or_else(|| ProfileError::configuration(format!("Unknown column '{s}'")))
    }
}

/// The four categorical columns with a frequency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    Label,
    DetailedLabel,
    Proto,
    ConnState,
}

impl CategoricalField {
    /// All categorical fields in report order.
    pub const ALL: [CategoricalField; 4] = [
        CategoricalField::Label,
        CategoricalField::DetailedLabel,
        CategoricalField::Proto,
        CategoricalField::ConnState,
    ];

    /// The column backing this table.
    pub fn column(&self) -> ConnColumn {
        match self {
            CategoricalField::Label => ConnColumn::Label,
            CategoricalField::DetailedLabel => ConnColumn::DetailedLabel,
            CategoricalField::Proto => ConnColumn::Proto,
            CategoricalField::ConnState => ConnColumn::ConnState,
        }
    }
}

/// One column of a discovered schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Header name exactly as found in the file
    pub name: String,
    /// Known column identity, `None` for unrecognized headers
    pub column: Option<ConnColumn>,
    /// Declared type
    pub declared: DeclaredType,
}

/// Ordered column schema of one file.
///
/// Built once per file from its header and shared read-only by the reader,
/// the coercion layer, and the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ColumnSpec>", into = "Vec<ColumnSpec>")]
pub struct ConnSchema {
    columns: Vec<ColumnSpec>,
    positions: HashMap<ConnColumn, usize>,
}

impl From<Vec<ColumnSpec>> for ConnSchema {
    fn from(columns: Vec<ColumnSpec>) -> Self {
        let mut positions = HashMap::new();
        for (idx, spec) in columns.iter().enumerate() {
            if let Some(column) = spec.column {
                positions.entry(column).or_insert(idx);
            }
        }
        Self { columns, positions }
    }
}

impl From<ConnSchema> for Vec<ColumnSpec> {
    fn from(schema: ConnSchema) -> Self {
        schema.columns
    }
}

impl ConnSchema {
    /// Builds a schema from header names.
    ///
    /// Returns [`ProfileError::EmptyFile`] when there are no headers.
    pub fn from_headers<I, S>(headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut columns = Vec::new();
        let mut seen = HashMap::new();

        for header in headers {
            let name = header.as_ref().to_string();
            let column = match ConnColumn::from_header(&name) {
                Some(column) if !seen.contains_key(&column) => {
                    seen.insert(column, columns.len());
                    Some(column)
                }
                Some(column) => {
                    warn!(header = %name, column = %column, "Duplicate column header, treating as free text");
                    None
                }
                None => {
                    warn!(header = %name, "Unrecognized column header, tracking nulls only");
                    None
                }
            };
            let declared = column
                .map(|c| c.declared_type())
                .unwrap_or(DeclaredType::Text);
            columns.push(ColumnSpec {
                name,
                column,
                declared,
            });
        }

        if columns.is_empty() {
            return Err(ProfileError::EmptyFile);
        }

        Ok(Self::from(columns))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in file order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Column at a position.
    pub fn spec(&self, idx: usize) -> Option<&ColumnSpec> {
        self.columns.get(idx)
    }

    /// Position of a known column, if present in this file.
    pub fn position(&self, column: ConnColumn) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    /// Whether a known column is present.
    pub fn contains(&self, column: ConnColumn) -> bool {
        self.positions.contains_key(&column)
    }

    /// Position of the first column with the given header name.
    pub fn position_of_name(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|spec| spec.name == name)
    }

    /// Header names not recognized as known columns.
    pub fn unknown_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|spec| spec.column.is_none())
            .map(|spec| spec.name.as_str())
    }

    /// Arrow schema used to read the file: every column as nullable `Utf8`.
    pub fn raw_arrow_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|spec| Field::new(&spec.name, DataType::Utf8, true))
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// Union of two schemas by header name, keeping this schema's order and
    /// appending columns only the other one has.
    pub fn union(&self, other: &ConnSchema) -> ConnSchema {
        let mut columns = self.columns.clone();
        for spec in &other.columns {
            if !columns.iter().any(|existing| existing.name == spec.name) {
                let column = spec.column.filter(|c| !columns.iter().any(|e| e.column == Some(*c)));
                columns.push(ColumnSpec {
                    name: spec.name.clone(),
                    column,
                    declared: column.map(|c| c.declared_type()).unwrap_or(DeclaredType::Text),
                });
            }
        }
        ConnSchema::from(columns)
    }
}
