//! Immutable profile of one file, or of several merged files.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accumulator::AccumulatorState;
use crate::aggregator::LifecycleState;
use crate::error::{ProfileError, Result};
use crate::schema::{CategoricalField, ConnColumn, ConnSchema, DeclaredType};

/// Source name given to the summary of several merged files.
pub const MERGED_SOURCE: &str = "merged_dataset.csv";

/// Numeric summary of one column.
///
/// `mean`, `min` and `max` are `None` when the column held no valid value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub column: ConnColumn,
    pub count: u64,
    pub sum: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    /// Whether any valid value was seen.
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

/// One row of a frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: u64,
}

/// Per-column counts in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCounts {
    pub name: String,
    pub declared: DeclaredType,
    pub nulls: u64,
    pub malformed: u64,
}

/// Serializable view of a snapshot, used by the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    pub source: String,
    pub files: Vec<String>,
    pub rows: u64,
    pub batches: u64,
    pub finalized_at: DateTime<Utc>,
    pub columns: Vec<ColumnCounts>,
    pub cardinality: Vec<(ConnColumn, usize)>,
    pub numeric: Vec<NumericSummary>,
    pub distributions: Vec<(CategoricalField, Vec<CategoryCount>)>,
}

/// Finalized accumulator state together with the schema it was built over.
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    source: String,
    schema: Arc<ConnSchema>,
    state: AccumulatorState,
    batches: u64,
    finalized_at: DateTime<Utc>,
    files: Vec<String>,
}

impl ProfileSnapshot {
    pub(crate) fn new(
        source: String,
        schema: Arc<ConnSchema>,
        state: AccumulatorState,
        batches: u64,
    ) -> Self {
        Self {
            files: vec![source.clone()],
            source,
            schema,
            state,
            batches,
            finalized_at: Utc::now(),
        }
    }

    /// Identifier of the profiled source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Sources folded into this snapshot; one entry unless merged.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn schema(&self) -> &Arc<ConnSchema> {
        &self.schema
    }

    /// Finalized accumulator state.
    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    /// Always [`LifecycleState::Finalized`].
    pub fn lifecycle(&self) -> LifecycleState {
        LifecycleState::Finalized
    }

    pub fn rows(&self) -> u64 {
        self.state.rows
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn finalized_at(&self) -> DateTime<Utc> {
        self.finalized_at
    }

    /// Null counts in schema order.
    pub fn null_counts(&self) -> Vec<(String, u64)> {
        self.schema
            .columns()
            .iter()
            .zip(&self.state.null_counts)
            .map(|(spec, count)| (spec.name.clone(), *count))
            .collect()
    }

    /// Null count of a column by header name.
    pub fn null_count(&self, name: &str) -> Option<u64> {
        let idx = self.schema.position_of_name(name)?;
        self.state.null_counts.get(idx).copied()
    }

    /// Malformed count of a column by header name.
    pub fn malformed_count(&self, name: &str) -> Option<u64> {
        let idx = self.schema.position_of_name(name)?;
        self.state.malformed_counts.get(idx).copied()
    }

    /// Columns with per-column null and malformed counts.
    pub fn column_counts(&self) -> Vec<ColumnCounts> {
        self.schema
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, spec)| ColumnCounts {
                name: spec.name.clone(),
                declared: spec.declared,
                nulls: self.state.null_counts.get(idx).copied().unwrap_or(0),
                malformed: self.state.malformed_counts.get(idx).copied().unwrap_or(0),
            })
            .collect()
    }

    /// Columns whose distinct values were tracked, in canonical order.
    pub fn tracked_columns(&self) -> Vec<ConnColumn> {
        self.state.distinct_values.keys().copied().collect()
    }

    /// Number of distinct non-null values of a tracked column.
    pub fn cardinality(&self, column: ConnColumn) -> Option<usize> {
        self.state.distinct_values.get(&column).map(HashSet::len)
    }

    /// Distinct non-null raw values of a tracked column.
    pub fn distinct_values(&self, column: ConnColumn) -> Option<&HashSet<String>> {
        self.state.distinct_values.get(&column)
    }

    /// Numeric summary of a column, if it was summarized.
    pub fn numeric_summary(&self, column: ConnColumn) -> Option<NumericSummary> {
        let stats = self.state.numeric_stats.get(&column)?;
        let has_data = !stats.is_empty();
        Some(NumericSummary {
            column,
            count: stats.count,
            sum: stats.sum,
            mean: stats.mean(),
            min: has_data.then_some(stats.min),
            max: has_data.then_some(stats.max),
        })
    }

    /// Summaries of every summarized column, in canonical order.
    pub fn numeric_summaries(&self) -> Vec<NumericSummary> {
        self.state
            .numeric_stats
            .keys()
            .filter_map(|column| self.numeric_summary(*column))
            .collect()
    }

    /// Frequency table sorted by descending count, ties by ascending value.
    ///
    /// `None` when the backing column is absent from the schema.
    pub fn frequency_table(&self, field: CategoricalField) -> Option<Vec<(String, u64)>> {
        let counts = self.state.categorical_counts.get(&field)?;
        let mut table: Vec<(String, u64)> = counts
            .iter()
            .map(|(value, count)| (value.clone(), *count))
            .collect();
        table.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Some(table)
    }

    /// Header name of a known column, if present.
    pub fn column_name(&self, column: ConnColumn) -> Option<&str> {
        let idx = self.schema.position(column)?;
        self.schema.spec(idx).map(|spec| spec.name.as_str())
    }

    /// Serializable view of the whole snapshot.
    pub fn report(&self) -> ProfileReport {
        ProfileReport {
            source: self.source.clone(),
            files: self.files.clone(),
            rows: self.rows(),
            batches: self.batches,
            finalized_at: self.finalized_at,
            columns: self.column_counts(),
            cardinality: self
                .tracked_columns()
                .into_iter()
                .filter_map(|c| self.cardinality(c).map(|n| (c, n)))
                .collect(),
            numeric: self.numeric_summaries(),
            distributions: CategoricalField::ALL
                .iter()
                .filter_map(|field| {
                    let table = self.frequency_table(*field)?;
                    let rows = table
                        .into_iter()
                        .map(|(value, count)| CategoryCount { value, count })
                        .collect();
                    Some((*field, rows))
                })
                .collect(),
        }
    }

    /// Combines the snapshots of several files.
    ///
    /// Columns are aligned by header name; the result's schema is the union
    /// of the inputs' schemas in first-seen order.
    pub fn merge(snapshots: &[ProfileSnapshot]) -> Result<ProfileSnapshot> {
        let Some(first) = snapshots.first() else {
            return Err(ProfileError::Internal(
                "cannot merge an empty list of snapshots".to_string(),
            ));
        };

        let schema = snapshots
            .iter()
            .skip(1)
            .fold((*first.schema).clone(), |acc, s| acc.union(&s.schema));

        let mut state = AccumulatorState {
            null_counts: vec![0; schema.len()],
            malformed_counts: vec![0; schema.len()],
            ..AccumulatorState::default()
        };
        let mut batches = 0;
        let mut files = Vec::new();

        for snapshot in snapshots {
            state.absorb(snapshot.state.clone().remap(&snapshot.schema, &schema));
            batches += snapshot.batches;
            files.extend(snapshot.files.iter().cloned());
        }

        Ok(ProfileSnapshot {
            source: MERGED_SOURCE.to_string(),
            schema: Arc::new(schema),
            state,
            batches,
            finalized_at: Utc::now(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ProfileAggregator;
    use crate::config::ProfilerConfig;
    use crate::test_helpers::{coercer_for, typed_batches};

    fn snapshot(source: &str, headers: &[&str], rows: &[&[&str]]) -> ProfileSnapshot {
        let (schema, coercer) = coercer_for(headers);
        let mut agg = ProfileAggregator::new(schema, &ProfilerConfig::default());
        for batch in typed_batches(&coercer, headers, rows, 2) {
            agg.observe_batch(&batch);
        }
        agg.finalize(source)
    }

    #[test]
    fn test_frequency_table_ties_by_value() {
        let snap = snapshot(
            "a.csv",
            &["conn_state"],
            &[&["SF"], &["S0"], &["REJ"], &["S0"], &["SF"], &["OTH"]],
        );
        assert_eq!(
            snap.frequency_table(CategoricalField::ConnState).unwrap(),
            vec![
                ("S0".to_string(), 2),
                ("SF".to_string(), 2),
                ("OTH".to_string(), 1),
                ("REJ".to_string(), 1),
            ]
        );
        assert!(snap.frequency_table(CategoricalField::Label).is_none());
    }

    #[test]
    fn test_numeric_summary_no_data() {
        let snap = snapshot("a.csv", &["resp_pkts"], &[&["-"], &["-"]]);
        let summary = snap.numeric_summary(ConnColumn::RespPkts).unwrap();
        assert!(!summary.has_data());
        assert_eq!(summary.mean, None);
        assert_eq!(summary.min, None);
        assert_eq!(snap.null_count("resp_pkts"), Some(2));
        assert!(snap.numeric_summary(ConnColumn::Duration).is_none());
    }

    #[test]
    fn test_null_counts_in_schema_order() {
        let snap = snapshot(
            "a.csv",
            &["proto", "extra", "duration"],
            &[&["tcp", "-", "x"], &["-", "", "1.0"]],
        );
        assert_eq!(
            snap.null_counts(),
            vec![
                ("proto".to_string(), 1),
                ("extra".to_string(), 2),
                ("duration".to_string(), 1),
            ]
        );
        assert_eq!(snap.malformed_count("duration"), Some(1));
        assert_eq!(snap.malformed_count("missing"), None);
    }

    #[test]
    fn test_merge_aligns_columns_by_name() {
        let left = snapshot(
            "a.csv",
            &["proto", "id.orig_h", "orig_pkts"],
            &[&["tcp", "10.0.0.1", "1"], &["udp", "-", "2"]],
        );
        let right = snapshot(
            "b.csv",
            &["id.orig_h", "label", "proto"],
            &[&["10.0.0.1", "Benign", "tcp"], &["10.0.0.9", "-", "tcp"]],
        );

        let merged = ProfileSnapshot::merge(&[left, right]).unwrap();
        assert_eq!(merged.source(), MERGED_SOURCE);
        assert_eq!(merged.files(), &["a.csv".to_string(), "b.csv".to_string()]);
        assert_eq!(merged.rows(), 4);
        assert_eq!(
            merged.null_counts(),
            vec![
                ("proto".to_string(), 0),
                ("id.orig_h".to_string(), 1),
                ("orig_pkts".to_string(), 0),
                ("label".to_string(), 1),
            ]
        );
        assert_eq!(merged.cardinality(ConnColumn::OrigHost), Some(2));
        assert_eq!(
            merged.frequency_table(CategoricalField::Proto).unwrap(),
            vec![("tcp".to_string(), 3), ("udp".to_string(), 1)]
        );
        assert_eq!(merged.numeric_summary(ConnColumn::OrigPkts).unwrap().sum, 3.0);
    }

    #[test]
    fn test_merge_of_nothing_fails() {
        assert!(ProfileSnapshot::merge(&[]).is_err());
    }

    #[test]
    fn test_report_serializes() {
        let snap = snapshot("a.csv", &["proto", "duration"], &[&["tcp", "0.5"]]);
        let report = snap.report();
        assert_eq!(report.rows, 1);
        assert_eq!(report.distributions.len(), 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["source"], "a.csv");
        assert_eq!(json["numeric"][0]["column"], "duration");
    }
}
