//! Accumulator state: the bounded-memory summary of the rows seen so far.
//!
//! Every field combines associatively and commutatively, so partial states
//! computed over disjoint slices of a file (or over different files) can be
//! merged into the state of the whole.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::schema::{CategoricalField, ConnColumn, ConnSchema};

/// Running sum, count, minimum and maximum of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericAccumulator {
    /// Sum of valid values
    pub sum: f64,
    /// Number of valid values
    pub count: u64,
    /// Smallest value, `+inf` while empty
    pub min: f64,
    /// Largest value, `-inf` while empty
    pub max: f64,
}

impl Default for NumericAccumulator {
    fn default() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl NumericAccumulator {
    /// Folds one value in.
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Combines another accumulator into this one.
    pub fn merge(&mut self, other: &NumericAccumulator) {
        if other.count == 0 {
            return;
        }
        self.sum += other.sum;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Whether no value has been folded in.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean of the values, `None` when there are none.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Complete accumulator state for one file (or a merge of files).
///
/// Null and malformed counts are indexed by schema position; the other
/// tables are keyed by known column and only hold entries for columns
/// present in the schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatorState {
    pub(crate) rows: u64,
    pub(crate) null_counts: Vec<u64>,
    pub(crate) malformed_counts: Vec<u64>,
    pub(crate) distinct_values: BTreeMap<ConnColumn, HashSet<String>>,
    pub(crate) numeric_stats: BTreeMap<ConnColumn, NumericAccumulator>,
    pub(crate) categorical_counts: BTreeMap<CategoricalField, HashMap<String, u64>>,
}

impl AccumulatorState {
    /// Empty state for a schema and the tracked columns.
    pub fn for_schema(
        schema: &ConnSchema,
        unique_columns: &[ConnColumn],
        numeric_columns: &[ConnColumn],
    ) -> Self {
        let distinct_values = unique_columns
            .iter()
            .filter(|c| schema.contains(**c))
            .map(|c| (*c, HashSet::new()))
            .collect();
        let numeric_stats = numeric_columns
            .iter()
            .filter(|c| schema.contains(**c))
            .map(|c| (*c, NumericAccumulator::default()))
            .collect();
        let categorical_counts = CategoricalField::ALL
            .iter()
            .filter(|f| schema.contains(f.column()))
            .map(|f| (*f, HashMap::new()))
            .collect();

        Self {
            rows: 0,
            null_counts: vec![0; schema.len()],
            malformed_counts: vec![0; schema.len()],
            distinct_values,
            numeric_stats,
            categorical_counts,
        }
    }

    /// Rows folded into this state.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Combines a state built over the same schema into this one.
    pub fn absorb(&mut self, other: AccumulatorState) {
        self.rows += other.rows;

        if self.null_counts.len() < other.null_counts.len() {
            self.null_counts.resize(other.null_counts.len(), 0);
            self.malformed_counts.resize(other.null_counts.len(), 0);
        }
        for (idx, count) in other.null_counts.iter().enumerate() {
            self.null_counts[idx] += count;
        }
        for (idx, count) in other.malformed_counts.iter().enumerate() {
            self.malformed_counts[idx] += count;
        }

        for (column, values) in other.distinct_values {
            let set = self.distinct_values.entry(column).or_default();
            if set.is_empty() {
                *set = values;
            } else {
                set.extend(values);
            }
        }

        for (column, stats) in &other.numeric_stats {
            self.numeric_stats.entry(*column).or_default().merge(stats);
        }

        for (field, counts) in other.categorical_counts {
            let table = self.categorical_counts.entry(field).or_default();
            for (value, count) in counts {
                *table.entry(value).or_insert(0) += count;
            }
        }
    }

    /// Moves positional counts from one schema layout to another, matching
    /// columns by header name. Columns missing from `to` are dropped.
    pub fn remap(mut self, from: &ConnSchema, to: &ConnSchema) -> AccumulatorState {
        let mut null_counts = vec![0; to.len()];
        let mut malformed_counts = vec![0; to.len()];
        for (idx, spec) in from.columns().iter().enumerate() {
            if let Some(target) = to.position_of_name(&spec.name) {
                null_counts[target] += self.null_counts.get(idx).copied().unwrap_or(0);
                malformed_counts[target] += self.malformed_counts.get(idx).copied().unwrap_or(0);
            }
        }
        self.null_counts = null_counts;
        self.malformed_counts = malformed_counts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accumulator_initial_state() {
        let acc = NumericAccumulator::default();
        assert_eq!(acc.sum, 0.0);
        assert_eq!(acc.count, 0);
        assert_eq!(acc.min, f64::INFINITY);
        assert_eq!(acc.max, f64::NEG_INFINITY);
        assert!(acc.is_empty());
        assert_eq!(acc.mean(), None);
    }

    #[test]
    fn test_numeric_accumulator_merge() {
        let mut left = NumericAccumulator::default();
        for v in [4.0, 1.0] {
            left.add(v);
        }
        let mut right = NumericAccumulator::default();
        for v in [9.0, 2.0] {
            right.add(v);
        }

        left.merge(&right);
        assert_eq!(left.sum, 16.0);
        assert_eq!(left.count, 4);
        assert_eq!(left.min, 1.0);
        assert_eq!(left.max, 9.0);
        assert_eq!(left.mean(), Some(4.0));

        let before = left;
        left.merge(&NumericAccumulator::default());
        assert_eq!(left, before);
    }

    #[test]
    fn test_for_schema_only_tracks_present_columns() {
        let schema = ConnSchema::from_headers(["proto", "orig_pkts", "id.orig_h"]).unwrap();
        let state = AccumulatorState::for_schema(
            &schema,
            &[ConnColumn::OrigHost, ConnColumn::RespHost],
            &[ConnColumn::OrigPkts, ConnColumn::Duration],
        );

        assert_eq!(state.null_counts, vec![0, 0, 0]);
        assert!(state.distinct_values.contains_key(&ConnColumn::OrigHost));
        assert!(!state.distinct_values.contains_key(&ConnColumn::RespHost));
        assert!(state.numeric_stats.contains_key(&ConnColumn::OrigPkts));
        assert!(!state.numeric_stats.contains_key(&ConnColumn::Duration));
        assert_eq!(
            state.categorical_counts.keys().copied().collect::<Vec<_>>(),
            vec![CategoricalField::Proto]
        );
    }

    #[test]
    fn test_remap_by_name() {
        let from = ConnSchema::from_headers(["proto", "label"]).unwrap();
        let to = ConnSchema::from_headers(["ts", "label", "proto"]).unwrap();
        let mut state = AccumulatorState::for_schema(&from, &[], &[]);
        state.null_counts = vec![3, 5];

        let remapped = state.remap(&from, &to);
        assert_eq!(remapped.null_counts, vec![0, 5, 3]);
        assert_eq!(remapped.malformed_counts, vec![0, 0, 0]);
    }
}
