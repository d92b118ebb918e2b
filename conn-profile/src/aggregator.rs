//! Streaming aggregation over typed batches.
//!
//! A [`ProfileAggregator`] owns the accumulator state of one file. Batches
//! are folded in strictly one after another; values are added one at a time
//! in row order, so the final state does not depend on where the batch
//! boundaries fall. Parallelism happens across files, each with its own
//! aggregator, and only finalized snapshots are combined.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use conn_profile::aggregator::ProfileAggregator;
//! use conn_profile::coercion::{NullTokens, TypeCoercer};
//! use conn_profile::config::ProfilerConfig;
//! use conn_profile::schema::{CategoricalField, ConnSchema};
//! use arrow::array::StringArray;
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//!
//! let schema = Arc::new(ConnSchema::from_headers(["proto"]).unwrap());
//! let coercer = TypeCoercer::new(Arc::clone(&schema), NullTokens::default());
//! let raw = RecordBatch::try_new(
//!     Arc::new(Schema::new(vec![Field::new("proto", DataType::Utf8, true)])),
//!     vec![Arc::new(StringArray::from(vec!["tcp", "udp", "tcp"]))],
//! )
//! .unwrap();
//!
//! let mut aggregator = ProfileAggregator::new(schema, &ProfilerConfig::default());
//! aggregator.observe_batch(&coercer.coerce(&raw));
//! let snapshot = aggregator.finalize("inline");
//!
//! assert_eq!(
//!     snapshot.frequency_table(CategoricalField::Proto).unwrap(),
//!     vec![("tcp".to_string(), 2), ("udp".to_string(), 1)]
//! );
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::accumulator::AccumulatorState;
use crate::coercion::{parse_numeric, TypedBatch, TypedValues};
use crate::config::ProfilerConfig;
use crate::error::{ProfileError, Result};
use crate::schema::{CategoricalField, ConnColumn, ConnSchema};
use crate::snapshot::ProfileSnapshot;

/// Per-file lifecycle. Variants are declared in the order a file moves
/// through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing read yet. The runner reports this before schema discovery;
    /// an aggregator never holds it.
    Idle,
    /// Schema fixed from the header sample
    SchemaDiscovered,
    /// At least one batch observed
    Accumulating,
    /// Snapshot produced; no further batches accepted
    Finalized,
}

/// Folds typed batches of one file into its accumulator state.
#[derive(Debug, Clone)]
pub struct ProfileAggregator {
    schema: Arc<ConnSchema>,
    state: AccumulatorState,
    batches: u64,
    unique_positions: Vec<(ConnColumn, usize)>,
    numeric_positions: Vec<(ConnColumn, usize)>,
    categorical_positions: Vec<(CategoricalField, usize)>,
}

impl ProfileAggregator {
    /// Creates an aggregator for a discovered schema.
    pub fn new(schema: Arc<ConnSchema>, config: &ProfilerConfig) -> Self {
        let state =
            AccumulatorState::for_schema(&schema, &config.unique_columns, &config.numeric_columns);

        let unique_positions = state
            .distinct_values
            .keys()
            .filter_map(|c| schema.position(*c).map(|idx| (*c, idx)))
            .collect();
        let numeric_positions = state
            .numeric_stats
            .keys()
            .filter_map(|c| schema.position(*c).map(|idx| (*c, idx)))
            .collect();
        let categorical_positions = state
            .categorical_counts
            .keys()
            .filter_map(|f| schema.position(f.column()).map(|idx| (*f, idx)))
            .collect();

        Self {
            schema,
            state,
            batches: 0,
            unique_positions,
            numeric_positions,
            categorical_positions,
        }
    }

    /// Schema this aggregator was built for.
    pub fn schema(&self) -> &Arc<ConnSchema> {
        &self.schema
    }

    /// Current accumulator state.
    pub fn accumulators(&self) -> &AccumulatorState {
        &self.state
    }

    /// Where this aggregator is in the per-file lifecycle.
    pub fn lifecycle(&self) -> LifecycleState {
        if self.batches == 0 {
            LifecycleState::SchemaDiscovered
        } else {
            LifecycleState::Accumulating
        }
    }

    /// Rows observed so far.
    pub fn rows_observed(&self) -> u64 {
        self.state.rows
    }

    /// Batches observed so far.
    pub fn batches_observed(&self) -> u64 {
        self.batches
    }

    /// Folds one batch into the accumulators.
    ///
    /// Columns missing from the batch are skipped; nothing in the batch
    /// contents can make this fail.
    pub fn observe_batch(&mut self, batch: &TypedBatch) {
        let same_layout =
            Arc::ptr_eq(batch.schema(), &self.schema) || **batch.schema() == *self.schema;
        let schema = Arc::clone(&self.schema);
        let column_at = |idx: usize| {
            if same_layout {
                batch.column(idx)
            } else {
                schema
                    .spec(idx)
                    .and_then(|spec| batch.schema().position_of_name(&spec.name))
                    .and_then(|p| batch.column(p))
            }
        };

        self.state.rows += batch.num_rows() as u64;
        self.batches += 1;

        for idx in 0..schema.len() {
            if let Some(column) = column_at(idx) {
                self.state.null_counts[idx] += column.null_count() as u64;
                self.state.malformed_counts[idx] += column.malformed_count();
            }
        }

        for (column_id, idx) in &self.unique_positions {
            let Some(column) = column_at(*idx) else {
                continue;
            };
            let set = self.state.distinct_values.entry(*column_id).or_default();
            for value in column.raw().iter().flatten() {
                if !set.contains(value) {
                    set.insert(value.to_string());
                }
            }
        }

        for (column_id, idx) in &self.numeric_positions {
            let Some(column) = column_at(*idx) else {
                continue;
            };
            let stats = self.state.numeric_stats.entry(*column_id).or_default();
            match column.values() {
                TypedValues::Float(values) => {
                    for value in values.iter().flatten().filter(|v| !v.is_nan()) {
                        stats.add(value);
                    }
                }
                TypedValues::Text => {
                    // Unparseable text is null for every numeric summary
                    for cell in column.raw().iter().flatten() {
                        match parse_numeric(cell) {
                            Some(value) => stats.add(value),
                            None => {
                                self.state.null_counts[*idx] += 1;
                                self.state.malformed_counts[*idx] += 1;
                            }
                        }
                    }
                }
                TypedValues::Boolean(_) => {
                    for value in column.raw().iter().flatten().filter_map(parse_numeric) {
                        stats.add(value);
                    }
                }
            }
        }

        for (field, idx) in &self.categorical_positions {
            let Some(column) = column_at(*idx) else {
                continue;
            };
            let counts = self.state.categorical_counts.entry(*field).or_default();
            for value in column.raw().iter().flatten() {
                match counts.get_mut(value) {
                    Some(count) => *count += 1,
                    None => {
                        counts.insert(value.to_string(), 1);
                    }
                }
            }
        }

        trace!(
            rows = batch.num_rows(),
            total_rows = self.state.rows,
            batches = self.batches,
            "Observed batch"
        );
    }

    /// Fold form of [`observe_batch`](Self::observe_batch).
    pub fn combine(mut self, batch: &TypedBatch) -> Self {
        self.observe_batch(batch);
        self
    }

    /// Merges a partial aggregator over the same schema into this one.
    pub fn merge(&mut self, other: ProfileAggregator) -> Result<()> {
        if *self.schema != *other.schema {
            return Err(ProfileError::schema_mismatch(
                "cannot merge aggregators built over different schemas",
            ));
        }
        self.batches += other.batches;
        self.state.absorb(other.state);
        Ok(())
    }

    /// Ends accumulation and produces the immutable snapshot.
    pub fn finalize(self, source: impl Into<String>) -> ProfileSnapshot {
        ProfileSnapshot::new(source.into(), self.schema, self.state, self.batches)
    }
}
