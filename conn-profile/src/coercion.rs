//! Type coercion of raw batches.
//!
//! The reader hands over batches where every column is `Utf8`. Coercion
//! turns boolean columns into Arrow booleans, float and unsigned counter
//! columns into `Float64`, and maps the
//! null sentinels to real nulls in every column. It never fails on cell
//! contents: a value that cannot be coerced becomes null and is counted as
//! malformed. A column whose Arrow type cannot be read as text is treated
//! as absent from the batch.
//!
//! Every typed column keeps its raw strings alongside the typed values, so
//! the aggregator can track distinct values by their original spelling.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::error::Result;
use crate::schema::{ConnSchema, DeclaredType};

/// Parses a boolean flag. Only `T`, `True`, `F` and `False` are accepted.
pub fn parse_boolean(token: &str) -> Option<bool> {
    match token.trim() {
        "T" | "True" => Some(true),
        "F" | "False" => Some(false),
        _ => None,
    }
}

/// Parses a number permissively. NaN is not a number for statistics.
pub fn parse_numeric(token: &str) -> Option<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| !value.is_nan())
}

/// Set of tokens that stand for "no data".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullTokens {
    tokens: Vec<String>,
}

impl NullTokens {
    /// Creates a token set. Tokens are compared after trimming whitespace.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .collect(),
        }
    }

    /// Whether a raw value is a null sentinel.
    pub fn is_null(&self, value: &str) -> bool {
        let value = value.trim();
        self.tokens.iter().any(|token| token == value)
    }
}

impl Default for NullTokens {
    fn default() -> Self {
        Self::new(["", "-"])
    }
}

/// Typed values of a coerced column.
#[derive(Debug, Clone)]
pub enum TypedValues {
    Boolean(BooleanArray),
    Float(Float64Array),
    /// The raw strings are the values
    Text,
}

/// One coerced column.
///
/// `raw` is null exactly where the typed value is null.
#[derive(Debug, Clone)]
pub struct TypedColumn {
    raw: StringArray,
    values: TypedValues,
    malformed: u64,
}

impl TypedColumn {
    /// Raw strings of the non-null cells.
    pub fn raw(&self) -> &StringArray {
        &self.raw
    }

    /// Typed values.
    pub fn values(&self) -> &TypedValues {
        &self.values
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Null cells after coercion, sentinels and malformed values included.
    pub fn null_count(&self) -> usize {
        self.raw.null_count()
    }

    /// Present, non-sentinel cells that failed coercion.
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    /// The typed values as an Arrow array.
    pub fn to_array(&self) -> ArrayRef {
        match &self.values {
            TypedValues::Boolean(values) => Arc::new(values.clone()),
            TypedValues::Float(values) => Arc::new(values.clone()),
            TypedValues::Text => Arc::new(self.raw.clone()),
        }
    }

    fn data_type(&self) -> DataType {
        match &self.values {
            TypedValues::Boolean(_) => DataType::Boolean,
            TypedValues::Float(_) => DataType::Float64,
            TypedValues::Text => DataType::Utf8,
        }
    }
}

/// A batch after coercion, aligned with the file schema.
#[derive(Debug, Clone)]
pub struct TypedBatch {
    schema: Arc<ConnSchema>,
    columns: Vec<Option<TypedColumn>>,
    num_rows: usize,
}

impl TypedBatch {
    /// Number of rows in the batch.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Column at a schema position, `None` when absent from this batch.
    pub fn column(&self, idx: usize) -> Option<&TypedColumn> {
        self.columns.get(idx).and_then(Option::as_ref)
    }

    /// Schema the batch was coerced against.
    pub fn schema(&self) -> &Arc<ConnSchema> {
        &self.schema
    }

    /// Converts the typed batch back into an Arrow batch. Absent columns
    /// become all-null `Utf8` columns.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays = Vec::with_capacity(self.columns.len());

        for (spec, column) in self.schema.columns().iter().zip(&self.columns) {
            match column {
                Some(column) => {
                    fields.push(Field::new(&spec.name, column.data_type(), true));
                    arrays.push(column.to_array());
                }
                None => {
                    fields.push(Field::new(&spec.name, DataType::Utf8, true));
                    arrays.push(arrow::array::new_null_array(&DataType::Utf8, self.num_rows));
                }
            }
        }

        let options = arrow::record_batch::RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &options,
        )?)
    }
}

/// Converts raw batches into typed batches for one file schema.
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    schema: Arc<ConnSchema>,
    null_tokens: NullTokens,
}

impl TypeCoercer {
    /// Creates a coercer for a schema.
    pub fn new(schema: Arc<ConnSchema>, null_tokens: NullTokens) -> Self {
        Self {
            schema,
            null_tokens,
        }
    }

    /// Coerces a batch. Output has the same number of rows as the input.
    pub fn coerce(&self, batch: &RecordBatch) -> TypedBatch {
        let batch_schema = batch.schema();
        let columns = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                // Prefer the positional match so duplicate headers stay distinct
                let position = match batch_schema.fields().get(idx) {
                    Some(field) if field.name() == &spec.name => Some(idx),
                    _ => batch_schema.index_of(&spec.name).ok(),
                };
                let Some(position) = position else {
                    debug!(column = %spec.name, "Column absent from batch");
                    return None;
                };
                coerce_column(batch.column(position), spec.declared, &self.null_tokens)
            })
            .collect();

        TypedBatch {
            schema: Arc::clone(&self.schema),
            columns,
            num_rows: batch.num_rows(),
        }
    }
}

/// Coerces one column according to its declared type.
///
/// Arrays that already carry the target type pass through unchanged.
/// Returns `None` when the array cannot be interpreted as text.
pub fn coerce_column(
    array: &ArrayRef,
    declared: DeclaredType,
    null_tokens: &NullTokens,
) -> Option<TypedColumn> {
    match (declared, array.data_type()) {
        (DeclaredType::Float | DeclaredType::UnsignedInt, DataType::Float64) => {
            let values = array.as_any().downcast_ref::<Float64Array>()?.clone();
            let raw = as_utf8(array)?;
            Some(TypedColumn {
                raw,
                values: TypedValues::Float(values),
                malformed: 0,
            })
        }
        (DeclaredType::Boolean, DataType::Boolean) => {
            let values = array.as_any().downcast_ref::<BooleanArray>()?.clone();
            let raw = as_utf8(array)?;
            Some(TypedColumn {
                raw,
                values: TypedValues::Boolean(values),
                malformed: 0,
            })
        }
        _ => {
            let strings = as_utf8(array)?;
            Some(coerce_strings(&strings, declared, null_tokens))
        }
    }
}

fn as_utf8(array: &ArrayRef) -> Option<StringArray> {
    if let Some(strings) = array.as_any().downcast_ref::<StringArray>() {
        return Some(strings.clone());
    }
    match cast(array, &DataType::Utf8) {
        Ok(casted) => casted.as_any().downcast_ref::<StringArray>().cloned(),
        Err(e) => {
            debug!(data_type = ?array.data_type(), error = %e, "Column cannot be read as text");
            None
        }
    }
}

fn coerce_strings(
    strings: &StringArray,
    declared: DeclaredType,
    null_tokens: &NullTokens,
) -> TypedColumn {
    let present: StringArray = strings
        .iter()
        .map(|value| value.filter(|s| !null_tokens.is_null(s)))
        .collect();

    let mut malformed = 0u64;
    match declared {
        DeclaredType::Float | DeclaredType::UnsignedInt => {
            let values: Float64Array = present
                .iter()
                .map(|value| {
                    value.and_then(|s| {
                        let parsed = parse_numeric(s);
                        if parsed.is_none() {
                            malformed += 1;
                        }
                        parsed
                    })
                })
                .collect();
            let raw = keep_valid(&present, &values);
            TypedColumn {
                raw,
                values: TypedValues::Float(values),
                malformed,
            }
        }
        DeclaredType::Boolean => {
            let values: BooleanArray = present
                .iter()
                .map(|value| {
                    value.and_then(|s| {
                        let parsed = parse_boolean(s);
                        if parsed.is_none() {
                            malformed += 1;
                        }
                        parsed
                    })
                })
                .collect();
            let raw = keep_valid(&present, &values);
            TypedColumn {
                raw,
                values: TypedValues::Boolean(values),
                malformed,
            }
        }
        DeclaredType::Categorical | DeclaredType::Text => TypedColumn {
            raw: present,
            values: TypedValues::Text,
            malformed: 0,
        },
    }
}

/// Nulls out raw strings whose typed value is null.
fn keep_valid(raw: &StringArray, typed: &dyn Array) -> StringArray {
    raw.iter()
        .enumerate()
        .map(|(idx, value)| value.filter(|_| typed.is_valid(idx)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::raw_batch;

    fn coercer(headers: &[&str]) -> TypeCoercer {
        let schema = ConnSchema::from_headers(headers.iter().copied()).unwrap();
        TypeCoercer::new(Arc::new(schema), NullTokens::default())
    }

    #[test]
    fn test_parse_boolean_tokens() {
        assert_eq!(parse_boolean("T"), Some(true));
        assert_eq!(parse_boolean("True"), Some(true));
        assert_eq!(parse_boolean("F"), Some(false));
        assert_eq!(parse_boolean("False"), Some(false));
        assert_eq!(parse_boolean("true"), None);
        assert_eq!(parse_boolean("1"), None);
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("10.5"), Some(10.5));
        assert_eq!(parse_numeric(" 42 "), Some(42.0));
        assert_eq!(parse_numeric("1e3"), Some(1000.0));
        assert_eq!(parse_numeric("-"), None);
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric("NaN"), None);
    }

    #[test]
    fn test_null_tokens() {
        let tokens = NullTokens::default();
        assert!(tokens.is_null("-"));
        assert!(tokens.is_null(""));
        assert!(tokens.is_null("  - "));
        assert!(!tokens.is_null("--"));
        assert!(!tokens.is_null("tcp"));
    }

    #[test]
    fn test_numeric_column_counts_sentinel_and_malformed_as_null() {
        let coercer = coercer(&["duration"]);
        let batch = raw_batch(&["duration"], &[&["10.5"], &["-"], &["3.2"], &["abc"]]);

        let typed = coercer.coerce(&batch);
        assert_eq!(typed.num_rows(), 4);
        let column = typed.column(0).unwrap();
        assert_eq!(column.null_count(), 2);
        assert_eq!(column.malformed_count(), 1);

        let TypedValues::Float(values) = column.values() else {
            panic!("duration should be coerced to float");
        };
        let collected: Vec<Option<f64>> = values.iter().collect();
        assert_eq!(collected, vec![Some(10.5), None, Some(3.2), None]);

        let raw: Vec<Option<&str>> = column.raw().iter().collect();
        assert_eq!(raw, vec![Some("10.5"), None, Some("3.2"), None]);
    }

    #[test]
    fn test_boolean_column() {
        let coercer = coercer(&["local_orig"]);
        let batch = raw_batch(
            &["local_orig"],
            &[&["T"], &["False"], &["-"], &["maybe"], &["True"]],
        );

        let typed = coercer.coerce(&batch);
        let column = typed.column(0).unwrap();
        let TypedValues::Boolean(values) = column.values() else {
            panic!("local_orig should be coerced to boolean");
        };
        let collected: Vec<Option<bool>> = values.iter().collect();
        assert_eq!(
            collected,
            vec![Some(true), Some(false), None, None, Some(true)]
        );
        assert_eq!(column.null_count(), 2);
        assert_eq!(column.malformed_count(), 1);
    }

    #[test]
    fn test_text_columns_pass_through_with_sentinels_nulled() {
        let coercer = coercer(&["proto", "orig_pkts"]);
        let batch = raw_batch(
            &["proto", "orig_pkts"],
            &[&["tcp", "3"], &["-", "x"], &["udp", "-"]],
        );

        let typed = coercer.coerce(&batch);
        let proto: Vec<Option<&str>> = typed.column(0).unwrap().raw().iter().collect();
        assert_eq!(proto, vec![Some("tcp"), None, Some("udp")]);

        let pkts = typed.column(1).unwrap();
        assert!(matches!(pkts.values(), TypedValues::Float(_)));
        assert_eq!(pkts.malformed_count(), 1);
        assert_eq!(pkts.null_count(), 2);
    }

    #[test]
    fn test_counter_column_counts_sentinel_and_malformed_as_null() {
        let coercer = coercer(&["orig_pkts", "missed_bytes"]);
        let batch = raw_batch(
            &["orig_pkts", "missed_bytes"],
            &[&["10.5", "10.5"], &["-", "-"], &["3.2", "3.2"], &["abc", "abc"]],
        );

        let typed = coercer.coerce(&batch);
        for idx in 0..2 {
            let column = typed.column(idx).unwrap();
            assert_eq!(column.null_count(), 2);
            assert_eq!(column.malformed_count(), 1);
            let TypedValues::Float(values) = column.values() else {
                panic!("counter columns should be coerced to float");
            };
            let collected: Vec<Option<f64>> = values.iter().collect();
            assert_eq!(collected, vec![Some(10.5), None, Some(3.2), None]);
        }
    }

    #[test]
    fn test_missing_column_is_absent() {
        let coercer = coercer(&["proto", "label"]);
        let batch = raw_batch(&["proto"], &[&["tcp"]]);

        let typed = coercer.coerce(&batch);
        assert!(typed.column(0).is_some());
        assert!(typed.column(1).is_none());
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let headers = ["duration", "local_orig", "proto"];
        let coercer = coercer(&headers);
        let batch = raw_batch(
            &headers,
            &[&["1.5", "T", "tcp"], &["-", "F", "-"], &["oops", "?", "udp"]],
        );

        let once = coercer.coerce(&batch).to_record_batch().unwrap();
        let twice = coercer.coerce(&once).to_record_batch().unwrap();

        assert_eq!(once.schema(), twice.schema());
        assert_eq!(once.columns(), twice.columns());
        assert_eq!(once.column(0).data_type(), &DataType::Float64);
        assert_eq!(once.column(1).data_type(), &DataType::Boolean);
    }

    #[test]
    fn test_non_text_array_is_cast() {
        let array: ArrayRef = Arc::new(arrow::array::Int64Array::from(vec![Some(7), None]));
        let column = coerce_column(&array, DeclaredType::UnsignedInt, &NullTokens::default())
            .unwrap();
        let raw: Vec<Option<&str>> = column.raw().iter().collect();
        assert_eq!(raw, vec![Some("7"), None]);
        let TypedValues::Float(values) = column.values() else {
            panic!("integer input should land in a float column");
        };
        assert_eq!(values.iter().collect::<Vec<_>>(), vec![Some(7.0), None]);
    }
}
