//! Helpers shared by unit tests.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::coercion::{NullTokens, TypeCoercer, TypedBatch};
use crate::schema::ConnSchema;

/// Builds a raw all-`Utf8` batch. An empty string cell becomes a null.
pub fn raw_batch(headers: &[&str], rows: &[&[&str]]) -> RecordBatch {
    let fields: Vec<Field> = headers
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, true))
        .collect();

    let columns: Vec<ArrayRef> = (0..headers.len())
        .map(|col| {
            let values: StringArray = rows
                .iter()
                .map(|row| row.get(col).copied().filter(|v| !v.is_empty()))
                .collect();
            Arc::new(values) as ArrayRef
        })
        .collect();

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
}

/// Builds a schema and a coercer for the given headers.
pub fn coercer_for(headers: &[&str]) -> (Arc<ConnSchema>, TypeCoercer) {
    let schema = Arc::new(ConnSchema::from_headers(headers.iter().copied()).unwrap());
    let coercer = TypeCoercer::new(Arc::clone(&schema), NullTokens::default());
    (schema, coercer)
}

/// Raw rows split into typed batches of at most `batch_size` rows.
pub fn typed_batches(
    coercer: &TypeCoercer,
    headers: &[&str],
    rows: &[&[&str]],
    batch_size: usize,
) -> Vec<TypedBatch> {
    rows.chunks(batch_size)
        .map(|chunk| coercer.coerce(&raw_batch(headers, chunk)))
        .collect()
}
