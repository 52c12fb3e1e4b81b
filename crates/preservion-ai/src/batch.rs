//! Batch scoring of Arrow record batches of stored sensor readings.
//!
//! Rows that fail validation are kept with null assessment columns and an
//! `error` message; server-side failures (model unavailable, encoding
//! mismatch, malformed output) abort the whole batch.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float32Builder, Float64Array, LargeStringArray, ListBuilder, StringArray,
    StringBuilder, TimestampNanosecondArray, UInt32Builder,
};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use preservion_core::schema::readings;
use preservion_core::{Measurement, PipelineError, SensorReading};

use crate::pipeline::Pipeline;

/// Counts from one scoring run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScoreStats {
    pub rows: usize,
    pub scored: usize,
    pub rejected: usize,
}

/// Check `batch` carries every column of [`readings::input_schema`]. Numeric
/// columns may be any type that casts to Float64; string columns may be
/// Utf8 or LargeUtf8.
pub fn check_input_columns(batch: &RecordBatch) -> anyhow::Result<()> {
    let schema = batch.schema();
    let required = readings::input_schema();
    let mut missing = Vec::new();
    for field in required.fields() {
        match schema.field_with_name(field.name()) {
            Err(_) => missing.push(field.name().as_str()),
            Ok(actual) if field.data_type() == &DataType::Utf8 => {
                anyhow::ensure!(
                    matches!(actual.data_type(), DataType::Utf8 | DataType::LargeUtf8),
                    "column '{}' must be a string column, found {}",
                    field.name(),
                    actual.data_type()
                );
            }
            Ok(actual) => {
                anyhow::ensure!(
                    arrow::compute::can_cast_types(actual.data_type(), field.data_type()),
                    "column '{}' must be numeric, found {}",
                    field.name(),
                    actual.data_type()
                );
            }
        }
    }
    anyhow::ensure!(missing.is_empty(), "missing columns: {}", missing.join(", "));
    Ok(())
}

/// Extract one reading per row. Missing columns fail the batch; bad values
/// fail only their row.
pub fn readings_from_batch(
    batch: &RecordBatch,
) -> anyhow::Result<Vec<Result<SensorReading, PipelineError>>> {
    check_input_columns(batch)?;

    let mut numeric = Vec::with_capacity(Measurement::ALL.len());
    for m in Measurement::ALL {
        let col = batch
            .column_by_name(m.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing '{}' column", m.as_str()))?;
        numeric.push(cast(col.as_ref(), &DataType::Float64)?);
    }
    let onion_col = batch
        .column_by_name("onion_type")
        .ok_or_else(|| anyhow::anyhow!("missing 'onion_type' column"))?;

    let values: Vec<&Float64Array> = numeric
        .iter()
        .map(|arr| {
            arr.as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| anyhow::anyhow!("numeric cast did not yield Float64"))
        })
        .collect::<anyhow::Result<_>>()?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        out.push(reading_at(&values, onion_col.as_ref(), row));
    }
    Ok(out)
}

fn reading_at(
    numeric: &[&Float64Array],
    onion_col: &dyn Array,
    row: usize,
) -> Result<SensorReading, PipelineError> {
    let mut v = [0.0f64; 4];
    for (slot, (m, arr)) in v.iter_mut().zip(Measurement::ALL.iter().zip(numeric)) {
        if arr.is_null(row) {
            return Err(PipelineError::invalid(m.as_str(), "missing or not numeric"));
        }
        *slot = arr.value(row);
    }
    let onion_type = get_string(onion_col, row)
        .ok_or_else(|| PipelineError::invalid("onion_type", "missing or not a string"))?;

    let reading = SensorReading {
        temperature: v[0],
        humidity: v[1],
        ethylene: v[2],
        co2: v[3],
        onion_type,
    };
    reading.validate()?;
    Ok(reading)
}

/// Score one batch, appending the assessment columns to its input columns.
pub fn score_batch(
    pipeline: &Pipeline,
    batch: &RecordBatch,
    assessed_at_nanos: i64,
    stats: &mut ScoreStats,
) -> anyhow::Result<RecordBatch> {
    let n = batch.num_rows();
    let readings = readings_from_batch(batch)?;

    let mut condition = StringBuilder::new();
    let mut risk_level = UInt32Builder::new();
    let mut shelf_life = StringBuilder::new();
    let mut confidence = Float32Builder::new();
    let mut prob_good = Float32Builder::new();
    let mut prob_risky = Float32Builder::new();
    let mut prob_spoiled = Float32Builder::new();
    let mut recommendations = ListBuilder::new(StringBuilder::new());
    let mut error = StringBuilder::new();

    for reading in readings {
        let assessed = reading.and_then(|r| pipeline.assess(&r));
        match assessed {
            Ok(a) => {
                condition.append_value(a.condition.as_str());
                risk_level.append_value(a.risk_level);
                shelf_life.append_value(&a.shelf_life);
                confidence.append_value(a.confidence);
                prob_good.append_value(a.probabilities.good);
                prob_risky.append_value(a.probabilities.risky);
                prob_spoiled.append_value(a.probabilities.spoiled);
                for directive in &a.recommendations {
                    recommendations.values().append_value(directive);
                }
                recommendations.append(true);
                error.append_null();
                stats.scored += 1;
            }
            Err(e) if e.is_client_error() => {
                condition.append_null();
                risk_level.append_null();
                shelf_life.append_null();
                confidence.append_null();
                prob_good.append_null();
                prob_risky.append_null();
                prob_spoiled.append_null();
                recommendations.append(false);
                error.append_value(e.to_string());
                stats.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    stats.rows += n;

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns.push(Arc::new(condition.finish()));
    columns.push(Arc::new(risk_level.finish()));
    columns.push(Arc::new(shelf_life.finish()));
    columns.push(Arc::new(confidence.finish()));
    columns.push(Arc::new(prob_good.finish()));
    columns.push(Arc::new(prob_risky.finish()));
    columns.push(Arc::new(prob_spoiled.finish()));
    columns.push(Arc::new(recommendations.finish()));
    columns.push(Arc::new(error.finish()));
    columns.push(Arc::new(
        TimestampNanosecondArray::from(vec![assessed_at_nanos; n]).with_timezone("UTC"),
    ));

    let schema = readings::scored_schema(&batch.schema());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Score every batch with one shared timestamp.
pub fn score_batches(
    pipeline: &Pipeline,
    batches: &[RecordBatch],
    assessed_at_nanos: i64,
) -> anyhow::Result<(Vec<RecordBatch>, ScoreStats)> {
    let mut stats = ScoreStats::default();
    let scored = batches
        .iter()
        .map(|b| score_batch(pipeline, b, assessed_at_nanos, &mut stats))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok((scored, stats))
}

/// Extract a string value from an Arrow array (handles Utf8 and LargeUtf8).
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(row).to_string())
        .or_else(|| {
            col.as_any()
                .downcast_ref::<LargeStringArray>()
                .map(|arr| arr.value(row).to_string())
        })
}
