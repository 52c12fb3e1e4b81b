//! Batch scoring: reads readings from Parquet, assesses every row, writes the
//! scored rows back out as Parquet.

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use preservion_ai::Pipeline;
use preservion_ai::batch::{ScoreStats, score_batches};
use preservion_core::schema::readings;

pub struct BatchStats {
    pub scored: ScoreStats,
    pub elapsed_secs: f64,
}

/// Read a Parquet file into Arrow RecordBatches, keeping its schema so an
/// empty file still yields a well-formed output.
fn read_parquet(path: &Path) -> anyhow::Result<(arrow::datatypes::SchemaRef, Vec<RecordBatch>)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

fn write_parquet(
    path: &Path,
    schema: arrow::datatypes::SchemaRef,
    batches: &[RecordBatch],
) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}

/// Score `input` into `output`, stamping every row with `assessed_at_nanos`.
pub fn run_batch(
    pipeline: &Pipeline,
    input: &Path,
    output: &Path,
    assessed_at_nanos: i64,
) -> anyhow::Result<BatchStats> {
    let start = Instant::now();

    let (schema, batches) = read_parquet(input).context("reading readings parquet")?;
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    tracing::info!(rows = total, path = %input.display(), "read readings");

    let (scored, stats) = score_batches(pipeline, &batches, assessed_at_nanos)?;
    let out_schema = match scored.first() {
        Some(b) => b.schema(),
        None => std::sync::Arc::new(readings::scored_schema(&schema)),
    };
    write_parquet(output, out_schema, &scored).context("writing scored parquet")?;

    Ok(BatchStats {
        scored: stats,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, StringArray, UInt32Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use preservion_core::DecisionEngine;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn demo_pipeline() -> Pipeline {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/onion-centroid");
        Pipeline::load(&dir, DecisionEngine::default()).unwrap()
    }

    fn readings_batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("sensor_id", DataType::Utf8, false),
            Field::new("temperature", DataType::Float64, false),
            Field::new("humidity", DataType::Float64, false),
            Field::new("ethylene", DataType::Float64, false),
            Field::new("co2", DataType::Float64, false),
            Field::new("onion_type", DataType::Utf8, false),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["bay-1", "bay-2", "bay-3"])),
                Arc::new(Float64Array::from(vec![8.0, 28.0, 12.0])),
                Arc::new(Float64Array::from(vec![62.0, 95.0, 65.0])),
                Arc::new(Float64Array::from(vec![0.4, 8.0, 0.5])),
                Arc::new(Float64Array::from(vec![450.0, 1900.0, 500.0])),
                Arc::new(StringArray::from(vec!["large", "white", "purple"])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn scores_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("readings.parquet");
        let output = dir.path().join("scored.parquet");
        let batch = readings_batch();
        write_parquet(&input, batch.schema(), &[batch]).unwrap();

        let stats = run_batch(&demo_pipeline(), &input, &output, 42).unwrap();
        assert_eq!(stats.scored.rows, 3);
        assert_eq!(stats.scored.scored, 2);
        assert_eq!(stats.scored.rejected, 1);

        let (schema, batches) = read_parquet(&output).unwrap();
        assert!(schema.field_with_name("sensor_id").is_ok());
        assert!(schema.field_with_name("assessed_at").is_ok());
        let out = &batches[0];

        let condition = out
            .column_by_name("condition")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(condition.value(0), "good");
        assert_eq!(condition.value(1), "spoiled");
        assert!(condition.is_null(2));

        let risk = out
            .column_by_name("risk_level")
            .unwrap()
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap();
        assert_eq!(risk.value(1), 100);

        let error = out
            .column_by_name("error")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert!(error.value(2).contains("purple"));
    }

    #[test]
    fn missing_input_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_batch(
            &demo_pipeline(),
            &dir.path().join("nope.parquet"),
            &dir.path().join("out.parquet"),
            0,
        );
        assert!(err.is_err());
    }
}
