//! Codec for the `RawBlob` contents (`spec` §3, §6): the service-native
//! columnar layout landed at `{tenant_id}/raw/{service}/{table}/{job_id}/{chunk_id}.parquet`.
//!
//! Source records are attribute maps of unknown shape per service (`spec`
//! §4.2) — rather than infer a per-service Arrow schema up front, this
//! reference codec stores one JSON-encoded UTF8 value per row, via `arrow`'s
//! in-memory `RecordBatch` and `parquet`'s `ArrowWriter`. A real per-service
//! connector that knows its own schema ahead of time can build a richer
//! `RecordBatch` directly against the same Parquet writer; this is the
//! reference encoding the Chunk Processor and Canonical Transformer share.

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RawCodecError {
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("record serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RawCodecError>;

fn raw_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![Field::new("record", DataType::Utf8, false)]))
}

/// Encode `records` as a single-row-group Parquet file, one row per record.
/// An empty slice still produces a valid (zero-row) Parquet file, matching
/// the empty-page boundary case in `spec` §8.
pub fn encode_records(records: &[Value]) -> Result<Vec<u8>> {
    let schema = raw_schema();
    let rows = records
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let column: ArrayRef = Arc::new(StringArray::from(rows));
    let batch = RecordBatch::try_new(schema.clone(), vec![column])?;

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, Some(WriterProperties::builder().build()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buf)
}

/// Incrementally encodes records as Parquet row groups instead of holding
/// every record of a chunk in memory at once. Callers flush a batch at a
/// time (`spec` §4.4: the in-memory buffer is bounded by
/// `page_size * max_pages_in_memory`) and call [`StreamingRawWriter::finish`]
/// once the chunk's pages are exhausted.
pub struct StreamingRawWriter {
    writer: ArrowWriter<Vec<u8>>,
    schema: Arc<Schema>,
}

impl StreamingRawWriter {
    pub fn try_new() -> Result<Self> {
        let schema = raw_schema();
        let writer = ArrowWriter::try_new(Vec::new(), schema.clone(), Some(WriterProperties::builder().build()))?;
        Ok(Self { writer, schema })
    }

    /// Append one row group. A no-op on an empty batch.
    pub fn write_batch(&mut self, records: &[Value]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let rows = records
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let column: ArrayRef = Arc::new(StringArray::from(rows));
        let batch = RecordBatch::try_new(self.schema.clone(), vec![column])?;
        self.writer.write(&batch)?;
        Ok(())
    }

    /// Finalize the Parquet footer and return the encoded bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.writer.into_inner()?)
    }
}

/// Decode a Parquet blob previously written by [`encode_records`] back into
/// the original records, in row order.
pub fn decode_records(bytes: Vec<u8>) -> Result<Vec<Value>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes))?.build()?;
    let mut out = Vec::new();
    for batch in reader {
        let batch = batch?;
        let column = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("raw_codec always writes a single Utf8 `record` column");
        for i in 0..column.len() {
            out.push(serde_json::from_str(column.value(i))?);
        }
    }
    Ok(out)
}
