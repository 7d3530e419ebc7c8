// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Dataset <-> columnar batch conversion.
//!
//! Each partition is converted on the shared executor into batches of at most
//! `max_records_per_batch` rows. The stream yields them in partition order
//! and, within a partition, in row order.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use arrow::array::{ArrayData, RecordBatch};
use arrow::buffer::Buffer;
use arrow::datatypes::{Schema as ArrowSchema, SchemaRef as ArrowSchemaRef};

use crate::columnar::builder::rows_to_record_batch;
use crate::columnar::reader::record_batch_to_rows;
use crate::columnar::schema::{from_arrow_schema, to_arrow_schema};
use crate::common::error::{ConversionError, Result};
use crate::common::logging::debug;
use crate::common::options::ConversionOptions;
use crate::runtime::executor::partition_executor;
use crate::runtime::ordered_buffer::OrderedPartitionBuffer;
use crate::runtime::partition::PartitionSource;
use crate::types::{Dataset, LocalTable, Row};

/// Ordered stream of record batches for one dataset.
///
/// Always yields at least one batch; a dataset without rows produces a single
/// empty batch carrying the schema. Dropping the stream cancels partitions
/// that have not started yet.
pub struct ColumnarBatchStream {
    arrow_schema: ArrowSchemaRef,
    buffer: Arc<OrderedPartitionBuffer<Vec<RecordBatch>>>,
    pending: VecDeque<RecordBatch>,
    emitted: usize,
    finished: bool,
}

impl ColumnarBatchStream {
    fn new(
        arrow_schema: ArrowSchemaRef,
        buffer: Arc<OrderedPartitionBuffer<Vec<RecordBatch>>>,
    ) -> Self {
        Self {
            arrow_schema,
            buffer,
            pending: VecDeque::new(),
            emitted: 0,
            finished: false,
        }
    }

    pub fn schema(&self) -> ArrowSchemaRef {
        Arc::clone(&self.arrow_schema)
    }

    pub fn collect_batches(self) -> Result<Vec<RecordBatch>> {
        self.collect()
    }
}

impl Iterator for ColumnarBatchStream {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = self.pending.pop_front() {
                self.emitted += 1;
                return Some(Ok(batch));
            }
            if self.finished {
                return None;
            }
            match self.buffer.next() {
                Some(Ok(batches)) => self.pending.extend(batches),
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    if self.emitted == 0 {
                        self.emitted = 1;
                        return Some(Ok(RecordBatch::new_empty(Arc::clone(
                            &self.arrow_schema,
                        ))));
                    }
                    return None;
                }
            }
        }
    }
}

impl Drop for ColumnarBatchStream {
    fn drop(&mut self) {
        self.buffer.cancel();
    }
}

/// Convert every partition of `source` into record batches.
///
/// The schema is mapped before any partition is scheduled, so unsupported
/// types fail without touching the data.
pub fn to_columnar_batches<S>(
    source: Arc<S>,
    options: &ConversionOptions,
) -> Result<ColumnarBatchStream>
where
    S: PartitionSource + ?Sized + 'static,
{
    options.validate()?;
    let schema = source.schema();
    let arrow_schema = Arc::new(to_arrow_schema(&schema, options.format_version)?);
    let num_partitions = source.num_partitions();
    let buffer = Arc::new(OrderedPartitionBuffer::new(
        num_partitions,
        options.max_result_size,
    ));
    debug!(
        "converting {} partitions to arrow, max {} records per batch, time zone {}",
        num_partitions, options.max_records_per_batch, options.time_zone
    );

    let executor = partition_executor();
    for index in 0..num_partitions {
        let source = Arc::clone(&source);
        let schema = Arc::clone(&schema);
        let arrow_schema = Arc::clone(&arrow_schema);
        let tz = options.time_zone;
        let max_records = options.max_records_per_batch;
        executor.submit(&buffer, index, move || {
            let rows = source
                .compute(index)
                .map_err(|message| ConversionError::PartitionFailed { index, message })?;
            let mut batches = Vec::with_capacity(rows.len().div_ceil(max_records));
            let mut bytes = 0u64;
            for chunk in rows.chunks(max_records) {
                let batch = rows_to_record_batch(&schema, &arrow_schema, chunk, &tz)?;
                bytes = bytes.saturating_add(record_batch_bytes(&batch) as u64);
                batches.push(batch);
            }
            Ok((batches, bytes))
        });
    }
    Ok(ColumnarBatchStream::new(arrow_schema, buffer))
}

pub fn dataset_to_columnar_batches(
    dataset: &Dataset,
    options: &ConversionOptions,
) -> Result<Vec<RecordBatch>> {
    to_columnar_batches(Arc::new(dataset.clone()), options)?.collect_batches()
}

/// Build a dataset with one partition per batch.
///
/// Every batch must carry `arrow_schema`; timestamps are rendered in the
/// session time zone.
pub fn from_columnar_batches(
    arrow_schema: &ArrowSchema,
    batches: &[RecordBatch],
    options: &ConversionOptions,
) -> Result<Dataset> {
    let schema = Arc::new(from_arrow_schema(arrow_schema)?);
    let mut partitions: Vec<Vec<Row>> = Vec::with_capacity(batches.len());
    for (index, batch) in batches.iter().enumerate() {
        if batch.schema().fields() != arrow_schema.fields() {
            return Err(ConversionError::SchemaMismatch(format!(
                "batch {index} has schema {:?}, expected {:?}",
                batch.schema().fields(),
                arrow_schema.fields()
            )));
        }
        partitions.push(record_batch_to_rows(&schema, batch, &options.time_zone)?);
    }
    Dataset::try_new(schema, partitions)
}

/// Materialize `source` on the caller side through record batches.
pub fn collect_local<S>(source: Arc<S>, options: &ConversionOptions) -> Result<LocalTable>
where
    S: PartitionSource + ?Sized + 'static,
{
    let schema = source.schema();
    let stream = to_columnar_batches(source, options)?;
    let mut rows = Vec::new();
    for batch in stream {
        rows.extend(record_batch_to_rows(&schema, &batch?, &options.time_zone)?);
    }
    LocalTable::try_new(schema, rows)
}

/// Distribute a local table over `num_partitions` partitions, passing every
/// slice through record batches.
pub fn local_to_dataset(
    table: &LocalTable,
    num_partitions: usize,
    options: &ConversionOptions,
) -> Result<Dataset> {
    options.validate()?;
    let schema = Arc::clone(table.schema());
    let arrow_schema = Arc::new(to_arrow_schema(&schema, options.format_version)?);
    let sliced = Dataset::from_rows(Arc::clone(&schema), table.rows().to_vec(), num_partitions)?;
    let mut partitions = Vec::with_capacity(sliced.num_partitions());
    for index in 0..sliced.num_partitions() {
        let rows = sliced.partition(index).unwrap_or(&[]);
        let mut converted = Vec::with_capacity(rows.len());
        for chunk in rows.chunks(options.max_records_per_batch) {
            let batch = rows_to_record_batch(&schema, &arrow_schema, chunk, &options.time_zone)?;
            converted.extend(record_batch_to_rows(&schema, &batch, &options.time_zone)?);
        }
        partitions.push(converted);
    }
    Dataset::try_new(schema, partitions)
}

/// Size of a batch counted as the sum of its distinct buffers.
///
/// Buffers shared between columns of the same batch are counted once.
pub fn record_batch_bytes(batch: &RecordBatch) -> usize {
    let mut seen = HashSet::new();
    batch.columns().iter().fold(0usize, |total, column| {
        total.saturating_add(array_data_bytes(&column.to_data(), &mut seen))
    })
}

fn array_data_bytes(data: &ArrayData, seen: &mut HashSet<usize>) -> usize {
    let mut total = 0usize;
    for buffer in data.buffers() {
        total = total.saturating_add(buffer_bytes(buffer, seen));
    }
    if let Some(nulls) = data.nulls() {
        total = total.saturating_add(buffer_bytes(nulls.buffer(), seen));
    }
    for child in data.child_data() {
        total = total.saturating_add(array_data_bytes(child, seen));
    }
    total
}

fn buffer_bytes(buffer: &Buffer, seen: &mut HashSet<usize>) -> usize {
    let ptr = buffer.as_ptr() as usize;
    if !seen.insert(ptr) {
        return 0;
    }
    buffer.len()
}
