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
//! Row form to Arrow arrays.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array,
    Float64Array, Int32Array, Int64Array, ListArray, MapArray, RecordBatch, RecordBatchOptions,
    StringArray, StructArray, TimestampMicrosecondArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType as ArrowDataType, SchemaRef as ArrowSchemaRef};
use chrono::NaiveDate;

use crate::columnar::schema::TIMESTAMP_TIME_ZONE;
use crate::common::error::{ConversionError, Result};
use crate::common::timezone::TimeZoneSpec;
use crate::types::{DataType, Row, Schema, Value};

pub(crate) fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Per-column state shared by the recursive builders.
pub(crate) struct ColumnContext<'a> {
    pub(crate) name: &'a str,
    pub(crate) tz: &'a TimeZoneSpec,
}

impl ColumnContext<'_> {
    pub(crate) fn mismatch(&self, expected: &DataType, got: &Value) -> ConversionError {
        ConversionError::SchemaMismatch(format!(
            "Exception thrown when converting column `{}`: expected {}, got {}",
            self.name,
            expected,
            got.kind_name()
        ))
    }

    pub(crate) fn null_violation(&self, expected: &DataType) -> ConversionError {
        ConversionError::SchemaMismatch(format!(
            "Exception thrown when converting column `{}`: null found where non-null {} is required",
            self.name, expected
        ))
    }

    pub(crate) fn decimal_overflow(&self, expected: &DataType, got: &str) -> ConversionError {
        ConversionError::SchemaMismatch(format!(
            "Exception thrown when converting column `{}`: {} cannot be represented exactly as {}",
            self.name, got, expected
        ))
    }

    fn layout(&self, expected: &DataType, arrow_type: &ArrowDataType) -> ConversionError {
        ConversionError::SchemaMismatch(format!(
            "column `{}`: native type {} does not match Arrow type {}",
            self.name, expected, arrow_type
        ))
    }
}

/// Convert a chunk of rows into one record batch with `arrow_schema`.
///
/// `arrow_schema` must be the mapping of `schema`; the first value that does
/// not fit its column fails the whole batch.
pub fn rows_to_record_batch(
    schema: &Schema,
    arrow_schema: &ArrowSchemaRef,
    rows: &[Row],
    tz: &TimeZoneSpec,
) -> Result<RecordBatch> {
    let mut columns = Vec::with_capacity(schema.len());
    for (index, (field, arrow_field)) in schema
        .fields()
        .iter()
        .zip(arrow_schema.fields().iter())
        .enumerate()
    {
        let values = rows
            .iter()
            .map(|row| {
                row.get(index).ok_or_else(|| {
                    ConversionError::SchemaMismatch(format!(
                        "row has {} values, missing column `{}`",
                        row.len(),
                        field.name
                    ))
                })
            })
            .collect::<Result<Vec<&Value>>>()?;
        let ctx = ColumnContext {
            name: &field.name,
            tz,
        };
        columns.push(build_array(
            &field.data_type,
            arrow_field.data_type(),
            &values,
            field.nullable,
            &ctx,
        )?);
    }
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(
        Arc::clone(arrow_schema),
        columns,
        &options,
    )?)
}

fn collect_present<'v, T>(
    values: &[&'v Value],
    data_type: &DataType,
    nullable: bool,
    ctx: &ColumnContext<'_>,
    mut extract: impl FnMut(&'v Value) -> Result<T>,
) -> Result<Vec<Option<T>>> {
    let mut out = Vec::with_capacity(values.len());
    for &value in values {
        if value.is_null() {
            if !nullable {
                return Err(ctx.null_violation(data_type));
            }
            out.push(None);
        } else {
            out.push(Some(extract(value)?));
        }
    }
    Ok(out)
}

fn null_buffer(validity: Vec<bool>) -> Option<NullBuffer> {
    if validity.iter().all(|valid| *valid) {
        None
    } else {
        Some(NullBuffer::from(validity))
    }
}

fn next_offset(len: usize, ctx: &ColumnContext<'_>) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        ConversionError::ValueOutOfRange(format!(
            "column `{}` has more than {} nested values in one batch",
            ctx.name,
            i32::MAX
        ))
    })
}

fn build_array(
    data_type: &DataType,
    arrow_type: &ArrowDataType,
    values: &[&Value],
    nullable: bool,
    ctx: &ColumnContext<'_>,
) -> Result<ArrayRef> {
    let dt = data_type;
    let array: ArrayRef = match data_type {
        DataType::Boolean => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Boolean(b) => Ok(*b),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(BooleanArray::from(out))
        }
        DataType::Int32 => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Int32(x) => Ok(*x),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(Int32Array::from(out))
        }
        DataType::Int64 => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Int64(x) => Ok(*x),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(Int64Array::from(out))
        }
        DataType::Float32 => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Float32(x) => Ok(*x),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(Float32Array::from(out))
        }
        DataType::Float64 => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Float64(x) => Ok(*x),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(Float64Array::from(out))
        }
        DataType::String => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::String(s) => Ok(s.as_str()),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(StringArray::from(out))
        }
        DataType::Binary => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Binary(b) => Ok(b.as_slice()),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(BinaryArray::from_opt_vec(out))
        }
        DataType::Decimal { precision, scale } => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Decimal(d) => d
                    .rescale(*scale)
                    .filter(|d| d.fits(*precision))
                    .map(|d| d.unscaled())
                    .ok_or_else(|| ctx.decimal_overflow(dt, &d.to_string())),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            let ArrowDataType::Decimal128(p, s) = arrow_type else {
                return Err(ctx.layout(dt, arrow_type));
            };
            Arc::new(Decimal128Array::from(out).with_precision_and_scale(*p, *s)?)
        }
        DataType::Date => {
            let epoch = unix_epoch();
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Date(d) => i32::try_from(d.signed_duration_since(epoch).num_days())
                    .map_err(|_| ConversionError::ValueOutOfRange(format!("date {d}"))),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(Date32Array::from(out))
        }
        DataType::Timestamp => {
            let out = collect_present(values, dt, nullable, ctx, |v| match v {
                Value::Timestamp(t) => ctx.tz.to_instant_micros(*t),
                other => Err(ctx.mismatch(dt, other)),
            })?;
            Arc::new(TimestampMicrosecondArray::from(out).with_timezone(TIMESTAMP_TIME_ZONE))
        }
        DataType::Array {
            element,
            contains_null,
        } => {
            let ArrowDataType::List(item_field) = arrow_type else {
                return Err(ctx.layout(dt, arrow_type));
            };
            let mut offsets = Vec::with_capacity(values.len() + 1);
            offsets.push(0i32);
            let mut validity = Vec::with_capacity(values.len());
            let mut children: Vec<&Value> = Vec::new();
            for value in values {
                match value {
                    Value::Null if !nullable => return Err(ctx.null_violation(dt)),
                    Value::Null => validity.push(false),
                    Value::Array(items) => {
                        validity.push(true);
                        children.extend(items.iter());
                    }
                    other => return Err(ctx.mismatch(dt, other)),
                }
                offsets.push(next_offset(children.len(), ctx)?);
            }
            let child = build_array(
                element,
                item_field.data_type(),
                &children,
                *contains_null,
                ctx,
            )?;
            Arc::new(ListArray::try_new(
                Arc::clone(item_field),
                OffsetBuffer::new(offsets.into()),
                child,
                null_buffer(validity),
            )?)
        }
        DataType::Map {
            key,
            value,
            value_contains_null,
        } => {
            let ArrowDataType::Map(entries_field, sorted) = arrow_type else {
                return Err(ctx.layout(dt, arrow_type));
            };
            let ArrowDataType::Struct(entry_fields) = entries_field.data_type() else {
                return Err(ctx.layout(dt, arrow_type));
            };
            if entry_fields.len() != 2 {
                return Err(ctx.layout(dt, arrow_type));
            }
            let mut offsets = Vec::with_capacity(values.len() + 1);
            offsets.push(0i32);
            let mut validity = Vec::with_capacity(values.len());
            let mut keys: Vec<&Value> = Vec::new();
            let mut vals: Vec<&Value> = Vec::new();
            for v in values {
                match v {
                    Value::Null if !nullable => return Err(ctx.null_violation(dt)),
                    Value::Null => validity.push(false),
                    Value::Map(entries) => {
                        validity.push(true);
                        for (k, val) in entries {
                            keys.push(k);
                            vals.push(val);
                        }
                    }
                    other => return Err(ctx.mismatch(dt, other)),
                }
                offsets.push(next_offset(keys.len(), ctx)?);
            }
            let key_array = build_array(key, entry_fields[0].data_type(), &keys, false, ctx)?;
            let value_array = build_array(
                value,
                entry_fields[1].data_type(),
                &vals,
                *value_contains_null,
                ctx,
            )?;
            let entries = StructArray::try_new(
                entry_fields.clone(),
                vec![key_array, value_array],
                None,
            )?;
            Arc::new(MapArray::try_new(
                Arc::clone(entries_field),
                OffsetBuffer::new(offsets.into()),
                entries,
                null_buffer(validity),
                *sorted,
            )?)
        }
        DataType::UserDefined { .. } => {
            return Err(ConversionError::unsupported_to_arrow(data_type));
        }
    };
    Ok(array)
}
