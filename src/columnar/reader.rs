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
//! Arrow arrays back to row form.

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::{
    Date32Type, Decimal128Type, Float32Type, Float64Type, Int32Type, Int64Type,
    TimestampMicrosecondType,
};
use chrono::TimeDelta;

use crate::columnar::builder::{ColumnContext, unix_epoch};
use crate::common::error::{ConversionError, Result};
use crate::common::timezone::TimeZoneSpec;
use crate::types::{DataType, Decimal, Row, Schema, Value};

/// Decode every row of `batch`. Timestamps are rendered as wall-clock
/// readings in `tz`.
pub fn record_batch_to_rows(
    schema: &Schema,
    batch: &RecordBatch,
    tz: &TimeZoneSpec,
) -> Result<Vec<Row>> {
    if batch.num_columns() != schema.len() {
        return Err(ConversionError::SchemaMismatch(format!(
            "batch has {} columns but schema {} has {}",
            batch.num_columns(),
            schema,
            schema.len()
        )));
    }
    let num_rows = batch.num_rows();
    let mut columns = Vec::with_capacity(schema.len());
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let ctx = ColumnContext {
            name: &field.name,
            tz,
        };
        columns.push(read_array(&field.data_type, array.as_ref(), &ctx)?.into_iter());
    }

    let mut rows = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let values = columns
            .iter_mut()
            .map(|column| column.next().unwrap_or(Value::Null))
            .collect::<Vec<_>>();
        rows.push(Row::new(values));
    }
    Ok(rows)
}

fn layout_error(
    ctx: &ColumnContext<'_>,
    expected: &DataType,
    array: &dyn Array,
) -> ConversionError {
    ConversionError::SchemaMismatch(format!(
        "column `{}`: expected {}, found Arrow {}",
        ctx.name,
        expected,
        array.data_type()
    ))
}

fn collect_values(
    array: &dyn Array,
    mut decode: impl FnMut(usize) -> Result<Value>,
) -> Result<Vec<Value>> {
    (0..array.len())
        .map(|i| {
            if array.is_null(i) {
                Ok(Value::Null)
            } else {
                decode(i)
            }
        })
        .collect()
}

/// Group a fully decoded child array back into per-row slices.
fn split_by_offsets<T: Clone>(
    array: &dyn Array,
    offsets: &[i32],
    children: &[T],
    mut wrap: impl FnMut(Vec<T>) -> Value,
) -> Result<Vec<Value>> {
    collect_values(array, |i| {
        let start = usize::try_from(offsets[i]).unwrap_or(0);
        let end = usize::try_from(offsets[i + 1]).unwrap_or(0);
        let slice = children.get(start..end).ok_or_else(|| {
            ConversionError::SchemaMismatch(format!(
                "offsets {start}..{end} out of bounds for {} child values",
                children.len()
            ))
        })?;
        Ok(wrap(slice.to_vec()))
    })
}

macro_rules! read_primitive {
    ($array:expr, $arrow_ty:ty, $variant:ident, $dt:expr, $ctx:expr) => {{
        let col = $array
            .as_primitive_opt::<$arrow_ty>()
            .ok_or_else(|| layout_error($ctx, $dt, $array))?;
        collect_values($array, |i| Ok(Value::$variant(col.value(i))))
    }};
}

fn read_array(
    data_type: &DataType,
    array: &dyn Array,
    ctx: &ColumnContext<'_>,
) -> Result<Vec<Value>> {
    let dt = data_type;
    match data_type {
        DataType::Boolean => {
            let col = array
                .as_boolean_opt()
                .ok_or_else(|| layout_error(ctx, dt, array))?;
            collect_values(array, |i| Ok(Value::Boolean(col.value(i))))
        }
        DataType::Int32 => read_primitive!(array, Int32Type, Int32, dt, ctx),
        DataType::Int64 => read_primitive!(array, Int64Type, Int64, dt, ctx),
        DataType::Float32 => read_primitive!(array, Float32Type, Float32, dt, ctx),
        DataType::Float64 => read_primitive!(array, Float64Type, Float64, dt, ctx),
        DataType::String => {
            let col = array
                .as_string_opt::<i32>()
                .ok_or_else(|| layout_error(ctx, dt, array))?;
            collect_values(array, |i| Ok(Value::String(col.value(i).to_string())))
        }
        DataType::Binary => {
            let col = array
                .as_binary_opt::<i32>()
                .ok_or_else(|| layout_error(ctx, dt, array))?;
            collect_values(array, |i| Ok(Value::Binary(col.value(i).to_vec())))
        }
        DataType::Decimal { scale, .. } => {
            let col = array
                .as_primitive_opt::<Decimal128Type>()
                .ok_or_else(|| layout_error(ctx, dt, array))?;
            if i16::from(col.scale()) != i16::from(*scale) {
                return Err(layout_error(ctx, dt, array));
            }
            collect_values(array, |i| Ok(Value::Decimal(Decimal::new(col.value(i), *scale))))
        }
        DataType::Date => {
            let col = array
                .as_primitive_opt::<Date32Type>()
                .ok_or_else(|| layout_error(ctx, dt, array))?;
            let epoch = unix_epoch();
            collect_values(array, |i| {
                let days = col.value(i);
                TimeDelta::try_days(i64::from(days))
                    .and_then(|delta| epoch.checked_add_signed(delta))
                    .map(Value::Date)
                    .ok_or_else(|| {
                        ConversionError::ValueOutOfRange(format!(
                            "column `{}`: {days} days since epoch is not a valid date",
                            ctx.name
                        ))
                    })
            })
        }
        DataType::Timestamp => {
            let col = array
                .as_primitive_opt::<TimestampMicrosecondType>()
                .ok_or_else(|| layout_error(ctx, dt, array))?;
            collect_values(array, |i| ctx.tz.to_local(col.value(i)).map(Value::Timestamp))
        }
        DataType::Array { element, .. } => {
            let col = array
                .as_list_opt::<i32>()
                .ok_or_else(|| layout_error(ctx, dt, array))?;
            let children = read_array(element, col.values().as_ref(), ctx)?;
            split_by_offsets(array, col.value_offsets(), &children, Value::Array)
        }
        DataType::Map { key, value, .. } => {
            let col = array
                .as_map_opt()
                .ok_or_else(|| layout_error(ctx, dt, array))?;
            let keys = read_array(key, col.keys().as_ref(), ctx)?;
            let values = read_array(value, col.values().as_ref(), ctx)?;
            let entries: Vec<(Value, Value)> = keys.into_iter().zip(values).collect();
            split_by_offsets(array, col.value_offsets(), &entries, Value::Map)
        }
        DataType::UserDefined { .. } => Err(ConversionError::unsupported_from_arrow(data_type)),
    }
}
