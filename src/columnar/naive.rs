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
//! Row-at-a-time conversion.
//!
//! Accepts every type, including the ones the columnar path rejects, and
//! produces exactly the values a columnar round trip would: decimals are
//! rescaled to the field scale and timestamps are normalized through the
//! session time zone.

use std::sync::Arc;

use crate::columnar::builder::ColumnContext;
use crate::common::error::{ConversionError, Result};
use crate::common::logging::debug;
use crate::common::options::ConversionOptions;
use crate::common::timezone::TimeZoneSpec;
use crate::runtime::executor::partition_executor;
use crate::runtime::ordered_buffer::OrderedPartitionBuffer;
use crate::runtime::partition::PartitionSource;
use crate::types::{DataType, Dataset, LocalTable, Row, Schema, Value};

pub fn normalize_row(schema: &Schema, row: &Row, tz: &TimeZoneSpec) -> Result<Row> {
    if row.len() != schema.len() {
        return Err(ConversionError::SchemaMismatch(format!(
            "row has {} values but schema {} has {} fields",
            row.len(),
            schema,
            schema.len()
        )));
    }
    let values = schema
        .fields()
        .iter()
        .zip(row.values())
        .map(|(field, value)| {
            let ctx = ColumnContext {
                name: &field.name,
                tz,
            };
            normalize_value(&field.data_type, value, field.nullable, &ctx)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(values))
}

pub fn normalize_rows(schema: &Schema, rows: &[Row], tz: &TimeZoneSpec) -> Result<Vec<Row>> {
    rows.iter().map(|row| normalize_row(schema, row, tz)).collect()
}

fn normalize_value(
    data_type: &DataType,
    value: &Value,
    nullable: bool,
    ctx: &ColumnContext<'_>,
) -> Result<Value> {
    match (data_type, value) {
        (dt, Value::Null) => {
            if nullable {
                Ok(Value::Null)
            } else {
                Err(ctx.null_violation(dt))
            }
        }
        (DataType::UserDefined { .. }, v) => Ok(v.clone()),
        (DataType::Boolean, Value::Boolean(_))
        | (DataType::Int32, Value::Int32(_))
        | (DataType::Int64, Value::Int64(_))
        | (DataType::Float32, Value::Float32(_))
        | (DataType::Float64, Value::Float64(_))
        | (DataType::String, Value::String(_))
        | (DataType::Binary, Value::Binary(_))
        | (DataType::Date, Value::Date(_)) => Ok(value.clone()),
        (DataType::Decimal { precision, scale }, Value::Decimal(d)) => d
            .rescale(*scale)
            .filter(|d| d.fits(*precision))
            .map(Value::Decimal)
            .ok_or_else(|| ctx.decimal_overflow(data_type, &d.to_string())),
        (DataType::Timestamp, Value::Timestamp(t)) => ctx.tz.normalize(*t).map(Value::Timestamp),
        (
            DataType::Array {
                element,
                contains_null,
            },
            Value::Array(items),
        ) => items
            .iter()
            .map(|item| normalize_value(element, item, *contains_null, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        (
            DataType::Map {
                key,
                value: value_type,
                value_contains_null,
            },
            Value::Map(entries),
        ) => entries
            .iter()
            .map(|(k, v)| {
                Ok((
                    normalize_value(key, k, false, ctx)?,
                    normalize_value(value_type, v, *value_contains_null, ctx)?,
                ))
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Map),
        (dt, other) => Err(ctx.mismatch(dt, other)),
    }
}

/// Collect every partition of `source` in order, normalizing each row.
///
/// Partitions run on the shared executor; the result-size budget is charged
/// with the estimated row footprint.
pub fn collect_rows<S>(source: Arc<S>, options: &ConversionOptions) -> Result<Vec<Row>>
where
    S: PartitionSource + ?Sized + 'static,
{
    let schema = source.schema();
    let num_partitions = source.num_partitions();
    let buffer = Arc::new(OrderedPartitionBuffer::new(
        num_partitions,
        options.max_result_size,
    ));
    debug!(
        "collecting {} partitions row by row, schema {}",
        num_partitions, schema
    );
    let executor = partition_executor();
    for index in 0..num_partitions {
        let source = Arc::clone(&source);
        let schema = Arc::clone(&schema);
        let tz = options.time_zone;
        executor.submit(&buffer, index, move || {
            let rows = source
                .compute(index)
                .map_err(|message| ConversionError::PartitionFailed { index, message })?;
            let normalized = normalize_rows(&schema, &rows, &tz)?;
            let bytes = normalized
                .iter()
                .map(|row| row.estimated_size() as u64)
                .sum::<u64>();
            Ok((normalized, bytes))
        });
    }

    let mut out = Vec::new();
    while let Some(partition) = buffer.next() {
        match partition {
            Ok(rows) => out.extend(rows),
            Err(err) => {
                buffer.cancel();
                return Err(err);
            }
        }
    }
    Ok(out)
}

pub fn collect_local<S>(source: Arc<S>, options: &ConversionOptions) -> Result<LocalTable>
where
    S: PartitionSource + ?Sized + 'static,
{
    let schema = source.schema();
    let rows = collect_rows(source, options)?;
    LocalTable::try_new(schema, rows)
}

pub fn local_to_dataset(
    table: &LocalTable,
    num_partitions: usize,
    options: &ConversionOptions,
) -> Result<Dataset> {
    let schema = Arc::clone(table.schema());
    let rows = normalize_rows(&schema, table.rows(), &options.time_zone)?;
    Dataset::from_rows(schema, rows, num_partitions)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::types::{Decimal, StructField};

    fn schema() -> Schema {
        Schema::try_new(vec![
            StructField::new("d", DataType::decimal(10, 2), true),
            StructField::new("ts", DataType::array(DataType::Timestamp), true),
            StructField::new("u", DataType::user_defined("point"), true),
        ])
        .unwrap()
    }

    #[test]
    fn values_are_normalized() {
        let gap = NaiveDate::from_ymd_opt(2015, 3, 8)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let row = Row::new(vec![
            Value::Decimal("1.5".parse::<Decimal>().unwrap()),
            Value::Array(vec![gap.into(), Value::Null]),
            Value::String("opaque".to_string()),
        ]);
        let la = TimeZoneSpec::parse("America/Los_Angeles").unwrap();
        let out = normalize_row(&schema(), &row, &la).expect("normalize");
        let Value::Decimal(d) = out.values()[0].clone() else {
            panic!("decimal expected");
        };
        assert_eq!((d.unscaled(), d.scale()), (150, 2));
        let shifted = gap + chrono::TimeDelta::hours(1);
        assert_eq!(out.values()[1], Value::Array(vec![shifted.into(), Value::Null]));
        assert_eq!(out.values()[2], Value::String("opaque".to_string()));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let row = Row::new(vec![Value::Int32(1), Value::Null, Value::Null]);
        let err = normalize_row(&schema(), &row, &TimeZoneSpec::utc()).expect_err("mismatch");
        assert!(err.to_string().contains("column `d`"), "{err}");
    }

    #[test]
    fn collects_partitions_in_order() {
        let schema = Arc::new(
            Schema::try_new(vec![StructField::new("a", DataType::Int64, false)]).unwrap(),
        );
        let rows = (0..50i64).map(|i| Row::new(vec![i.into()])).collect();
        let dataset = Arc::new(Dataset::from_rows(schema, rows, 7).unwrap());
        let options = ConversionOptions::default();
        let out = collect_rows(dataset, &options).expect("collect");
        let got: Vec<Value> = out.iter().map(|r| r.values()[0].clone()).collect();
        let expected: Vec<Value> = (0..50i64).map(Value::from).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn budget_applies_to_row_path() {
        let schema = Arc::new(
            Schema::try_new(vec![StructField::new("a", DataType::Int64, false)]).unwrap(),
        );
        let rows = (0..1000i64).map(|i| Row::new(vec![i.into()])).collect();
        let dataset = Arc::new(Dataset::from_rows(schema, rows, 10).unwrap());
        let options = ConversionOptions::default().with_max_result_size(Some(1024));
        let err = collect_rows(dataset, &options).expect_err("over budget");
        assert!(err.to_string().contains("is bigger than"), "{err}");
    }
}
