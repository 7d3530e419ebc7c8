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
//! End-to-end conversions between datasets, record batches and local tables.

mod common;

use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::TimestampMicrosecondType;
use arrowbridge::{
    ConversionError, ConversionOptions, ConversionPath, DataType, Dataset, FallbackController,
    LocalTable, Row, Schema, StructField, Value, dataset_to_columnar_batches, from_arrow_schema,
    from_columnar_batches, to_arrow_schema, to_columnar_batches,
};
use arrowbridge::common::options::DEFAULT_FORMAT_VERSION;
use common::*;

fn arrow_options() -> ConversionOptions {
    ConversionOptions::default()
        .with_arrow_enabled(true)
        .with_time_zone(los_angeles())
}

fn naive_options() -> ConversionOptions {
    arrow_options().with_arrow_enabled(false)
}

#[test]
fn nine_column_round_trip_matches_naive_path() {
    let schema = nine_column_schema();
    let rows = nine_column_rows();
    let dataset = Arc::new(assert_ok!(Dataset::from_rows(schema, rows.clone(), 3)));

    let arrow = assert_ok!(FallbackController::to_local(Arc::clone(&dataset), &arrow_options()));
    assert_eq!(arrow.path, ConversionPath::Arrow);
    assert!(arrow.warnings.is_empty());
    let naive = assert_ok!(FallbackController::to_local(dataset, &naive_options()));
    assert_eq!(naive.path, ConversionPath::Naive);

    assert_eq!(arrow.value.rows(), rows.as_slice());
    assert_eq!(arrow.value, naive.value);
    assert_eq!(
        arrow.value.column_names(),
        vec![
            "1_str_t",
            "2_int_t",
            "3_long_t",
            "4_float_t",
            "5_double_t",
            "6_decimal_t",
            "7_date_t",
            "8_timestamp_t",
            "9_binary_t"
        ]
    );
}

#[test]
fn batches_round_trip_for_any_batch_size() {
    let schema = nine_column_schema();
    let rows = nine_column_rows();
    let dataset = assert_ok!(Dataset::from_rows(schema, rows.clone(), 2));
    for max_records in [1usize, 2, 3, 4, 100] {
        let options = arrow_options().with_max_records_per_batch(max_records);
        let batches = assert_ok!(dataset_to_columnar_batches(&dataset, &options));
        assert!(batches.iter().all(|b| b.num_rows() <= max_records));
        let back = assert_ok!(from_columnar_batches(
            batches[0].schema().as_ref(),
            &batches,
            &options
        ));
        assert_eq!(back.collect_rows(), rows, "max_records={max_records}");
    }
}

#[test]
fn all_null_rows_stay_null() {
    let schema = nine_column_schema();
    let rows = vec![all_null_row(&schema), all_null_row(&schema)];
    let dataset = Arc::new(assert_ok!(Dataset::from_rows(schema, rows.clone(), 1)));
    let out = assert_ok!(FallbackController::to_local(dataset, &arrow_options()));
    assert_eq!(out.value.rows(), rows.as_slice());
    assert!(out.value.rows().iter().flat_map(|r| r.values()).all(Value::is_null));
}

#[test]
fn time_zone_changes_clock_reading_not_instant() {
    let schema = nine_column_schema();
    let dataset = assert_ok!(Dataset::from_rows(schema.clone(), nine_column_rows(), 1));
    let la = arrow_options();
    let ny = arrow_options().with_time_zone(new_york());

    let batches = assert_ok!(dataset_to_columnar_batches(&dataset, &la));
    let ts_index = assert_ok!(schema.index_of("8_timestamp_t").ok_or("missing column"));

    let instants_la: Vec<i64> = batches[0]
        .column(ts_index)
        .as_primitive::<TimestampMicrosecondType>()
        .values()
        .to_vec();

    // Reading the same instants in New York moves every clock reading by 3h.
    let in_ny = assert_ok!(from_columnar_batches(batches[0].schema().as_ref(), &batches, &ny));
    for (original, shifted) in dataset.rows().zip(in_ny.rows()) {
        let (Value::Timestamp(a), Value::Timestamp(b)) =
            (&original.values()[ts_index], &shifted.values()[ts_index])
        else {
            panic!("timestamps expected");
        };
        assert_eq!(*b - *a, chrono::TimeDelta::hours(3));
    }

    // Converting the New York readings under New York gives the same instants.
    let again = assert_ok!(dataset_to_columnar_batches(&in_ny, &ny));
    let instants_ny: Vec<i64> = again[0]
        .column(ts_index)
        .as_primitive::<TimestampMicrosecondType>()
        .values()
        .to_vec();
    assert_eq!(instants_la, instants_ny);
}

#[test]
fn empty_dataset_produces_one_empty_batch() {
    let schema = Arc::new(assert_ok!(Schema::try_new(vec![StructField::new(
        "field1",
        DataType::String,
        true
    )])));
    let stream = assert_ok!(to_columnar_batches(
        Arc::new(Dataset::empty(schema)),
        &arrow_options()
    ));
    let batches = assert_ok!(stream.collect_batches());
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].num_rows(), 0);
    assert_eq!(batches[0].num_columns(), 1);
    assert_eq!(batches[0].schema().field(0).name(), "field1");
}

#[test]
fn empty_schema_produces_zero_column_batch() {
    let dataset = Arc::new(Dataset::empty(Arc::new(Schema::empty())));
    let stream = assert_ok!(to_columnar_batches(dataset, &arrow_options()));
    let batches = assert_ok!(stream.collect_batches());
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].num_columns(), 0);
}

#[test]
fn nested_arrays_and_maps_round_trip() {
    let schema = Arc::new(assert_ok!(Schema::try_new(vec![
        StructField::new("ints", DataType::array(DataType::Int32), true),
        StructField::new(
            "nested",
            DataType::array(DataType::array(DataType::decimal(10, 2))),
            true
        ),
        StructField::new(
            "props",
            DataType::map(DataType::String, DataType::array(DataType::Float64)),
            true
        ),
    ])));
    let rows = vec![
        Row::new(vec![
            Value::Array(vec![Value::Int32(1), Value::Null, Value::Int32(3)]),
            Value::Array(vec![Value::Array(vec![decimal("1.25")]), Value::Null]),
            Value::Map(vec![
                ("a".into(), Value::Array(vec![Value::Float64(1.0)])),
                ("b".into(), Value::Null),
            ]),
        ]),
        Row::new(vec![Value::Null, Value::Null, Value::Null]),
        Row::new(vec![
            Value::Array(vec![]),
            Value::Array(vec![]),
            Value::Map(vec![]),
        ]),
    ];
    let dataset = Arc::new(assert_ok!(Dataset::from_rows(schema, rows.clone(), 2)));
    let arrow = assert_ok!(FallbackController::to_local(Arc::clone(&dataset), &arrow_options()));
    let naive = assert_ok!(FallbackController::to_local(dataset, &naive_options()));
    assert_eq!(arrow.path, ConversionPath::Arrow);
    assert_eq!(arrow.value.rows(), rows.as_slice());
    assert_eq!(arrow.value, naive.value);
}

#[test]
fn date_for_decimal_column_is_schema_mismatch_on_both_paths() {
    let schema = Arc::new(assert_ok!(Schema::try_new(vec![StructField::new(
        "6_decimal_t",
        DataType::decimal(38, 18),
        true
    )])));
    let table = assert_ok!(LocalTable::try_new(
        schema,
        vec![Row::new(vec![date(1969, 1, 1).into()])]
    ));
    for options in [arrow_options(), naive_options()] {
        let err = assert_err!(FallbackController::from_local(&table, 1, &options));
        assert!(matches!(err, ConversionError::SchemaMismatch(_)), "{err}");
        let msg = err.to_string();
        assert!(msg.contains("decimal(38,18)") && msg.contains("date"), "{msg}");
    }
}

#[test]
fn from_local_partitions_rows_evenly() {
    let schema = nine_column_schema();
    let rows = nine_column_rows();
    let table = assert_ok!(LocalTable::try_new(schema, rows.clone()));
    let arrow = assert_ok!(FallbackController::from_local(&table, 3, &arrow_options()));
    let naive = assert_ok!(FallbackController::from_local(&table, 3, &naive_options()));
    assert_eq!(arrow.value.num_partitions(), 3);
    let sizes: Vec<usize> = (0..3)
        .map(|i| arrow.value.partition(i).map_or(0, |p| p.len()))
        .collect();
    assert_eq!(sizes, vec![1, 1, 2]);
    assert_eq!(arrow.value.collect_rows(), rows);
    assert_eq!(naive.value.collect_rows(), rows);
}

#[test]
fn dst_transitions_agree_between_paths() {
    let schema = Arc::new(assert_ok!(Schema::try_new(vec![StructField::new(
        "ts",
        DataType::Timestamp,
        true
    )])));
    // Ambiguous fall-back hour, then a wall-clock reading inside the spring gap.
    let ambiguous = datetime(2015, 11, 1, 1, 30, 0);
    let gap = datetime(2015, 3, 8, 2, 30, 0);
    let rows = vec![Row::new(vec![ambiguous.into()]), Row::new(vec![gap.into()])];
    let dataset = Arc::new(assert_ok!(Dataset::from_rows(schema, rows, 1)));

    let arrow = assert_ok!(FallbackController::to_local(Arc::clone(&dataset), &arrow_options()));
    let naive = assert_ok!(FallbackController::to_local(dataset, &naive_options()));
    assert_eq!(arrow.value, naive.value);
    assert_eq!(arrow.value.rows()[0].values()[0], Value::Timestamp(ambiguous));
    assert_eq!(
        arrow.value.rows()[1].values()[0],
        Value::Timestamp(datetime(2015, 3, 8, 3, 30, 0))
    );
}

#[test]
fn schema_round_trips_through_arrow() {
    let schema = nine_column_schema();
    let arrow = assert_ok!(to_arrow_schema(&schema, DEFAULT_FORMAT_VERSION));
    let back = assert_ok!(from_arrow_schema(&arrow));
    assert_eq!(&back, schema.as_ref());
    assert_eq!(assert_ok!(to_arrow_schema(&back, DEFAULT_FORMAT_VERSION)), arrow);
}

#[test]
fn mismatched_batch_schema_is_rejected() {
    let dataset = assert_ok!(Dataset::from_rows(nine_column_schema(), nine_column_rows(), 1));
    let batches = assert_ok!(dataset_to_columnar_batches(&dataset, &arrow_options()));
    let other = assert_ok!(to_arrow_schema(
        &assert_ok!(Schema::try_new(vec![StructField::new("x", DataType::Int32, true)])),
        DEFAULT_FORMAT_VERSION
    ));
    let err = assert_err!(from_columnar_batches(&other, &batches, &arrow_options()));
    assert!(matches!(err, ConversionError::SchemaMismatch(_)));
    assert_eq!(batches[0].column(0).len(), 4);
}
