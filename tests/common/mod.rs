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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use arrowbridge::arrowbridge_config::AppConfig;
use arrowbridge::arrowbridge_logging;
use arrowbridge::{
    DataType, Decimal, PartitionSource, Row, Schema, SchemaRef, StructField, TimeZoneSpec, Value,
};

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    /// Create a new test configuration with default settings.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_content(
            r#"
log_level = "debug"

[conversion]
arrow_enabled = true
fallback_enabled = true
max_records_per_batch = 10000
time_zone = "America/Los_Angeles"
max_result_size = "1g"
arrow_format_version = "2.0.0"
"#,
        )
    }

    pub fn with_content(content: &str) -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_arrowbridge.toml");
        std::fs::write(&config_path, content)?;
        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    /// Initialize logging for tests.
    pub fn init_logging(&self) {
        let cfg = self.load_config().expect("Failed to load test config");
        arrowbridge_logging::init_from_config(&cfg);
    }

    /// Load the test configuration without touching the process-wide one.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        AppConfig::load_from_file(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

pub fn los_angeles() -> TimeZoneSpec {
    TimeZoneSpec::parse("America/Los_Angeles").expect("zone")
}

pub fn new_york() -> TimeZoneSpec {
    TimeZoneSpec::parse("America/New_York").expect("zone")
}

pub fn datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .and_then(|date| date.and_hms_opt(h, mi, s))
        .expect("valid datetime")
}

pub fn date(y: i32, mo: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, d).expect("valid date")
}

pub fn decimal(s: &str) -> Value {
    Value::Decimal(s.parse::<Decimal>().expect("decimal"))
}

/// String, int, long, float, double, decimal(38,18), date, timestamp, binary.
pub fn nine_column_schema() -> SchemaRef {
    Arc::new(
        Schema::try_new(vec![
            StructField::new("1_str_t", DataType::String, true),
            StructField::new("2_int_t", DataType::Int32, true),
            StructField::new("3_long_t", DataType::Int64, true),
            StructField::new("4_float_t", DataType::Float32, true),
            StructField::new("5_double_t", DataType::Float64, true),
            StructField::new("6_decimal_t", DataType::decimal(38, 18), true),
            StructField::new("7_date_t", DataType::Date, true),
            StructField::new("8_timestamp_t", DataType::Timestamp, true),
            StructField::new("9_binary_t", DataType::Binary, true),
        ])
        .expect("schema"),
    )
}

pub fn nine_column_rows() -> Vec<Row> {
    vec![
        Row::new(vec![
            "a".into(),
            Value::Int32(1),
            Value::Int64(10),
            Value::Float32(0.2),
            Value::Float64(2.0),
            decimal("2.0"),
            date(1969, 1, 1).into(),
            datetime(1969, 1, 1, 1, 1, 1).into(),
            Value::Binary(b"a".to_vec()),
        ]),
        Row::new(vec![
            "b".into(),
            Value::Int32(2),
            Value::Int64(20),
            Value::Float32(0.4),
            Value::Float64(4.0),
            decimal("4.0"),
            date(2012, 2, 2).into(),
            datetime(2012, 2, 2, 2, 2, 2).into(),
            Value::Binary(b"bb".to_vec()),
        ]),
        Row::new(vec![
            "c".into(),
            Value::Int32(3),
            Value::Int64(30),
            Value::Float32(0.8),
            Value::Float64(6.0),
            decimal("6.0"),
            date(2100, 3, 3).into(),
            datetime(2100, 3, 3, 3, 3, 3).into(),
            Value::Binary(b"ccc".to_vec()),
        ]),
        Row::new(vec![
            "d".into(),
            Value::Int32(4),
            Value::Int64(0),
            Value::Float32(0.8),
            Value::Float64(8.0),
            decimal("8.0"),
            date(2262, 4, 12).into(),
            datetime(2262, 3, 3, 3, 3, 3).into(),
            Value::Binary(b"dddd".to_vec()),
        ]),
    ]
}

pub fn all_null_row(schema: &Schema) -> Row {
    Row::new(vec![Value::Null; schema.len()])
}

/// A source whose partition 0 is held back for `delay`.
pub struct DelayedSource {
    schema: SchemaRef,
    partitions: Vec<Arc<[Row]>>,
    delay: Duration,
    failing: Option<(usize, String)>,
}

impl DelayedSource {
    pub fn new(schema: SchemaRef, partitions: Vec<Vec<Row>>, delay: Duration) -> Self {
        Self {
            schema,
            partitions: partitions.into_iter().map(Into::into).collect(),
            delay,
            failing: None,
        }
    }

    pub fn failing_at(mut self, index: usize, message: &str) -> Self {
        self.failing = Some((index, message.to_string()));
        self
    }
}

impl PartitionSource for DelayedSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    fn compute(&self, index: usize) -> Result<Arc<[Row]>, String> {
        if index == 0 {
            std::thread::sleep(self.delay);
        }
        if let Some((failing, message)) = &self.failing
            && *failing == index
        {
            return Err(message.clone());
        }
        self.partitions
            .get(index)
            .cloned()
            .ok_or_else(|| format!("no partition {index}"))
    }
}

/// Run `f` and fail the test if it does not finish within `timeout`.
pub fn run_with_timeout<F, T>(timeout: Duration, f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    use std::sync::mpsc;

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });

    match rx.recv_timeout(timeout) {
        Ok(v) => v,
        Err(_) => panic!("test timed out after {:?}", timeout),
    }
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}
