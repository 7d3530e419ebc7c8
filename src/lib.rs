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
pub mod columnar;
pub mod common;
pub mod fallback;
pub mod runtime;
pub mod types;

// `arrowbridge_*` convenience aliases.
pub use common::app_config as arrowbridge_config;
pub use common::logging as arrowbridge_logging;

pub use columnar::{
    ColumnarBatchStream, dataset_to_columnar_batches, from_arrow_schema, from_columnar_batches,
    to_arrow_schema, to_columnar_batches,
};
pub use common::error::{ConversionError, Result};
pub use common::options::{ConversionOptions, FormatVersion};
pub use common::session_conf::SessionConf;
pub use common::timezone::TimeZoneSpec;
pub use fallback::{ConversionPath, ConversionWarning, Converted, FallbackController};
pub use runtime::partition::PartitionSource;
pub use types::{DataType, Dataset, Decimal, LocalTable, Row, Schema, SchemaRef, StructField, Value};
