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
//! Error types for row/columnar conversion.

use arrow::error::ArrowError;
use thiserror::Error;

/// Errors raised by the conversion pipeline.
///
/// Only [`ConversionError::UnsupportedType`] is ever caught by the fallback
/// controller; every other kind reaches the caller unchanged.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// A type has no columnar representation.
    #[error("{0}")]
    UnsupportedType(String),

    /// A value disagrees with the declared type of its column.
    #[error("{0}")]
    SchemaMismatch(String),

    /// The materialized result is larger than the configured byte budget.
    #[error("{0}")]
    ResultSizeExceeded(String),

    /// The Arrow format version in use is too old for a requested type.
    #[error("{0}")]
    VersionUnsupported(String),

    /// A configuration value is missing, malformed or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A value cannot be represented in the target form (e.g. a timestamp
    /// outside the range of the clock type).
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    /// The engine failed while producing a partition.
    #[error("partition {index} failed: {message}")]
    PartitionFailed { index: usize, message: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl ConversionError {
    pub fn unsupported_to_arrow(type_name: impl std::fmt::Display) -> Self {
        Self::UnsupportedType(format!(
            "Unsupported type in conversion to Arrow: {type_name}"
        ))
    }

    pub fn unsupported_from_arrow(type_name: impl std::fmt::Display) -> Self {
        Self::UnsupportedType(format!(
            "Unsupported type in conversion from Arrow: {type_name}"
        ))
    }

    pub fn is_unsupported_type(&self) -> bool {
        matches!(self, Self::UnsupportedType(_))
    }
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;
