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
//! Engine-side (row form) data model.

pub mod dataset;
pub mod value;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::common::error::{ConversionError, Result};

pub use dataset::{Dataset, LocalTable, Row};
pub use value::{Decimal, Value};

pub const MAX_DECIMAL_PRECISION: u8 = 38;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal {
        precision: u8,
        scale: u8,
    },
    /// Calendar date without a time zone.
    Date,
    /// Naive clock reading; interpreted in the session time zone.
    Timestamp,
    Binary,
    Array {
        element: Box<DataType>,
        contains_null: bool,
    },
    Map {
        key: Box<DataType>,
        value: Box<DataType>,
        value_contains_null: bool,
    },
    /// A type registered by the engine with no columnar representation.
    UserDefined {
        name: String,
    },
}

impl DataType {
    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self::Decimal { precision, scale }
    }

    pub fn array(element: DataType) -> Self {
        Self::Array {
            element: Box::new(element),
            contains_null: true,
        }
    }

    pub fn map(key: DataType, value: DataType) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
            value_contains_null: true,
        }
    }

    pub fn user_defined(name: impl Into<String>) -> Self {
        Self::UserDefined { name: name.into() }
    }

    /// Whether a timestamp appears anywhere inside this type.
    pub fn contains_timestamp(&self) -> bool {
        match self {
            Self::Timestamp => true,
            Self::Array { element, .. } => element.contains_timestamp(),
            Self::Map { key, value, .. } => key.contains_timestamp() || value.contains_timestamp(),
            _ => false,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Decimal { precision, scale } => {
                if *precision == 0 || *precision > MAX_DECIMAL_PRECISION || scale > precision {
                    return Err(ConversionError::SchemaMismatch(format!(
                        "invalid decimal({precision},{scale}): precision must be in 1..={MAX_DECIMAL_PRECISION} and scale must not exceed it"
                    )));
                }
                Ok(())
            }
            Self::Array { element, .. } => element.validate(),
            Self::Map { key, value, .. } => {
                key.validate()?;
                value.validate()
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("boolean"),
            Self::String => f.write_str("string"),
            Self::Int32 => f.write_str("int"),
            Self::Int64 => f.write_str("bigint"),
            Self::Float32 => f.write_str("float"),
            Self::Float64 => f.write_str("double"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Self::Date => f.write_str("date"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Binary => f.write_str("binary"),
            Self::Array { element, .. } => write!(f, "array<{element}>"),
            Self::Map { key, value, .. } => write!(f, "map<{key},{value}>"),
            Self::UserDefined { name } => write!(f, "udt<{name}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl StructField {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Ordered, uniquely named fields. Field order is column order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<StructField>,
}

pub type SchemaRef = Arc<Schema>;

impl Schema {
    pub fn try_new(fields: Vec<StructField>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ConversionError::SchemaMismatch(format!(
                    "duplicate field name `{}` in schema",
                    field.name
                )));
            }
            field.data_type.validate()?;
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&StructField> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("struct<")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", field.name, field.data_type)?;
        }
        f.write_str(">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_names() {
        let err = Schema::try_new(vec![
            StructField::new("a", DataType::Int32, true),
            StructField::new("a", DataType::String, true),
        ])
        .expect_err("duplicate");
        assert!(err.to_string().contains("duplicate field name `a`"));
    }

    #[test]
    fn rejects_invalid_decimal() {
        for dt in [
            DataType::decimal(0, 0),
            DataType::decimal(39, 2),
            DataType::decimal(5, 6),
            DataType::array(DataType::decimal(40, 0)),
        ] {
            let schema = Schema::try_new(vec![StructField::new("d", dt.clone(), true)]);
            assert!(schema.is_err(), "{dt}");
        }
    }

    #[test]
    fn display_uses_simple_strings() {
        let schema = Schema::try_new(vec![
            StructField::new("a", DataType::array(DataType::Timestamp), true),
            StructField::new("m", DataType::map(DataType::String, DataType::Int64), true),
            StructField::new("d", DataType::decimal(38, 18), true),
        ])
        .expect("schema");
        assert_eq!(
            schema.to_string(),
            "struct<a:array<timestamp>,m:map<string,bigint>,d:decimal(38,18)>"
        );
    }

    #[test]
    fn finds_nested_timestamps() {
        assert!(DataType::array(DataType::Timestamp).contains_timestamp());
        assert!(
            DataType::map(DataType::String, DataType::array(DataType::Timestamp))
                .contains_timestamp()
        );
        assert!(!DataType::array(DataType::Date).contains_timestamp());
    }
}
