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
//! Mapping between native schemas and Arrow schemas.
//!
//! | native            | Arrow                                   |
//! |-------------------|-----------------------------------------|
//! | boolean           | Boolean                                 |
//! | string            | Utf8                                    |
//! | int / bigint      | Int32 / Int64                           |
//! | float / double    | Float32 / Float64                       |
//! | decimal(p,s)      | Decimal128(p,s)                         |
//! | date              | Date32                                  |
//! | timestamp         | Timestamp(Microsecond, "UTC")           |
//! | binary            | Binary                                  |
//! | array<T>          | List<item: T>                           |
//! | map<K,V>          | Map<entries: Struct<key: K, value: V>>  |
//!
//! Timestamps nested in arrays or maps and user-defined types have no
//! mapping. Maps need Arrow format version 2.0.0 or newer.

use std::sync::Arc;

use arrow::datatypes::{
    DataType as ArrowDataType, Field, Fields, Schema as ArrowSchema, TimeUnit,
};

use crate::common::error::{ConversionError, Result};
use crate::common::options::FormatVersion;
use crate::types::{DataType, Schema, StructField};

pub const TIMESTAMP_TIME_ZONE: &str = "UTC";
pub const LIST_ITEM_NAME: &str = "item";
pub const MAP_ENTRIES_NAME: &str = "entries";
pub const MAP_KEY_NAME: &str = "key";
pub const MAP_VALUE_NAME: &str = "value";
pub const MAP_MIN_FORMAT_VERSION: FormatVersion = FormatVersion::new(2, 0, 0);

pub fn to_arrow_schema(schema: &Schema, version: FormatVersion) -> Result<ArrowSchema> {
    let fields = schema
        .fields()
        .iter()
        .map(|f| to_arrow_field(f, version))
        .collect::<Result<Vec<_>>>()?;
    Ok(ArrowSchema::new(fields))
}

pub fn to_arrow_field(field: &StructField, version: FormatVersion) -> Result<Field> {
    Ok(Field::new(
        field.name.as_str(),
        to_arrow_type(&field.data_type, version)?,
        field.nullable,
    ))
}

pub fn to_arrow_type(data_type: &DataType, version: FormatVersion) -> Result<ArrowDataType> {
    let out = match data_type {
        DataType::Boolean => ArrowDataType::Boolean,
        DataType::String => ArrowDataType::Utf8,
        DataType::Int32 => ArrowDataType::Int32,
        DataType::Int64 => ArrowDataType::Int64,
        DataType::Float32 => ArrowDataType::Float32,
        DataType::Float64 => ArrowDataType::Float64,
        DataType::Decimal { precision, scale } => {
            let scale = i8::try_from(*scale)
                .map_err(|_| ConversionError::unsupported_to_arrow(data_type))?;
            ArrowDataType::Decimal128(*precision, scale)
        }
        DataType::Date => ArrowDataType::Date32,
        DataType::Timestamp => {
            ArrowDataType::Timestamp(TimeUnit::Microsecond, Some(TIMESTAMP_TIME_ZONE.into()))
        }
        DataType::Binary => ArrowDataType::Binary,
        DataType::Array {
            element,
            contains_null,
        } => {
            if element.contains_timestamp() {
                return Err(ConversionError::unsupported_to_arrow(data_type));
            }
            ArrowDataType::List(Arc::new(Field::new(
                LIST_ITEM_NAME,
                to_arrow_type(element, version)?,
                *contains_null,
            )))
        }
        DataType::Map {
            key,
            value,
            value_contains_null,
        } => {
            if version < MAP_MIN_FORMAT_VERSION {
                return Err(ConversionError::VersionUnsupported(format!(
                    "MapType is only supported with Arrow format version {MAP_MIN_FORMAT_VERSION} and above, found {version}"
                )));
            }
            if key.contains_timestamp() || value.contains_timestamp() {
                return Err(ConversionError::unsupported_to_arrow(data_type));
            }
            map_type(
                to_arrow_type(key, version)?,
                to_arrow_type(value, version)?,
                *value_contains_null,
            )
        }
        DataType::UserDefined { .. } => {
            return Err(ConversionError::unsupported_to_arrow(data_type));
        }
    };
    Ok(out)
}

fn map_type(key: ArrowDataType, value: ArrowDataType, value_contains_null: bool) -> ArrowDataType {
    let entries = Fields::from(vec![
        Field::new(MAP_KEY_NAME, key, false),
        Field::new(MAP_VALUE_NAME, value, value_contains_null),
    ]);
    ArrowDataType::Map(
        Arc::new(Field::new(
            MAP_ENTRIES_NAME,
            ArrowDataType::Struct(entries),
            false,
        )),
        false,
    )
}

pub fn from_arrow_schema(schema: &ArrowSchema) -> Result<Schema> {
    let fields = schema
        .fields()
        .iter()
        .map(|f| from_arrow_field(f))
        .collect::<Result<Vec<_>>>()?;
    Schema::try_new(fields)
}

pub fn from_arrow_field(field: &Field) -> Result<StructField> {
    Ok(StructField::new(
        field.name().as_str(),
        from_arrow_type(field.data_type())?,
        field.is_nullable(),
    ))
}

pub fn from_arrow_type(data_type: &ArrowDataType) -> Result<DataType> {
    let out = match data_type {
        ArrowDataType::Boolean => DataType::Boolean,
        ArrowDataType::Utf8 => DataType::String,
        ArrowDataType::Int32 => DataType::Int32,
        ArrowDataType::Int64 => DataType::Int64,
        ArrowDataType::Float32 => DataType::Float32,
        ArrowDataType::Float64 => DataType::Float64,
        ArrowDataType::Decimal128(precision, scale) => {
            let scale = u8::try_from(*scale)
                .map_err(|_| ConversionError::unsupported_from_arrow(data_type))?;
            DataType::Decimal {
                precision: *precision,
                scale,
            }
        }
        ArrowDataType::Date32 => DataType::Date,
        ArrowDataType::Timestamp(TimeUnit::Microsecond, _) => DataType::Timestamp,
        ArrowDataType::Binary => DataType::Binary,
        ArrowDataType::List(item) => {
            let element = from_arrow_type(item.data_type())?;
            if element.contains_timestamp() {
                return Err(ConversionError::unsupported_from_arrow(data_type));
            }
            DataType::Array {
                element: Box::new(element),
                contains_null: item.is_nullable(),
            }
        }
        ArrowDataType::Map(entries, _) => {
            let ArrowDataType::Struct(fields) = entries.data_type() else {
                return Err(ConversionError::unsupported_from_arrow(data_type));
            };
            if fields.len() != 2 {
                return Err(ConversionError::unsupported_from_arrow(data_type));
            }
            let (key, value) = (&fields[0], &fields[1]);
            let key_type = from_arrow_type(key.data_type())?;
            let value_type = from_arrow_type(value.data_type())?;
            if key_type.contains_timestamp() || value_type.contains_timestamp() {
                return Err(ConversionError::unsupported_from_arrow(data_type));
            }
            DataType::Map {
                key: Box::new(key_type),
                value: Box::new(value_type),
                value_contains_null: value.is_nullable(),
            }
        }
        other => return Err(ConversionError::unsupported_from_arrow(other)),
    };
    Ok(out)
}
