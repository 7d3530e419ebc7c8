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
use std::sync::Arc;

use crate::common::error::{ConversionError, Result};
use crate::runtime::partition::PartitionSource;
use crate::types::{SchemaRef, Value};

/// An immutable tuple of values, one per schema field.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Arc<[Value]>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn estimated_size(&self) -> usize {
        self.values.iter().map(Value::estimated_size).sum()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

fn check_arity(schema: &SchemaRef, rows: &[Row]) -> Result<()> {
    for (i, row) in rows.iter().enumerate() {
        if row.len() != schema.len() {
            return Err(ConversionError::SchemaMismatch(format!(
                "row {} has {} values but schema {} has {} fields",
                i,
                row.len(),
                schema,
                schema.len()
            )));
        }
    }
    Ok(())
}

/// Rows split into independently processed partitions.
///
/// Zero partitions is a distinct state from one partition with zero rows.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: SchemaRef,
    partitions: Vec<Arc<[Row]>>,
}

impl Dataset {
    pub fn try_new(schema: SchemaRef, partitions: Vec<Vec<Row>>) -> Result<Self> {
        for rows in &partitions {
            check_arity(&schema, rows)?;
        }
        Ok(Self {
            schema,
            partitions: partitions.into_iter().map(Into::into).collect(),
        })
    }

    /// Slice `rows` into `num_partitions` contiguous ranges of near-equal size.
    pub fn from_rows(schema: SchemaRef, rows: Vec<Row>, num_partitions: usize) -> Result<Self> {
        check_arity(&schema, &rows)?;
        let total = rows.len();
        if num_partitions == 0 && total > 0 {
            return Err(ConversionError::InvalidConfig(format!(
                "cannot place {total} rows into zero partitions"
            )));
        }
        let mut partitions: Vec<Arc<[Row]>> = Vec::with_capacity(num_partitions);
        let mut rows = rows.into_iter();
        for i in 0..num_partitions {
            let start = i * total / num_partitions;
            let end = (i + 1) * total / num_partitions;
            partitions.push(rows.by_ref().take(end - start).collect::<Vec<_>>().into());
        }
        Ok(Self { schema, partitions })
    }

    /// A dataset with no partitions at all.
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            partitions: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, index: usize) -> Option<&[Row]> {
        self.partitions.get(index).map(|p| p.as_ref())
    }

    pub fn num_rows(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.partitions.iter().flat_map(|p| p.iter())
    }

    pub fn collect_rows(&self) -> Vec<Row> {
        self.rows().cloned().collect()
    }
}

impl PartitionSource for Dataset {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    fn compute(&self, index: usize) -> std::result::Result<Arc<[Row]>, String> {
        self.partitions
            .get(index)
            .cloned()
            .ok_or_else(|| format!("partition index {index} out of range"))
    }
}

/// A fully materialized, caller-side table.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTable {
    schema: SchemaRef,
    rows: Vec<Row>,
}

impl LocalTable {
    pub fn try_new(schema: SchemaRef, rows: Vec<Row>) -> Result<Self> {
        check_arity(&schema, &rows)?;
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.names()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
