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

use crate::types::{Row, SchemaRef};

/// Row producer owned by the engine.
///
/// Partitions may be computed concurrently and in any order; each call must
/// be independent of the others.
pub trait PartitionSource: Send + Sync {
    fn schema(&self) -> SchemaRef;

    fn num_partitions(&self) -> usize;

    /// Rows of one partition, or the engine's error message.
    fn compute(&self, index: usize) -> Result<Arc<[Row]>, String>;
}
