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
//! Chooses between the Arrow path and the row path for a conversion.
//!
//! With Arrow enabled, only an unsupported-type failure is retried on the
//! row path, and only when fallback is enabled. Every other error reaches
//! the caller unchanged.

use std::fmt;
use std::sync::Arc;

use crate::columnar::{converter, naive};
use crate::common::error::{ConversionError, Result};
use crate::common::logging::{debug, warn};
use crate::common::options::ConversionOptions;
use crate::common::session_conf::{ARROW_ENABLED, ARROW_FALLBACK_ENABLED};
use crate::runtime::partition::PartitionSource;
use crate::types::{Dataset, LocalTable};

/// Which path produced a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionPath {
    /// Arrow was enabled and succeeded.
    Arrow,
    /// Arrow was disabled.
    Naive,
    /// Arrow failed on an unsupported type and the row path was used.
    Fallback,
}

/// User-visible notice attached to a result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionWarning {
    pub message: String,
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug)]
pub struct Converted<T> {
    pub value: T,
    pub path: ConversionPath,
    pub warnings: Vec<ConversionWarning>,
}

impl<T> Converted<T> {
    fn new(value: T, path: ConversionPath) -> Self {
        Self {
            value,
            path,
            warnings: Vec::new(),
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

fn fallback_warning(operation: &str, err: &ConversionError) -> ConversionWarning {
    ConversionWarning {
        message: format!(
            "{operation} attempted Arrow optimization because '{ARROW_ENABLED}' is set to true; \
             however, failed by the reason below:\n  {err}\n\
             Attempting non-optimization as '{ARROW_FALLBACK_ENABLED}' is set to true."
        ),
    }
}

/// Routing between the two conversion paths.
///
/// Holds no state; both switches come from the `ConversionOptions` passed to
/// each call.
pub struct FallbackController;

impl FallbackController {
    /// Run `arrow` or `naive` according to the switches in `options`.
    pub fn route<T>(
        options: &ConversionOptions,
        operation: &str,
        arrow: impl FnOnce() -> Result<T>,
        naive: impl FnOnce() -> Result<T>,
    ) -> Result<Converted<T>> {
        if !options.arrow_enabled {
            debug!("{operation}: arrow disabled, using row path");
            return naive().map(|value| Converted::new(value, ConversionPath::Naive));
        }
        match arrow() {
            Ok(value) => Ok(Converted::new(value, ConversionPath::Arrow)),
            Err(err) if err.is_unsupported_type() && options.fallback_enabled => {
                let warning = fallback_warning(operation, &err);
                warn!("{}", warning);
                let value = naive()?;
                Ok(Converted {
                    value,
                    path: ConversionPath::Fallback,
                    warnings: vec![warning],
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Materialize `source` into a caller-side table.
    pub fn to_local<S>(source: Arc<S>, options: &ConversionOptions) -> Result<Converted<LocalTable>>
    where
        S: PartitionSource + ?Sized + 'static,
    {
        Self::route(
            options,
            "toLocal",
            || converter::collect_local(Arc::clone(&source), options),
            || naive::collect_local(Arc::clone(&source), options),
        )
    }

    /// Distribute a caller-side table over `num_partitions` partitions.
    ///
    /// The result-size budget only bounds results collected to the caller,
    /// so it is not applied here.
    pub fn from_local(
        table: &LocalTable,
        num_partitions: usize,
        options: &ConversionOptions,
    ) -> Result<Converted<Dataset>> {
        let options = options.clone().with_max_result_size(None);
        Self::route(
            &options,
            "fromLocal",
            || converter::local_to_dataset(table, num_partitions, &options),
            || naive::local_to_dataset(table, num_partitions, &options),
        )
    }
}
