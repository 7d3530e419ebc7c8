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
use std::fmt;
use std::str::FromStr;

use crate::common::error::{ConversionError, Result};
use crate::common::timezone::TimeZoneSpec;

pub const DEFAULT_MAX_RECORDS_PER_BATCH: usize = 10_000;
pub const DEFAULT_MAX_RESULT_SIZE: u64 = 1 << 30;

/// Version of the Arrow format understood by the consumer of the batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FormatVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// Oldest version able to carry every native type.
pub const DEFAULT_FORMAT_VERSION: FormatVersion = FormatVersion::new(2, 0, 0);

impl FromStr for FormatVersion {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = [0u32; 3];
        let mut count = 0usize;
        for piece in s.trim().split('.') {
            if count == parts.len() {
                return Err(ConversionError::InvalidConfig(format!(
                    "format version '{s}' has more than three components"
                )));
            }
            parts[count] = piece.parse::<u32>().map_err(|e| {
                ConversionError::InvalidConfig(format!("invalid format version '{s}': {e}"))
            })?;
            count += 1;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Switches and limits for a single conversion call.
///
/// Built fresh from the session configuration for every call and passed down
/// explicitly; nothing in the pipeline reads configuration on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionOptions {
    pub arrow_enabled: bool,
    pub fallback_enabled: bool,
    pub max_records_per_batch: usize,
    pub time_zone: TimeZoneSpec,
    /// `None` means unlimited.
    pub max_result_size: Option<u64>,
    pub format_version: FormatVersion,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            arrow_enabled: false,
            fallback_enabled: true,
            max_records_per_batch: DEFAULT_MAX_RECORDS_PER_BATCH,
            time_zone: TimeZoneSpec::utc(),
            max_result_size: Some(DEFAULT_MAX_RESULT_SIZE),
            format_version: DEFAULT_FORMAT_VERSION,
        }
    }
}

impl ConversionOptions {
    pub fn with_arrow_enabled(mut self, enabled: bool) -> Self {
        self.arrow_enabled = enabled;
        self
    }

    pub fn with_fallback_enabled(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn with_max_records_per_batch(mut self, max_records: usize) -> Self {
        self.max_records_per_batch = max_records;
        self
    }

    pub fn with_time_zone(mut self, time_zone: TimeZoneSpec) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn with_max_result_size(mut self, max_bytes: Option<u64>) -> Self {
        self.max_result_size = max_bytes;
        self
    }

    pub fn with_format_version(mut self, version: FormatVersion) -> Self {
        self.format_version = version;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_records_per_batch == 0 {
            return Err(ConversionError::InvalidConfig(
                "arrow.maxRecordsPerBatch must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_versions() {
        assert_eq!("2".parse::<FormatVersion>().unwrap(), FormatVersion::new(2, 0, 0));
        assert_eq!(
            "1.0.1".parse::<FormatVersion>().unwrap(),
            FormatVersion::new(1, 0, 1)
        );
        assert!("1.0.0.0".parse::<FormatVersion>().is_err());
        assert!("one".parse::<FormatVersion>().is_err());
    }

    #[test]
    fn versions_order_numerically() {
        assert!(FormatVersion::new(1, 17, 0) < DEFAULT_FORMAT_VERSION);
        assert!(FormatVersion::new(10, 0, 0) > DEFAULT_FORMAT_VERSION);
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let options = ConversionOptions::default().with_max_records_per_batch(0);
        assert!(matches!(
            options.validate(),
            Err(ConversionError::InvalidConfig(_))
        ));
        assert!(ConversionOptions::default().validate().is_ok());
    }
}
