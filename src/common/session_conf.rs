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
//! Mutable key-value configuration namespace of a session.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::common::app_config::{self, ConversionConfig};
use crate::common::byte_size::parse_result_size_limit;
use crate::common::error::{ConversionError, Result};
use crate::common::logging::warn;
use crate::common::options::{ConversionOptions, FormatVersion};
use crate::common::timezone::TimeZoneSpec;

pub const ARROW_ENABLED: &str = "arrow.enabled";
pub const ARROW_FALLBACK_ENABLED: &str = "arrow.fallback.enabled";
pub const ARROW_MAX_RECORDS_PER_BATCH: &str = "arrow.maxRecordsPerBatch";
pub const ARROW_FORMAT_VERSION: &str = "arrow.formatVersion";
pub const SESSION_TIME_ZONE: &str = "session.timeZone";
pub const DRIVER_MAX_RESULT_SIZE: &str = "driver.maxResultSize";

const ALIASES: &[(&str, &str)] = &[
    ("arrow.pyspark.enabled", ARROW_ENABLED),
    ("arrow.pyspark.fallback.enabled", ARROW_FALLBACK_ENABLED),
];

fn canonical_key(key: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(key)
}

#[derive(Debug, Default)]
pub struct SessionConf {
    entries: RwLock<HashMap<String, String>>,
}

impl SessionConf {
    /// A namespace seeded from the process-wide configuration file.
    pub fn new() -> Self {
        match app_config::config() {
            Ok(cfg) => Self::from_config(&cfg.conversion),
            Err(err) => {
                warn!("failed to load arrowbridge config, using defaults: {err:#}");
                Self::from_config(&ConversionConfig::default())
            }
        }
    }

    pub fn from_config(cfg: &ConversionConfig) -> Self {
        let conf = Self::default();
        conf.set(ARROW_ENABLED, cfg.arrow_enabled);
        conf.set(ARROW_FALLBACK_ENABLED, cfg.fallback_enabled);
        conf.set(ARROW_MAX_RECORDS_PER_BATCH, cfg.max_records_per_batch);
        conf.set(SESSION_TIME_ZONE, &cfg.time_zone);
        conf.set(DRIVER_MAX_RESULT_SIZE, &cfg.max_result_size);
        conf.set(ARROW_FORMAT_VERSION, &cfg.arrow_format_version);
        conf
    }

    pub fn set(&self, key: &str, value: impl ToString) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(canonical_key(key).to_string(), value.to_string());
    }

    pub fn unset(&self, key: &str) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(canonical_key(key));
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard.get(canonical_key(key)).cloned()
    }

    /// Run `f` with temporary overrides, restoring the previous values after,
    /// also when `f` panics.
    pub fn with_overrides<R>(&self, overrides: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let previous = overrides
            .iter()
            .map(|(key, value)| {
                let old = self.get(key);
                self.set(key, value);
                (key.to_string(), old)
            })
            .collect();
        let _restore = RestoreGuard {
            conf: self,
            previous,
        };
        f()
    }

    /// Snapshot the current values into validated options.
    ///
    /// Called at the start of every conversion so later changes to the
    /// namespace only affect later conversions.
    pub fn conversion_options(&self) -> Result<ConversionOptions> {
        let mut options = ConversionOptions::default();

        if let Some(v) = self.get(ARROW_ENABLED) {
            options.arrow_enabled = parse_bool(ARROW_ENABLED, &v)?;
        }
        if let Some(v) = self.get(ARROW_FALLBACK_ENABLED) {
            options.fallback_enabled = parse_bool(ARROW_FALLBACK_ENABLED, &v)?;
        }
        if let Some(v) = self.get(ARROW_MAX_RECORDS_PER_BATCH) {
            let n = v.trim().parse::<i64>().map_err(|e| {
                ConversionError::InvalidConfig(format!(
                    "{ARROW_MAX_RECORDS_PER_BATCH} must be an integer, got '{v}': {e}"
                ))
            })?;
            if n <= 0 {
                return Err(ConversionError::InvalidConfig(format!(
                    "{ARROW_MAX_RECORDS_PER_BATCH} must be positive, got {n}"
                )));
            }
            options.max_records_per_batch = usize::try_from(n).map_err(|_| {
                ConversionError::InvalidConfig(format!(
                    "{ARROW_MAX_RECORDS_PER_BATCH} is too large: {n}"
                ))
            })?;
        }
        if let Some(v) = self.get(SESSION_TIME_ZONE) {
            options.time_zone = TimeZoneSpec::parse(&v)?;
        }
        if let Some(v) = self.get(DRIVER_MAX_RESULT_SIZE) {
            options.max_result_size = parse_result_size_limit(&v)?;
        }
        if let Some(v) = self.get(ARROW_FORMAT_VERSION) {
            options.format_version = v.parse::<FormatVersion>()?;
        }
        options.validate()?;
        Ok(options)
    }
}

struct RestoreGuard<'a> {
    conf: &'a SessionConf,
    previous: Vec<(String, Option<String>)>,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        for (key, old) in self.previous.drain(..).rev() {
            match old {
                Some(value) => self.conf.set(&key, value),
                None => self.conf.unset(&key),
            }
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConversionError::InvalidConfig(format!(
            "{key} should be boolean, but was '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_keys() {
        let conf = SessionConf::new();
        conf.set("arrow.pyspark.enabled", "true");
        assert_eq!(conf.get(ARROW_ENABLED).as_deref(), Some("true"));
        conf.set(ARROW_FALLBACK_ENABLED, "false");
        assert_eq!(
            conf.get("arrow.pyspark.fallback.enabled").as_deref(),
            Some("false")
        );
    }

    #[test]
    fn options_reflect_current_values() {
        let conf = SessionConf::new();
        conf.set(ARROW_ENABLED, "TRUE");
        conf.set(ARROW_MAX_RECORDS_PER_BATCH, 2);
        conf.set(SESSION_TIME_ZONE, "America/New_York");
        conf.set(DRIVER_MAX_RESULT_SIZE, "10k");
        let options = conf.conversion_options().expect("options");
        assert!(options.arrow_enabled);
        assert!(options.fallback_enabled);
        assert_eq!(options.max_records_per_batch, 2);
        assert_eq!(options.time_zone.to_string(), "America/New_York");
        assert_eq!(options.max_result_size, Some(10 * 1024));
    }

    #[test]
    fn non_positive_batch_size_is_rejected() {
        let conf = SessionConf::new();
        for bad in ["0", "-3", "ten"] {
            conf.set(ARROW_MAX_RECORDS_PER_BATCH, bad);
            let err = conf.conversion_options().expect_err(bad);
            assert!(matches!(err, ConversionError::InvalidConfig(_)), "{bad}");
        }
    }

    #[test]
    fn unknown_time_zone_is_rejected() {
        let conf = SessionConf::new();
        conf.set(SESSION_TIME_ZONE, "Nowhere/Special");
        assert!(matches!(
            conf.conversion_options(),
            Err(ConversionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn overrides_are_restored() {
        let conf = SessionConf::new();
        conf.unset(SESSION_TIME_ZONE);
        let seen = conf.with_overrides(
            &[(ARROW_ENABLED, "true"), (SESSION_TIME_ZONE, "Asia/Tokyo")],
            || conf.conversion_options().expect("options"),
        );
        assert!(seen.arrow_enabled);
        assert_eq!(seen.time_zone.to_string(), "Asia/Tokyo");
        assert_eq!(conf.get(ARROW_ENABLED).as_deref(), Some("false"));
        assert_eq!(conf.get(SESSION_TIME_ZONE), None);
    }

    #[test]
    fn overrides_are_restored_after_panic() {
        let conf = SessionConf::new();
        conf.set(SESSION_TIME_ZONE, "UTC");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            conf.with_overrides(
                &[(ARROW_ENABLED, "true"), (SESSION_TIME_ZONE, "Asia/Tokyo")],
                || -> bool { panic!("conversion failed") },
            )
        }));
        assert!(result.is_err());
        assert_eq!(conf.get(ARROW_ENABLED).as_deref(), Some("false"));
        assert_eq!(conf.get(SESSION_TIME_ZONE).as_deref(), Some("UTC"));
    }

    #[test]
    fn bad_boolean_is_rejected() {
        let conf = SessionConf::new();
        conf.set(ARROW_ENABLED, "yes");
        assert!(conf.conversion_options().is_err());
    }
}
