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
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

/// Process-wide configuration, read once from `$ARROWBRIDGE_CONFIG` or
/// `./arrowbridge.toml`. Defaults apply when neither exists.
pub fn init_from_env_or_default() -> Result<&'static AppConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = match config_path_from_env_or_default() {
        Some(path) => AppConfig::load_from_file(&path)?,
        None => AppConfig::default(),
    };
    let _ = CONFIG.set(cfg);
    CONFIG.get().ok_or_else(|| anyhow!("config not initialized"))
}

pub fn config() -> Result<&'static AppConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("ARROWBRIDGE_CONFIG")
        && !p.trim().is_empty()
    {
        return Some(PathBuf::from(p));
    }
    let local = PathBuf::from("arrowbridge.toml");
    local.exists().then_some(local)
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "arrowbridge=debug"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub conversion: ConversionConfig,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("parse toml: {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn effective_log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(&self.log_level)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            conversion: ConversionConfig::default(),
        }
    }
}

/// Initial values for the session configuration namespace.
///
/// Values stay as written in the file; they are validated when a session
/// builds its conversion options.
#[derive(Clone, Debug, Deserialize)]
pub struct ConversionConfig {
    #[serde(default)]
    pub arrow_enabled: bool,
    #[serde(default = "default_fallback_enabled")]
    pub fallback_enabled: bool,
    #[serde(default = "default_max_records_per_batch")]
    pub max_records_per_batch: i64,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_max_result_size")]
    pub max_result_size: String,
    #[serde(default = "default_arrow_format_version")]
    pub arrow_format_version: String,
}

fn default_fallback_enabled() -> bool {
    true
}
fn default_max_records_per_batch() -> i64 {
    10_000
}
fn default_time_zone() -> String {
    "UTC".to_string()
}
fn default_max_result_size() -> String {
    "1g".to_string()
}
fn default_arrow_format_version() -> String {
    "2.0.0".to_string()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            arrow_enabled: false,
            fallback_enabled: default_fallback_enabled(),
            max_records_per_batch: default_max_records_per_batch(),
            time_zone: default_time_zone(),
            max_result_size: default_max_result_size(),
            arrow_format_version: default_arrow_format_version(),
        }
    }
}
