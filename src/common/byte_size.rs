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
use crate::common::error::{ConversionError, Result};

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;
const TIB: u64 = 1 << 40;
const PIB: u64 = 1 << 50;

/// Parse a JVM-style byte string such as `10k`, `512mb` or `1g`.
///
/// Suffixes are binary multiples; a bare number is a byte count.
pub fn parse_byte_size(raw: &str) -> Result<u64> {
    let text = raw.trim().to_ascii_lowercase();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, suffix) = text.split_at(split);
    if digits.is_empty() {
        return Err(ConversionError::InvalidConfig(format!(
            "byte size '{raw}' must start with a number"
        )));
    }
    let value = digits.parse::<u64>().map_err(|e| {
        ConversionError::InvalidConfig(format!("invalid byte size '{raw}': {e}"))
    })?;
    let multiplier = match suffix.trim() {
        "" | "b" => 1,
        "k" | "kb" => KIB,
        "m" | "mb" => MIB,
        "g" | "gb" => GIB,
        "t" | "tb" => TIB,
        "p" | "pb" => PIB,
        other => {
            return Err(ConversionError::InvalidConfig(format!(
                "invalid byte size suffix '{other}' in '{raw}'"
            )));
        }
    };
    value.checked_mul(multiplier).ok_or_else(|| {
        ConversionError::InvalidConfig(format!("byte size '{raw}' overflows u64"))
    })
}

/// Parse a result-size budget, where `0` means unlimited.
pub fn parse_result_size_limit(raw: &str) -> Result<Option<u64>> {
    let bytes = parse_byte_size(raw)?;
    Ok((bytes > 0).then_some(bytes))
}

/// Render a byte count with one decimal, e.g. `10.0 KiB`.
pub fn format_bytes(bytes: u64) -> String {
    let (unit, size) = if bytes >= 2 * PIB {
        ("PiB", PIB)
    } else if bytes >= 2 * TIB {
        ("TiB", TIB)
    } else if bytes >= 2 * GIB {
        ("GiB", GIB)
    } else if bytes >= 2 * MIB {
        ("MiB", MIB)
    } else if bytes >= 2 * KIB {
        ("KiB", KIB)
    } else {
        return format!("{bytes} B");
    };
    format!("{:.1} {}", bytes as f64 / size as f64, unit)
}
