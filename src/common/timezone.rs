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
//! Session time zone used to map naive clock readings to absolute instants.

use std::fmt;
use std::str::FromStr;

use chrono::offset::LocalResult;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::common::error::{ConversionError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeZoneSpec {
    Fixed(FixedOffset),
    Named(Tz),
}

impl TimeZoneSpec {
    pub fn utc() -> Self {
        Self::Named(Tz::UTC)
    }

    /// Accepts `UTC`, fixed offsets like `+05:30`, and IANA zone names.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }
        if let Ok(offset) = FixedOffset::from_str(s) {
            return Ok(Self::Fixed(offset));
        }
        Tz::from_str(s)
            .map(Self::Named)
            .map_err(|_| ConversionError::InvalidConfig(format!("unknown time zone '{s}'")))
    }

    /// Interpret a naive clock reading in this zone and return microseconds
    /// since the epoch.
    ///
    /// Ambiguous readings (DST fall-back) resolve to the earliest instant.
    /// Readings inside a DST gap are shifted forward by the length of the gap.
    pub fn to_instant_micros(&self, local: NaiveDateTime) -> Result<i64> {
        let local = truncate_to_micros(local);
        let utc = match self {
            Self::Fixed(offset) => resolve_local(offset, local),
            Self::Named(tz) => resolve_local(tz, local),
        }?;
        Ok(utc.timestamp_micros())
    }

    /// Render an instant as a naive clock reading in this zone.
    pub fn to_local(&self, micros: i64) -> Result<NaiveDateTime> {
        let utc = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
            ConversionError::ValueOutOfRange(format!("timestamp {micros}us is out of range"))
        })?;
        Ok(match self {
            Self::Fixed(offset) => utc.with_timezone(offset).naive_local(),
            Self::Named(tz) => utc.with_timezone(tz).naive_local(),
        })
    }

    /// The clock reading this zone would render back after a round trip.
    ///
    /// Identity for every reading that exists exactly once in the zone.
    pub fn normalize(&self, local: NaiveDateTime) -> Result<NaiveDateTime> {
        self.to_local(self.to_instant_micros(local)?)
    }
}

impl Default for TimeZoneSpec {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for TimeZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(offset) => write!(f, "{offset}"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// Drop sub-microsecond digits; instants are stored at microsecond precision.
pub fn truncate_to_micros(local: NaiveDateTime) -> NaiveDateTime {
    let nanos = local.nanosecond();
    local
        .with_nanosecond(nanos - nanos % 1_000)
        .unwrap_or(local)
}

fn resolve_local<Z: TimeZone>(zone: &Z, local: NaiveDateTime) -> Result<DateTime<Utc>> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            // Gap: apply the offset in effect before the transition. Readings
            // at the edge of the calendar land here too when the offset
            // overflows.
            let out_of_range = || {
                ConversionError::ValueOutOfRange(format!(
                    "timestamp {local} cannot be placed on the time line"
                ))
            };
            let probe = local
                .checked_sub_signed(TimeDelta::days(1))
                .ok_or_else(out_of_range)?;
            let before = zone.offset_from_utc_datetime(&probe).fix();
            let utc = local
                .checked_sub_signed(TimeDelta::seconds(i64::from(before.local_minus_utc())))
                .ok_or_else(out_of_range)?;
            Ok(Utc.from_utc_datetime(&utc))
        }
    }
}
