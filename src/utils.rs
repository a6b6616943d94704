// leafsql: SQL access to the Leaf agricultural data API
// Copyright 2026 leafsql contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Various utility functions

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde_json::Value as JsonValue;

/// Date and time with UTC timezone
pub type UtcTime = DateTime<Utc>;

// Unreserved characters (RFC 3986 section 2.3) stay literal; everything else,
// including the query-string reserved characters, is escaped.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encodes a query-string key or value.
pub fn url_encode(s: &str) -> String {
    utf8_percent_encode(s, QUERY_ESCAPE).collect()
}

/// Decodes a percent-encoded connection-string component. `+` is treated as a space.
pub fn url_decode(s: &str) -> Result<String> {
    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|v| v.into_owned())
        .map_err(|e| Error::Configuration(format!("invalid percent-encoding in '{s}': {e}")))
}

/// Formats a timestamp as RFC 3339 in UTC with millisecond precision.
pub fn to_rfc3339_millis(t: UtcTime) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses a timestamp string.
///
/// Accepts RFC 3339 with any offset, ISO 8601 without offset (assumed UTC),
/// a bare date (midnight UTC) and integral epoch milliseconds.
pub fn parse_timestamp(s: &str) -> Option<UtcTime> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    s.parse::<i64>().ok().and_then(from_epoch_millis)
}

pub fn from_epoch_millis(ms: i64) -> Option<UtcTime> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Looks up a dotted field path (`geometry.area`) in a JSON object.
///
/// A key containing the full dotted path takes precedence over nested lookup.
pub fn json_path<'a>(record: &'a serde_json::Map<String, JsonValue>, path: &str) -> Option<&'a JsonValue> {
    if let Some(v) = record.get(path) {
        return Some(v);
    }
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Short human-readable rendering of a JSON value for error messages.
pub fn describe_json(value: &JsonValue) -> String {
    let text = value.to_string();
    if text.chars().count() > 64 {
        let head: String = text.chars().take(61).collect();
        format!("{head}...")
    } else {
        text
    }
}
