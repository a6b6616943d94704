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

//! Decoding of API response bodies into raw records.
//!
//! Accepted shapes:
//!
//! - a bare JSON array of objects
//! - an object holding the array under `data`, `content`, `items`, `results`
//!   or a table-specific field
//! - an object with parallel `columns` and `rows` arrays

use crate::catalog::{PaginationMode, TableDescriptor};
use crate::error::{Error, Result};
use crate::utils::json_path;
use serde_json::{Map, Value as JsonValue};

/// A JSON object as received from the API, before any type coercion.
pub type RawRecord = Map<String, JsonValue>;

const RECORD_FIELDS: [&str; 4] = ["data", "content", "items", "results"];

/// Records extracted from one response body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Records {
    pub records: Vec<RawRecord>,
    /// Column order declared by a `columns`/`rows` response
    pub columns: Option<Vec<String>>,
    /// The enclosing object, when the body was not a bare array
    pub envelope: Option<Map<String, JsonValue>>,
}

/// One decoded page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedPage {
    pub records: Vec<RawRecord>,
    pub next_cursor: Option<String>,
    /// Explicit last-page marker (`"last": true` in paged envelopes)
    pub last: Option<bool>,
}

pub fn decode_page(body: &[u8], table: &TableDescriptor) -> Result<DecodedPage> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DecodedPage::default());
    }
    let value: JsonValue = serde_json::from_slice(body)
        .map_err(|e| Error::invalid_response(format!("body is not JSON: {e}")))?;
    let Records {
        records, envelope, ..
    } = extract_records(value, table.records_field.as_deref())?;

    let mut page = DecodedPage {
        records,
        ..Default::default()
    };
    if let Some(obj) = &envelope {
        page.last = obj.get("last").and_then(JsonValue::as_bool);
        if let PaginationMode::Cursor { cursor_field, .. } = &table.pagination {
            page.next_cursor = json_path(obj, cursor_field).and_then(|v| match v {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            });
        }
    }
    Ok(page)
}

/// Pulls the record list out of a response value.
pub fn extract_records(value: JsonValue, records_field: Option<&str>) -> Result<Records> {
    match value {
        JsonValue::Array(items) => Ok(Records {
            records: objects(items)?,
            columns: None,
            envelope: None,
        }),
        JsonValue::Object(obj) => {
            if let Some(field) = records_field {
                let items = match json_path(&obj, field) {
                    Some(JsonValue::Array(items)) => items.clone(),
                    Some(JsonValue::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(Error::invalid_response(format!(
                            "'{field}' is not an array but {}",
                            json_kind(other)
                        )));
                    }
                };
                return Ok(Records {
                    records: objects(items)?,
                    columns: None,
                    envelope: Some(obj),
                });
            }

            if let (Some(JsonValue::Array(columns)), Some(JsonValue::Array(rows))) =
                (obj.get("columns"), obj.get("rows"))
            {
                let columns = column_names(columns)?;
                let records = zip_rows(&columns, rows)?;
                return Ok(Records {
                    records,
                    columns: Some(columns),
                    envelope: Some(obj),
                });
            }

            let items = RECORD_FIELDS
                .iter()
                .find_map(|f| obj.get(*f).and_then(JsonValue::as_array).cloned());
            match items {
                Some(items) => Ok(Records {
                    records: objects(items)?,
                    columns: None,
                    envelope: Some(obj),
                }),
                None => Err(Error::invalid_response(
                    "object response has no records array",
                )),
            }
        }
        other => Err(Error::invalid_response(format!(
            "expected an array or object, got {}",
            json_kind(&other)
        ))),
    }
}

fn objects(items: Vec<JsonValue>) -> Result<Vec<RawRecord>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            JsonValue::Object(map) => Ok(map),
            other => Err(Error::invalid_response(format!(
                "record {i} is {}, expected an object",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn column_names(columns: &[JsonValue]) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|c| match c {
            JsonValue::String(s) => Ok(s.clone()),
            JsonValue::Object(o) => o
                .get("name")
                .and_then(JsonValue::as_str)
                .map(str::to_owned)
                .ok_or_else(|| Error::invalid_response("column entry without a name")),
            other => Err(Error::invalid_response(format!(
                "column entry is {}",
                json_kind(other)
            ))),
        })
        .collect()
}

fn zip_rows(columns: &[String], rows: &[JsonValue]) -> Result<Vec<RawRecord>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let cells = row.as_array().ok_or_else(|| {
                Error::invalid_response(format!("row {i} is {}, expected an array", json_kind(row)))
            })?;
            if cells.len() != columns.len() {
                return Err(Error::invalid_response(format!(
                    "row {i} has {} cells for {} columns",
                    cells.len(),
                    columns.len()
                )));
            }
            Ok(columns.iter().cloned().zip(cells.iter().cloned()).collect())
        })
        .collect()
}

pub(crate) fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
