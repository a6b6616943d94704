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

//! Conversion of raw API records into typed rows.
//!
//! Coercion rules per declared type:
//!
//! - **string**: any scalar; objects and arrays become their JSON text
//! - **integer**: integral JSON numbers (including `12.0`) and numeric strings (`"12"`)
//! - **decimal**: any finite number or numeric string
//! - **boolean**: `true`/`false`, the strings `"true"`/`"false"` and the numbers 0 and 1
//! - **timestamp**: RFC 3339 strings, ISO 8601 without offset (taken as UTC),
//!   and integral epoch milliseconds
//!
//! A missing or null field yields [`Value::Null`] for nullable columns and a
//! `SchemaViolation` otherwise.

mod residual;

pub use residual::{LimitDecision, LimitWindow, ResidualPipeline};

use crate::catalog::{ColumnDescriptor, TableDescriptor};
use crate::error::{Error, Result};
use crate::fetch::RawRecord;
use crate::utils::{describe_json, from_epoch_millis, json_path, parse_timestamp};
use crate::value::{SemanticType, TypedRow, Value};
use regex::{Regex, RegexBuilder};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Coerces one JSON value to `ty`. `None` when the value cannot represent that type.
pub fn coerce_json(value: &JsonValue, ty: SemanticType) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }
    match ty {
        SemanticType::String => Some(Value::String(match value {
            JsonValue::String(s) => s.clone(),
            JsonValue::Bool(b) => b.to_string(),
            JsonValue::Number(n) => n.to_string(),
            other => other.to_string(),
        })),
        SemanticType::Integer => match value {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral_f64))
                .map(Value::Integer),
            JsonValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
                    .map(Value::Integer)
            }
            _ => None,
        },
        SemanticType::Decimal => match value {
            JsonValue::Number(n) => n.as_f64().map(Value::Decimal),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Decimal),
            _ => None,
        },
        SemanticType::Boolean => match value {
            JsonValue::Bool(b) => Some(Value::Boolean(*b)),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Boolean(true)),
                "false" => Some(Value::Boolean(false)),
                _ => None,
            },
            JsonValue::Number(n) => match n.as_i64() {
                Some(0) => Some(Value::Boolean(false)),
                Some(1) => Some(Value::Boolean(true)),
                _ => None,
            },
            _ => None,
        },
        SemanticType::Timestamp => match value {
            JsonValue::String(s) => parse_timestamp(s).map(Value::Timestamp),
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(from_epoch_millis)
                .map(Value::Timestamp),
            _ => None,
        },
    }
}

fn integral_f64(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.2e18).then_some(f as i64)
}

fn materialize_column(record: &RawRecord, table: &str, column: &ColumnDescriptor) -> Result<Value> {
    match json_path(record, &column.field) {
        None | Some(JsonValue::Null) if column.nullable => Ok(Value::Null),
        None => Err(Error::SchemaViolation {
            table: table.to_string(),
            column: column.name.clone(),
            message: format!("required field '{}' is missing", column.field),
        }),
        Some(JsonValue::Null) => Err(Error::SchemaViolation {
            table: table.to_string(),
            column: column.name.clone(),
            message: format!("required field '{}' is null", column.field),
        }),
        Some(raw) => coerce_json(raw, column.semantic_type).ok_or_else(|| Error::TypeCoercion {
            table: table.to_string(),
            column: column.name.clone(),
            expected: column.semantic_type,
            found: describe_json(raw),
        }),
    }
}

/// Materializes every column of `table` from `record`.
pub fn materialize(record: &RawRecord, table: &TableDescriptor) -> Result<TypedRow> {
    let values = table
        .columns
        .iter()
        .map(|c| materialize_column(record, &table.name, c))
        .collect::<Result<Vec<_>>>()?;
    Ok(TypedRow::new(table.column_names(), values))
}

/// Materializes a fixed subset of a table's columns.
#[derive(Clone, Debug)]
pub struct RowMaterializer {
    table: Arc<TableDescriptor>,
    indices: Vec<usize>,
    columns: Arc<[String]>,
}

impl RowMaterializer {
    pub fn new(table: Arc<TableDescriptor>, columns: &[String]) -> Result<Self> {
        let indices = columns
            .iter()
            .map(|c| {
                table
                    .column_index(c)
                    .ok_or_else(|| Error::column_not_found(&table.name, c))
            })
            .collect::<Result<Vec<_>>>()?;
        let columns = indices
            .iter()
            .map(|&i| table.columns[i].name.clone())
            .collect();
        Ok(Self {
            table,
            indices,
            columns,
        })
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn materialize(&self, record: &RawRecord) -> Result<TypedRow> {
        let values = self
            .indices
            .iter()
            .map(|&i| materialize_column(record, &self.table.name, &self.table.columns[i]))
            .collect::<Result<Vec<_>>>()?;
        Ok(TypedRow::new(Arc::clone(&self.columns), values))
    }
}

/// Compiles a SQL `LIKE` pattern. `\` escapes a following `%`, `_` or `\`.
pub fn like_to_regex(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => re.push_str(&regex::escape(&escaped.to_string())),
                None => {
                    return Err(Error::InvalidPredicate(format!(
                        "LIKE pattern '{pattern}' ends with an escape character"
                    )));
                }
            },
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| Error::InvalidPredicate(format!("LIKE pattern '{pattern}': {e}")))
}
