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

//! SQL passthrough to the Leaf point-lake query service.
//!
//! The statement is sent verbatim as `text/plain`; the service evaluates it
//! and answers with either a record array (bare or under `data`) or a
//! `columns`/`rows` table. Column types are inferred from the first non-null
//! value of each column.

use crate::error::{RequestContext, Result};
use crate::fetch::page::extract_records;
use crate::fetch::{CancellationToken, RequestExecutor};
use crate::materialize::coerce_json;
use crate::request::RequestDescriptor;
use crate::value::{SemanticType, TypedRow, Value};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Default path of the point-lake query endpoint.
pub const NATIVE_QUERY_PATH: &str = "/services/pointlake/api/v2/query";
/// Default value of the `sqlEngine` parameter.
pub const NATIVE_SQL_ENGINE: &str = "SPARK_SQL";
/// Column exposed when a query returns no columns at all.
pub const EMPTY_RESULT_COLUMN: &str = "result";

/// Fully buffered result of a native query.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeResult {
    columns: Arc<[String]>,
    column_types: Vec<SemanticType>,
    rows: Vec<TypedRow>,
}

impl NativeResult {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_types(&self) -> &[SemanticType] {
        &self.column_types
    }

    pub fn rows(&self) -> &[TypedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<TypedRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decodes a query service response body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::from_records(Vec::new(), Vec::new()));
        }
        let value: JsonValue = serde_json::from_slice(body)?;
        if value.is_null() {
            return Ok(Self::from_records(Vec::new(), Vec::new()));
        }
        let records = extract_records(value, None)?;
        let columns = match records.columns {
            Some(columns) => columns,
            None => {
                let mut columns: Vec<String> = Vec::new();
                for record in &records.records {
                    for key in record.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
                columns
            }
        };
        let cells = records
            .records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|c| record.remove(c).unwrap_or(JsonValue::Null))
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(Self::from_records(columns, cells))
    }

    fn from_records(mut columns: Vec<String>, cells: Vec<Vec<JsonValue>>) -> Self {
        if columns.is_empty() {
            columns.push(EMPTY_RESULT_COLUMN.to_string());
        }
        let column_types: Vec<SemanticType> = (0..columns.len())
            .map(|i| {
                cells
                    .iter()
                    .filter_map(|row| row.get(i))
                    .find(|v| !v.is_null())
                    .map_or(SemanticType::String, infer_type)
            })
            .collect();
        let columns: Arc<[String]> = columns.into();
        let rows = cells
            .iter()
            .map(|row| {
                let values = column_types
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| match row.get(i) {
                        None | Some(JsonValue::Null) => Value::Null,
                        Some(cell) => coerce_json(cell, *ty).unwrap_or_else(|| natural_value(cell)),
                    })
                    .collect();
                TypedRow::new(Arc::clone(&columns), values)
            })
            .collect();
        Self {
            columns,
            column_types,
            rows,
        }
    }
}

fn infer_type(value: &JsonValue) -> SemanticType {
    match value {
        JsonValue::Bool(_) => SemanticType::Boolean,
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => SemanticType::Integer,
        JsonValue::Number(_) => SemanticType::Decimal,
        _ => SemanticType::String,
    }
}

fn natural_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Decimal),
        },
        JsonValue::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Runs `sql` on the query service at `path`.
pub async fn execute_native(
    executor: &RequestExecutor,
    path: &str,
    engine: &str,
    sql: &str,
    cancel: &CancellationToken,
) -> Result<NativeResult> {
    let descriptor = RequestDescriptor::post(path)
        .with_query("sqlEngine", engine)
        .with_body("text/plain; charset=utf-8", sql.to_owned());
    log::debug!("native query ({} bytes) via {engine}", sql.len());
    let response = executor.execute(&descriptor, None, cancel).await?;
    NativeResult::decode(&response.body).map_err(|e| {
        e.with_context(
            RequestContext::new("POST", descriptor.url(executor.base_url()))
                .with_status(response.status.as_u16()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialProvider, StaticToken};
    use crate::error::Error;
    use crate::fetch::RetryPolicy;
    use crate::fetch::transport::testing::{ScriptedTransport, json_response};
    use serde_json::json;

    #[test]
    fn test_decode_object_rows_unions_keys() {
        let body = json!({"data": [
            {"crop": "corn", "bushels": null},
            {"crop": "soy", "bushels": 42, "wet": true},
            {"crop": "oats", "bushels": 40.5}
        ]});
        let result = NativeResult::decode(body.to_string().as_bytes()).unwrap();
        assert_eq!(result.columns(), &["crop", "bushels", "wet"]);
        assert_eq!(
            result.column_types(),
            &[SemanticType::String, SemanticType::Integer, SemanticType::Boolean]
        );
        assert_eq!(result.rows()[0].values(), &[Value::from("corn"), Value::Null, Value::Null]);
        assert_eq!(result.rows()[2].get_by_name("bushels"), Some(&Value::Decimal(40.5)));
    }

    #[test]
    fn test_decode_columns_and_rows() {
        let body = json!({"columns": ["operation_id", "area"], "rows": [["op1", 12.5], ["op2", 3]]});
        let result = NativeResult::decode(body.to_string().as_bytes()).unwrap();
        assert_eq!(result.columns(), &["operation_id", "area"]);
        assert_eq!(result.column_types()[1], SemanticType::Decimal);
        assert_eq!(result.rows()[1].values()[1], Value::Decimal(3.0));
    }

    #[test]
    fn test_empty_results_expose_result_column() {
        for body in [&b""[..], &b"null"[..], &b"[]"[..]] {
            let result = NativeResult::decode(body).unwrap();
            assert_eq!(result.columns(), &[EMPTY_RESULT_COLUMN]);
            assert!(result.is_empty());
        }
        assert!(matches!(NativeResult::decode(b"{oops"), Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_execute_native_posts_plain_text() {
        let transport = Arc::new(ScriptedTransport::new([json_response(200, json!([{"n": 1}]))]));
        let executor = RequestExecutor::new(
            transport.clone(),
            Arc::new(CredentialProvider::new(Arc::new(StaticToken::new("t")))),
            RetryPolicy::none(),
            "http://leaf.test",
        );
        let sql = "SELECT count(*) AS n FROM points";
        let result = execute_native(&executor, NATIVE_QUERY_PATH, NATIVE_SQL_ENGINE, sql, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.rows()[0].values(), &[Value::Integer(1)]);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, http::Method::POST);
        assert_eq!(
            sent.url,
            "http://leaf.test/services/pointlake/api/v2/query?sqlEngine=SPARK_SQL"
        );
        assert_eq!(sent.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(sent.body.as_deref(), Some(sql.as_bytes()));
    }
}
