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

//! DataFusion [`TableProvider`] over a Leaf table.
//!
//! Filters DataFusion can express as [`Predicate`]s are reported as `Exact`:
//! the driver evaluates whatever the API cannot, so DataFusion never has to
//! re-check them, and the scan limit can be forwarded as well.
//!
//! ```text
//! SELECT name FROM fields WHERE farm_id = 'f1' LIMIT 5
//!            |
//!   supports_filters_pushdown  -> [Exact]
//!            |
//!   scan(projection=[name], filters=[farm_id = 'f1'], limit=5)
//!            |
//!   ScanRequest -> PushdownPlanner -> ResultSet -> RecordBatch -> MemTable
//! ```

use super::expr_to_predicate;
use crate::catalog::TableDescriptor;
use crate::driver::LeafConnection;
use crate::plan::{Limit, ScanRequest};
use crate::value::{SemanticType, TypedRow, Value};
use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMillisecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use async_trait::async_trait;
use datafusion::catalog::Session;
use datafusion::datasource::{MemTable, TableProvider, TableType};
use datafusion::error::{DataFusionError, Result as DataFusionResult};
use datafusion::logical_expr::{Expr, TableProviderFilterPushDown};
use datafusion::physical_plan::ExecutionPlan;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

const UTC: &str = "UTC";

/// Arrow type used for a column of the given semantic type.
pub fn arrow_type(semantic: SemanticType) -> DataType {
    match semantic {
        SemanticType::String => DataType::Utf8,
        SemanticType::Integer => DataType::Int64,
        SemanticType::Decimal => DataType::Float64,
        SemanticType::Boolean => DataType::Boolean,
        SemanticType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, Some(UTC.into())),
    }
}

/// Arrow schema of a table, columns in catalog order.
pub fn arrow_schema(table: &TableDescriptor) -> SchemaRef {
    let fields: Vec<Field> = table
        .columns
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.semantic_type), c.nullable))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Exposes one catalog table to a DataFusion `SessionContext`.
pub struct LeafTableProvider {
    connection: LeafConnection,
    table: Arc<TableDescriptor>,
    schema: SchemaRef,
}

impl fmt::Debug for LeafTableProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafTableProvider")
            .field("table", &self.table.name)
            .field("columns", &self.schema.fields().len())
            .finish()
    }
}

impl LeafTableProvider {
    pub fn new(connection: LeafConnection, table: Arc<TableDescriptor>) -> Self {
        let schema = arrow_schema(&table);
        Self {
            connection,
            table,
            schema,
        }
    }

    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    fn scan_request(
        &self,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> ScanRequest {
        let predicates = filters.iter().filter_map(expr_to_predicate).collect();
        let mut request = ScanRequest::builder()
            .table(self.table.name.clone())
            .filters(predicates)
            .build();
        if let Some(indices) = projection {
            let mut names: Vec<String> = indices
                .iter()
                .filter_map(|&i| self.table.columns.get(i))
                .map(|c| c.name.clone())
                .collect();
            // COUNT(*) asks for no columns; one is still needed to count rows
            if names.is_empty()
                && let Some(first) = self.table.columns.first()
            {
                names.push(first.name.clone());
            }
            request.projection = Some(names);
        }
        request.limit = limit.map(Limit::new);
        request
    }
}

#[async_trait]
impl TableProvider for LeafTableProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    fn supports_filters_pushdown(
        &self,
        filters: &[&Expr],
    ) -> DataFusionResult<Vec<TableProviderFilterPushDown>> {
        Ok(filters
            .iter()
            .map(|expr| match expr_to_predicate(expr) {
                Some(p) if p.referenced_columns().iter().all(|c| self.table.column(c).is_some()) => {
                    TableProviderFilterPushDown::Exact
                }
                _ => TableProviderFilterPushDown::Unsupported,
            })
            .collect())
    }

    async fn scan(
        &self,
        state: &dyn Session,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> DataFusionResult<Arc<dyn ExecutionPlan>> {
        let request = self.scan_request(projection, filters, limit);
        log::debug!(
            "datafusion scan of {}: {} filter(s), limit {:?}",
            self.table.name,
            request.filters.len(),
            limit
        );

        let rows = self
            .connection
            .query(request)
            .await
            .map_err(|e| DataFusionError::External(Box::new(e)))?
            .collect_rows()
            .await
            .map_err(|e| DataFusionError::External(Box::new(e)))?;

        let schema = match projection {
            Some(indices) => Arc::new(self.schema.project(indices)?),
            None => self.schema(),
        };
        let batch = rows_to_batch(Arc::clone(&schema), &rows)?;
        let mem = MemTable::try_new(schema, vec![vec![batch]])?;
        mem.scan(state, None, &[], None).await
    }
}

/// Builds a batch whose columns follow `schema`. Row values are read
/// positionally; a zero-column schema still records the row count.
pub fn rows_to_batch(schema: SchemaRef, rows: &[TypedRow]) -> Result<RecordBatch, ArrowError> {
    let columns = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| build_column(field.data_type(), rows.iter().map(|r| r.get(i))))
        .collect::<Result<Vec<_>, _>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(schema, columns, &options)
}

fn build_column<'a>(
    data_type: &DataType,
    values: impl ExactSizeIterator<Item = Option<&'a Value>>,
) -> Result<ArrayRef, ArrowError> {
    let len = values.len();
    let array: ArrayRef = match data_type {
        DataType::Utf8 => {
            let mut b = StringBuilder::with_capacity(len, len * 16);
            values.for_each(|v| b.append_option(v.and_then(Value::as_str)));
            Arc::new(b.finish())
        }
        DataType::Int64 => {
            let mut b = Int64Builder::with_capacity(len);
            values.for_each(|v| b.append_option(v.and_then(Value::as_i64)));
            Arc::new(b.finish())
        }
        DataType::Float64 => {
            let mut b = Float64Builder::with_capacity(len);
            values.for_each(|v| b.append_option(v.and_then(Value::as_f64)));
            Arc::new(b.finish())
        }
        DataType::Boolean => {
            let mut b = BooleanBuilder::with_capacity(len);
            values.for_each(|v| b.append_option(v.and_then(Value::as_bool)));
            Arc::new(b.finish())
        }
        DataType::Timestamp(TimeUnit::Millisecond, tz) => {
            let mut b = TimestampMillisecondBuilder::with_capacity(len).with_timezone_opt(tz.clone());
            values.for_each(|v| {
                b.append_option(v.and_then(Value::as_timestamp).map(|t| t.timestamp_millis()))
            });
            Arc::new(b.finish())
        }
        other => {
            return Err(ArrowError::NotYetImplemented(format!(
                "column type {other} is not produced by leaf tables"
            )));
        }
    };
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::leaf_table;
    use crate::driver::ConnectionConfig;
    use crate::fetch::transport::testing::{ScriptedTransport, json_response};
    use arrow::array::{Array, StringArray};
    use datafusion::prelude::SessionContext;
    use serde_json::json;

    fn connection(transport: Arc<ScriptedTransport>) -> LeafConnection {
        let mut config = ConnectionConfig::with_token("t");
        config.api_base = "http://leaf.test".into();
        LeafConnection::builder(config)
            .with_transport(transport)
            .build()
            .unwrap()
    }

    #[test]
    fn test_schema_mapping() {
        let schema = arrow_schema(&leaf_table("fields").unwrap());
        assert_eq!(schema.field(0).name(), "id");
        assert_eq!(schema.field_with_name("area").unwrap().data_type(), &DataType::Float64);
        assert!(matches!(
            schema.field_with_name("created_time").unwrap().data_type(),
            DataType::Timestamp(TimeUnit::Millisecond, Some(_))
        ));
    }

    #[test]
    fn test_rows_to_batch_with_nulls() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("area", DataType::Float64, true),
        ]));
        let cols: Arc<[String]> = vec!["name".to_string(), "area".to_string()].into();
        let rows = vec![
            TypedRow::new(cols.clone(), vec![Value::from("North"), Value::Decimal(40.5)]),
            TypedRow::new(cols, vec![Value::Null, Value::Null]),
        ];
        let batch = rows_to_batch(schema, &rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        let names = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.value(0), "North");
        assert!(names.is_null(1));
    }

    #[test]
    fn test_zero_column_batch_keeps_row_count() {
        let schema = Arc::new(Schema::empty());
        let cols: Arc<[String]> = Vec::<String>::new().into();
        let rows = vec![TypedRow::new(cols.clone(), vec![]), TypedRow::new(cols, vec![])];
        assert_eq!(rows_to_batch(schema, &rows).unwrap().num_rows(), 2);
    }

    #[tokio::test]
    async fn test_sql_filter_reaches_request_url() {
        let transport = Arc::new(ScriptedTransport::new([json_response(
            200,
            json!([
                {"id": "f1", "name": "North 40", "farmId": "farm-1", "area": 40.0},
                {"id": "f2", "name": "Creek", "farmId": "farm-1", "area": 12.5}
            ]),
        )]));
        let conn = connection(transport.clone());
        let ctx = SessionContext::new();
        let registered = super::super::register_tables(&ctx, &conn).await.unwrap();
        assert!(registered.contains(&"fields".to_string()));

        let batches = ctx
            .sql("SELECT name FROM fields WHERE farm_id = 'farm-1' AND area > 20")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        let total: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(total, 1);
        let names = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .unwrap()
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap()
            .value(0)
            .to_string();
        assert_eq!(names, "North 40");
        assert!(transport.requests()[0].url.contains("farmId=farm-1"));
    }
}
