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

//! Table metadata served by an HTTP endpoint.
//!
//! The document has the shape
//!
//! ```json
//! {"tables": [{"name": "fields", "endpoint": "/services/fields/api/fields",
//!              "columns": [{"name": "id", "field": "id", "type": "string",
//!                           "nullable": false, "operators": ["eq"], "sortable": false}]}]}
//! ```
//!
//! Columns without an `operators` list inherit the documented capabilities of
//! the built-in Leaf table of the same name; anything undocumented is treated
//! as unsupported and filtered locally.

use super::descriptor::{ColumnDescriptor, FilterOp, PaginationMode, TableDescriptor};
use super::leaf::{LEAF_MAX_PAGE_SIZE, documented_column, leaf_table};
use super::MetadataSource;
use crate::error::{Error, RequestContext, Result};
use crate::fetch::{CancellationToken, RequestExecutor};
use crate::request::RequestDescriptor;
use crate::value::SemanticType;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    tables: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableEntry {
    name: String,
    endpoint: String,
    #[serde(default)]
    columns: Vec<ColumnEntry>,
    /// `none`, `page`, `offset` or `cursor`
    pagination: Option<String>,
    page_size: Option<usize>,
    cursor_field: Option<String>,
    projection_param: Option<String>,
    sort_param: Option<String>,
    max_sort_keys: Option<usize>,
    records_field: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ColumnEntry {
    name: String,
    field: Option<String>,
    #[serde(rename = "type")]
    type_name: String,
    nullable: Option<bool>,
    operators: Option<Vec<String>>,
    sortable: Option<bool>,
}

/// Loads table descriptors from `{apiBase}{path}`.
#[derive(Clone, Debug)]
pub struct HttpMetadata {
    executor: RequestExecutor,
    path: String,
}

impl HttpMetadata {
    pub fn new(executor: RequestExecutor, path: impl Into<String>) -> Self {
        Self {
            executor,
            path: path.into(),
        }
    }

    /// Parses a metadata document, merging in documented capabilities.
    pub fn parse_document(body: &[u8]) -> Result<Vec<TableDescriptor>> {
        let document: MetadataDocument = serde_json::from_slice(body)
            .map_err(|e| Error::invalid_response(format!("malformed metadata document: {e}")))?;
        document.tables.into_iter().map(table_descriptor).collect()
    }
}

#[async_trait]
impl MetadataSource for HttpMetadata {
    async fn load_tables(&self) -> Result<Vec<TableDescriptor>> {
        let descriptor = RequestDescriptor::get(&self.path);
        let response = self
            .executor
            .execute(&descriptor, None, &CancellationToken::new())
            .await?;
        Self::parse_document(&response.body).map_err(|e| {
            let url = descriptor.url(self.executor.base_url());
            e.with_context(RequestContext::new("GET", url).with_status(response.status.as_u16()))
        })
    }

    fn name(&self) -> &'static str {
        "HttpMetadata"
    }
}

fn table_descriptor(entry: TableEntry) -> Result<TableDescriptor> {
    let documented = leaf_table(&entry.name);
    let pagination = pagination_mode(&entry, documented.as_ref())?;

    let mut table = TableDescriptor::new(entry.name, entry.endpoint).with_pagination(pagination);
    table.projection_param = entry.projection_param;
    table.records_field = entry.records_field;
    table.description = entry.description;
    table.sort = match (entry.sort_param, documented.as_ref()) {
        (Some(param), _) => Some(super::SortSupport {
            param,
            max_keys: entry.max_sort_keys.unwrap_or(1),
        }),
        (None, Some(doc)) => doc.sort.clone(),
        (None, None) => None,
    };

    for column in entry.columns {
        let descriptor = column_descriptor(&table.name, column)?;
        table.columns.push(descriptor);
    }
    Ok(table)
}

fn column_descriptor(table: &str, entry: ColumnEntry) -> Result<ColumnDescriptor> {
    let semantic_type = SemanticType::parse(&entry.type_name).ok_or_else(|| {
        Error::invalid_response(format!(
            "column {table}.{} has unknown type '{}'",
            entry.name, entry.type_name
        ))
    })?;
    let documented = documented_column(table, &entry.name);

    let field = entry
        .field
        .or_else(|| documented.map(|d| d.field.clone()))
        .unwrap_or_else(|| entry.name.clone());
    let mut column = ColumnDescriptor::new(entry.name, semantic_type)
        .with_field(field)
        .with_nullable(entry.nullable.unwrap_or(true));

    match entry.operators {
        Some(names) => {
            for name in names {
                let Some(op) = FilterOp::parse(&name) else {
                    log::warn!("ignoring unknown operator '{name}' on {table}.{}", column.name);
                    continue;
                };
                column = match documented.and_then(|d| d.param_for(op)) {
                    Some(param) => column.with_filter_param(op, param),
                    None => column.with_filters([op]),
                };
            }
        }
        None => {
            if let Some(doc) = documented {
                column.filters = doc.filters.clone();
            }
        }
    }

    column.sort_field = match entry.sortable {
        Some(true) => documented
            .and_then(|d| d.sort_field.clone())
            .or_else(|| Some(column.field.clone())),
        Some(false) => None,
        None => documented.and_then(|d| d.sort_field.clone()),
    };
    Ok(column)
}

fn pagination_mode(entry: &TableEntry, documented: Option<&TableDescriptor>) -> Result<PaginationMode> {
    let page_size = entry.page_size.unwrap_or(LEAF_MAX_PAGE_SIZE);
    let mode = match entry.pagination.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => match documented {
            Some(doc) => doc.pagination.clone(),
            None => PaginationMode::page_number(page_size),
        },
        Some("none") => PaginationMode::None,
        Some("page") | Some("page_number") => PaginationMode::page_number(page_size),
        Some("offset") => PaginationMode::offset(page_size),
        Some("cursor") => {
            let field = entry.cursor_field.clone().ok_or_else(|| {
                Error::invalid_response(format!(
                    "table '{}' uses cursor pagination without a cursorField",
                    entry.name
                ))
            })?;
            PaginationMode::cursor(field, page_size)
        }
        Some(other) => {
            return Err(Error::invalid_response(format!(
                "table '{}' has unknown pagination '{other}'",
                entry.name
            )));
        }
    };
    Ok(match entry.page_size {
        Some(size) => mode.with_page_size(size),
        None => mode,
    })
}
