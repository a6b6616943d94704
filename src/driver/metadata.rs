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

//! Driver and catalog metadata reported to SQL tools.

use crate::catalog::TableDescriptor;
use crate::error::Result;
use crate::materialize::like_to_regex;
use crate::value::SemanticType;
use std::sync::Arc;

/// Static facts about the driver and the remote product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverMetadata {
    pub driver_name: &'static str,
    pub driver_version: &'static str,
    pub product_name: &'static str,
    pub url_prefix: &'static str,
    pub identifier_quote: &'static str,
    pub search_string_escape: &'static str,
    pub read_only: bool,
    pub api_base: String,
    pub user_name: Option<String>,
}

impl DriverMetadata {
    pub(crate) fn new(api_base: &str, user_name: Option<String>) -> Self {
        Self {
            driver_name: "leafsql",
            driver_version: env!("CARGO_PKG_VERSION"),
            product_name: "Leaf API",
            url_prefix: super::config::URL_PREFIX,
            identifier_quote: "\"",
            search_string_escape: "\\",
            read_only: true,
            api_base: api_base.to_string(),
            user_name,
        }
    }
}

/// A connection property a client may set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

const fn property(name: &'static str, required: bool, description: &'static str) -> PropertyInfo {
    PropertyInfo {
        name,
        required,
        description,
    }
}

/// Every recognised connection property.
pub fn property_info() -> Vec<PropertyInfo> {
    vec![
        property("apiBase", false, "Leaf API base URL, e.g. https://api.withleaf.io"),
        property("token", false, "Bearer token; required unless username and password are set"),
        property("username", false, "Leaf account name for password login"),
        property("password", false, "Leaf account password"),
        property("authPath", false, "Login endpoint path"),
        property("metadataPath", false, "Endpoint serving table metadata"),
        property("nativeQueryPath", false, "Point-lake SQL endpoint path"),
        property("sqlEngine", false, "Engine name sent with native queries"),
        property("requestTimeoutMs", false, "Timeout of each HTTP call"),
        property("connectTimeoutMs", false, "TCP connect timeout"),
        property("maxRetries", false, "Retries of transient failures"),
        property("initialBackoffMs", false, "First retry delay"),
        property("maxBackoffMs", false, "Upper bound of a retry delay"),
        property("pageSize", false, "Records requested per page"),
        property("rowErrorPolicy", false, "surface, skip or abort"),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    pub table_name: String,
    pub table_type: &'static str,
    pub remarks: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub table_name: String,
    pub column_name: String,
    pub type_name: &'static str,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    /// 1-based position in the table
    pub ordinal: usize,
}

fn name_filter(pattern: Option<&str>) -> Result<Option<regex::Regex>> {
    pattern
        .filter(|p| *p != "%")
        .map(|p| like_to_regex(p, true))
        .transpose()
}

/// Tables whose name matches the `LIKE` pattern (`None` matches all).
pub fn table_infos(tables: &[Arc<TableDescriptor>], pattern: Option<&str>) -> Result<Vec<TableInfo>> {
    let filter = name_filter(pattern)?;
    Ok(tables
        .iter()
        .filter(|t| filter.as_ref().is_none_or(|re| re.is_match(&t.name)))
        .map(|t| TableInfo {
            table_name: t.name.clone(),
            table_type: "TABLE",
            remarks: t.description.clone(),
        })
        .collect())
}

/// Columns of the tables matching `table_pattern`, filtered by `column_pattern`.
pub fn column_infos(
    tables: &[Arc<TableDescriptor>],
    table_pattern: Option<&str>,
    column_pattern: Option<&str>,
) -> Result<Vec<ColumnInfo>> {
    let table_filter = name_filter(table_pattern)?;
    let column_filter = name_filter(column_pattern)?;
    let mut out = Vec::new();
    for table in tables
        .iter()
        .filter(|t| table_filter.as_ref().is_none_or(|re| re.is_match(&t.name)))
    {
        for (i, column) in table.columns.iter().enumerate() {
            if column_filter.as_ref().is_some_and(|re| !re.is_match(&column.name)) {
                continue;
            }
            out.push(ColumnInfo {
                table_name: table.name.clone(),
                column_name: column.name.clone(),
                type_name: column.semantic_type.sql_name(),
                semantic_type: column.semantic_type,
                nullable: column.nullable,
                ordinal: i + 1,
            });
        }
    }
    Ok(out)
}
