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

//! Table and column descriptors with their push-down capabilities.

use crate::value::SemanticType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Filter operators a column may accept remotely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    #[serde(alias = "ne")]
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Like,
    Regex,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    pub const ALL: [FilterOp; 11] = [
        FilterOp::Eq,
        FilterOp::NotEq,
        FilterOp::Lt,
        FilterOp::Lte,
        FilterOp::Gt,
        FilterOp::Gte,
        FilterOp::In,
        FilterOp::Like,
        FilterOp::Regex,
        FilterOp::IsNull,
        FilterOp::IsNotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::NotEq => "ne",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::In => "in",
            FilterOp::Like => "like",
            FilterOp::Regex => "regex",
            FilterOp::IsNull => "is_null",
            FilterOp::IsNotNull => "is_not_null",
        }
    }

    /// Parses an operator name as it appears in metadata documents.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" | "==" => Some(FilterOp::Eq),
            "ne" | "neq" | "not_eq" | "!=" | "<>" => Some(FilterOp::NotEq),
            "lt" | "<" => Some(FilterOp::Lt),
            "lte" | "le" | "<=" => Some(FilterOp::Lte),
            "gt" | ">" => Some(FilterOp::Gt),
            "gte" | "ge" | ">=" => Some(FilterOp::Gte),
            "in" => Some(FilterOp::In),
            "like" => Some(FilterOp::Like),
            "regex" | "~" => Some(FilterOp::Regex),
            "is_null" | "isnull" => Some(FilterOp::IsNull),
            "is_not_null" | "isnotnull" | "not_null" => Some(FilterOp::IsNotNull),
            _ => None,
        }
    }

    /// Query parameter suffix appended to the field name when no explicit
    /// parameter is configured.
    pub fn default_suffix(&self) -> &'static str {
        match self {
            FilterOp::Eq | FilterOp::In => "",
            FilterOp::NotEq => "_ne",
            FilterOp::Lt => "_lt",
            FilterOp::Lte => "_lte",
            FilterOp::Gt => "_gt",
            FilterOp::Gte => "_gte",
            FilterOp::Like => "_like",
            FilterOp::Regex => "_regex",
            FilterOp::IsNull | FilterOp::IsNotNull => "_null",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column of a remote table.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDescriptor {
    /// SQL-visible column name
    pub name: String,
    /// JSON field path in API records; dots address nested objects
    pub field: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    /// Remote filter operators and the query parameter each one uses
    pub filters: BTreeMap<FilterOp, String>,
    /// Field name the API sorts by, when sorting on this column is supported
    pub sort_field: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        let name = name.into();
        Self {
            field: name.clone(),
            name,
            semantic_type,
            nullable: true,
            filters: BTreeMap::new(),
            sort_field: None,
        }
    }

    /// Sets the JSON field path. Filter parameters added afterwards derive from it.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Declares remote support for `ops` using the default parameter encoding.
    pub fn with_filters(mut self, ops: impl IntoIterator<Item = FilterOp>) -> Self {
        for op in ops {
            let param = format!("{}{}", self.field, op.default_suffix());
            self.filters.insert(op, param);
        }
        self
    }

    /// Declares remote support for `op` under an explicit query parameter.
    pub fn with_filter_param(mut self, op: FilterOp, param: impl Into<String>) -> Self {
        self.filters.insert(op, param.into());
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sort_field = Some(self.field.clone());
        self
    }

    pub fn with_sort_field(mut self, field: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self
    }

    pub fn supports(&self, op: FilterOp) -> bool {
        self.filters.contains_key(&op)
    }

    pub fn param_for(&self, op: FilterOp) -> Option<&str> {
        self.filters.get(&op).map(String::as_str)
    }

    pub fn is_sortable(&self) -> bool {
        self.sort_field.is_some()
    }
}

/// How a table's endpoint pages through results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaginationMode {
    /// Single response holds every record
    None,
    /// `page`/`size` style; the page index starts at `first_page`
    PageNumber {
        page_param: String,
        size_param: String,
        page_size: usize,
        first_page: u64,
    },
    /// Record offset plus page length
    Offset {
        offset_param: String,
        limit_param: String,
        page_size: usize,
    },
    /// Opaque continuation token read from `cursor_field` of each response body
    Cursor {
        cursor_param: String,
        size_param: Option<String>,
        page_size: usize,
        cursor_field: String,
    },
}

impl PaginationMode {
    /// Zero-based `page`/`size` pagination as used by the Leaf services.
    pub fn page_number(page_size: usize) -> Self {
        PaginationMode::PageNumber {
            page_param: "page".into(),
            size_param: "size".into(),
            page_size,
            first_page: 0,
        }
    }

    pub fn offset(page_size: usize) -> Self {
        PaginationMode::Offset {
            offset_param: "offset".into(),
            limit_param: "limit".into(),
            page_size,
        }
    }

    pub fn cursor(cursor_field: impl Into<String>, page_size: usize) -> Self {
        PaginationMode::Cursor {
            cursor_param: "cursor".into(),
            size_param: Some("size".into()),
            page_size,
            cursor_field: cursor_field.into(),
        }
    }

    pub fn page_size(&self) -> Option<usize> {
        match self {
            PaginationMode::None => None,
            PaginationMode::PageNumber { page_size, .. }
            | PaginationMode::Offset { page_size, .. }
            | PaginationMode::Cursor { page_size, .. } => Some(*page_size),
        }
    }

    /// Returns a copy with the page size replaced, if the mode has one.
    pub fn with_page_size(&self, size: usize) -> Self {
        let mut mode = self.clone();
        match &mut mode {
            PaginationMode::None => {}
            PaginationMode::PageNumber { page_size, .. }
            | PaginationMode::Offset { page_size, .. }
            | PaginationMode::Cursor { page_size, .. } => *page_size = size.max(1),
        }
        mode
    }

    /// Whether a scan can start `offset` records into the result remotely.
    pub fn can_start_at(&self, offset: usize) -> bool {
        match self {
            PaginationMode::None => offset == 0,
            PaginationMode::Offset { .. } => true,
            PaginationMode::PageNumber { page_size, .. } => {
                *page_size > 0 && offset % *page_size == 0
            }
            PaginationMode::Cursor { .. } => offset == 0,
        }
    }
}

/// Remote ordering support of a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSupport {
    pub param: String,
    pub max_keys: usize,
}

/// A queryable table backed by one API endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    /// Endpoint path relative to the API base, e.g. `/services/fields/api/fields`
    pub endpoint: String,
    pub columns: Vec<ColumnDescriptor>,
    pub pagination: PaginationMode,
    /// Query parameter taking a comma-separated field list, if projection is supported
    pub projection_param: Option<String>,
    pub sort: Option<SortSupport>,
    /// Field of an object response holding the records, when not one of the usual names
    pub records_field: Option<String>,
    /// Parameters sent with every request to this endpoint
    pub static_params: Vec<(String, String)>,
    pub description: Option<String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            columns: Vec::new(),
            pagination: PaginationMode::None,
            projection_param: None,
            sort: None,
            records_field: None,
            static_params: Vec::new(),
            description: None,
        }
    }

    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_columns(mut self, columns: impl IntoIterator<Item = ColumnDescriptor>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationMode) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_projection_param(mut self, param: impl Into<String>) -> Self {
        self.projection_param = Some(param.into());
        self
    }

    pub fn with_sort(mut self, param: impl Into<String>, max_keys: usize) -> Self {
        self.sort = Some(SortSupport {
            param: param.into(),
            max_keys,
        });
        self
    }

    pub fn with_records_field(mut self, field: impl Into<String>) -> Self {
        self.records_field = Some(field.into());
        self
    }

    pub fn with_static_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_params.push((key.into(), value.into()));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Case-insensitive column position.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn column_names(&self) -> Arc<[String]> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn max_sort_keys(&self) -> usize {
        self.sort.as_ref().map_or(0, |s| s.max_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_params_follow_field() {
        let col = ColumnDescriptor::new("start_time", SemanticType::Timestamp)
            .with_field("startTime")
            .with_filters([FilterOp::Gte, FilterOp::Eq, FilterOp::IsNull]);
        assert_eq!(col.param_for(FilterOp::Gte), Some("startTime_gte"));
        assert_eq!(col.param_for(FilterOp::Eq), Some("startTime"));
        assert_eq!(col.param_for(FilterOp::IsNull), Some("startTime_null"));
        assert!(!col.supports(FilterOp::Lt));
    }

    #[test]
    fn test_filter_param_override() {
        let col = ColumnDescriptor::new("start_time", SemanticType::Timestamp)
            .with_field("startTime")
            .with_filter_param(FilterOp::Gte, "startTime");
        assert_eq!(col.param_for(FilterOp::Gte), Some("startTime"));
    }

    #[test]
    fn test_parse_filter_op() {
        assert_eq!(FilterOp::parse(">="), Some(FilterOp::Gte));
        assert_eq!(FilterOp::parse("NE"), Some(FilterOp::NotEq));
        assert_eq!(FilterOp::parse("between"), None);
    }

    #[test]
    fn test_pagination_can_start_at() {
        assert!(PaginationMode::offset(50).can_start_at(13));
        assert!(PaginationMode::page_number(10).can_start_at(20));
        assert!(!PaginationMode::page_number(10).can_start_at(15));
        assert!(PaginationMode::cursor("next", 10).can_start_at(0));
        assert!(!PaginationMode::cursor("next", 10).can_start_at(1));
        assert!(!PaginationMode::None.can_start_at(3));
    }

    #[test]
    fn test_column_lookup_case_insensitive() {
        let table = TableDescriptor::new("fields", "/fields")
            .with_column(ColumnDescriptor::new("id", SemanticType::String))
            .with_column(ColumnDescriptor::new("farm_id", SemanticType::String));
        assert_eq!(table.column_index("FARM_ID"), Some(1));
        assert!(table.column("nope").is_none());
        assert_eq!(&*table.column_names(), &["id".to_string(), "farm_id".to_string()]);
    }
}
