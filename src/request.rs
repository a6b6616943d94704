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

//! Translation of a plan split into concrete API requests.
//!
//! The query-parameter encoding of each remote filter operator is:
//!
//! | operator      | parameter                        |
//! |---------------|----------------------------------|
//! | `=`           | `field=value`                    |
//! | `!=`          | `field_ne=value`                 |
//! | `>` `>=`      | `field_gt=value`, `field_gte=value` |
//! | `<` `<=`      | `field_lt=value`, `field_lte=value` |
//! | `IN`          | `field=v1&field=v2`              |
//! | `LIKE`        | `field_like=pattern`             |
//! | regex         | `field_regex=pattern`            |
//! | `IS NULL`     | `field_null=true`                |
//! | `IS NOT NULL` | `field_null=false`               |
//!
//! A column descriptor may override the parameter name per operator, e.g. the
//! Leaf operations endpoint takes `startTime=` to mean "start time at or after".

use crate::catalog::{FilterOp, PaginationMode, TableDescriptor};
use crate::error::{Error, Result};
use crate::fetch::pagination::{PagePosition, PaginationState};
use crate::fetch::transport::HttpRequest;
use crate::multimap_ext::{Multimap, MultimapExt};
use crate::plan::{PlanSplit, RemoteProjection};
use bytes::Bytes;
use http::Method;
use std::sync::Arc;

/// One HTTP request, fully determined by a plan split and a pagination position.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the API base
    pub path: String,
    pub query_params: Multimap,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
    /// Continuation token this request carries, in cursor mode
    pub cursor: Option<String>,
    /// Records asked for, when the endpoint is paginated
    pub page_size: Option<usize>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query_params: Multimap::new(),
            body: None,
            content_type: None,
            cursor: None,
            page_size: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.add(key, value);
        self
    }

    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    /// Canonical query string: parameters sorted by name.
    pub fn query_string(&self) -> String {
        self.query_params.get_canonical_query_string()
    }

    /// Absolute URL against `base`.
    pub fn url(&self, base: &str) -> String {
        let mut url = String::with_capacity(base.len() + self.path.len() + 64);
        url.push_str(base.trim_end_matches('/'));
        if !self.path.starts_with('/') {
            url.push('/');
        }
        url.push_str(&self.path);
        let query = self.query_string();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    pub fn to_http_request(&self, base: &str, authorization: Option<&str>) -> HttpRequest {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(auth) = authorization {
            headers.push(("Authorization".to_string(), auth.to_string()));
        }
        if let Some(ct) = &self.content_type {
            headers.push(("Content-Type".to_string(), ct.clone()));
        }
        HttpRequest {
            method: self.method.clone(),
            url: self.url(base),
            headers,
            body: self.body.clone(),
        }
    }
}

/// Builds the request for each page of one table scan.
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    table: Arc<TableDescriptor>,
}

impl RequestBuilder {
    pub fn new(table: Arc<TableDescriptor>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    /// Builds the request for the page at `state`. Deterministic: equal inputs
    /// give equal descriptors and byte-identical URLs.
    pub fn build(&self, split: &PlanSplit, state: &PaginationState) -> Result<RequestDescriptor> {
        let table = &self.table;
        let mut req = RequestDescriptor::get(&table.endpoint);

        for (key, value) in &table.static_params {
            req.query_params.add(key, value);
        }

        for filter in &split.remote_filters {
            let column = table
                .column(&filter.column)
                .ok_or_else(|| Error::column_not_found(&table.name, &filter.column))?;
            let param = match column.param_for(filter.op) {
                Some(p) => p.to_string(),
                None => format!("{}{}", column.field, filter.op.default_suffix()),
            };
            match filter.op {
                FilterOp::IsNull => req.query_params.add(param, "true"),
                FilterOp::IsNotNull => req.query_params.add(param, "false"),
                FilterOp::In => {
                    for v in &filter.values {
                        req.query_params.add(&param, v.to_param());
                    }
                }
                _ => {
                    let value = filter.values.first().ok_or_else(|| {
                        Error::InvalidPredicate(format!("{} {} has no operand", filter.column, filter.op))
                    })?;
                    req.query_params.add(param, value.to_param());
                }
            }
        }

        if let (Some(param), RemoteProjection::Columns(cols)) =
            (&table.projection_param, &split.remote_projection)
        {
            let fields: Vec<&str> = cols
                .iter()
                .filter_map(|c| table.column(c))
                .map(|c| c.field.as_str())
                .collect();
            if !fields.is_empty() {
                req.query_params.add(param, fields.join(","));
            }
        }

        if let (Some(sort), Some(keys)) = (&table.sort, &split.remote_sort) {
            for key in keys {
                let field = table
                    .column(&key.column)
                    .and_then(|c| c.sort_field.as_deref())
                    .ok_or_else(|| Error::column_not_found(&table.name, &key.column))?;
                req.query_params
                    .add(&sort.param, format!("{field},{}", key.direction.as_str()));
            }
        }

        let remaining = split
            .remote_limit
            .and_then(|l| l.count)
            .map(|count| count.saturating_sub(state.delivered));

        match (&table.pagination, &state.position) {
            (
                PaginationMode::PageNumber {
                    page_param,
                    size_param,
                    page_size,
                    first_page,
                },
                PagePosition::Page(page),
            ) => {
                // A first page that covers the whole limit can simply be shorter.
                let starts_at_zero = split.remote_limit.is_none_or(|l| l.offset == 0);
                let size = match remaining {
                    Some(r) if *page == *first_page && starts_at_zero && r < *page_size => r.max(1),
                    _ => *page_size,
                };
                req.query_params.add(page_param, page.to_string());
                req.query_params.add(size_param, size.to_string());
                req.page_size = Some(size);
            }
            (
                PaginationMode::Offset {
                    offset_param,
                    limit_param,
                    page_size,
                },
                PagePosition::Offset(offset),
            ) => {
                let size = remaining.map_or(*page_size, |r| r.clamp(1, *page_size));
                req.query_params.add(offset_param, offset.to_string());
                req.query_params.add(limit_param, size.to_string());
                req.page_size = Some(size);
            }
            (
                PaginationMode::Cursor {
                    cursor_param,
                    size_param,
                    page_size,
                    ..
                },
                PagePosition::Cursor(cursor),
            ) => {
                let size = remaining.map_or(*page_size, |r| r.clamp(1, *page_size));
                if let Some(c) = cursor {
                    req.query_params.add(cursor_param, c);
                    req.cursor = Some(c.clone());
                }
                if let Some(param) = size_param {
                    req.query_params.add(param, size.to_string());
                }
                req.page_size = Some(size);
            }
            _ => {}
        }

        Ok(req)
    }
}
