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

//! Query plan fragments and the push-down planner.

mod planner;
mod predicate;

pub use planner::{PushdownPlanner, coerce_literal};
pub use predicate::{CompareOp, Predicate};

use crate::catalog::FilterOp;
use crate::value::Value;
use std::fmt;
use typed_builder::TypedBuilder;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_str().to_uppercase())
    }
}

/// `LIMIT count OFFSET offset`; a missing count means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Limit {
    pub count: Option<usize>,
    pub offset: usize,
}

impl Limit {
    pub fn new(count: usize) -> Self {
        Self {
            count: Some(count),
            offset: 0,
        }
    }

    pub fn offset_only(offset: usize) -> Self {
        Self {
            count: None,
            offset,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Position one past the last row kept, if bounded.
    pub fn end(&self) -> Option<usize> {
        self.count.map(|c| c.saturating_add(self.offset))
    }
}

/// The single-table fragment a relational optimizer hands to the driver:
/// a conjunction of filters, a projection, an ordering and a limit.
///
/// ```
/// use leafsql::plan::{Limit, Predicate, ScanRequest, SortKey};
///
/// let scan = ScanRequest::builder()
///     .table("operations")
///     .filters(vec![Predicate::eq("provider", "JohnDeere")])
///     .projection(vec!["id".to_string(), "start_time".to_string()])
///     .sort(vec![SortKey::desc("start_time")])
///     .limit(Limit::new(10))
///     .build();
/// assert_eq!(scan.table, "operations");
/// ```
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct ScanRequest {
    #[builder(setter(into))]
    pub table: String,
    /// Conjunction of predicates
    #[builder(default)]
    pub filters: Vec<Predicate>,
    /// Output columns in order; `None` selects every column
    #[builder(default, setter(strip_option))]
    pub projection: Option<Vec<String>>,
    #[builder(default)]
    pub sort: Vec<SortKey>,
    #[builder(default, setter(strip_option))]
    pub limit: Option<Limit>,
}

impl ScanRequest {
    /// Full scan of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self::builder().table(table).build()
    }
}

/// A filter the API evaluates, normalized to one operator on one column.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteFilter {
    pub column: String,
    pub op: FilterOp,
    pub values: Vec<Value>,
}

impl fmt::Display for RemoteFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        write!(f, "{} {} [{}]", self.column, self.op, values.join(", "))
    }
}

/// Where a conjunct is evaluated.
#[derive(Clone, Debug, PartialEq)]
pub enum Placement {
    Pushable(RemoteFilter),
    Residual,
}

/// One conjunct of the WHERE clause and its placement.
#[derive(Clone, Debug, PartialEq)]
pub struct PredicateFragment {
    pub predicate: Predicate,
    pub placement: Placement,
}

impl PredicateFragment {
    pub fn is_pushable(&self) -> bool {
        matches!(self.placement, Placement::Pushable(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteProjection {
    /// The API returns every field
    All,
    /// Only these columns are requested, in table order
    Columns(Vec<String>),
}

/// Split of a [`ScanRequest`] into what the API does and what runs locally.
///
/// Applying the remote part and then the residual part yields exactly the
/// rows the original request describes.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanSplit {
    pub table: String,
    pub fragments: Vec<PredicateFragment>,
    pub remote_filters: Vec<RemoteFilter>,
    pub remote_projection: RemoteProjection,
    pub remote_sort: Option<Vec<SortKey>>,
    pub remote_limit: Option<Limit>,
    pub residual_filters: Vec<Predicate>,
    pub residual_sort: Option<Vec<SortKey>>,
    pub residual_limit: Option<Limit>,
    /// Columns of each materialized row, in table order
    pub materialized_columns: Vec<String>,
    /// Columns handed to the caller, in request order
    pub output_columns: Vec<String>,
}

impl PlanSplit {
    /// True when nothing but the final projection runs locally.
    pub fn is_fully_pushed(&self) -> bool {
        self.residual_filters.is_empty()
            && self.residual_sort.is_none()
            && self.residual_limit.is_none()
    }

    /// Human-readable plan, one operation per line.
    pub fn explain(&self) -> String {
        let mut lines = vec![format!("Scan {}", self.table)];
        for filter in &self.remote_filters {
            lines.push(format!("  remote filter: {filter}"));
        }
        match &self.remote_projection {
            RemoteProjection::All => lines.push("  remote projection: *".into()),
            RemoteProjection::Columns(cols) => {
                lines.push(format!("  remote projection: {}", cols.join(", ")))
            }
        }
        if let Some(sort) = &self.remote_sort {
            lines.push(format!("  remote sort: {}", join_keys(sort)));
        }
        if let Some(limit) = &self.remote_limit {
            lines.push(format!("  remote limit: {limit:?}"));
        }
        for filter in &self.residual_filters {
            lines.push(format!("  residual filter: {filter}"));
        }
        if let Some(sort) = &self.residual_sort {
            lines.push(format!("  residual sort: {}", join_keys(sort)));
        }
        if let Some(limit) = &self.residual_limit {
            lines.push(format!("  residual limit: {limit:?}"));
        }
        lines.push(format!("  output: {}", self.output_columns.join(", ")));
        lines.join("\n")
    }
}

fn join_keys(keys: &[SortKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
