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

//! Local evaluation of the operations the API cannot perform.

use super::like_to_regex;
use crate::catalog::TableDescriptor;
use crate::error::{Error, Result};
use crate::plan::{CompareOp, Limit, PlanSplit, Predicate, SortDirection, coerce_literal};
use crate::value::{TypedRow, Value};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::Arc;

/// A predicate bound to column positions of the materialized row.
#[derive(Debug)]
enum Compiled {
    Compare {
        index: usize,
        op: CompareOp,
        value: Value,
    },
    In {
        index: usize,
        values: Vec<Value>,
    },
    Like {
        index: usize,
        regex: Regex,
    },
    /// Unanchored search
    Regex {
        index: usize,
        regex: Regex,
    },
    IsNull(usize),
    IsNotNull(usize),
    And(Vec<Compiled>),
    Or(Vec<Compiled>),
    Not(Box<Compiled>),
}

impl Compiled {
    /// Three-valued evaluation; `None` is SQL `UNKNOWN`.
    fn eval(&self, row: &[Value]) -> Option<bool> {
        match self {
            Compiled::Compare { index, op, value } => {
                row[*index].sql_cmp(value).map(|ord| op.matches(ord))
            }
            Compiled::In { index, values } => {
                let cell = &row[*index];
                if cell.is_null() {
                    return None;
                }
                let mut unknown = false;
                for v in values {
                    match cell.sql_cmp(v) {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Compiled::Like { index, regex } | Compiled::Regex { index, regex } => {
                match &row[*index] {
                    Value::Null => None,
                    Value::String(s) => Some(regex.is_match(s)),
                    other => Some(regex.is_match(&other.to_param())),
                }
            }
            Compiled::IsNull(index) => Some(row[*index].is_null()),
            Compiled::IsNotNull(index) => Some(!row[*index].is_null()),
            Compiled::And(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match part.eval(row) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Compiled::Or(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match part.eval(row) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Compiled::Not(inner) => inner.eval(row).map(|b| !b),
        }
    }
}

/// Outcome of offering one row to a [`LimitWindow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitDecision {
    /// Row falls before the offset
    Skip,
    Emit,
    /// Row falls past the limit; no later row can be emitted
    Done,
}

/// Streaming `OFFSET`/`LIMIT` counter.
#[derive(Clone, Debug, Default)]
pub struct LimitWindow {
    limit: Option<Limit>,
    seen: usize,
}

impl LimitWindow {
    pub fn new(limit: Option<Limit>) -> Self {
        Self { limit, seen: 0 }
    }

    pub fn offer(&mut self) -> LimitDecision {
        let Some(limit) = &self.limit else {
            return LimitDecision::Emit;
        };
        if limit.end().is_some_and(|end| self.seen >= end) {
            return LimitDecision::Done;
        }
        self.seen += 1;
        if self.seen <= limit.offset {
            LimitDecision::Skip
        } else {
            LimitDecision::Emit
        }
    }

    /// True once no further row can be emitted.
    pub fn is_full(&self) -> bool {
        self.limit
            .as_ref()
            .and_then(Limit::end)
            .is_some_and(|end| self.seen >= end)
    }
}

/// Residual filters, sort, limit and final projection of a [`PlanSplit`],
/// bound to the positions of the materialized columns.
#[derive(Debug)]
pub struct ResidualPipeline {
    filters: Vec<Compiled>,
    sort: Option<Vec<(usize, SortDirection)>>,
    limit: Option<Limit>,
    output_indices: Vec<usize>,
    output_columns: Arc<[String]>,
}

impl ResidualPipeline {
    pub fn new(table: &TableDescriptor, split: &PlanSplit) -> Result<Self> {
        let position = |name: &str| -> Result<usize> {
            split
                .materialized_columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::column_not_found(&table.name, name))
        };

        let filters = split
            .residual_filters
            .iter()
            .map(|p| compile(table, p, &position))
            .collect::<Result<Vec<_>>>()?;
        let sort = split
            .residual_sort
            .as_ref()
            .map(|keys| {
                keys.iter()
                    .map(|k| Ok((position(&k.column)?, k.direction)))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;
        let output_indices = split
            .output_columns
            .iter()
            .map(|c| position(c))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            filters,
            sort,
            limit: split.residual_limit,
            output_indices,
            output_columns: split.output_columns.iter().cloned().collect(),
        })
    }

    /// True when every residual filter evaluates to `TRUE` for `row`.
    pub fn matches(&self, row: &TypedRow) -> bool {
        self.filters.iter().all(|f| f.eval(row.values()) == Some(true))
    }

    pub fn has_sort(&self) -> bool {
        self.sort.is_some()
    }

    /// Stable sort by the residual keys. Nulls sort last ascending and first descending.
    pub fn sort(&self, rows: &mut [TypedRow]) {
        let Some(keys) = &self.sort else {
            return;
        };
        rows.sort_by(|a, b| compare_rows(a.values(), b.values(), keys));
    }

    pub fn limit_window(&self) -> LimitWindow {
        LimitWindow::new(self.limit)
    }

    pub fn output_columns(&self) -> &Arc<[String]> {
        &self.output_columns
    }

    pub fn project(&self, row: &TypedRow) -> TypedRow {
        row.project(&self.output_indices, Arc::clone(&self.output_columns))
    }
}

fn compare_rows(a: &[Value], b: &[Value], keys: &[(usize, SortDirection)]) -> Ordering {
    for &(index, direction) in keys {
        let (x, y) = (&a[index], &b[index]);
        let ord = match (x.is_null(), y.is_null(), direction) {
            (true, true, _) => Ordering::Equal,
            (true, false, SortDirection::Asc) | (false, true, SortDirection::Desc) => {
                Ordering::Greater
            }
            (true, false, SortDirection::Desc) | (false, true, SortDirection::Asc) => {
                Ordering::Less
            }
            (false, false, SortDirection::Asc) => x.sort_cmp(y),
            (false, false, SortDirection::Desc) => x.sort_cmp(y).reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compile(
    table: &TableDescriptor,
    predicate: &Predicate,
    position: &dyn Fn(&str) -> Result<usize>,
) -> Result<Compiled> {
    let literal = |column: &str, value: &Value| -> Value {
        table
            .column(column)
            .and_then(|c| coerce_literal(value, c.semantic_type))
            .unwrap_or_else(|| value.clone())
    };
    Ok(match predicate {
        Predicate::Compare { column, op, value } => Compiled::Compare {
            index: position(column)?,
            op: *op,
            value: literal(column, value),
        },
        Predicate::In { column, values } => Compiled::In {
            index: position(column)?,
            values: values.iter().map(|v| literal(column, v)).collect(),
        },
        Predicate::Like {
            column,
            pattern,
            case_insensitive,
        } => Compiled::Like {
            index: position(column)?,
            regex: like_to_regex(pattern, *case_insensitive)?,
        },
        Predicate::Regex { column, pattern } => Compiled::Regex {
            index: position(column)?,
            regex: Regex::new(pattern)
                .map_err(|e| Error::InvalidPredicate(format!("regex '{pattern}': {e}")))?,
        },
        Predicate::IsNull(column) => Compiled::IsNull(position(column)?),
        Predicate::IsNotNull(column) => Compiled::IsNotNull(position(column)?),
        Predicate::And(parts) => Compiled::And(
            parts
                .iter()
                .map(|p| compile(table, p, position))
                .collect::<Result<_>>()?,
        ),
        Predicate::Or(parts) => Compiled::Or(
            parts
                .iter()
                .map(|p| compile(table, p, position))
                .collect::<Result<_>>()?,
        ),
        Predicate::Not(inner) => Compiled::Not(Box::new(compile(table, inner, position)?)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDescriptor, FilterOp};
    use crate::plan::{PushdownPlanner, ScanRequest, SortKey};
    use crate::value::SemanticType;

    fn yields() -> TableDescriptor {
        TableDescriptor::new("yields", "/yields").with_columns([
            ColumnDescriptor::new("id", SemanticType::String)
                .not_null()
                .with_filters([FilterOp::Eq]),
            ColumnDescriptor::new("crop", SemanticType::String),
            ColumnDescriptor::new("bushels", SemanticType::Integer),
        ])
    }

    fn rows(table: &TableDescriptor, data: &[(&str, Option<&str>, Option<i64>)]) -> Vec<TypedRow> {
        data.iter()
            .map(|(id, crop, bushels)| {
                TypedRow::new(
                    table.column_names(),
                    vec![Value::from(*id), Value::from(*crop), Value::from(*bushels)],
                )
            })
            .collect()
    }

    fn pipeline(table: &TableDescriptor, request: ScanRequest) -> ResidualPipeline {
        let split = PushdownPlanner::plan(table, &request).unwrap();
        ResidualPipeline::new(table, &split).unwrap()
    }

    #[test]
    fn test_null_comparison_is_not_true() {
        let table = yields();
        let p = pipeline(
            &table,
            ScanRequest::builder()
                .table("yields")
                .filters(vec![Predicate::gt("bushels", 10)])
                .build(),
        );
        let data = rows(&table, &[("a", None, Some(20)), ("b", None, None), ("c", None, Some(5))]);
        let kept: Vec<_> = data.iter().filter(|r| p.matches(r)).map(|r| r.values()[0].clone()).collect();
        assert_eq!(kept, vec![Value::from("a")]);
    }

    #[test]
    fn test_kleene_or_and_not() {
        let table = yields();
        // NULL OR TRUE is TRUE; NOT (NULL > 10) stays UNKNOWN
        let p = pipeline(
            &table,
            ScanRequest::builder()
                .table("yields")
                .filters(vec![Predicate::gt("bushels", 10).or(Predicate::eq("crop", "corn"))])
                .build(),
        );
        let data = rows(&table, &[("a", Some("corn"), None), ("b", Some("soy"), None)]);
        assert!(p.matches(&data[0]));
        assert!(!p.matches(&data[1]));

        let p = pipeline(
            &table,
            ScanRequest::builder()
                .table("yields")
                .filters(vec![!Predicate::like("crop", "s%")])
                .build(),
        );
        assert!(p.matches(&data[0]));
        assert!(!p.matches(&data[1]));
        assert!(!p.matches(&rows(&table, &[("c", None, None)])[0]));
    }

    #[test]
    fn test_in_list_and_literal_coercion() {
        let table = yields();
        let p = pipeline(
            &table,
            ScanRequest::builder()
                .table("yields")
                .filters(vec![Predicate::in_list("bushels", ["20", "30"])])
                .build(),
        );
        let data = rows(&table, &[("a", None, Some(20)), ("b", None, Some(25))]);
        assert!(p.matches(&data[0]));
        assert!(!p.matches(&data[1]));
    }

    #[test]
    fn test_sort_desc_nulls_first_and_stable() {
        let table = yields();
        let p = pipeline(
            &table,
            ScanRequest::builder()
                .table("yields")
                .sort(vec![SortKey::desc("bushels")])
                .build(),
        );
        let mut data = rows(
            &table,
            &[("a", None, Some(1)), ("b", None, None), ("c", None, Some(3)), ("d", None, Some(1))],
        );
        p.sort(&mut data);
        let ids: Vec<_> = data.iter().map(|r| r.values()[0].to_string()).collect();
        assert_eq!(ids, vec!["'b'", "'c'", "'a'", "'d'"]);

        let p = pipeline(
            &table,
            ScanRequest::builder()
                .table("yields")
                .sort(vec![SortKey::asc("bushels")])
                .build(),
        );
        p.sort(&mut data);
        let ids: Vec<_> = data.iter().map(|r| r.values()[0].to_string()).collect();
        assert_eq!(ids, vec!["'a'", "'d'", "'c'", "'b'"]);
    }

    #[test]
    fn test_limit_window() {
        let mut window = LimitWindow::new(Some(Limit::new(2).with_offset(1)));
        let decisions: Vec<_> = (0..4).map(|_| window.offer()).collect();
        assert_eq!(
            decisions,
            vec![LimitDecision::Skip, LimitDecision::Emit, LimitDecision::Emit, LimitDecision::Done]
        );
        assert!(window.is_full());

        let mut unlimited = LimitWindow::new(None);
        assert_eq!(unlimited.offer(), LimitDecision::Emit);
        assert!(!unlimited.is_full());
    }

    #[test]
    fn test_projection_in_request_order() {
        let table = yields();
        let p = pipeline(
            &table,
            ScanRequest::builder()
                .table("yields")
                .projection(vec!["bushels".into(), "ID".into()])
                .build(),
        );
        let row = &rows(&table, &[("a", Some("corn"), Some(7))])[0];
        let out = p.project(row);
        assert_eq!(out.columns(), &["bushels".to_string(), "id".to_string()]);
        assert_eq!(out.values(), &[Value::Integer(7), Value::from("a")]);
    }
}
