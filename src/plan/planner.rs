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

//! Decides which parts of a scan the Leaf API can evaluate.
//!
//! The planner is conservative: an operation is pushed only when the table
//! descriptor documents remote support for it and the remote result is
//! guaranteed to match local evaluation. Everything else stays residual.

use super::predicate::{CompareOp, Predicate};
use super::{
    Limit, Placement, PlanSplit, PredicateFragment, RemoteFilter, RemoteProjection, ScanRequest,
    SortKey,
};
use crate::catalog::{ColumnDescriptor, FilterOp, TableDescriptor};
use crate::error::{Error, Result};
use crate::materialize::like_to_regex;
use crate::utils::parse_timestamp;
use crate::value::{SemanticType, Value};
use regex::Regex;
use std::collections::BTreeSet;

/// Stateless push-down planner.
pub struct PushdownPlanner;

impl PushdownPlanner {
    /// Splits `request` into a remote prefix and a local residual.
    ///
    /// Fails with `NotFound` for unknown columns and `InvalidPredicate` for
    /// malformed patterns; never because an operation cannot be pushed.
    pub fn plan(table: &TableDescriptor, request: &ScanRequest) -> Result<PlanSplit> {
        let resolve = |name: &str| -> Result<String> {
            table
                .column(name)
                .map(|c| c.name.clone())
                .ok_or_else(|| Error::column_not_found(&table.name, name))
        };

        let mut conjuncts = Vec::new();
        for filter in &request.filters {
            let normalized = filter.try_map_columns(&mut |c| resolve(c))?;
            validate_patterns(&normalized)?;
            conjuncts.extend(normalized.into_conjuncts());
        }

        let output_columns = match &request.projection {
            Some(cols) => cols.iter().map(|c| resolve(c)).collect::<Result<Vec<_>>>()?,
            None => table.columns.iter().map(|c| c.name.clone()).collect(),
        };

        let sort_keys = request
            .sort
            .iter()
            .map(|k| {
                Ok(SortKey {
                    column: resolve(&k.column)?,
                    direction: k.direction,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut fragments = Vec::with_capacity(conjuncts.len());
        let mut remote_filters = Vec::new();
        let mut residual_filters = Vec::new();
        for predicate in conjuncts {
            let placement = classify(table, &predicate);
            match &placement {
                Placement::Pushable(remote) => remote_filters.push(remote.clone()),
                Placement::Residual => residual_filters.push(predicate.clone()),
            }
            fragments.push(PredicateFragment {
                predicate,
                placement,
            });
        }

        let (remote_sort, residual_sort) = if sort_keys.is_empty() {
            (None, None)
        } else if sort_is_pushable(table, &sort_keys) {
            (Some(sort_keys), None)
        } else {
            (None, Some(sort_keys))
        };

        let (remote_limit, residual_limit) = match request.limit {
            None => (None, None),
            Some(limit) if limit_is_pushable(table, &limit, &residual_filters, &residual_sort) => {
                (Some(limit), None)
            }
            Some(limit) => (None, Some(limit)),
        };

        let remote_projection = match table.projection_param {
            Some(_) => {
                let mut needed: BTreeSet<&str> =
                    output_columns.iter().map(String::as_str).collect();
                for p in &residual_filters {
                    needed.extend(p.referenced_columns());
                }
                if let Some(keys) = &residual_sort {
                    needed.extend(keys.iter().map(|k| k.column.as_str()));
                }
                RemoteProjection::Columns(
                    table
                        .columns
                        .iter()
                        .filter(|c| needed.contains(c.name.as_str()))
                        .map(|c| c.name.clone())
                        .collect(),
                )
            }
            None => RemoteProjection::All,
        };

        let materialized_columns = match &remote_projection {
            RemoteProjection::Columns(cols) => cols.clone(),
            RemoteProjection::All => table.columns.iter().map(|c| c.name.clone()).collect(),
        };

        let split = PlanSplit {
            table: table.name.clone(),
            fragments,
            remote_filters,
            remote_projection,
            remote_sort,
            remote_limit,
            residual_filters,
            residual_sort,
            residual_limit,
            materialized_columns,
            output_columns,
        };
        log::debug!("planned scan:\n{}", split.explain());
        Ok(split)
    }
}

fn validate_patterns(predicate: &Predicate) -> Result<()> {
    match predicate {
        Predicate::Regex { pattern, .. } => Regex::new(pattern)
            .map(|_| ())
            .map_err(|e| Error::InvalidPredicate(format!("invalid regex '{pattern}': {e}"))),
        Predicate::Like {
            pattern,
            case_insensitive,
            ..
        } => like_to_regex(pattern, *case_insensitive).map(|_| ()),
        Predicate::And(parts) | Predicate::Or(parts) => {
            parts.iter().try_for_each(validate_patterns)
        }
        Predicate::Not(inner) => validate_patterns(inner),
        _ => Ok(()),
    }
}

/// Converts a literal to the column's type when the conversion is lossless.
pub fn coerce_literal(value: &Value, ty: SemanticType) -> Option<Value> {
    match (ty, value) {
        (_, Value::Null) => None,
        (SemanticType::String, Value::String(_)) => Some(value.clone()),
        (SemanticType::Integer, Value::Integer(_)) => Some(value.clone()),
        (SemanticType::Integer, Value::Decimal(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Some(Value::Integer(*f as i64))
        }
        (SemanticType::Integer, Value::String(s)) => s.trim().parse().ok().map(Value::Integer),
        (SemanticType::Decimal, Value::Decimal(_)) => Some(value.clone()),
        (SemanticType::Decimal, Value::Integer(i)) => Some(Value::Decimal(*i as f64)),
        (SemanticType::Decimal, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Decimal),
        (SemanticType::Boolean, Value::Boolean(_)) => Some(value.clone()),
        (SemanticType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            _ => None,
        },
        (SemanticType::Timestamp, Value::Timestamp(_)) => Some(value.clone()),
        (SemanticType::Timestamp, Value::String(s)) => parse_timestamp(s).map(Value::Timestamp),
        _ => None,
    }
}

fn pushable(column: &ColumnDescriptor, op: FilterOp, values: &[Value]) -> Placement {
    if !column.supports(op) {
        return Placement::Residual;
    }
    let mut coerced = Vec::with_capacity(values.len());
    for v in values {
        match coerce_literal(v, column.semantic_type) {
            Some(c) => coerced.push(c),
            None => return Placement::Residual,
        }
    }
    Placement::Pushable(RemoteFilter {
        column: column.name.clone(),
        op,
        values: coerced,
    })
}

fn classify(table: &TableDescriptor, predicate: &Predicate) -> Placement {
    match predicate {
        Predicate::Compare { column: c, op, value } => match table.column(c) {
            Some(col) if !value.is_null() => pushable(col, op.filter_op(), std::slice::from_ref(value)),
            _ => Placement::Residual,
        },
        Predicate::In { column: c, values } => {
            let Some(col) = table.column(c) else {
                return Placement::Residual;
            };
            if values.is_empty() || values.iter().any(Value::is_null) {
                Placement::Residual
            } else if values.len() == 1 && !col.supports(FilterOp::In) {
                pushable(col, FilterOp::Eq, values)
            } else {
                pushable(col, FilterOp::In, &dedup(values.clone()))
            }
        }
        Predicate::Like {
            column: c,
            pattern,
            case_insensitive: false,
        } => match table.column(c) {
            Some(col) if col.semantic_type == SemanticType::String => {
                pushable(col, FilterOp::Like, &[Value::String(pattern.clone())])
            }
            _ => Placement::Residual,
        },
        Predicate::Like { .. } => Placement::Residual,
        Predicate::Regex { column: c, pattern } => match table.column(c) {
            Some(col) if col.semantic_type == SemanticType::String => {
                pushable(col, FilterOp::Regex, &[Value::String(pattern.clone())])
            }
            _ => Placement::Residual,
        },
        Predicate::IsNull(c) => table.column(c).map_or(Placement::Residual, |col| {
            pushable(col, FilterOp::IsNull, &[])
        }),
        Predicate::IsNotNull(c) => table.column(c).map_or(Placement::Residual, |col| {
            pushable(col, FilterOp::IsNotNull, &[])
        }),
        Predicate::Not(inner) => match inner.as_ref() {
            Predicate::Compare { column: c, op, value } => classify(
                table,
                &Predicate::Compare {
                    column: c.clone(),
                    op: op.negate(),
                    value: value.clone(),
                },
            ),
            Predicate::IsNull(c) => classify(table, &Predicate::IsNotNull(c.clone())),
            Predicate::IsNotNull(c) => classify(table, &Predicate::IsNull(c.clone())),
            Predicate::Not(double) => classify(table, double),
            _ => Placement::Residual,
        },
        Predicate::Or(_) => classify_or(table, predicate),
        Predicate::And(parts) if parts.len() == 1 => classify(table, &parts[0]),
        Predicate::And(_) => Placement::Residual,
    }
}

/// An OR group is pushable only as an `IN` over a single column.
fn classify_or(table: &TableDescriptor, predicate: &Predicate) -> Placement {
    let branches = predicate.clone().into_disjuncts();
    let mut target: Option<&str> = None;
    let mut values = Vec::new();

    for branch in &branches {
        let (column, branch_values) = match branch {
            Predicate::Compare {
                column,
                op: CompareOp::Eq,
                value,
            } => (column.as_str(), std::slice::from_ref(value)),
            Predicate::In { column, values } => (column.as_str(), values.as_slice()),
            _ => return Placement::Residual,
        };
        match target {
            None => target = Some(column),
            Some(t) if t == column => {}
            Some(_) => return Placement::Residual,
        }
        if branch_values.is_empty() || branch_values.iter().any(Value::is_null) {
            return Placement::Residual;
        }
        values.extend(branch_values.iter().cloned());
    }

    match target.and_then(|t| table.column(t)) {
        Some(col) => pushable(col, FilterOp::In, &dedup(values)),
        None => Placement::Residual,
    }
}

fn dedup(values: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn sort_is_pushable(table: &TableDescriptor, keys: &[SortKey]) -> bool {
    table.sort.is_some()
        && keys.len() <= table.max_sort_keys()
        && keys
            .iter()
            .all(|k| table.column(&k.column).is_some_and(ColumnDescriptor::is_sortable))
}

fn limit_is_pushable(
    table: &TableDescriptor,
    limit: &Limit,
    residual_filters: &[Predicate],
    residual_sort: &Option<Vec<SortKey>>,
) -> bool {
    residual_filters.is_empty()
        && residual_sort.is_none()
        && table.pagination.can_start_at(limit.offset)
}
