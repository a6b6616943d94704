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

//! Property: pushing part of a scan to the API and evaluating the rest
//! locally selects exactly the rows a fully local evaluation selects.

use chrono::DateTime;
use leafsql::catalog::{FilterOp, leaf_table};
use leafsql::materialize::{ResidualPipeline, like_to_regex};
use leafsql::plan::{
    CompareOp, Limit, PlanSplit, Predicate, PushdownPlanner, RemoteFilter, ScanRequest, SortKey,
};
use leafsql::{TypedRow, Value};
use quickcheck::{Arbitrary, Gen, QuickCheck};
use std::cmp::Ordering;
use std::sync::Arc;

const STRING_COLUMNS: [&str; 5] = ["provider", "origin", "status", "file_name", "leaf_user_id"];
const TIME_COLUMNS: [&str; 3] = ["start_time", "end_time", "created_time"];
const WORDS: [&str; 3] = ["a", "b", "c"];
const PATTERNS: [&str; 4] = ["a%", "%b", "_", "c"];

fn timestamp(hour: u8) -> Value {
    Value::Timestamp(DateTime::from_timestamp(i64::from(hour % 4) * 3600, 0).unwrap())
}

fn word(g: &mut Gen) -> Value {
    Value::from(*g.choose(&WORDS).unwrap())
}

fn compare_op(g: &mut Gen) -> CompareOp {
    *g.choose(&[
        CompareOp::Eq,
        CompareOp::NotEq,
        CompareOp::Lt,
        CompareOp::Lte,
        CompareOp::Gt,
        CompareOp::Gte,
    ])
    .unwrap()
}

fn predicate(g: &mut Gen, depth: u8) -> Predicate {
    let string_col = g.choose(&STRING_COLUMNS).unwrap().to_string();
    let time_col = g.choose(&TIME_COLUMNS).unwrap().to_string();
    let kinds = if depth == 0 { 7 } else { 9 };
    match u8::arbitrary(g) % kinds {
        0 => Predicate::compare(string_col, compare_op(g), word(g)),
        1 => Predicate::compare(time_col, compare_op(g), timestamp(u8::arbitrary(g))),
        2 => Predicate::in_list(string_col, (0..1 + usize::arbitrary(g) % 3).map(|_| word(g))),
        3 => Predicate::like(string_col, *g.choose(&PATTERNS).unwrap()),
        4 => Predicate::ilike(string_col, g.choose(&PATTERNS).unwrap().to_uppercase()),
        5 => Predicate::is_null(string_col),
        6 => Predicate::is_not_null(time_col),
        7 => !predicate(g, depth - 1),
        _ => predicate(g, depth - 1).or(predicate(g, depth - 1)),
    }
}

#[derive(Clone, Debug)]
struct Scenario {
    filters: Vec<Predicate>,
    sort: Option<SortKey>,
    limit: Option<Limit>,
    rows: Vec<Vec<Value>>,
}

impl Arbitrary for Scenario {
    fn arbitrary(g: &mut Gen) -> Self {
        let filters = (0..usize::arbitrary(g) % 4).map(|_| predicate(g, 2)).collect();
        let sort = bool::arbitrary(g).then(|| {
            let column = *g.choose(&["start_time", "file_name"]).unwrap();
            if bool::arbitrary(g) {
                SortKey::asc(column)
            } else {
                SortKey::desc(column)
            }
        });
        let limit = bool::arbitrary(g)
            .then(|| Limit::new(usize::arbitrary(g) % 6).with_offset(usize::arbitrary(g) % 3));
        let table = leaf_table("operations").unwrap();
        let rows = (0..usize::arbitrary(g) % 12)
            .map(|i| {
                table
                    .columns
                    .iter()
                    .map(|c| match c.name.as_str() {
                        "id" => Value::from(format!("op-{i}")),
                        name if name.ends_with("_time") => {
                            if u8::arbitrary(g) % 5 == 0 {
                                Value::Null
                            } else {
                                timestamp(u8::arbitrary(g))
                            }
                        }
                        _ => {
                            if u8::arbitrary(g) % 4 == 0 {
                                Value::Null
                            } else {
                                word(g)
                            }
                        }
                    })
                    .collect()
            })
            .collect();
        Scenario {
            filters,
            sort,
            limit,
            rows,
        }
    }
}

/// What the API does with a pushed filter.
fn server_accepts(filter: &RemoteFilter, row: &TypedRow) -> bool {
    let value = row.get_by_name(&filter.column).unwrap();
    let cmp = |i: usize| value.sql_cmp(&filter.values[i]);
    match filter.op {
        FilterOp::Eq => cmp(0) == Some(Ordering::Equal),
        FilterOp::NotEq => matches!(cmp(0), Some(o) if o != Ordering::Equal),
        FilterOp::Lt => cmp(0) == Some(Ordering::Less),
        FilterOp::Lte => matches!(cmp(0), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Gt => cmp(0) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(cmp(0), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::In => (0..filter.values.len()).any(|i| cmp(i) == Some(Ordering::Equal)),
        FilterOp::Like | FilterOp::Regex => {
            let pattern = filter.values[0].as_str().unwrap();
            let re = match filter.op {
                FilterOp::Like => like_to_regex(pattern, false).unwrap(),
                _ => regex::Regex::new(pattern).unwrap(),
            };
            value.as_str().is_some_and(|s| re.is_match(s))
        }
        FilterOp::IsNull => value.is_null(),
        FilterOp::IsNotNull => !value.is_null(),
    }
}

/// Runs rows through the pushed part, then the local part, returning ids.
fn execute(split: &PlanSplit, rows: &[TypedRow]) -> Vec<String> {
    let table = leaf_table("operations").unwrap();
    let pipeline = ResidualPipeline::new(&table, split).unwrap();

    let mut remote: Vec<TypedRow> = rows
        .iter()
        .filter(|r| split.remote_filters.iter().all(|f| server_accepts(f, r)))
        .cloned()
        .collect();
    if split.remote_sort.is_some() {
        pipeline_for_sort(&table, split).sort(&mut remote);
    }
    if let Some(limit) = split.remote_limit {
        remote = remote
            .into_iter()
            .skip(limit.offset)
            .take(limit.count.unwrap_or(usize::MAX))
            .collect();
    }

    let mut kept: Vec<TypedRow> = remote.into_iter().filter(|r| pipeline.matches(r)).collect();
    pipeline.sort(&mut kept);
    let mut window = pipeline.limit_window();
    let mut out = Vec::new();
    for row in &kept {
        match window.offer() {
            leafsql::materialize::LimitDecision::Skip => {}
            leafsql::materialize::LimitDecision::Emit => {
                out.push(row.get_by_name("id").unwrap().as_str().unwrap().to_string())
            }
            leafsql::materialize::LimitDecision::Done => break,
        }
    }
    out
}

/// A pipeline that performs the pushed sort, standing in for the API.
fn pipeline_for_sort(table: &leafsql::catalog::TableDescriptor, split: &PlanSplit) -> ResidualPipeline {
    let mut sorter = split.clone();
    sorter.residual_filters.clear();
    sorter.residual_sort = split.remote_sort.clone();
    sorter.residual_limit = None;
    ResidualPipeline::new(table, &sorter).unwrap()
}

/// The same scan with nothing pushed.
fn all_local(split: &PlanSplit, request: &ScanRequest) -> PlanSplit {
    let mut local = split.clone();
    local.remote_filters.clear();
    local.remote_sort = None;
    local.remote_limit = None;
    local.residual_filters = request.filters.clone();
    local.residual_sort = (!request.sort.is_empty()).then(|| request.sort.clone());
    local.residual_limit = request.limit;
    local
}

fn prop_pushdown_preserves_results(scenario: Scenario) -> bool {
    let table = leaf_table("operations").unwrap();
    let mut request = ScanRequest::new("operations");
    request.filters = scenario.filters.clone();
    request.sort = scenario.sort.clone().into_iter().collect();
    request.limit = scenario.limit;

    let split = PushdownPlanner::plan(&table, &request).unwrap();
    let names: Arc<[String]> = table.column_names();
    let rows: Vec<TypedRow> = scenario
        .rows
        .iter()
        .map(|values| TypedRow::new(names.clone(), values.clone()))
        .collect();

    let planned = execute(&split, &rows);
    let expected = execute(&all_local(&split, &request), &rows);
    planned == expected
}

#[test]
fn pushdown_preserves_results() {
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop_pushdown_preserves_results as fn(Scenario) -> bool);
}

#[test]
fn every_conjunct_is_placed_once() {
    fn prop(scenario: Scenario) -> bool {
        let table = leaf_table("operations").unwrap();
        let mut request = ScanRequest::new("operations");
        request.filters = scenario.filters;
        let split = PushdownPlanner::plan(&table, &request).unwrap();
        let pushed = split.fragments.iter().filter(|f| f.is_pushable()).count();
        split.fragments.len() == split.remote_filters.len() + split.residual_filters.len()
            && pushed == split.remote_filters.len()
            && (split.remote_limit.is_none() || split.residual_filters.is_empty())
    }
    QuickCheck::new()
        .tests(300)
        .quickcheck(prop as fn(Scenario) -> bool);
}
