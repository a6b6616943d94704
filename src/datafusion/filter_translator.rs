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

//! Translation of DataFusion filter expressions into scan predicates.
//!
//! Supported shapes, with the column on either side of a comparison:
//!
//! - `=`, `!=`, `<`, `<=`, `>`, `>=` against a literal
//! - `LIKE`, `ILIKE` and their negations with a literal pattern
//! - `~`, `~*`, `!~`, `!~*` with a literal pattern
//! - `IN` / `NOT IN` lists of literals
//! - `IS NULL`, `IS NOT NULL`
//! - `AND`, `OR`, `NOT` over supported expressions
//!
//! Anything else (functions, casts, arithmetic, subqueries) is left to DataFusion.

use crate::plan::{CompareOp, Predicate};
use crate::value::Value;
use chrono::DateTime;
use datafusion::logical_expr::expr::{InList, Like};
use datafusion::logical_expr::{BinaryExpr, Expr, Operator};
use datafusion::scalar::ScalarValue;

/// Converts a DataFusion expression to a [`Predicate`]; `None` when unsupported.
///
/// ```
/// use datafusion::logical_expr::{col, lit};
/// use leafsql::datafusion::expr_to_predicate;
///
/// let p = expr_to_predicate(&col("area").gt(lit(40.0))).unwrap();
/// assert_eq!(p.to_string(), "area > 40");
/// ```
pub fn expr_to_predicate(expr: &Expr) -> Option<Predicate> {
    match expr {
        Expr::BinaryExpr(bin) => translate_binary_expr(bin),
        Expr::Not(inner) => expr_to_predicate(inner).map(|p| !p),
        Expr::IsNull(inner) => column_name(inner).map(Predicate::is_null),
        Expr::IsNotNull(inner) => column_name(inner).map(Predicate::is_not_null),
        Expr::Like(like) => translate_like(like),
        Expr::InList(in_list) => translate_in_list(in_list),
        _ => None,
    }
}

fn translate_binary_expr(bin: &BinaryExpr) -> Option<Predicate> {
    use Operator::*;

    match bin.op {
        And => Some(expr_to_predicate(&bin.left)?.and(expr_to_predicate(&bin.right)?)),
        Or => Some(expr_to_predicate(&bin.left)?.or(expr_to_predicate(&bin.right)?)),
        Eq | NotEq | Lt | LtEq | Gt | GtEq => {
            let op = compare_op(bin.op)?;
            translate_comparison(&bin.left, op, &bin.right)
                .or_else(|| translate_comparison(&bin.right, op.flip(), &bin.left))
        }
        LikeMatch | ILikeMatch | NotLikeMatch | NotILikeMatch => {
            let column = column_name(&bin.left)?;
            let pattern = literal_string(&bin.right)?;
            let predicate = match bin.op {
                LikeMatch | NotLikeMatch => Predicate::like(column, pattern),
                _ => Predicate::ilike(column, pattern),
            };
            Some(match bin.op {
                NotLikeMatch | NotILikeMatch => !predicate,
                _ => predicate,
            })
        }
        RegexMatch | RegexIMatch | RegexNotMatch | RegexNotIMatch => {
            let column = column_name(&bin.left)?;
            let pattern = literal_string(&bin.right)?;
            let pattern = match bin.op {
                RegexIMatch | RegexNotIMatch => format!("(?i){pattern}"),
                _ => pattern,
            };
            let predicate = Predicate::regex(column, pattern);
            Some(match bin.op {
                RegexNotMatch | RegexNotIMatch => !predicate,
                _ => predicate,
            })
        }
        _ => None,
    }
}

fn compare_op(op: Operator) -> Option<CompareOp> {
    Some(match op {
        Operator::Eq => CompareOp::Eq,
        Operator::NotEq => CompareOp::NotEq,
        Operator::Lt => CompareOp::Lt,
        Operator::LtEq => CompareOp::Lte,
        Operator::Gt => CompareOp::Gt,
        Operator::GtEq => CompareOp::Gte,
        _ => return None,
    })
}

fn translate_comparison(col_expr: &Expr, op: CompareOp, value_expr: &Expr) -> Option<Predicate> {
    let column = column_name(col_expr)?;
    let value = literal_value(value_expr)?;
    Some(Predicate::compare(column, op, value))
}

fn translate_like(like: &Like) -> Option<Predicate> {
    if like.escape_char.is_some_and(|c| c != '\\') {
        return None;
    }
    let column = column_name(&like.expr)?;
    let pattern = literal_string(&like.pattern)?;
    let predicate = if like.case_insensitive {
        Predicate::ilike(column, pattern)
    } else {
        Predicate::like(column, pattern)
    };
    Some(if like.negated { !predicate } else { predicate })
}

fn translate_in_list(in_list: &InList) -> Option<Predicate> {
    let column = column_name(&in_list.expr)?;
    let values = in_list
        .list
        .iter()
        .map(literal_value)
        .collect::<Option<Vec<_>>>()?;
    let predicate = Predicate::in_list(column, values);
    Some(if in_list.negated { !predicate } else { predicate })
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Column(col) => Some(col.name.clone()),
        _ => None,
    }
}

fn literal_string(expr: &Expr) -> Option<String> {
    match literal_value(expr)? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(scalar, _) => scalar_to_value(scalar),
        _ => None,
    }
}

/// Converts a scalar literal. `None` for types scans cannot compare against.
pub fn scalar_to_value(scalar: &ScalarValue) -> Option<Value> {
    if scalar.is_null() {
        return Some(Value::Null);
    }
    match scalar {
        ScalarValue::Int8(Some(v)) => Some(Value::Integer(i64::from(*v))),
        ScalarValue::Int16(Some(v)) => Some(Value::Integer(i64::from(*v))),
        ScalarValue::Int32(Some(v)) => Some(Value::Integer(i64::from(*v))),
        ScalarValue::Int64(Some(v)) => Some(Value::Integer(*v)),
        ScalarValue::UInt8(Some(v)) => Some(Value::Integer(i64::from(*v))),
        ScalarValue::UInt16(Some(v)) => Some(Value::Integer(i64::from(*v))),
        ScalarValue::UInt32(Some(v)) => Some(Value::Integer(i64::from(*v))),
        ScalarValue::UInt64(Some(v)) => i64::try_from(*v).ok().map(Value::Integer),
        ScalarValue::Float32(Some(v)) if v.is_finite() => Some(Value::Decimal(f64::from(*v))),
        ScalarValue::Float64(Some(v)) if v.is_finite() => Some(Value::Decimal(*v)),
        ScalarValue::Boolean(Some(v)) => Some(Value::Boolean(*v)),
        ScalarValue::Utf8(Some(v))
        | ScalarValue::LargeUtf8(Some(v))
        | ScalarValue::Utf8View(Some(v)) => Some(Value::String(v.clone())),
        ScalarValue::TimestampSecond(Some(v), _) => {
            DateTime::from_timestamp(*v, 0).map(Value::Timestamp)
        }
        ScalarValue::TimestampMillisecond(Some(v), _) => {
            DateTime::from_timestamp_millis(*v).map(Value::Timestamp)
        }
        ScalarValue::TimestampMicrosecond(Some(v), _) => {
            DateTime::from_timestamp_micros(*v).map(Value::Timestamp)
        }
        ScalarValue::TimestampNanosecond(Some(v), _) => {
            Some(Value::Timestamp(DateTime::from_timestamp_nanos(*v)))
        }
        _ => None,
    }
}
