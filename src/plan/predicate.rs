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

//! Filter predicates over table columns.
//!
//! Predicates are built either directly:
//!
//! ```
//! use leafsql::plan::Predicate;
//!
//! // provider = 'JohnDeere' AND NOT (status = 'failed')
//! let p = Predicate::eq("provider", "JohnDeere").and(!Predicate::eq("status", "failed"));
//! assert_eq!(p.to_string(), "(provider = 'JohnDeere' AND NOT (status = 'failed'))");
//! ```
//!
//! or translated from a SQL front end (see the `datafusion` feature).

use crate::catalog::FilterOp;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }

    pub fn filter_op(&self) -> FilterOp {
        match self {
            CompareOp::Eq => FilterOp::Eq,
            CompareOp::NotEq => FilterOp::NotEq,
            CompareOp::Lt => FilterOp::Lt,
            CompareOp::Lte => FilterOp::Lte,
            CompareOp::Gt => FilterOp::Gt,
            CompareOp::Gte => FilterOp::Gte,
        }
    }

    /// Logical complement: `NOT (a op b)` is `a op.negate() b` under three-valued logic.
    pub fn negate(&self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::NotEq,
            CompareOp::NotEq => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Gte,
            CompareOp::Lte => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Lte,
            CompareOp::Gte => CompareOp::Lt,
        }
    }

    /// Operator with operands swapped: `lit op col` is `col op.flip() lit`.
    pub fn flip(&self) -> CompareOp {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            other => *other,
        }
    }

    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
        }
    }
}

/// A boolean condition over the columns of one table.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    /// SQL `LIKE` with `%` and `_` wildcards
    Like {
        column: String,
        pattern: String,
        case_insensitive: bool,
    },
    Regex {
        column: String,
        pattern: String,
    },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::NotEq, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lte, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gte, value)
    }

    pub fn in_list<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            column: column.into(),
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            column: column.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    pub fn regex(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Regex {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull(column.into())
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Predicate) -> Self {
        let mut parts = self.into_conjuncts();
        parts.extend(other.into_conjuncts());
        Predicate::And(parts)
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn or(self, other: Predicate) -> Self {
        let mut parts = self.into_disjuncts();
        parts.extend(other.into_disjuncts());
        Predicate::Or(parts)
    }

    /// Splits a predicate into its top-level conjuncts.
    pub fn into_conjuncts(self) -> Vec<Predicate> {
        match self {
            Predicate::And(parts) => parts.into_iter().flat_map(Predicate::into_conjuncts).collect(),
            other => vec![other],
        }
    }

    pub fn into_disjuncts(self) -> Vec<Predicate> {
        match self {
            Predicate::Or(parts) => parts.into_iter().flat_map(Predicate::into_disjuncts).collect(),
            other => vec![other],
        }
    }

    /// Every column name referenced, as written.
    pub fn referenced_columns(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::In { column, .. }
            | Predicate::Like { column, .. }
            | Predicate::Regex { column, .. }
            | Predicate::IsNull(column)
            | Predicate::IsNotNull(column) => {
                out.insert(column.as_str());
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.collect_columns(out);
                }
            }
            Predicate::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Rewrites every column reference through `f`.
    pub fn try_map_columns<E>(
        &self,
        f: &mut impl FnMut(&str) -> Result<String, E>,
    ) -> Result<Predicate, E> {
        Ok(match self {
            Predicate::Compare { column, op, value } => Predicate::Compare {
                column: f(column)?,
                op: *op,
                value: value.clone(),
            },
            Predicate::In { column, values } => Predicate::In {
                column: f(column)?,
                values: values.clone(),
            },
            Predicate::Like {
                column,
                pattern,
                case_insensitive,
            } => Predicate::Like {
                column: f(column)?,
                pattern: pattern.clone(),
                case_insensitive: *case_insensitive,
            },
            Predicate::Regex { column, pattern } => Predicate::Regex {
                column: f(column)?,
                pattern: pattern.clone(),
            },
            Predicate::IsNull(column) => Predicate::IsNull(f(column)?),
            Predicate::IsNotNull(column) => Predicate::IsNotNull(f(column)?),
            Predicate::And(parts) => Predicate::And(
                parts
                    .iter()
                    .map(|p| p.try_map_columns(f))
                    .collect::<Result<_, _>>()?,
            ),
            Predicate::Or(parts) => Predicate::Or(
                parts
                    .iter()
                    .map(|p| p.try_map_columns(f))
                    .collect::<Result<_, _>>()?,
            ),
            Predicate::Not(inner) => Predicate::Not(Box::new(inner.try_map_columns(f)?)),
        })
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

fn join(f: &mut fmt::Formatter<'_>, parts: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{p}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { column, op, value } => {
                write!(f, "{column} {} {value}", op.symbol())
            }
            Predicate::In { column, values } => {
                write!(f, "{column} IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
            Predicate::Like {
                column,
                pattern,
                case_insensitive,
            } => {
                let kw = if *case_insensitive { "ILIKE" } else { "LIKE" };
                write!(f, "{column} {kw} '{pattern}'")
            }
            Predicate::Regex { column, pattern } => write!(f, "{column} ~ '{pattern}'"),
            Predicate::IsNull(column) => write!(f, "{column} IS NULL"),
            Predicate::IsNotNull(column) => write!(f, "{column} IS NOT NULL"),
            Predicate::And(parts) => join(f, parts, " AND "),
            Predicate::Or(parts) => join(f, parts, " OR "),
            Predicate::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_flattens() {
        let p = Predicate::eq("a", 1)
            .and(Predicate::eq("b", 2).and(Predicate::eq("c", 3)));
        assert_eq!(p.into_conjuncts().len(), 3);
    }

    #[test]
    fn test_or_flattens() {
        let p = Predicate::eq("a", 1).or(Predicate::eq("a", 2)).or(Predicate::eq("a", 3));
        match p {
            Predicate::Or(parts) => assert_eq!(parts.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_negate_and_flip() {
        for op in [
            CompareOp::Eq,
            CompareOp::NotEq,
            CompareOp::Lt,
            CompareOp::Lte,
            CompareOp::Gt,
            CompareOp::Gte,
        ] {
            assert_eq!(op.negate().negate(), op);
            assert_eq!(op.flip().flip(), op);
            for ord in [Ordering::Less, Ordering::Equal, Ordering::Greater] {
                assert_eq!(op.negate().matches(ord), !op.matches(ord));
                assert_eq!(op.flip().matches(ord.reverse()), op.matches(ord));
            }
        }
    }

    #[test]
    fn test_referenced_columns() {
        let p = Predicate::eq("provider", "x")
            .and(!Predicate::is_null("status").or(Predicate::in_list("farm_id", ["1", "2"])));
        let cols: Vec<_> = p.referenced_columns().into_iter().collect();
        assert_eq!(cols, vec!["farm_id", "provider", "status"]);
    }

    #[test]
    fn test_display() {
        let p = Predicate::in_list("farm_id", [1, 2]).or(Predicate::ilike("name", "north%"));
        assert_eq!(p.to_string(), "(farm_id IN (1, 2) OR name ILIKE 'north%')");
    }
}
