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

//! Error types for the Leaf SQL driver.
//!
//! Every fallible operation returns [`Result<T>`](Result). Errors raised while
//! talking to the Leaf API carry a [`RequestContext`] describing the call that
//! failed; the token never appears in it.

use crate::value::SemanticType;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Describes the HTTP call an error originated from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub table: Option<String>,
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            table: None,
            method: method.into(),
            url: url.into(),
            status: None,
        }
    }

    pub fn with_table(mut self, table: Option<&str>) -> Self {
        self.table = table.map(str::to_owned);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if let Some(table) = &self.table {
            write!(f, " (table {table})")?;
        }
        if let Some(status) = self.status {
            write!(f, " -> {status}")?;
        }
        Ok(())
    }
}

fn context_suffix(context: &Option<RequestContext>) -> String {
    match context {
        Some(ctx) => format!(" [{ctx}]"),
        None => String::new(),
    }
}

/// Kind of catalog object a lookup failed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Column,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Table => f.write_str("table"),
            ObjectKind::Column => f.write_str("column"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing connection parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Credentials were rejected or could not be obtained.
    #[error("authentication failed: {message}{ctx}", ctx = context_suffix(.context))]
    Authentication {
        message: String,
        context: Option<RequestContext>,
    },

    /// Retries for a transient failure were exhausted.
    #[error(
        "transient network failure after {attempts} attempt(s): {message}{ctx}",
        ctx = context_suffix(.context)
    )]
    TransientNetwork {
        attempts: u32,
        message: String,
        context: Option<RequestContext>,
    },

    /// The API answered with a non-retryable status.
    #[error("API request failed with status {status}: {message}{ctx}", ctx = context_suffix(.context))]
    Api {
        status: u16,
        message: String,
        context: Option<RequestContext>,
    },

    /// The request could not be sent and retrying would not help.
    #[error("transport error: {message}{ctx}", ctx = context_suffix(.context))]
    Transport {
        message: String,
        context: Option<RequestContext>,
    },

    /// The response body could not be decoded into records.
    #[error("invalid response: {message}{ctx}", ctx = context_suffix(.context))]
    InvalidResponse {
        message: String,
        context: Option<RequestContext>,
    },

    /// A required field was missing or null.
    #[error("schema violation in {table}.{column}: {message}")]
    SchemaViolation {
        table: String,
        column: String,
        message: String,
    },

    /// A value could not be converted to the column's declared type.
    #[error("cannot coerce {found} to {expected} for {table}.{column}")]
    TypeCoercion {
        table: String,
        column: String,
        expected: SemanticType,
        found: String,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: ObjectKind, name: String },

    /// A predicate is malformed (bad regex or LIKE pattern, wrong arity).
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("connection closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: ObjectKind::Table,
            name: name.into(),
        }
    }

    pub fn column_not_found(table: &str, column: &str) -> Self {
        Error::NotFound {
            kind: ObjectKind::Column,
            name: format!("{table}.{column}"),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Error::InvalidResponse {
            message: message.into(),
            context: None,
        }
    }

    /// Errors scoped to a single row; the result set may continue after them.
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            Error::SchemaViolation { .. } | Error::TypeCoercion { .. }
        )
    }

    /// Attaches a request context to errors that carry one.
    pub fn with_context(mut self, ctx: RequestContext) -> Self {
        match &mut self {
            Error::Authentication { context, .. }
            | Error::TransientNetwork { context, .. }
            | Error::Api { context, .. }
            | Error::Transport { context, .. }
            | Error::InvalidResponse { context, .. } => {
                if context.is_none() {
                    *context = Some(ctx);
                }
            }
            _ => {}
        }
        self
    }

    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            Error::Authentication { context, .. }
            | Error::TransientNetwork { context, .. }
            | Error::Api { context, .. }
            | Error::Transport { context, .. }
            | Error::InvalidResponse { context, .. } => context.as_ref(),
            _ => None,
        }
    }
}
