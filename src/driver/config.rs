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

//! Connection configuration.
//!
//! A connection string starts with `leaf:` (a leading `jdbc:` is accepted)
//! and carries parameters in one of two forms:
//!
//! ```text
//! leaf:?token=abc&apiBase=https%3A%2F%2Fapi.withleaf.io
//! leaf:token=abc;apiBase=https://api.withleaf.io
//! ```
//!
//! The query form is percent-decoded; the `;` form is taken verbatim. Explicit
//! properties take precedence over values from the string.

use crate::error::{Error, Result};
use crate::fetch::RetryPolicy;
use crate::result_set::RowErrorPolicy;
use crate::utils::url_decode;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const URL_PREFIX: &str = "leaf:";
pub const DEFAULT_API_BASE: &str = "https://api.withleaf.io";
pub const DEFAULT_AUTH_PATH: &str = "/api/authenticate";

/// Settings of one connection.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// Scheme and host of the Leaf API, without a trailing slash
    #[serde(alias = "apiPrefix")]
    pub api_base: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_path: String,
    /// Endpoint serving table metadata; the built-in tables are used when unset
    pub metadata_path: Option<String>,
    pub native_query_path: String,
    pub sql_engine: String,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Overrides the page size of every table
    pub page_size: Option<usize>,
    pub row_error_policy: RowErrorPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            username: None,
            password: None,
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            metadata_path: None,
            native_query_path: crate::native::NATIVE_QUERY_PATH.to_string(),
            sql_engine: crate::native::NATIVE_SQL_ENGINE.to_string(),
            request_timeout_ms: 60_000,
            connect_timeout_ms: 10_000,
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            page_size: None,
            row_error_policy: RowErrorPolicy::Surface,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ConnectionConfig")
            .field("api_base", &self.api_base)
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("metadata_path", &self.metadata_path)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .field("row_error_policy", &self.row_error_policy)
            .finish_non_exhaustive()
    }
}

impl ConnectionConfig {
    /// Configuration authenticated by a static bearer token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Parses a connection string; non-blank `properties` override its values.
    pub fn parse(url: &str, properties: &HashMap<String, String>) -> Result<Self> {
        let rest = url
            .strip_prefix("jdbc:")
            .unwrap_or(url)
            .strip_prefix(URL_PREFIX)
            .ok_or_else(|| {
                Error::Configuration(format!("connection string must start with '{URL_PREFIX}'"))
            })?;

        let mut params = HashMap::new();
        if let Some(query) = rest.strip_prefix('?') {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                params.insert(url_decode(k)?, url_decode(v)?);
            }
        } else {
            for pair in rest.split(';').filter(|p| !p.is_empty()) {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                params.insert(k.trim().to_string(), v.trim().to_string());
            }
        }
        for (k, v) in properties {
            if !v.trim().is_empty() {
                params.insert(k.clone(), v.clone());
            }
        }

        let mut config = Self::default();
        let mut keys: Vec<_> = params.keys().cloned().collect();
        keys.sort();
        for key in keys {
            let value = &params[&key];
            if !value.trim().is_empty() {
                config.set(&key, value.trim())?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets one parameter by its connection-string name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "apiBase" | "apiPrefix" => self.api_base = value.to_string(),
            "token" => self.token = Some(value.to_string()),
            "username" | "user" => self.username = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "authPath" => self.auth_path = value.to_string(),
            "metadataPath" => self.metadata_path = Some(value.to_string()),
            "nativeQueryPath" => self.native_query_path = value.to_string(),
            "sqlEngine" => self.sql_engine = value.to_string(),
            "requestTimeoutMs" => self.request_timeout_ms = parse_number(key, value)?,
            "connectTimeoutMs" => self.connect_timeout_ms = parse_number(key, value)?,
            "maxRetries" => self.max_retries = parse_number(key, value)?,
            "initialBackoffMs" => self.initial_backoff_ms = parse_number(key, value)?,
            "maxBackoffMs" => self.max_backoff_ms = parse_number(key, value)?,
            "pageSize" => self.page_size = Some(parse_number(key, value)?),
            "rowErrorPolicy" => self.row_error_policy = value.parse()?,
            other => log::warn!("ignoring unknown connection property '{other}'"),
        }
        Ok(())
    }

    /// Checks that the configuration can open a connection.
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.api_base)
            .map_err(|e| Error::Configuration(format!("invalid apiBase '{}': {e}", self.api_base)))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(Error::Configuration(format!(
                "apiBase must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        let has_token = self.token.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_login = self.username.is_some() && self.password.is_some();
        if !has_token && !has_login {
            return Err(Error::Configuration(
                "missing required property 'token' (or 'username' and 'password')".into(),
            ));
        }
        if self.page_size == Some(0) {
            return Err(Error::Configuration("pageSize must be positive".into()));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(Error::Configuration(
                "maxBackoffMs must not be below initialBackoffMs".into(),
            ));
        }
        Ok(())
    }

    /// API base without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Configuration(format!("'{key}' must be a number, got '{value}'")))
}
