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

//! HTTP transport seam.
//!
//! The engine only needs "send this request, give me status, headers and
//! body". [`ReqwestTransport`] is the production implementation; tests plug
//! in their own.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::RETRY_AFTER;
use http::{HeaderMap, Method, StatusCode};
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

/// A fully resolved HTTP request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// `Retry-After` given in seconds. HTTP-date values are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    /// Start of the body for error messages.
    pub fn body_snippet(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        if text.is_empty() {
            return self
                .status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string();
        }
        text.chars().take(200).collect()
    }
}

/// Failure below the HTTP layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("error reading response: {0}")]
    Body(String),
    #[error("request could not be sent: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Request(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else if e.is_builder() || e.is_redirect() {
            TransportError::Request(e.to_string())
        } else {
            // Remaining reqwest errors are I/O level (reset, closed)
            TransportError::Connect(e.to_string())
        }
    }
}

/// Executes HTTP requests on behalf of the engine.
///
/// Implementations must be `Send + Sync`; a single transport is shared by all
/// queries of a connection.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a pooled `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client whose every call is bounded by `timeout`.
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("leafsql/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for unit tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

    /// Replays queued responses in order, then falls back to the handler.
    pub struct ScriptedTransport {
        queue: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        handler: Option<Handler>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl Debug for ScriptedTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ScriptedTransport")
                .field("requests", &self.request_count())
                .finish()
        }
    }

    impl ScriptedTransport {
        pub fn new(responses: impl IntoIterator<Item = Result<HttpResponse, TransportError>>) -> Self {
            Self {
                queue: Mutex::new(responses.into_iter().collect()),
                handler: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn with_handler(
            handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                queue: Mutex::new(VecDeque::new()),
                handler: Some(Box::new(handler)),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    pub fn json_response(status: u16, body: serde_json::Value) -> Result<HttpResponse, TransportError> {
        let mut resp = HttpResponse::new(StatusCode::from_u16(status).unwrap(), body.to_string());
        resp.headers
            .insert(http::header::CONTENT_TYPE, "application/json".parse().unwrap());
        Ok(resp)
    }

    pub fn status_response(status: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(StatusCode::from_u16(status).unwrap(), ""))
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(next) = self.queue.lock().unwrap().pop_front() {
                return next;
            }
            match &self.handler {
                Some(handler) => handler(&request),
                None => Err(TransportError::Request("no scripted response left".into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_seconds() {
        let mut resp = HttpResponse::new(StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(resp.retry_after(), None);
        resp.headers.insert(RETRY_AFTER, "2".parse().unwrap());
        assert_eq!(resp.retry_after(), Some(Duration::from_secs(2)));
        resp.headers
            .insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(resp.retry_after(), None);
    }

    #[test]
    fn test_body_snippet_falls_back_to_reason() {
        let resp = HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(resp.body_snippet(), "Service Unavailable");
        let resp = HttpResponse::new(StatusCode::BAD_REQUEST, " {\"message\":\"bad\"} ");
        assert_eq!(resp.body_snippet(), "{\"message\":\"bad\"}");
    }

    #[test]
    fn test_transport_error_retryable() {
        assert!(TransportError::Timeout("t".into()).is_retryable());
        assert!(TransportError::Connect("c".into()).is_retryable());
        assert!(!TransportError::Request("r".into()).is_retryable());
    }
}
