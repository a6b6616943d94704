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

use crate::utils::init_logger;
use leafsql::{ConnectionConfig, LeafConnection};
use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-token";
pub const FIELDS_PATH: &str = "/services/fields/api/fields";
pub const OPERATIONS_PATH: &str = "/services/operations/api/files";
pub const GROWERS_PATH: &str = "/services/fields/api/growers";

/// A mock Leaf API plus a connection configuration pointing at it.
pub struct TestContext {
    pub server: MockServer,
}

impl TestContext {
    pub async fn new() -> Self {
        init_logger();
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Token auth against the mock server with near-zero backoff.
    pub fn config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::with_token(TEST_TOKEN);
        config.api_base = self.base_url();
        config.initial_backoff_ms = 1;
        config.max_backoff_ms = 5;
        config.request_timeout_ms = 5_000;
        config
    }

    pub fn connection(&self) -> LeafConnection {
        self.connection_with(self.config())
    }

    pub fn connection_with(&self, config: ConnectionConfig) -> LeafConnection {
        LeafConnection::builder(config)
            .build()
            .expect("connection against mock server")
    }

    /// Serves `pages[i]` for `?page=i` on `endpoint`.
    pub async fn mount_pages(&self, endpoint: &str, pages: Vec<Value>) {
        for (i, body) in pages.into_iter().enumerate() {
            Mock::given(method("GET"))
                .and(path(endpoint))
                .and(query_param("page", i.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.server)
                .await;
        }
    }

    /// Serves `body` for every GET of `endpoint`.
    pub async fn mount_json(&self, endpoint: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Requests received so far for `endpoint`, in arrival order.
    pub async fn requests_to(&self, endpoint: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == endpoint)
            .collect()
    }
}
