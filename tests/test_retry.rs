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

use leafsql::Error;
use leafsql::plan::ScanRequest;
use leafsql_common::fixtures::field_records;
use leafsql_common::test_context::{FIELDS_PATH, TestContext};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transient_failures_are_retried() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path(FIELDS_PATH))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .mount(&ctx.server)
        .await;
    ctx.mount_json(FIELDS_PATH, field_records(0, 2)).await;

    let rows = ctx
        .connection()
        .query(ScanRequest::new("fields"))
        .await
        .unwrap()
        .collect_rows()
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(ctx.requests_to(FIELDS_PATH).await.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retries_are_bounded() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path(FIELDS_PATH))
        .respond_with(ResponseTemplate::new(502))
        .mount(&ctx.server)
        .await;
    let mut config = ctx.config();
    config.max_retries = 2;

    let err = ctx
        .connection_with(config)
        .query(ScanRequest::new("fields"))
        .await
        .unwrap()
        .collect_rows()
        .await
        .unwrap_err();
    match err {
        Error::TransientNetwork { attempts, context, .. } => {
            assert_eq!(attempts, 3);
            assert_eq!(context.unwrap().table.as_deref(), Some("fields"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(ctx.requests_to(FIELDS_PATH).await.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn client_errors_fail_immediately() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path(FIELDS_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad farmId"))
        .mount(&ctx.server)
        .await;

    let err = ctx
        .connection()
        .query(ScanRequest::new("fields"))
        .await
        .unwrap()
        .collect_rows()
        .await
        .unwrap_err();
    match err {
        Error::Api { status, message, .. } => {
            assert_eq!(status, 400);
            assert!(message.contains("bad farmId"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(ctx.requests_to(FIELDS_PATH).await.len(), 1);
}
