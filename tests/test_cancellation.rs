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
use leafsql::fetch::FetchState;
use leafsql::plan::ScanRequest;
use leafsql_common::fixtures::field_records;
use leafsql_common::test_context::{FIELDS_PATH, TestContext};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_after_first_page_stops_fetching() {
    let ctx = TestContext::new().await;
    ctx.mount_pages(FIELDS_PATH, vec![field_records(0, 10), field_records(10, 10)])
        .await;
    let mut config = ctx.config();
    config.page_size = Some(10);
    let conn = ctx.connection_with(config);

    let mut rows = conn.query(ScanRequest::new("fields")).await.unwrap();
    for _ in 0..10 {
        rows.next().await.unwrap().unwrap();
    }
    rows.cancellation_token().cancel();

    assert!(matches!(rows.next().await, Some(Err(Error::Cancelled))));
    assert!(rows.next().await.is_none());
    assert_eq!(rows.fetch_state(), FetchState::Closed);
    assert_eq!(ctx.requests_to(FIELDS_PATH).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_interrupts_slow_request() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path(FIELDS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(field_records(0, 1))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&ctx.server)
        .await;

    let conn = ctx.connection();
    let mut rows = conn.query(ScanRequest::new("fields")).await.unwrap();
    let token = rows.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let started = Instant::now();
    assert!(matches!(rows.next().await, Some(Err(Error::Cancelled))));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn closing_connection_cancels_queries() {
    let ctx = TestContext::new().await;
    ctx.mount_pages(FIELDS_PATH, vec![field_records(0, 10), field_records(10, 10)])
        .await;
    let mut config = ctx.config();
    config.page_size = Some(10);
    let conn = ctx.connection_with(config);

    let mut rows = conn.query(ScanRequest::new("fields")).await.unwrap();
    rows.next().await.unwrap().unwrap();
    conn.close();
    assert!(conn.is_closed());

    let mut drained = 0;
    let mut cancelled = false;
    while let Some(item) = rows.next().await {
        match item {
            Ok(_) => drained += 1,
            Err(Error::Cancelled) => cancelled = true,
            Err(e) => panic!("unexpected error {e:?}"),
        }
    }
    assert!(cancelled);
    assert_eq!(drained, 9);
    assert_eq!(ctx.requests_to(FIELDS_PATH).await.len(), 1);

    let err = conn.query(ScanRequest::new("fields")).await.unwrap_err();
    assert!(matches!(err, Error::Closed));
}
