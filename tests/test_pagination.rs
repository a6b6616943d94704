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

use leafsql::Value;
use leafsql::fetch::FetchState;
use leafsql::plan::{Limit, Predicate, ScanRequest};
use leafsql_common::fixtures::field_records;
use leafsql_common::test_context::{FIELDS_PATH, TestContext};
use serde_json::json;

async fn paged_context() -> TestContext {
    let ctx = TestContext::new().await;
    ctx.mount_pages(
        FIELDS_PATH,
        vec![field_records(0, 10), field_records(10, 10), field_records(20, 4)],
    )
    .await;
    ctx
}

fn small_pages(ctx: &TestContext) -> leafsql::LeafConnection {
    let mut config = ctx.config();
    config.page_size = Some(10);
    ctx.connection_with(config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_scan_walks_every_page() {
    let ctx = paged_context().await;
    let conn = small_pages(&ctx);

    let mut rows = conn.query(ScanRequest::new("fields")).await.unwrap();
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await {
        let row = row.unwrap();
        ids.push(row.get_by_name("id").unwrap().as_str().unwrap().to_string());
    }
    assert_eq!(ids.len(), 24);
    assert_eq!(ids[0], "field-0");
    assert_eq!(ids[23], "field-23");
    assert_eq!(rows.pages_fetched(), 3);
    assert_eq!(rows.fetch_state(), FetchState::Exhausted);

    let requests = ctx.requests_to(FIELDS_PATH).await;
    assert_eq!(requests.len(), 3);
    for (i, request) in requests.iter().enumerate() {
        let query = request.url.query().unwrap_or_default();
        assert!(query.contains(&format!("page={i}")), "{query}");
        assert!(query.contains("size=10"), "{query}");
        assert_eq!(
            request.headers.get("authorization").unwrap().to_str().unwrap(),
            "Bearer test-token"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn limit_stops_before_last_page() {
    let ctx = paged_context().await;
    let conn = small_pages(&ctx);

    let scan = ScanRequest::builder()
        .table("fields")
        .limit(Limit::new(15))
        .build();
    let rows = conn.query(scan).await.unwrap().collect_rows().await.unwrap();
    assert_eq!(rows.len(), 15);
    assert_eq!(ctx.requests_to(FIELDS_PATH).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pushed_filter_and_nested_fields() {
    let ctx = TestContext::new().await;
    ctx.mount_json(
        FIELDS_PATH,
        json!({"content": [
            {"id": "a", "name": "North", "farmId": "farm-1", "area": {"value": 40.5, "unit": "ha"}},
            {"id": "b", "name": "South", "farmId": "farm-1", "area": null}
        ], "last": true}),
    )
    .await;
    let conn = ctx.connection();

    let scan = ScanRequest::builder()
        .table("fields")
        .filters(vec![Predicate::eq("farm_id", "farm-1")])
        .projection(vec!["name".to_string(), "area".to_string(), "area_unit".to_string()])
        .build();
    let rows = conn.query(scan).await.unwrap().collect_rows().await.unwrap();
    assert_eq!(
        rows[0].values(),
        &[Value::from("North"), Value::Decimal(40.5), Value::from("ha")]
    );
    assert_eq!(rows[1].values(), &[Value::from("South"), Value::Null, Value::Null]);

    let requests = ctx.requests_to(FIELDS_PATH).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), Some("farmId=farm-1&page=0&size=100"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn empty_first_page_yields_no_rows() {
    let ctx = TestContext::new().await;
    ctx.mount_json(FIELDS_PATH, json!([])).await;
    let conn = ctx.connection();

    let rows = conn
        .query(ScanRequest::new("fields"))
        .await
        .unwrap()
        .collect_rows()
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(ctx.requests_to(FIELDS_PATH).await.len(), 1);
}
