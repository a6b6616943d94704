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

use leafsql::plan::{Predicate, ScanRequest};
use leafsql::{Error, Value};
use leafsql_common::test_context::TestContext;
use serde_json::{Value as JsonValue, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

const METADATA_PATH: &str = "/api/metadata";
const MACHINES_PATH: &str = "/services/machines/api/machines";

fn document() -> JsonValue {
    json!({"tables": [{
        "name": "machines",
        "endpoint": MACHINES_PATH,
        "pagination": "cursor",
        "cursorField": "next",
        "pageSize": 2,
        "recordsField": "machines",
        "description": "Connected machines",
        "columns": [
            {"name": "serial", "type": "string", "nullable": false, "operators": ["eq", "in"]},
            {"name": "engine_hours", "field": "engine.hours", "type": "double"},
            {"name": "active", "type": "boolean"}
        ]
    }]})
}

async fn metadata_context() -> TestContext {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(document()))
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path(MACHINES_PATH))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [{"serial": "S3", "engine": {"hours": 12}, "active": "false"}],
            "next": null
        })))
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path(MACHINES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [
                {"serial": "S1", "engine": {"hours": 1520.5}, "active": true},
                {"serial": "S2", "active": true}
            ],
            "next": "c2"
        })))
        .mount(&ctx.server)
        .await;
    ctx
}

fn metadata_config(ctx: &TestContext) -> leafsql::ConnectionConfig {
    let mut config = ctx.config();
    config.metadata_path = Some(METADATA_PATH.into());
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tables_come_from_metadata_endpoint() {
    let ctx = metadata_context().await;
    let conn = ctx.connection_with(metadata_config(&ctx));

    let tables = conn.list_tables().await.unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "machines");
    assert!(matches!(
        conn.describe_table("fields").await,
        Err(Error::NotFound { .. })
    ));

    let rows = conn
        .query(ScanRequest::new("machines"))
        .await
        .unwrap()
        .collect_rows()
        .await
        .unwrap();
    let serials: Vec<&str> = rows.iter().map(|r| r.values()[0].as_str().unwrap()).collect();
    assert_eq!(serials, vec!["S1", "S2", "S3"]);
    assert_eq!(rows[0].get_by_name("engine_hours"), Some(&Value::Decimal(1520.5)));
    assert_eq!(rows[1].get_by_name("engine_hours"), Some(&Value::Null));
    assert_eq!(rows[2].get_by_name("active"), Some(&Value::Boolean(false)));

    let requests = ctx.requests_to(MACHINES_PATH).await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.query(), Some("size=2"));
    assert_eq!(requests[1].url.query(), Some("cursor=c2&size=2"));
    assert_eq!(ctx.requests_to(METADATA_PATH).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn declared_operators_are_pushed() {
    let ctx = metadata_context().await;
    let conn = ctx.connection_with(metadata_config(&ctx));

    let scan = ScanRequest::builder()
        .table("machines")
        .filters(vec![
            Predicate::eq("serial", "S1"),
            Predicate::gt("engine_hours", 100.0),
        ])
        .build();
    let plan = conn.plan(&scan).await.unwrap();
    assert_eq!(plan.remote_filters.len(), 1);
    assert_eq!(plan.residual_filters.len(), 1);

    let rows = conn.query(scan).await.unwrap().collect_rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    let first = &ctx.requests_to(MACHINES_PATH).await[0];
    assert!(first.url.query().unwrap().contains("serial=S1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn catalog_loads_once_until_refreshed() {
    let ctx = metadata_context().await;
    let conn = ctx.connection_with(metadata_config(&ctx));

    let (a, b) = tokio::join!(conn.list_tables(), conn.describe_table("machines"));
    a.unwrap();
    b.unwrap();
    assert_eq!(ctx.requests_to(METADATA_PATH).await.len(), 1);

    conn.catalog().refresh().await;
    conn.list_tables().await.unwrap();
    assert_eq!(ctx.requests_to(METADATA_PATH).await.len(), 2);
    assert_eq!(conn.catalog().load_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_metadata_is_reported() {
    let ctx = TestContext::new().await;
    ctx.mount_json(METADATA_PATH, json!({"tables": "nope"})).await;
    let conn = ctx.connection_with(metadata_config(&ctx));

    let err = conn.list_tables().await.unwrap_err();
    assert!(matches!(err, Error::InvalidResponse { .. }), "{err:?}");
}
