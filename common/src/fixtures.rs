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

//! JSON records shaped like the Leaf services return them.

use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};

/// A field record numbered `i`, belonging to `farm-{i % 3}`.
pub fn field_record(i: usize) -> Value {
    let created = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::days(i as i64);
    json!({
        "id": format!("field-{i}"),
        "name": format!("Field {i}"),
        "leafUserId": "user-1",
        "farmId": format!("farm-{}", i % 3),
        "providerName": "JohnDeere",
        "type": "ORIGINAL",
        "area": {"value": 10.0 + i as f64, "unit": "ha"},
        "createdTime": created.to_rfc3339(),
        "updatedTime": created.to_rfc3339(),
    })
}

/// `count` field records starting at `start`.
pub fn field_records(start: usize, count: usize) -> Value {
    Value::Array((start..start + count).map(field_record).collect())
}

/// An operation file record.
pub fn operation_record(id: &str, operation_type: &str, start_time: &str) -> Value {
    json!({
        "id": id,
        "fileName": format!("{id}.zip"),
        "leafUserId": "user-1",
        "provider": "CNHI",
        "origin": "automerged",
        "operationType": operation_type,
        "status": "processed",
        "startTime": start_time,
        "endTime": start_time,
        "createdTime": start_time,
        "updatedTime": start_time,
        "apiOwnerUsername": "owner",
    })
}

/// A grower record; `id` is numeric in the API.
pub fn grower_record(id: Value, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "leafUserId": "user-1",
        "providerName": "Trimble",
        "createdTime": "2024-01-01T00:00:00Z",
    })
}
