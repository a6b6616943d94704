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

//! Built-in Leaf API tables and their documented query parameters.
//!
//! Only parameters the Leaf API documents are declared here; everything else
//! is evaluated locally.

use super::descriptor::{ColumnDescriptor, FilterOp, PaginationMode, TableDescriptor};
use crate::value::SemanticType;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Largest page the Leaf services accept.
pub const LEAF_MAX_PAGE_SIZE: usize = 100;

const FIELDS_SERVICE: &str = "/services/fields/api";

fn string(name: &str, field: &str) -> ColumnDescriptor {
    ColumnDescriptor::new(name, SemanticType::String).with_field(field)
}

fn timestamp(name: &str, field: &str) -> ColumnDescriptor {
    ColumnDescriptor::new(name, SemanticType::Timestamp).with_field(field)
}

fn paged(table: TableDescriptor) -> TableDescriptor {
    table
        .with_pagination(PaginationMode::page_number(LEAF_MAX_PAGE_SIZE))
        .with_sort("sort", 1)
}

fn fields() -> TableDescriptor {
    paged(TableDescriptor::new("fields", format!("{FIELDS_SERVICE}/fields")))
        .with_description("Field boundaries of every Leaf user")
        .with_columns([
            string("id", "id").not_null(),
            string("name", "name"),
            string("leaf_user_id", "leafUserId").with_filters([FilterOp::Eq]),
            string("farm_id", "farmId").with_filters([FilterOp::Eq, FilterOp::In]),
            string("provider", "providerName").with_filter_param(FilterOp::Eq, "provider"),
            string("type", "type"),
            ColumnDescriptor::new("area", SemanticType::Decimal).with_field("area.value"),
            string("area_unit", "area.unit"),
            timestamp("created_time", "createdTime").sortable(),
            timestamp("updated_time", "updatedTime").sortable(),
        ])
}

fn farms() -> TableDescriptor {
    paged(TableDescriptor::new("farms", format!("{FIELDS_SERVICE}/farms")))
        .with_description("Farms grouping fields")
        .with_columns([
            ColumnDescriptor::new("id", SemanticType::Integer).not_null(),
            string("name", "name"),
            string("leaf_user_id", "leafUserId").with_filters([FilterOp::Eq]),
            ColumnDescriptor::new("grower_id", SemanticType::Integer)
                .with_field("growerId")
                .with_filters([FilterOp::Eq]),
            string("provider", "providerName").with_filter_param(FilterOp::Eq, "provider"),
            timestamp("created_time", "createdTime").sortable(),
            timestamp("updated_time", "updatedTime").sortable(),
        ])
}

fn growers() -> TableDescriptor {
    paged(TableDescriptor::new("growers", format!("{FIELDS_SERVICE}/growers")))
        .with_description("Growers owning farms")
        .with_columns([
            ColumnDescriptor::new("id", SemanticType::Integer).not_null(),
            string("name", "name"),
            string("leaf_user_id", "leafUserId").with_filters([FilterOp::Eq]),
            string("provider", "providerName").with_filter_param(FilterOp::Eq, "provider"),
            timestamp("created_time", "createdTime").sortable(),
        ])
}

fn operations() -> TableDescriptor {
    paged(TableDescriptor::new(
        "operations",
        "/services/operations/api/files",
    ))
    .with_description("Machine operation files (planting, harvest, application, tillage)")
    .with_columns([
        string("id", "id").not_null(),
        string("file_name", "fileName"),
        string("leaf_user_id", "leafUserId").with_filters([FilterOp::Eq]),
        string("provider", "provider").with_filters([FilterOp::Eq]),
        string("origin", "origin").with_filters([FilterOp::Eq]),
        string("operation_type", "operationType").with_filters([FilterOp::Eq]),
        string("status", "status").with_filters([FilterOp::Eq]),
        timestamp("start_time", "startTime")
            .with_filter_param(FilterOp::Gte, "startTime")
            .sortable(),
        timestamp("end_time", "endTime")
            .with_filter_param(FilterOp::Lte, "endTime")
            .sortable(),
        timestamp("created_time", "createdTime")
            .with_filter_param(FilterOp::Gte, "createdTime")
            .sortable(),
        timestamp("updated_time", "updatedTime")
            .with_filter_param(FilterOp::Gte, "updatedTime")
            .sortable(),
        string("api_owner_username", "apiOwnerUsername"),
    ])
}

fn leaf_users() -> TableDescriptor {
    paged(TableDescriptor::new(
        "leaf_users",
        "/services/usermanagement/api/users",
    ))
    .with_description("Leaf users registered under the API owner")
    .with_columns([
        string("id", "id").not_null(),
        string("name", "name").with_filters([FilterOp::Eq]),
        string("email", "email").with_filters([FilterOp::Eq]),
        string("phone", "phone"),
        string("address", "address"),
        timestamp("created_time", "createdTime").sortable(),
        timestamp("updated_time", "updatedTime").sortable(),
    ])
}

lazy_static! {
    static ref LEAF_TABLES: Vec<TableDescriptor> =
        vec![fields(), farms(), growers(), operations(), leaf_users()];
    static ref CAPABILITIES: HashMap<(String, String), ColumnDescriptor> = LEAF_TABLES
        .iter()
        .flat_map(|t| {
            t.columns
                .iter()
                .map(move |c| ((t.name.clone(), c.name.to_ascii_lowercase()), c.clone()))
        })
        .collect();
}

/// The built-in table set.
pub fn leaf_tables() -> Vec<TableDescriptor> {
    LEAF_TABLES.clone()
}

/// The built-in descriptor for `table`, if any.
pub fn leaf_table(table: &str) -> Option<TableDescriptor> {
    LEAF_TABLES
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(table))
        .cloned()
}

/// Documented capabilities of `table.column`, used to fill in metadata that
/// does not declare its own operators.
pub fn documented_column(table: &str, column: &str) -> Option<&'static ColumnDescriptor> {
    CAPABILITIES.get(&(table.to_ascii_lowercase(), column.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_tables_have_unique_columns() {
        for table in leaf_tables() {
            let mut names: Vec<_> = table.columns.iter().map(|c| c.name.clone()).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), table.columns.len(), "{}", table.name);
            assert!(table.endpoint.starts_with("/services/"));
        }
    }

    #[test]
    fn test_operations_time_window_params() {
        let ops = leaf_table("OPERATIONS").unwrap();
        let start = ops.column("start_time").unwrap();
        assert_eq!(start.param_for(FilterOp::Gte), Some("startTime"));
        assert!(!start.supports(FilterOp::Lte));
        let end = ops.column("end_time").unwrap();
        assert_eq!(end.param_for(FilterOp::Lte), Some("endTime"));
    }

    #[test]
    fn test_documented_column_lookup() {
        let c = documented_column("fields", "FARM_ID").unwrap();
        assert!(c.supports(FilterOp::In));
        assert!(documented_column("fields", "colour").is_none());
        assert!(documented_column("unknown", "id").is_none());
    }
}
