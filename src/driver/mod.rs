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

//! Connections, configuration and driver metadata.

mod config;
mod connection;
mod metadata;

pub use config::{ConnectionConfig, DEFAULT_API_BASE, DEFAULT_AUTH_PATH, URL_PREFIX};
pub use connection::{ConnectionBuilder, LeafConnection};
pub use metadata::{ColumnInfo, DriverMetadata, PropertyInfo, TableInfo, property_info};
