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

//! # leafsql
//!
//! SQL access to the Leaf agricultural data API. Leaf exposes fields,
//! farms, growers, operations and users as paginated JSON endpoints;
//! this crate presents them as relational tables and translates
//! single-table scans into the cheapest sequence of HTTP requests.
//!
//! A scan ([`plan::ScanRequest`]) is split by the [`plan::PushdownPlanner`]
//! into the filters, projection, ordering and limit the endpoint can apply
//! and a residual part evaluated locally. The [`ResultSet`] then pages
//! through the endpoint, turns JSON records into [`TypedRow`]s and applies
//! the residual part, stopping early once a limit is met.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use leafsql::LeafConnection;
//! use leafsql::plan::{Predicate, ScanRequest};
//!
//! #[tokio::main]
//! async fn main() -> leafsql::Result<()> {
//!     let conn = LeafConnection::connect("leaf:?token=abc", &Default::default()).await?;
//!
//!     let scan = ScanRequest::builder()
//!         .table("fields")
//!         .filters(vec![Predicate::eq("farm_id", "farm-1")])
//!         .projection(vec!["name".to_string(), "area".to_string()])
//!         .build();
//!     let mut rows = conn.query(scan).await?;
//!     while let Some(row) = rows.next().await {
//!         println!("{:?}", row?.values());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//! - `datafusion`: registers every table with a DataFusion `SessionContext`
//! - `default-tls`, `native-tls`, `rustls-tls`: TLS backend of the HTTP client
//! - `http2`: HTTP/2 support in the HTTP client

#![allow(clippy::result_large_err)]

pub mod auth;
pub mod catalog;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod materialize;
pub mod multimap_ext;
pub mod native;
pub mod plan;
pub mod request;
pub mod result_set;
pub mod utils;
pub mod value;

#[cfg(feature = "datafusion")]
pub mod datafusion;

pub use driver::{ConnectionConfig, LeafConnection};
pub use error::{Error, Result};
pub use result_set::{ResultSet, RowErrorPolicy};
pub use value::{SemanticType, TypedRow, Value};

#[cfg(test)]
#[macro_use]
extern crate quickcheck;
