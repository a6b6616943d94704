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

//! DataFusion integration, enabled with the `datafusion` feature.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use datafusion::prelude::SessionContext;
//! use leafsql::LeafConnection;
//!
//! let conn = LeafConnection::connect("leaf:?token=abc", &Default::default()).await?;
//! let ctx = SessionContext::new();
//! leafsql::datafusion::register_tables(&ctx, &conn).await?;
//! ctx.sql("SELECT name, area FROM fields ORDER BY area DESC LIMIT 5")
//!     .await?
//!     .show()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod filter_translator;
mod table_provider;

pub use filter_translator::{expr_to_predicate, scalar_to_value};
pub use table_provider::{LeafTableProvider, arrow_schema, arrow_type, rows_to_batch};

use crate::driver::LeafConnection;
use crate::error::{Error, Result};
use datafusion::prelude::SessionContext;
use std::sync::Arc;

/// Registers every catalog table with `ctx`. Returns the registered names.
pub async fn register_tables(ctx: &SessionContext, connection: &LeafConnection) -> Result<Vec<String>> {
    let tables = connection.list_tables().await?;
    let mut names = Vec::with_capacity(tables.len());
    for table in tables {
        let name = table.name.clone();
        let provider = LeafTableProvider::new(connection.clone(), table);
        ctx.register_table(name.as_str(), Arc::new(provider))
            .map_err(|e| Error::Configuration(format!("cannot register table {name}: {e}")))?;
        names.push(name);
    }
    log::debug!("registered {} leaf tables with datafusion", names.len());
    Ok(names)
}
