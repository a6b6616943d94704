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

use clap::Parser;
use datafusion::prelude::SessionContext;
use leafsql::LeafConnection;
use log::info;
use std::collections::HashMap;

/// Run SQL over the Leaf tables with DataFusion.
///
/// Filters and limits DataFusion hands to the scan are pushed into the API
/// requests where the endpoints allow it.
#[derive(Parser)]
struct Cli {
    /// SQL to run
    #[arg(default_value = "SELECT name, area, area_unit FROM fields ORDER BY area DESC LIMIT 10")]
    sql: String,
    #[arg(long, env = "LEAF_URL", default_value = "leaf:")]
    url: String,
    #[arg(long, env = "LEAF_TOKEN")]
    token: Option<String>,
    /// Send the SQL to the point-lake query service instead
    #[arg(long)]
    native: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let args = Cli::parse();

    let mut properties = HashMap::new();
    if let Some(token) = args.token {
        properties.insert("token".to_string(), token);
    }
    let conn = LeafConnection::connect(&args.url, &properties).await?;

    if args.native {
        let result = conn.native_query(&args.sql).await?;
        println!("{}", result.columns().join("\t"));
        for row in result.rows() {
            let cells: Vec<String> = row.values().iter().map(ToString::to_string).collect();
            println!("{}", cells.join("\t"));
        }
        return Ok(());
    }

    let ctx = SessionContext::new();
    let tables = leafsql::datafusion::register_tables(&ctx, &conn).await?;
    info!("registered tables: {}", tables.join(", "));

    ctx.sql(&args.sql).await?.show().await?;
    Ok(())
}
