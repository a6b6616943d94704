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
use leafsql::LeafConnection;
use leafsql::plan::{Limit, Predicate, ScanRequest, SortKey};
use log::info;
use std::collections::HashMap;

/// List the fields of a farm through the Leaf API.
#[derive(Parser)]
struct Cli {
    /// Connection string, e.g. `leaf:;token=...` or `leaf:?username=...&password=...`
    #[arg(long, env = "LEAF_URL", default_value = "leaf:")]
    url: String,
    /// Bearer token; overrides the connection string
    #[arg(long, env = "LEAF_TOKEN")]
    token: Option<String>,
    /// Only fields of this farm
    #[arg(long)]
    farm: Option<String>,
    /// Case-insensitive name pattern (SQL LIKE syntax)
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value_t = 20)]
    limit: usize,
    /// Print the plan instead of running the query
    #[arg(long)]
    explain: bool,
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

    let mut filters = Vec::new();
    if let Some(farm) = args.farm {
        filters.push(Predicate::eq("farm_id", farm));
    }
    if let Some(name) = args.name {
        filters.push(Predicate::ilike("name", name));
    }
    let scan = ScanRequest::builder()
        .table("fields")
        .filters(filters)
        .projection(vec!["id".into(), "name".into(), "area".into(), "area_unit".into()])
        .sort(vec![SortKey::desc("created_time")])
        .limit(Limit::new(args.limit))
        .build();

    if args.explain {
        println!("{}", conn.plan(&scan).await?.explain());
        return Ok(());
    }

    let mut rows = conn.query(scan).await?;
    println!("{}", rows.columns().join("\t"));
    while let Some(row) = rows.next().await {
        match row {
            Ok(row) => {
                let cells: Vec<String> = row.values().iter().map(ToString::to_string).collect();
                println!("{}", cells.join("\t"));
            }
            Err(e) if e.is_row_error() => eprintln!("skipped row: {e}"),
            Err(e) => return Err(e.into()),
        }
    }
    info!(
        "{} row(s) from {} page(s)",
        rows.rows_returned(),
        rows.pages_fetched()
    );
    conn.close();
    Ok(())
}
