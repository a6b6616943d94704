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

//! Table and column metadata.
//!
//! A [`SchemaCatalog`] loads descriptors from a [`MetadataSource`] once per
//! connection and serves them from a cache until [`SchemaCatalog::refresh`].

mod descriptor;
mod http_metadata;
mod leaf;

pub use descriptor::{ColumnDescriptor, FilterOp, PaginationMode, SortSupport, TableDescriptor};
pub use http_metadata::HttpMetadata;
pub use leaf::{LEAF_MAX_PAGE_SIZE, documented_column, leaf_table, leaf_tables};

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Where table descriptors come from.
#[async_trait]
pub trait MetadataSource: Send + Sync + Debug {
    async fn load_tables(&self) -> Result<Vec<TableDescriptor>>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// A fixed table set; by default the built-in Leaf tables.
#[derive(Clone, Debug)]
pub struct StaticMetadata {
    tables: Vec<TableDescriptor>,
}

impl Default for StaticMetadata {
    fn default() -> Self {
        Self::new(leaf_tables())
    }
}

impl StaticMetadata {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn load_tables(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self.tables.clone())
    }

    fn name(&self) -> &'static str {
        "StaticMetadata"
    }
}

type Snapshot = Arc<Vec<Arc<TableDescriptor>>>;

/// Cached view of the queryable tables of one connection.
#[derive(Debug)]
pub struct SchemaCatalog {
    source: Arc<dyn MetadataSource>,
    cache: RwLock<Option<Snapshot>>,
    load_lock: Mutex<()>,
    loads: AtomicU64,
    page_size: Option<usize>,
}

impl SchemaCatalog {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
            load_lock: Mutex::new(()),
            loads: AtomicU64::new(0),
            page_size: None,
        }
    }

    /// Overrides the page size of every paginated table.
    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    pub async fn list_tables(&self) -> Result<Vec<Arc<TableDescriptor>>> {
        Ok(self.snapshot().await?.iter().cloned().collect())
    }

    /// Case-insensitive lookup; `NotFound` when the table does not exist.
    pub async fn describe_table(&self, name: &str) -> Result<Arc<TableDescriptor>> {
        self.snapshot()
            .await?
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| Error::table_not_found(name))
    }

    /// Drops the cached metadata; the next lookup reloads it.
    pub async fn refresh(&self) {
        *self.cache.write().await = None;
        log::debug!("catalog cache invalidated");
    }

    /// Number of times metadata was loaded from the source.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(snapshot));
        }
        let _guard = self.load_lock.lock().await;
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let mut tables = self.source.load_tables().await?;
        validate_tables(&tables)?;
        if let Some(size) = self.page_size {
            for table in &mut tables {
                table.pagination = table.pagination.with_page_size(size);
            }
        }
        self.loads.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "loaded {} table(s) from {}",
            tables.len(),
            self.source.name()
        );
        let snapshot: Snapshot = Arc::new(tables.into_iter().map(Arc::new).collect());
        *self.cache.write().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

fn validate_tables(tables: &[TableDescriptor]) -> Result<()> {
    let mut names = HashSet::new();
    for table in tables {
        if !names.insert(table.name.to_ascii_lowercase()) {
            return Err(Error::Configuration(format!(
                "duplicate table '{}' in metadata",
                table.name
            )));
        }
        if table.columns.is_empty() {
            return Err(Error::Configuration(format!(
                "table '{}' declares no columns",
                table.name
            )));
        }
        let mut columns = HashSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.to_ascii_lowercase()) {
                return Err(Error::Configuration(format!(
                    "duplicate column '{}' in table '{}'",
                    column.name, table.name
                )));
            }
        }
    }
    Ok(())
}
