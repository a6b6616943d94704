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

//! Per-connection context.

use super::config::ConnectionConfig;
use super::metadata::{ColumnInfo, DriverMetadata, TableInfo, column_infos, table_infos};
use crate::auth::{CredentialProvider, PasswordAuth, StaticToken, TokenSource};
use crate::catalog::{HttpMetadata, MetadataSource, SchemaCatalog, StaticMetadata, TableDescriptor};
use crate::error::{Error, Result};
use crate::fetch::{CancellationToken, HttpTransport, ReqwestTransport, RequestExecutor};
use crate::native::{NativeResult, execute_native};
use crate::plan::{PlanSplit, PushdownPlanner, ScanRequest};
use crate::result_set::ResultSet;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct ConnectionInner {
    config: ConnectionConfig,
    executor: RequestExecutor,
    catalog: SchemaCatalog,
    closed: AtomicBool,
    /// Parent of every query token; cancelled by `close`
    cancel: CancellationToken,
}

/// An open connection to the Leaf API.
///
/// Owns the schema catalog cache, the credential provider and the HTTP
/// transport shared by all of its queries. Cheap to clone; clones share
/// state.
///
/// ```no_run
/// use leafsql::LeafConnection;
/// use leafsql::plan::{Predicate, ScanRequest};
///
/// # async fn example() -> leafsql::Result<()> {
/// let conn = LeafConnection::connect("leaf:?token=abc", &Default::default()).await?;
/// let mut rows = conn
///     .query(
///         ScanRequest::builder()
///             .table("fields")
///             .filters(vec![Predicate::eq("farm_id", "farm-1")])
///             .build(),
///     )
///     .await?;
/// while let Some(row) = rows.next().await {
///     println!("{:?}", row?.values());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LeafConnection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for LeafConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafConnection")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl LeafConnection {
    pub fn builder(config: ConnectionConfig) -> ConnectionBuilder {
        ConnectionBuilder::new(config)
    }

    /// Parses `url`, opens a connection and obtains a first token.
    pub async fn connect(url: &str, properties: &HashMap<String, String>) -> Result<Self> {
        let config = ConnectionConfig::parse(url, properties)?;
        ConnectionBuilder::new(config).connect().await
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.inner.catalog
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.inner.executor
    }

    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        self.inner.executor.credentials()
    }

    pub async fn list_tables(&self) -> Result<Vec<Arc<TableDescriptor>>> {
        self.ensure_open()?;
        self.inner.catalog.list_tables().await
    }

    pub async fn describe_table(&self, name: &str) -> Result<Arc<TableDescriptor>> {
        self.ensure_open()?;
        self.inner.catalog.describe_table(name).await
    }

    /// Plans `request` without executing it.
    pub async fn plan(&self, request: &ScanRequest) -> Result<PlanSplit> {
        let table = self.describe_table(&request.table).await?;
        PushdownPlanner::plan(&table, request)
    }

    /// Plans and starts a scan. No request is sent until the first row is pulled.
    pub async fn query(&self, request: ScanRequest) -> Result<ResultSet> {
        let table = self.describe_table(&request.table).await?;
        let plan = Arc::new(PushdownPlanner::plan(&table, &request)?);
        let cancel = self.inner.cancel.child_token();
        ResultSet::new(
            self.inner.executor.clone(),
            table,
            plan,
            self.inner.config.row_error_policy,
            cancel,
        )
    }

    /// Sends `sql` to the point-lake query service unchanged.
    pub async fn native_query(&self, sql: &str) -> Result<NativeResult> {
        self.ensure_open()?;
        let cancel = self.inner.cancel.child_token();
        let config = &self.inner.config;
        execute_native(
            &self.inner.executor,
            &config.native_query_path,
            &config.sql_engine,
            sql,
            &cancel,
        )
        .await
    }

    pub fn metadata(&self) -> DriverMetadata {
        DriverMetadata::new(self.inner.config.api_base(), self.inner.config.username.clone())
    }

    /// Tables matching a `LIKE` pattern.
    pub async fn tables(&self, pattern: Option<&str>) -> Result<Vec<TableInfo>> {
        table_infos(&self.list_tables().await?, pattern)
    }

    /// Columns matching `LIKE` patterns on table and column name.
    pub async fn columns(
        &self,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<Vec<ColumnInfo>> {
        column_infos(&self.list_tables().await?, table_pattern, column_pattern)
    }

    /// Closes the connection and cancels its running queries.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();
        log::info!("connection to {} closed", self.inner.config.api_base());
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

/// Assembles a [`LeafConnection`], optionally with custom seams.
pub struct ConnectionBuilder {
    config: ConnectionConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    token_source: Option<Arc<dyn TokenSource>>,
    metadata: Option<Arc<dyn MetadataSource>>,
}

impl ConnectionBuilder {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            transport: None,
            token_source: None,
            metadata: None,
        }
    }

    /// Replaces the reqwest-based transport.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the token or password credentials of the configuration.
    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn with_metadata_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    /// Builds the connection without contacting the API.
    pub fn build(self) -> Result<LeafConnection> {
        if self.token_source.is_none() {
            self.config.validate()?;
        }
        let config = self.config;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                ReqwestTransport::new(config.request_timeout(), config.connect_timeout())
                    .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?,
            ),
        };

        let token_source: Arc<dyn TokenSource> = match (self.token_source, &config.token) {
            (Some(source), _) => source,
            (None, Some(token)) => Arc::new(StaticToken::new(token.clone())),
            (None, None) => match (&config.username, &config.password) {
                (Some(user), Some(password)) => Arc::new(PasswordAuth::new(
                    Arc::clone(&transport),
                    format!("{}{}", config.api_base(), config.auth_path),
                    user.clone(),
                    password.clone(),
                )),
                _ => {
                    return Err(Error::Configuration(
                        "missing required property 'token' (or 'username' and 'password')".into(),
                    ));
                }
            },
        };

        let executor = RequestExecutor::new(
            transport,
            Arc::new(CredentialProvider::new(token_source)),
            config.retry_policy(),
            config.api_base(),
        );

        let metadata: Arc<dyn MetadataSource> = match (self.metadata, &config.metadata_path) {
            (Some(source), _) => source,
            (None, Some(path)) => Arc::new(HttpMetadata::new(executor.clone(), path.clone())),
            (None, None) => Arc::new(StaticMetadata::default()),
        };
        let catalog = SchemaCatalog::new(metadata).with_page_size(config.page_size);

        log::debug!(
            "connection to {} using {} credentials",
            config.api_base(),
            executor.credentials().source_name()
        );
        Ok(LeafConnection {
            inner: Arc::new(ConnectionInner {
                config,
                executor,
                catalog,
                closed: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Builds the connection and authenticates, so bad credentials fail here.
    pub async fn connect(self) -> Result<LeafConnection> {
        let connection = self.build()?;
        connection.credentials().token().await?;
        Ok(connection)
    }
}
