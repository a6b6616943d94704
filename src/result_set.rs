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

//! Pull-driven query results.

use crate::catalog::TableDescriptor;
use crate::error::{Error, Result};
use crate::fetch::{CancellationToken, FetchState, PaginatedFetcher, RequestExecutor};
use crate::materialize::{LimitDecision, LimitWindow, ResidualPipeline, RowMaterializer};
use crate::plan::PlanSplit;
use crate::value::TypedRow;
use futures_util::stream::BoxStream;
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// What a result set does with a row that fails to materialize.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    /// Yield the error in place of the row and continue
    #[default]
    Surface,
    /// Log and drop the row
    Skip,
    /// Yield the error and end the result set
    Abort,
}

impl FromStr for RowErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "surface" => Ok(RowErrorPolicy::Surface),
            "skip" => Ok(RowErrorPolicy::Skip),
            "abort" => Ok(RowErrorPolicy::Abort),
            other => Err(Error::Configuration(format!(
                "unknown row error policy '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RowErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RowErrorPolicy::Surface => "surface",
            RowErrorPolicy::Skip => "skip",
            RowErrorPolicy::Abort => "abort",
        })
    }
}

/// Rows of one executed scan.
///
/// Each call to [`ResultSet::next`] fetches at most the pages needed to
/// produce one row. A residual sort is the exception: the first pull drains
/// the remaining stream, and row errors met while draining come out before
/// the sorted rows.
///
/// After a non-row error, cancellation or [`ResultSet::close`], `next`
/// returns `None`.
pub struct ResultSet {
    fetcher: PaginatedFetcher,
    materializer: RowMaterializer,
    pipeline: ResidualPipeline,
    window: LimitWindow,
    policy: RowErrorPolicy,
    plan: Arc<PlanSplit>,
    sorted: Option<VecDeque<Result<TypedRow>>>,
    done: bool,
    rows_returned: usize,
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("table", &self.plan.table)
            .field("columns", self.pipeline.output_columns())
            .field("state", &self.fetcher.state())
            .field("rows_returned", &self.rows_returned)
            .finish()
    }
}

impl ResultSet {
    pub fn new(
        executor: RequestExecutor,
        table: Arc<TableDescriptor>,
        plan: Arc<PlanSplit>,
        policy: RowErrorPolicy,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let materializer = RowMaterializer::new(Arc::clone(&table), &plan.materialized_columns)?;
        let pipeline = ResidualPipeline::new(&table, &plan)?;
        let window = pipeline.limit_window();
        let fetcher = PaginatedFetcher::new(executor, table, Arc::clone(&plan), cancel);
        Ok(Self {
            fetcher,
            materializer,
            pipeline,
            window,
            policy,
            plan,
            sorted: None,
            done: false,
            rows_returned: 0,
        })
    }

    /// Output column names, in order.
    pub fn columns(&self) -> &Arc<[String]> {
        self.pipeline.output_columns()
    }

    pub fn plan(&self) -> &PlanSplit {
        &self.plan
    }

    /// Token that cancels this query from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.fetcher.cancellation_token().clone()
    }

    pub fn fetch_state(&self) -> FetchState {
        self.fetcher.state()
    }

    pub fn pages_fetched(&self) -> usize {
        self.fetcher.pages_fetched()
    }

    pub fn rows_returned(&self) -> usize {
        self.rows_returned
    }

    /// Next row or error; `None` once the result set is finished.
    pub async fn next(&mut self) -> Option<Result<TypedRow>> {
        if self.done {
            return None;
        }
        let item = if self.pipeline.has_sort() {
            self.next_sorted().await
        } else {
            self.next_streaming().await
        };
        match item {
            None => {
                self.done = true;
                None
            }
            Some(Ok(row)) => {
                self.rows_returned += 1;
                Some(Ok(row))
            }
            Some(Err(e)) => {
                if !e.is_row_error() {
                    self.done = true;
                } else if self.policy == RowErrorPolicy::Abort {
                    self.close();
                }
                Some(Err(e))
            }
        }
    }

    async fn next_streaming(&mut self) -> Option<Result<TypedRow>> {
        loop {
            if self.window.is_full() {
                self.fetcher.close();
                return None;
            }
            let record = match self.fetcher.next_record().await? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };
            let row = match self.materializer.materialize(&record) {
                Ok(row) => row,
                Err(e) if self.policy == RowErrorPolicy::Skip => {
                    log::warn!("{}: skipping row: {e}", self.plan.table);
                    continue;
                }
                Err(e) => return Some(Err(e)),
            };
            if !self.pipeline.matches(&row) {
                continue;
            }
            match self.window.offer() {
                LimitDecision::Skip => continue,
                LimitDecision::Emit => return Some(Ok(self.pipeline.project(&row))),
                LimitDecision::Done => {
                    self.fetcher.close();
                    return None;
                }
            }
        }
    }

    async fn next_sorted(&mut self) -> Option<Result<TypedRow>> {
        if self.sorted.is_none() {
            let mut errors = Vec::new();
            let mut rows = Vec::new();
            while let Some(item) = self.fetcher.next_record().await {
                let record = match item {
                    Ok(record) => record,
                    Err(e) => return Some(Err(e)),
                };
                match self.materializer.materialize(&record) {
                    Ok(row) => {
                        if self.pipeline.matches(&row) {
                            rows.push(row);
                        }
                    }
                    Err(e) => match self.policy {
                        RowErrorPolicy::Surface => errors.push(e),
                        RowErrorPolicy::Skip => {
                            log::warn!("{}: skipping row: {e}", self.plan.table)
                        }
                        RowErrorPolicy::Abort => return Some(Err(e)),
                    },
                }
            }
            log::debug!("{}: sorting {} buffered row(s)", self.plan.table, rows.len());
            self.pipeline.sort(&mut rows);

            let mut out: VecDeque<Result<TypedRow>> = errors.into_iter().map(Err).collect();
            for row in &rows {
                match self.window.offer() {
                    LimitDecision::Skip => {}
                    LimitDecision::Emit => out.push_back(Ok(self.pipeline.project(row))),
                    LimitDecision::Done => break,
                }
            }
            self.sorted = Some(out);
        }
        self.sorted.as_mut()?.pop_front()
    }

    /// Stops the query. Pending requests are cancelled and buffered rows dropped.
    pub fn close(&mut self) {
        self.fetcher.close();
        self.sorted = None;
        self.done = true;
    }

    /// Drains the result set, failing on the first error.
    pub async fn collect_rows(mut self) -> Result<Vec<TypedRow>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }

    pub fn into_stream(mut self) -> BoxStream<'static, Result<TypedRow>> {
        Box::pin(async_stream::stream! {
            while let Some(item) = self.next().await {
                yield item;
            }
        })
    }
}
