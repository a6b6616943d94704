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

//! Paginated fetching of raw records.
//!
//! [`PaginatedFetcher`] drives one table scan through the API's pagination,
//! one page per pull:
//!
//! ```text
//! Ready -> Fetching -> HasMore -> Fetching -> ... -> Exhausted
//!              |
//!              +--> Failed          any state --close()--> Closed
//! ```

pub mod executor;
pub mod page;
pub mod pagination;
pub mod retry;
pub mod transport;

pub use tokio_util::sync::CancellationToken;
pub use executor::RequestExecutor;
pub use page::{DecodedPage, RawRecord, decode_page};
pub use pagination::{PagePosition, PaginationState};
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

use crate::catalog::TableDescriptor;
use crate::error::{Error, RequestContext, Result};
use crate::plan::PlanSplit;
use crate::request::RequestBuilder;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchState {
    Ready,
    Fetching,
    HasMore,
    Exhausted,
    Failed,
    Closed,
}

impl FetchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchState::Exhausted | FetchState::Failed | FetchState::Closed
        )
    }
}

/// Lazy, forward-only stream of raw records for one plan split.
///
/// Pages are requested only when the buffered records run out. After
/// `Exhausted`, `Failed` or `Closed` every pull returns end-of-stream.
#[derive(Debug)]
pub struct PaginatedFetcher {
    executor: RequestExecutor,
    builder: RequestBuilder,
    split: Arc<PlanSplit>,
    pagination: Option<PaginationState>,
    state: FetchState,
    cap: Option<usize>,
    buffer: VecDeque<RawRecord>,
    cancel: CancellationToken,
    pages_fetched: usize,
    records_delivered: usize,
}

impl PaginatedFetcher {
    pub fn new(
        executor: RequestExecutor,
        table: Arc<TableDescriptor>,
        split: Arc<PlanSplit>,
        cancel: CancellationToken,
    ) -> Self {
        let start = split.remote_limit.map_or(0, |l| l.offset);
        let cap = split.remote_limit.and_then(|l| l.count);
        let pagination = PaginationState::start(&table.pagination, start);
        let state = if cap == Some(0) {
            FetchState::Exhausted
        } else {
            FetchState::Ready
        };
        Self {
            executor,
            builder: RequestBuilder::new(table),
            split,
            pagination: Some(pagination),
            state,
            cap,
            buffer: VecDeque::new(),
            cancel,
            pages_fetched: 0,
            records_delivered: 0,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn pagination(&self) -> Option<&PaginationState> {
        self.pagination.as_ref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn records_delivered(&self) -> usize {
        self.records_delivered
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetches the next page. `Ok(None)` once the scan is over.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.state.is_terminal() {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            self.close();
            return Err(Error::Cancelled);
        }
        let Some(position) = self.pagination.as_ref() else {
            return Ok(None);
        };

        self.state = FetchState::Fetching;
        let descriptor = match self.builder.build(&self.split, position) {
            Ok(d) => d,
            Err(e) => return Err(self.fail(e)),
        };
        let table = self.builder.table().name.clone();

        let response = match self
            .executor
            .execute(&descriptor, Some(&table), &self.cancel)
            .await
        {
            Ok(r) => r,
            Err(Error::Cancelled) => {
                self.close();
                return Err(Error::Cancelled);
            }
            Err(e) => return Err(self.fail(e)),
        };

        let page = match decode_page(&response.body, self.builder.table()) {
            Ok(p) => p,
            Err(e) => {
                let ctx = RequestContext::new(
                    descriptor.method.as_str(),
                    descriptor.url(self.executor.base_url()),
                )
                .with_table(Some(&table))
                .with_status(response.status.as_u16());
                return Err(self.fail(e.with_context(ctx)));
            }
        };

        let received = page.records.len();
        let mut records = page.records;
        if let Some(cap) = self.cap {
            records.truncate(cap.saturating_sub(self.records_delivered));
        }
        self.pages_fetched += 1;
        self.records_delivered += records.len();

        let capped = self.cap.is_some_and(|c| self.records_delivered >= c);
        let has_more = match self.pagination.as_mut() {
            Some(p) => {
                p.delivered = self.records_delivered;
                p.advance(received, descriptor.page_size, page.next_cursor, page.last)
            }
            None => false,
        };

        if has_more && !capped && received > 0 {
            self.state = FetchState::HasMore;
        } else {
            self.state = FetchState::Exhausted;
            self.pagination = None;
        }
        log::debug!(
            "{table}: page {} returned {received} record(s), {:?}",
            self.pages_fetched,
            self.state
        );
        Ok(Some(records))
    }

    /// Next raw record, fetching pages as needed.
    pub async fn next_record(&mut self) -> Option<Result<RawRecord>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            match self.next_page().await {
                Ok(Some(records)) => self.buffer.extend(records),
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Stops the scan: no further requests are issued and buffered records are dropped.
    pub fn close(&mut self) {
        if self.state != FetchState::Closed {
            log::debug!("{}: fetcher closed", self.builder.table().name);
        }
        self.cancel.cancel();
        self.state = FetchState::Closed;
        self.pagination = None;
        self.buffer.clear();
    }

    fn fail(&mut self, error: Error) -> Error {
        log::warn!("{}: fetch failed: {error}", self.builder.table().name);
        self.state = FetchState::Failed;
        self.pagination = None;
        self.buffer.clear();
        error
    }
}
