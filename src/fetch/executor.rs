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

//! Single-request execution with credentials, retries and cancellation.

use super::retry::{Outcome, RetryPolicy, classify_status};
use super::transport::{HttpResponse, HttpTransport};
use crate::auth::CredentialProvider;
use crate::error::{Error, RequestContext, Result};
use crate::request::RequestDescriptor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Executes request descriptors against the Leaf API.
///
/// Shared by every query of a connection; cheap to clone.
#[derive(Clone, Debug)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<CredentialProvider>,
    retry: RetryPolicy,
    base_url: Arc<str>,
    attempts: Arc<AtomicU64>,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<CredentialProvider>,
        retry: RetryPolicy,
        base_url: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            transport,
            credentials,
            retry,
            base_url: base_url.into(),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        &self.credentials
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// HTTP attempts made through this executor, retries included.
    pub fn attempt_count(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Sends `descriptor`, returning the first successful response.
    ///
    /// A 401 triggers a credential refresh; a 401 straight after a refresh
    /// fails with `Authentication`. Timeouts, connection errors, 408, 429 and
    /// 5xx are retried with backoff; other statuses fail immediately.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        table: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let url = descriptor.url(&self.base_url);
        let ctx = RequestContext::new(descriptor.method.as_str(), &url).with_table(table);
        let mut failures: u32 = 0;
        let mut refreshed = false;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let token = self
                .credentials
                .token()
                .await
                .map_err(|e| e.with_context(ctx.clone()))?;
            let request = descriptor.to_http_request(&self.base_url, Some(token.authorization()));

            self.attempts.fetch_add(1, Ordering::Relaxed);
            log::debug!("{} {}", request.method, request.url);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                r = self.transport.execute(request) => r,
            };

            let (message, retry_after) = match result {
                Ok(resp) => match classify_status(resp.status) {
                    Outcome::Success => return Ok(resp),
                    Outcome::Unauthorized if !refreshed => {
                        log::debug!("401 from {url}, refreshing credentials");
                        refreshed = true;
                        self.credentials
                            .refresh(&token)
                            .await
                            .map_err(|e| e.with_context(ctx.clone()))?;
                        continue;
                    }
                    Outcome::Unauthorized => {
                        return Err(Error::Authentication {
                            message: "credentials rejected after refresh".into(),
                            context: Some(ctx.with_status(401)),
                        });
                    }
                    Outcome::Permanent => {
                        return Err(Error::Api {
                            status: resp.status.as_u16(),
                            message: resp.body_snippet(),
                            context: Some(ctx.with_status(resp.status.as_u16())),
                        });
                    }
                    Outcome::Transient => (
                        format!("HTTP {}: {}", resp.status.as_u16(), resp.body_snippet()),
                        resp.retry_after(),
                    ),
                },
                Err(e) if e.is_retryable() => (e.to_string(), None),
                Err(e) => {
                    return Err(Error::Transport {
                        message: e.to_string(),
                        context: Some(ctx),
                    });
                }
            };

            // Only consecutive 401s count as a rejected refresh.
            refreshed = false;
            failures += 1;
            if failures > self.retry.max_retries {
                return Err(Error::TransientNetwork {
                    attempts: failures,
                    message,
                    context: Some(ctx),
                });
            }
            let delay = self.retry.backoff(failures, retry_after);
            log::warn!(
                "transient failure on {url} ({message}); retry {failures}/{} in {delay:?}",
                self.retry.max_retries
            );
            sleep_or_cancel(delay, cancel).await?;
        }
    }
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
