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

//! Credential handling for the Leaf API.
//!
//! A [`TokenSource`] knows how to obtain a bearer token; the
//! [`CredentialProvider`] caches it per connection and coordinates refreshes
//! so that concurrent queries hitting a 401 trigger a single re-authentication.

use crate::error::{Error, RequestContext, Result};
use crate::fetch::transport::{HttpRequest, HttpTransport};
use crate::utils::{UtcTime, from_epoch_millis};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use chrono::Utc;
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Tokens this close to their expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Source of bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync + Debug {
    /// Obtains a fresh token. Called on first use and on every refresh.
    async fn fetch_token(&self) -> Result<String>;

    /// Returns a human-readable name for this source
    fn name(&self) -> &'static str;
}

fn redact(token: &str) -> String {
    if token.chars().count() > 10 {
        format!("{}...", token.chars().take(6).collect::<String>())
    } else {
        "[REDACTED]".to_string()
    }
}

/// A token supplied up front. Refreshing it yields the same value.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken")
            .field("token", &redact(&self.token))
            .finish()
    }
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn name(&self) -> &'static str {
        "StaticToken"
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember_me: &'a str,
}

#[derive(Deserialize)]
struct AuthenticateResponse {
    id_token: Option<String>,
}

/// Username/password login against `{api_base}/api/authenticate`.
pub struct PasswordAuth {
    transport: Arc<dyn HttpTransport>,
    url: String,
    username: String,
    password: String,
}

impl Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuth")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl PasswordAuth {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl TokenSource for PasswordAuth {
    async fn fetch_token(&self) -> Result<String> {
        let body = serde_json::to_vec(&AuthenticateRequest {
            username: &self.username,
            password: &self.password,
            remember_me: "true",
        })?;
        let request = HttpRequest {
            method: Method::POST,
            url: self.url.clone(),
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("Accept".into(), "application/json".into()),
            ],
            body: Some(Bytes::from(body)),
        };
        let ctx = RequestContext::new("POST", &self.url);

        log::debug!("authenticating {} against {}", self.username, self.url);
        let resp = self
            .transport
            .execute(request)
            .await
            .map_err(|e| Error::TransientNetwork {
                attempts: 1,
                message: e.to_string(),
                context: Some(ctx.clone()),
            })?;

        if !resp.status.is_success() {
            let message = if resp.status.as_u16() == 401 || resp.status.as_u16() == 403 {
                "invalid username or password".to_string()
            } else {
                resp.body_snippet()
            };
            return Err(Error::Authentication {
                message,
                context: Some(ctx.with_status(resp.status.as_u16())),
            });
        }

        let parsed: AuthenticateResponse = serde_json::from_slice(&resp.body)?;
        parsed
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: "authentication response has no id_token".into(),
                context: Some(ctx),
            })
    }

    fn name(&self) -> &'static str {
        "PasswordAuth"
    }
}

/// A cached bearer token.
///
/// `generation` increases with every fetch so callers can tell whether the
/// token they saw rejected has already been replaced.
pub struct AccessToken {
    value: String,
    authorization: String,
    generation: u64,
    expires_at: Option<UtcTime>,
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &redact(&self.value))
            .field("generation", &self.generation)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    fn new(value: String, generation: u64) -> Self {
        let expires_at = jwt_expiry(&value);
        Self {
            authorization: format!("Bearer {value}"),
            value,
            generation,
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Pre-computed `Authorization` header value.
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn expires_at(&self) -> Option<UtcTime> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|t| (t - Utc::now()).num_seconds() < EXPIRY_SKEW_SECS)
    }
}

/// Reads the `exp` claim of a JWT. Opaque tokens have no known expiry.
fn jwt_expiry(token: &str) -> Option<UtcTime> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    from_epoch_millis(exp.checked_mul(1000)?)
}

/// Per-connection token cache.
///
/// Reads are lock-free in practice (an uncontended `RwLock`); refreshes are
/// serialized by an async mutex.
pub struct CredentialProvider {
    source: Arc<dyn TokenSource>,
    cached: RwLock<Option<Arc<AccessToken>>>,
    refresh_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    refreshes: AtomicU64,
}

impl Debug for CredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("source", &self.source.name())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

impl CredentialProvider {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    fn current(&self) -> Option<Arc<AccessToken>> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the cached token, fetching one if there is none or it expired.
    pub async fn token(&self) -> Result<Arc<AccessToken>> {
        match self.current() {
            Some(token) if !token.is_expired() => Ok(token),
            _ => self.reload(None).await,
        }
    }

    /// Replaces `stale` after the API rejected it.
    ///
    /// If another caller already replaced it, the newer token is returned
    /// without contacting the token source.
    pub async fn refresh(&self, stale: &AccessToken) -> Result<Arc<AccessToken>> {
        self.reload(Some(stale.generation)).await
    }

    async fn reload(&self, stale_generation: Option<u64>) -> Result<Arc<AccessToken>> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.current() {
            let replaced = match stale_generation {
                Some(generation) => current.generation != generation,
                None => !current.is_expired(),
            };
            if replaced {
                return Ok(current);
            }
        }

        let value = self.source.fetch_token().await?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = Arc::new(AccessToken::new(value, generation));
        if stale_generation.is_some() {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            log::info!(
                "refreshed credentials via {} (generation {})",
                self.source.name(),
                generation
            );
        }
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&token));
        Ok(token)
    }

    /// Number of refreshes triggered by rejected tokens.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Drops the cached token; the next call to [`token`](Self::token) fetches anew.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::transport::testing::{ScriptedTransport, json_response, status_response};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch_token(&self) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::task::yield_now().await;
            Ok(format!("token-{n}"))
        }

        fn name(&self) -> &'static str {
            "CountingSource"
        }
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let source = Arc::new(CountingSource::default());
        let provider = CredentialProvider::new(source.clone());
        let a = provider.token().await.unwrap();
        let b = provider.token().await.unwrap();
        assert_eq!(a.value(), "token-1");
        assert_eq!(b.generation(), a.generation());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.authorization(), "Bearer token-1");
    }

    #[tokio::test]
    async fn test_concurrent_refresh_of_same_stale_token_fetches_once() {
        let source = Arc::new(CountingSource::default());
        let provider = Arc::new(CredentialProvider::new(source.clone()));
        let stale = provider.token().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                let stale = Arc::clone(&stale);
                tokio::spawn(async move { provider.refresh(&stale).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().value(), "token-2");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let source = Arc::new(CountingSource::default());
        let provider = CredentialProvider::new(source.clone());
        provider.token().await.unwrap();
        provider.invalidate();
        assert_eq!(provider.token().await.unwrap().value(), "token-2");
        assert_eq!(provider.refresh_count(), 0);
    }

    #[test]
    fn test_jwt_expiry() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"user","exp":1700000000}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig");
        let exp = jwt_expiry(&token).unwrap();
        assert_eq!(exp.timestamp(), 1_700_000_000);
        assert!(AccessToken::new(token, 1).is_expired());
        assert_eq!(jwt_expiry("opaque-token"), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", StaticToken::new("super-secret-token-value"));
        assert!(!debug.contains("super-secret-token-value"));
        let debug = format!("{:?}", AccessToken::new("another-secret-value".into(), 3));
        assert!(!debug.contains("another-secret-value"));
    }

    #[tokio::test]
    async fn test_password_auth_reads_id_token() {
        let transport = Arc::new(ScriptedTransport::new([json_response(
            200,
            json!({"id_token": "jwt-abc"}),
        )]));
        let auth = PasswordAuth::new(
            transport.clone(),
            "https://api.withleaf.io/api/authenticate",
            "agronomist@example.com",
            "hunter2",
        );
        assert_eq!(auth.fetch_token().await.unwrap(), "jwt-abc");

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::POST);
        let body: serde_json::Value = serde_json::from_slice(sent.body.as_ref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"username": "agronomist@example.com", "password": "hunter2", "rememberMe": "true"})
        );
    }

    #[tokio::test]
    async fn test_password_auth_rejected() {
        let transport = Arc::new(ScriptedTransport::new([status_response(401)]));
        let auth = PasswordAuth::new(transport, "http://localhost/api/authenticate", "u", "p");
        let err = auth.fetch_token().await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }), "{err}");
    }
}
