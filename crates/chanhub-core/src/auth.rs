//! Signature verification, Basic-auth header formation, and a cached,
//! single-flight OAuth client-credentials token.

use crate::error::ChannelError;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha1 = Hmac<Sha1>;

const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Builds the Twilio-style canonical string: `url || concat_over_sorted_keys(key || concat_over_values(value))`.
fn canonical_string(url: &str, params: &BTreeMap<String, String>) -> String {
    let mut data = String::from(url);
    for (key, value) in params {
        data.push_str(key);
        data.push_str(value);
    }
    data
}

/// Computes the base64-encoded HMAC-SHA1 signature over `url` and sorted form params.
pub fn sign(url: &str, params: &BTreeMap<String, String>, secret: &str) -> String {
    let data = canonical_string(url, params);
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(data.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Verifies a signature in constant time. Any single byte changed in the URL
/// or any form value flips the result.
pub fn verify(url: &str, params: &BTreeMap<String, String>, secret: &str, signature: &str) -> bool {
    let expected = sign(url, params, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// RFC 7617 Basic authentication header value, e.g. `"Basic dXNlcjpwYXNz"`.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    let raw = format!("{username}:{password}");
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(raw)
    )
}

/// Narrow collaborator interface onto the Backend's shared key-value store,
/// used only for caching OAuth tokens.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn token_cache_get(&self, key: &str) -> Option<String>;
    async fn token_cache_set(&self, key: &str, token: &str, ttl: Duration);
}

/// Per-channel keyed lock over OAuth token acquisition: fetches on unrelated
/// channels never serialize against each other (the single process-wide
/// mutex this replaces would have been a correctness and throughput bug).
pub struct OAuthTokenCache {
    locks: dashmap::DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
}

impl Default for OAuthTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthTokenCache {
    pub fn new() -> Self {
        Self {
            locks: dashmap::DashMap::new(),
        }
    }

    fn lock_for(&self, channel: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(channel)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Returns a cached token if present, else single-flights `fetch` behind
    /// the per-channel lock and caches the result with
    /// `TTL = min(reported_expires_in, 3600s)`.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        channel: Uuid,
        cache_key: &str,
        store: &dyn TokenStore,
        fetch: F,
    ) -> Result<String, ChannelError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, u64), ChannelError>>,
    {
        let lock = self.lock_for(channel);
        let _guard = lock.lock().await;

        if let Some(token) = store.token_cache_get(cache_key).await {
            return Ok(token);
        }

        let (token, expires_in) = fetch().await?;
        let ttl_secs = expires_in.min(DEFAULT_TOKEN_TTL_SECS).max(1);
        store
            .token_cache_set(cache_key, &token, Duration::from_secs(ttl_secs))
            .await;
        Ok(token)
    }
}
