//! Signing key resolution for access token verification.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use log::*;
use lru::LruCache;
use serde::Serialize;
use std::collections::HashMap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{key_set_error, Error, KeySetErrorKind};
use crate::http::HttpClient;

/// Resolves a token's `kid` header to the key that verifies its signature.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn resolve(&self, kid: &str) -> Result<DecodingKey, Error>;

    /// Whether the keys can currently be reached. In-memory sources always can.
    async fn status(&self) -> KeySetStatus {
        KeySetStatus::reachable(None)
    }
}

/// Result of a key set reachability check, as reported by `/healthz?deep=1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySetStatus {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub checked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeySetStatus {
    fn reachable(status: Option<u16>) -> Self {
        Self {
            reachable: true,
            status,
            checked_at: now_rfc3339(),
            error: None,
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Cache and rate limit settings for [`JwksClient`].
#[derive(Debug, Clone)]
pub struct JwksCacheConfig {
    pub max_entries: usize,
    pub max_age: Duration,
    pub requests_per_minute: u32,
}

impl Default for JwksCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10,
            max_age: Duration::from_secs(600),
            requests_per_minute: 30,
        }
    }
}

impl From<&service::config::Config> for JwksCacheConfig {
    fn from(config: &service::config::Config) -> Self {
        Self {
            max_entries: config.neonpanel_jwks_cache_max_entries as usize,
            max_age: config.jwks_cache_max_age(),
            requests_per_minute: config.neonpanel_jwks_requests_per_minute,
        }
    }
}

struct CachedKey {
    key: DecodingKey,
    fetched_at: Instant,
}

/// Keys by `kid`, bounded by count (least recently used goes first) and age.
struct KeyCache {
    entries: LruCache<String, CachedKey>,
    max_age: Duration,
}

impl KeyCache {
    fn new(max_entries: usize, max_age: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            max_age,
        }
    }

    fn get(&mut self, kid: &str, now: Instant) -> Option<DecodingKey> {
        let stale = self
            .entries
            .peek(kid)
            .is_some_and(|entry| now.duration_since(entry.fetched_at) >= self.max_age);
        if stale {
            self.entries.pop(kid);
            return None;
        }

        self.entries.get(kid).map(|entry| entry.key.clone())
    }

    fn insert(&mut self, kid: &str, key: DecodingKey, now: Instant) {
        self.entries.put(
            kid.to_string(),
            CachedKey {
                key,
                fetched_at: now,
            },
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Fetches signing keys from a remote JSON Web Key Set.
///
/// Cache misses refetch the whole set. Refetches are serialized and held to a
/// per-minute quota, so a burst of tokens with an unknown `kid` cannot hammer
/// the key server.
pub struct JwksClient {
    http: HttpClient,
    jwks_uri: String,
    cache: Mutex<KeyCache>,
    refetch: tokio::sync::Mutex<()>,
    limiter: DefaultDirectRateLimiter,
}

impl JwksClient {
    pub fn new(http: HttpClient, jwks_uri: impl Into<String>, config: JwksCacheConfig) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            http,
            jwks_uri: jwks_uri.into(),
            cache: Mutex::new(KeyCache::new(config.max_entries, config.max_age)),
            refetch: tokio::sync::Mutex::new(()),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    fn cached(&self, kid: &str) -> Option<DecodingKey> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kid, Instant::now())
    }

    async fn fetch_key_set(&self) -> Result<JwkSet, Error> {
        debug!("Fetching JWKS from {}", self.jwks_uri);
        let response = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;

        serde_json::from_slice::<JwkSet>(&body).map_err(|err| {
            warn!("JWKS response from {} is not a key set: {err}", self.jwks_uri);
            Error {
                source: Some(Box::new(err)),
                error_kind: crate::error::ErrorKind::KeySet(KeySetErrorKind::InvalidKeySet),
            }
        })
    }
}

#[async_trait]
impl KeySource for JwksClient {
    async fn resolve(&self, kid: &str) -> Result<DecodingKey, Error> {
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }

        let _refetch = self.refetch.lock().await;

        // Another task may have fetched while we waited for the lock.
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }

        if self.limiter.check().is_err() {
            warn!("JWKS refetch rate limit reached, not resolving kid {kid}");
            return Err(key_set_error(
                KeySetErrorKind::RateLimited,
                "JWKS request rate limit exceeded",
            ));
        }

        let key_set = self.fetch_key_set().await?;
        let jwk = key_set.find(kid).ok_or_else(|| {
            key_set_error(KeySetErrorKind::KeyNotFound, "kid not present in key set")
        })?;
        let key = DecodingKey::from_jwk(jwk).map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: crate::error::ErrorKind::KeySet(KeySetErrorKind::InvalidKeySet),
        })?;

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kid, key.clone(), Instant::now());

        Ok(key)
    }

    /// `HEAD` on the key set URI. Bypasses the cache and the refetch quota.
    async fn status(&self) -> KeySetStatus {
        match self.http.head(&self.jwks_uri).send().await {
            Ok(response) if response.status().is_success() => {
                KeySetStatus::reachable(Some(response.status().as_u16()))
            }
            Ok(response) => KeySetStatus {
                reachable: false,
                status: Some(response.status().as_u16()),
                checked_at: now_rfc3339(),
                error: None,
            },
            Err(err) => {
                warn!("JWKS endpoint {} is unreachable: {err}", self.jwks_uri);
                KeySetStatus {
                    reachable: false,
                    status: None,
                    checked_at: now_rfc3339(),
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

/// A fixed set of keys, for pinned deployments and tests.
#[derive(Default)]
pub struct StaticKeySource {
    keys: HashMap<String, DecodingKey>,
}

impl StaticKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }

    /// Loads every key with a `kid` from a JWKS document.
    pub fn from_jwks_json(json: &str) -> Result<Self, Error> {
        let key_set: JwkSet = serde_json::from_str(json).map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: crate::error::ErrorKind::KeySet(KeySetErrorKind::InvalidKeySet),
        })?;

        let mut source = Self::new();
        for jwk in &key_set.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                continue;
            };
            let key = DecodingKey::from_jwk(jwk).map_err(|err| Error {
                source: Some(Box::new(err)),
                error_kind: crate::error::ErrorKind::KeySet(KeySetErrorKind::InvalidKeySet),
            })?;
            source.keys.insert(kid.to_string(), key);
        }
        Ok(source)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn resolve(&self, kid: &str) -> Result<DecodingKey, Error> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| key_set_error(KeySetErrorKind::KeyNotFound, "unknown kid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::HttpClientBuilder;

    const JWKS: &str = include_str!("../testdata/jwks.json");

    fn client(uri: String, config: JwksCacheConfig) -> JwksClient {
        let http = HttpClientBuilder::new()
            .with_max_retries(0)
            .build()
            .unwrap();
        JwksClient::new(http, uri, config)
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let start = Instant::now();
        let mut cache = KeyCache::new(2, Duration::from_secs(60));
        cache.insert("a", DecodingKey::from_secret(b"a"), start);
        cache.insert("b", DecodingKey::from_secret(b"b"), start + Duration::from_millis(1));
        assert!(cache.get("a", start + Duration::from_millis(2)).is_some());

        cache.insert("c", DecodingKey::from_secret(b"c"), start + Duration::from_millis(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", start + Duration::from_millis(4)).is_some());
        assert!(cache.get("b", start + Duration::from_millis(4)).is_none());
        assert!(cache.get("c", start + Duration::from_millis(4)).is_some());
    }

    #[test]
    fn test_cache_expires_entries_past_max_age() {
        let start = Instant::now();
        let mut cache = KeyCache::new(5, Duration::from_secs(10));
        cache.insert("a", DecodingKey::from_secret(b"a"), start);

        assert!(cache.get("a", start + Duration::from_secs(9)).is_some());
        assert!(cache.get("a", start + Duration::from_secs(10)).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_resolve_fetches_once_and_then_serves_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jwks")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(JWKS)
            .expect(1)
            .create_async()
            .await;

        let jwks = client(format!("{}/jwks", server.url()), JwksCacheConfig::default());

        assert!(jwks.resolve("test-key-1").await.is_ok());
        assert!(jwks.resolve("test-key-1").await.is_ok());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_kid_is_key_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/jwks")
            .with_status(200)
            .with_body(JWKS)
            .create_async()
            .await;

        let jwks = client(format!("{}/jwks", server.url()), JwksCacheConfig::default());
        let err = jwks.resolve("rotated-away").await.unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::KeySet(KeySetErrorKind::KeyNotFound));
    }

    #[tokio::test]
    async fn test_refetches_are_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jwks")
            .with_status(200)
            .with_body(JWKS)
            .expect(1)
            .create_async()
            .await;

        let config = JwksCacheConfig {
            requests_per_minute: 1,
            ..JwksCacheConfig::default()
        };
        let jwks = client(format!("{}/jwks", server.url()), config);

        assert!(jwks.resolve("missing-1").await.is_err());
        let err = jwks.resolve("missing-2").await.unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::KeySet(KeySetErrorKind::RateLimited));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_surfaces_as_http_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/jwks")
            .with_status(500)
            .create_async()
            .await;

        let jwks = client(format!("{}/jwks", server.url()), JwksCacheConfig::default());
        let err = jwks.resolve("test-key-1").await.unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Http(crate::error::HttpErrorKind::Status(500))
        );
    }

    #[tokio::test]
    async fn test_status_reports_reachable_key_set() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/jwks")
            .with_status(200)
            .create_async()
            .await;

        let jwks = client(format!("{}/jwks", server.url()), JwksCacheConfig::default());
        let status = jwks.status().await;

        assert!(status.reachable);
        assert_eq!(status.status, Some(200));
        assert!(status.error.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_reports_failing_key_set() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/jwks")
            .with_status(404)
            .create_async()
            .await;

        let jwks = client(format!("{}/jwks", server.url()), JwksCacheConfig::default());
        let status = jwks.status().await;

        assert!(!status.reachable);
        assert_eq!(status.status, Some(404));
    }

    #[tokio::test]
    async fn test_static_source_loads_jwks_document() {
        let source = StaticKeySource::from_jwks_json(JWKS).unwrap();
        assert!(source.resolve("test-key-1").await.is_ok());
        assert!(source.resolve("other").await.is_err());
    }
}
