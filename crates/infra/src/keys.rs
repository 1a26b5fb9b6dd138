//! Rotating public verification keys (JWKS) with TTL and stampede control.
//!
//! The kid → key map is replaced wholesale on every successful refresh and
//! kept as-is when a refresh fails. Refresh attempts are serialized by an async
//! gate; attempts landing within `min_refresh_interval` of the previous one
//! are coalesced into a no-op, so a burst of cold lookups costs one fetch.
//! The map lock is only taken for lookups and the final swap, never across the
//! network call.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_JWKS_TTL;

/// Minimum spacing between two remote refreshes.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// A JSON Web Key (RSA members only; other members are ignored).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA", "EC")
    pub kty: String,

    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    /// Public key use (e.g., "sig")
    #[serde(default, rename = "use")]
    pub use_: Option<String>,

    /// RSA modulus (base64url)
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url)
    #[serde(default)]
    pub e: Option<String>,
}

impl Jwk {
    pub fn is_signing_key(&self) -> bool {
        self.use_.as_deref() != Some("enc")
    }

    pub fn is_rsa(&self) -> bool {
        self.kty == "RSA" && self.n.is_some() && self.e.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key set fetch failed: {0}")]
    Fetch(String),

    #[error("key set contained no usable RSA signing keys")]
    NoUsableKeys,

    #[error("signing key not found: {0}")]
    KeyNotFound(String),
}

/// Where key sets come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeySetError>;
}

/// Fetches a JWKS document over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    url: String,
    client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| KeySetError::Fetch(format!("http client: {e}")))?;
        Ok(Self::with_client(url, client))
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        debug!(jwks_url = %self.url, "fetching JWKS");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeySetError::Fetch(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(KeySetError::Fetch(format!("HTTP {}", response.status())));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySetError::Fetch(format!("invalid JSON: {e}")))
    }
}

/// Result of a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The map was replaced with this many keys.
    Replaced(usize),
    /// Another refresh ran within the coalescing window.
    Coalesced,
}

#[derive(Default)]
struct KeyMap {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

/// Cache of remote verification keys addressed by kid.
pub struct KeyRotationCache {
    source: Arc<dyn KeySetSource>,
    ttl: Duration,
    min_refresh_interval: Duration,
    state: RwLock<KeyMap>,
    /// Serializes refreshes; holds the completion time of the last attempt.
    refresh_gate: Mutex<Option<Instant>>,
}

impl core::fmt::Debug for KeyRotationCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyRotationCache")
            .field("ttl", &self.ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("keys", &self.key_ids())
            .finish()
    }
}

impl KeyRotationCache {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            ttl: DEFAULT_JWKS_TTL,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
            state: RwLock::new(KeyMap::default()),
            refresh_gate: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Key for `kid`: from cache while fresh, otherwise after one refresh.
    ///
    /// When the refresh fails the previous map is still consulted, so a
    /// flaky endpoint does not break tokens signed with known keys.
    pub async fn get_public_key(&self, kid: &str) -> Result<DecodingKey, KeySetError> {
        if let Some(key) = self.lookup(kid, true) {
            return Ok(key);
        }

        if let Err(e) = self.refresh().await {
            warn!(kid, error = %e, "JWKS refresh failed; keeping previous key set");
        }

        self.lookup(kid, false)
            .ok_or_else(|| KeySetError::KeyNotFound(kid.to_string()))
    }

    /// Fetch and swap in a new key set unless one was fetched very recently.
    pub async fn refresh(&self) -> Result<RefreshOutcome, KeySetError> {
        let mut last_attempt = self.refresh_gate.lock().await;
        if let Some(at) = *last_attempt {
            if at.elapsed() < self.min_refresh_interval {
                debug!("JWKS refresh coalesced");
                return Ok(RefreshOutcome::Coalesced);
            }
        }

        let fetched = self.source.fetch().await;
        *last_attempt = Some(Instant::now());
        let keys = parse_key_set(&fetched?);

        if keys.is_empty() {
            return Err(KeySetError::NoUsableKeys);
        }

        let count = keys.len();
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = KeyMap {
                keys,
                fetched_at: Some(Instant::now()),
            };
        }

        info!(key_count = count, "JWKS refreshed");
        Ok(RefreshOutcome::Replaced(count))
    }

    pub fn key_ids(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = state.keys.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lookup(&self, kid: &str, require_fresh: bool) -> Option<DecodingKey> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let fresh = state
            .fetched_at
            .is_some_and(|at| at.elapsed() < self.ttl);
        if require_fresh && !fresh {
            return None;
        }
        state.keys.get(kid).cloned()
    }
}

/// Convert usable RSA signing keys into verification keys, skipping the rest.
fn parse_key_set(set: &JwkSet) -> HashMap<String, DecodingKey> {
    let mut keys = HashMap::new();

    for jwk in &set.keys {
        let Some(kid) = jwk.kid.as_deref() else {
            debug!("skipping JWK without kid");
            continue;
        };
        if !jwk.is_rsa() || !jwk.is_signing_key() {
            debug!(kid, kty = %jwk.kty, "skipping non-RSA or encryption JWK");
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            debug!(kid, alg = ?jwk.alg, "skipping JWK with unexpected algorithm");
            continue;
        }

        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            continue;
        };
        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => {
                keys.insert(kid.to_string(), key);
            }
            Err(err) => warn!(kid, error = %err, "skipping JWK with invalid RSA components"),
        }
    }

    keys
}
