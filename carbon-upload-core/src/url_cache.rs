//! Read-through cache of temporary read URLs.
//!
//! [`UrlCache`] maps object keys to a URL and its expiry, measured against an
//! injected [`Clock`]. [`ReadUrls`] owns one cache and a [`FileApi`] and is
//! the only way callers obtain read URLs.
//!
//! No map shard is held across a request. Two callers missing on the same
//! key both fetch, and the later write wins.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::contract::FileApi;
use crate::error::ApiError;

/// Entries are treated as expired this long before their real expiry.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[cfg(any(test, feature = "test-export-mocks"))]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

#[cfg(any(test, feature = "test-export-mocks"))]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

#[cfg(any(test, feature = "test-export-mocks"))]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-export-mocks"))]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    expires_at: Instant,
}

/// Object key → temporary URL, expiring against `C`.
#[derive(Debug)]
pub struct UrlCache<C: Clock = SystemClock> {
    clock: C,
    entries: DashMap<String, CachedUrl>,
}

impl Default for UrlCache<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> UrlCache<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            entries: DashMap::new(),
        }
    }

    /// Cached URL for `key`, unless it is within the safety margin of expiry.
    /// Stale entries are dropped on the way out.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let fresh = self
            .entries
            .get(key)
            .filter(|entry| is_fresh(entry, now))
            .map(|entry| entry.url.clone());
        if fresh.is_none() {
            self.entries.remove_if(key, |_, entry| !is_fresh(entry, now));
        }
        fresh
    }

    /// Lifetimes that overflow the clock are not cached.
    pub fn insert(&self, key: impl Into<String>, url: impl Into<String>, expires_in: Duration) {
        let key = key.into();
        let Some(expires_at) = self.clock.now().checked_add(expires_in) else {
            warn!(
                object_key = %key,
                expires_in_secs = expires_in.as_secs(),
                "Temporary URL lifetime out of range, not cached"
            );
            self.entries.remove(&key);
            return;
        };
        self.entries.insert(
            key,
            CachedUrl {
                url: url.into(),
                expires_at,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_fresh(entry: &CachedUrl, now: Instant) -> bool {
    now + EXPIRY_SAFETY_MARGIN <= entry.expires_at
}

/// Access layer for temporary read URLs, backed by a [`UrlCache`].
pub struct ReadUrls<A: FileApi, C: Clock = SystemClock> {
    api: A,
    cache: UrlCache<C>,
    default_expires_in: u64,
}

impl<A: FileApi> ReadUrls<A, SystemClock> {
    pub fn new(api: A, default_expires_in: u64) -> Self {
        Self::with_clock(api, SystemClock, default_expires_in)
    }
}

impl<A: FileApi, C: Clock> ReadUrls<A, C> {
    pub fn with_clock(api: A, clock: C, default_expires_in: u64) -> Self {
        Self {
            api,
            cache: UrlCache::new(clock),
            default_expires_in,
        }
    }

    /// Temporary read URL for `object_key`, from cache when still fresh.
    pub async fn temporary_url(
        &self,
        object_key: &str,
        expires_in: Option<u64>,
    ) -> Result<String, ApiError> {
        if let Some(url) = self.cache.get(object_key) {
            debug!(object_key, "Temporary URL served from cache");
            return Ok(url);
        }

        let requested = expires_in.unwrap_or(self.default_expires_in);
        info!(object_key, expires_in = requested, "Fetching temporary URL");
        let fetched = self.api.presigned_url(object_key, requested).await?;
        self.cache
            .insert(object_key, fetched.url.clone(), fetched.expires_in);
        Ok(fetched.url)
    }

    pub fn invalidate(&self, object_key: &str) {
        self.cache.invalidate(object_key);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &UrlCache<C> {
        &self.cache
    }
}
