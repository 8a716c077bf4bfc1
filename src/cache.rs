//! In-memory result cache wrapped around a [`PerformanceSearch`].

use crate::config::CacheSettings;
use crate::error::Result;
use crate::models::{SearchRequest, SearchResponse};
use crate::orchestrator::PerformanceSearch;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

struct CacheEntry {
    response: SearchResponse,
    stored_at: Instant,
}

/// Successful responses keyed by normalized performer name.
pub struct SearchCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl SearchCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_seconds), settings.max_entries)
    }

    /// Cache key for a performer name: trimmed, lowercased, inner whitespace collapsed.
    pub fn key(performer_name: &str) -> String {
        performer_name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// A fresh entry for `performer_name`, if any.
    pub fn get(&self, performer_name: &str) -> Option<SearchResponse> {
        let key = Self::key(performer_name);
        let entries = self.read();
        entries
            .get(&key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.response.clone())
    }

    /// Store a response. Only successful responses are kept.
    pub fn insert(&self, response: &SearchResponse) {
        if !response.success {
            return;
        }

        let key = Self::key(&response.performer_name);
        let mut entries = self.write();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                response: response.clone(),
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Serves repeated searches from a [`SearchCache`].
///
/// A request with `bypass_cache` always reaches the inner search; its result
/// still refreshes the cache.
pub struct CachedSearch<S> {
    inner: S,
    cache: SearchCache,
}

impl<S: PerformanceSearch> CachedSearch<S> {
    pub fn new(inner: S, cache: SearchCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }
}

#[async_trait]
impl<S: PerformanceSearch> PerformanceSearch for CachedSearch<S> {
    #[instrument(skip(self, request), fields(performer = %request.performer_name, bypass = request.bypass_cache))]
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if !request.bypass_cache {
            if let Some(hit) = self.cache.get(&request.performer_name) {
                debug!("Cache hit for {}", request.performer_name);
                return Ok(hit);
            }
        }

        let response = self.inner.search(request).await?;
        self.cache.insert(&response);
        Ok(response)
    }
}
