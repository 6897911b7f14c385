//! Read-through document cache.
//!
//! Actor and key documents are fetched repeatedly while verifying and
//! building payloads. [`DocumentCache`] keeps successful responses for a
//! bounded time and is shared by reference; there is no process-wide cache.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::FederationConfig;
use crate::transport::{DocumentFetcher, FetchedDocument};
use crate::Result;

struct CacheEntry {
    document: FetchedDocument,
    stored_at: Instant,
}

/// TTL cache keyed by URL, safe for concurrent readers.
pub struct DocumentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl DocumentCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    pub fn from_config(config: &FederationConfig) -> Self {
        Self::new(
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_max_entries,
        )
    }

    /// Fresh cached document for `url`.
    pub fn get(&self, url: &str) -> Option<FetchedDocument> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(url)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.document.clone())
    }

    /// Store a document, evicting expired and then oldest entries when full.
    pub fn insert(&self, url: impl Into<String>, document: FetchedDocument) {
        if self.max_entries == 0 {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let url = url.into();
        if entries.len() >= self.max_entries && !entries.contains_key(&url) {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
            while entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        entries.remove(&key);
                    }
                    None => break,
                }
            }
        }
        entries.insert(
            url,
            CacheEntry {
                document,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, url: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(url);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`DocumentFetcher`] that consults a [`DocumentCache`] first.
///
/// Only successful responses are cached.
pub struct CachingFetcher<'a, F> {
    inner: F,
    cache: &'a DocumentCache,
}

impl<'a, F: DocumentFetcher> CachingFetcher<'a, F> {
    pub fn new(inner: F, cache: &'a DocumentCache) -> Self {
        Self { inner, cache }
    }
}

impl<F: DocumentFetcher> DocumentFetcher for CachingFetcher<'_, F> {
    fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        if let Some(document) = self.cache.get(url) {
            debug!(url, "document cache hit");
            return Ok(document);
        }
        let document = self.inner.fetch(url)?;
        if document.is_success() {
            self.cache.insert(url, document.clone());
        }
        Ok(document)
    }
}
