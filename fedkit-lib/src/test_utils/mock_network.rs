//! In-memory stand-ins for the network collaborators.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::entities::Profile;
use crate::transport::{
    Canonicalizer, DocumentFetcher, DocumentSender, FetchedDocument, ProfileResolver,
};
use crate::{FederationError, Result};

/// Resolver over a fixed set of profiles.
///
/// Each profile is found by its id, its handle and its `#main-key` key id.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    profiles: HashMap<String, Profile>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        let mut keys = vec![profile.base.id.clone(), format!("{}#main-key", profile.base.id)];
        if !profile.base.handle.is_empty() {
            keys.push(profile.base.handle.clone());
        }
        for key in keys {
            self.profiles.insert(key, profile.clone());
        }
        self
    }
}

impl ProfileResolver for StaticResolver {
    fn resolve(&self, identifier: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.get(identifier).cloned())
    }
}

/// One delivery seen by [`RecordingSender`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentDocument {
    pub url: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl SentDocument {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Sender that records every delivery.
///
/// Deliveries answer 202 unless a status or a transport failure was
/// configured for the url.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: RwLock<Vec<SentDocument>>,
    statuses: HashMap<String, u16>,
    failing: Vec<String>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `status` for `url`.
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.statuses.insert(url.into(), status);
        self
    }

    /// Fail deliveries to `url` with a transport error.
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failing.push(url.into());
        self
    }

    /// Deliveries so far, in order.
    pub fn sent(&self) -> Vec<SentDocument> {
        self.sent.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Deliveries to `url`.
    pub fn sent_to(&self, url: &str) -> Vec<SentDocument> {
        self.sent()
            .into_iter()
            .filter(|document| document.url == url)
            .collect()
    }
}

impl DocumentSender for RecordingSender {
    fn send(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<u16> {
        self.sent
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentDocument {
                url: url.to_string(),
                body: body.to_string(),
                headers: headers.to_vec(),
            });
        if self.failing.iter().any(|failing| failing == url) {
            return Err(FederationError::Transport(format!("connection refused: {}", url)));
        }
        Ok(self.statuses.get(url).copied().unwrap_or(202))
    }
}

/// Fetcher over a fixed set of documents. Unknown urls answer 404.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    documents: HashMap<String, String>,
    counts: RwLock<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.documents.insert(url.into(), body.into());
        self
    }

    /// Number of fetches of `url` so far.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.counts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

impl DocumentFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        *self
            .counts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(url.to_string())
            .or_insert(0) += 1;
        Ok(match self.documents.get(url) {
            Some(body) => FetchedDocument::new(body.clone(), 200),
            None => FetchedDocument::new("", 404),
        })
    }
}

/// Canonicalizer that serialises JSON with sorted keys.
///
/// Not RDF canonicalisation; deterministic enough to exercise LD
/// signatures end to end without a JSON-LD processor.
#[derive(Clone, Copy, Debug, Default)]
pub struct SortedKeysCanonicalizer;

impl Canonicalizer for SortedKeysCanonicalizer {
    fn canonicalize(&self, document: &serde_json::Value) -> Result<String> {
        Ok(serde_json::to_string(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::alice;

    #[test]
    fn test_static_resolver_keys() {
        let resolver = StaticResolver::new().with_profile(alice().profile());
        for key in [alice().id, alice().handle, alice().key_id()] {
            assert!(resolver.resolve(&key).unwrap().is_some(), "{}", key);
        }
        assert!(resolver.resolve("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_recording_sender() {
        let sender = RecordingSender::new()
            .with_status("https://a/inbox", 500)
            .with_failure("https://b/inbox");
        assert_eq!(sender.send("https://a/inbox", "x", &[]).unwrap(), 500);
        assert!(sender.send("https://b/inbox", "x", &[]).is_err());
        assert_eq!(sender.send("https://c/inbox", "x", &[]).unwrap(), 202);
        assert_eq!(sender.sent().len(), 3);
        assert_eq!(sender.sent_to("https://c/inbox").len(), 1);
    }

    #[test]
    fn test_sorted_keys() {
        let json = SortedKeysCanonicalizer
            .canonicalize(&serde_json::json!({"b": 1, "a": 2}))
            .unwrap();
        assert_eq!(json, r#"{"a":2,"b":1}"#);
    }
}
