//! Collaborator seams: fetching, delivery, profile lookup and RDF
//! canonicalisation.
//!
//! The library performs no I/O of its own. Hosts hand in implementations of
//! these traits; all calls are blocking and happen on the caller's thread.
//! [`HttpClient`] (feature `http-client`) is a ready-made reqwest-backed
//! fetcher and sender.

#[cfg(feature = "http-client")]
mod http;

#[cfg(feature = "http-client")]
pub use http::HttpClient;

use crate::entities::Profile;
use crate::Result;

/// Response body and status of a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedDocument {
    pub body: String,
    pub status: u16,
}

impl FetchedDocument {
    pub fn new(body: impl Into<String>, status: u16) -> Self {
        Self {
            body: body.into(),
            status,
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking document retrieval.
pub trait DocumentFetcher {
    /// Fetch `url`. Non-2xx responses are returned, not raised.
    fn fetch(&self, url: &str) -> Result<FetchedDocument>;
}

/// Blocking payload delivery.
pub trait DocumentSender {
    /// POST `body` to `url` with `headers`, returning the response status.
    fn send(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<u16>;
}

/// Looks up remote (or local) profiles by handle, actor id or key id.
pub trait ProfileResolver {
    /// Resolve an identifier. `Ok(None)` means "not found".
    fn resolve(&self, identifier: &str) -> Result<Option<Profile>>;
}

/// RDF dataset canonicalisation (URDNA2015) of a JSON-LD document.
pub trait Canonicalizer {
    /// Canonical N-Quads for `document`.
    fn canonicalize(&self, document: &serde_json::Value) -> Result<String>;
}

impl<T: DocumentFetcher + ?Sized> DocumentFetcher for &T {
    fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        (**self).fetch(url)
    }
}

impl<T: DocumentSender + ?Sized> DocumentSender for &T {
    fn send(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<u16> {
        (**self).send(url, body, headers)
    }
}

impl<T: ProfileResolver + ?Sized> ProfileResolver for &T {
    fn resolve(&self, identifier: &str) -> Result<Option<Profile>> {
        (**self).resolve(identifier)
    }
}

/// An inbound HTTP request as handed over by the host's server framework.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundRequest {
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub method: String,
    /// Absolute url or path of the request.
    pub url: String,
}

impl InboundRequest {
    /// A POST request carrying `body`.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            method: "POST".to_string(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Path and query of the request url.
    pub fn path(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(parsed) => match parsed.query() {
                Some(query) => format!("{}?{}", parsed.path(), query),
                None => parsed.path().to_string(),
            },
            Err(_) if self.url.is_empty() => "/".to_string(),
            Err(_) => self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = InboundRequest::new("{}").with_header("Content-Type", "application/json");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("date"), None);
    }

    #[test]
    fn test_path() {
        let request = InboundRequest::new("").with_url("https://example.com/inbox?x=1");
        assert_eq!(request.path(), "/inbox?x=1");
        let request = InboundRequest::new("").with_url("/users/a/inbox");
        assert_eq!(request.path(), "/users/a/inbox");
        assert_eq!(InboundRequest::new("").path(), "/");
    }

    #[test]
    fn test_fetched_document_status() {
        assert!(FetchedDocument::new("", 204).is_success());
        assert!(!FetchedDocument::new("", 404).is_success());
    }
}
