//! Shared users and in-memory collaborators for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use fedkit_lib::entities::Profile;
use fedkit_lib::protocols::activitypub::ActivityPubEntity;
use fedkit_lib::transport::{
    Canonicalizer, DocumentFetcher, DocumentSender, FetchedDocument, InboundRequest,
    ProfileResolver,
};
use fedkit_lib::LocalUser;

pub const ALICE_PRIVATE_PEM: &str = include_str!("../fixtures/alice_private.pem");
pub const BOB_PRIVATE_PEM: &str = include_str!("../fixtures/bob_private.pem");

pub fn alice() -> LocalUser {
    LocalUser::new("https://example.com/u/alice", "alice@example.com")
        .with_private_key_pem(ALICE_PRIVATE_PEM)
        .unwrap()
}

pub fn bob() -> LocalUser {
    LocalUser::new("https://example.org/u/bob", "bob@example.org")
        .with_private_key_pem(BOB_PRIVATE_PEM)
        .unwrap()
}

/// Profiles reachable by actor id, handle and key id.
#[derive(Default)]
pub struct Directory {
    profiles: HashMap<String, Profile>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: &LocalUser) -> Self {
        self.with_profile(user, user.profile())
    }

    /// Register `profile` under the identifiers of `user`.
    pub fn with_profile(mut self, user: &LocalUser, profile: Profile) -> Self {
        for key in [user.id.clone(), user.handle.clone(), user.key_id()] {
            self.profiles.insert(key, profile.clone());
        }
        self
    }
}

impl ProfileResolver for Directory {
    fn resolve(&self, identifier: &str) -> fedkit_lib::Result<Option<Profile>> {
        Ok(self.profiles.get(identifier).cloned())
    }
}

#[derive(Clone, Debug)]
pub struct Delivered {
    pub url: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl Delivered {
    /// The delivery as the receiving server sees it.
    pub fn to_request(&self) -> InboundRequest {
        let mut request = InboundRequest::new(self.body.clone()).with_url(self.url.clone());
        for (name, value) in &self.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        request
    }
}

/// Accepts every delivery with 202 and keeps it.
#[derive(Default)]
pub struct Outbox {
    delivered: Mutex<Vec<Delivered>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn only(&self) -> Delivered {
        let delivered = self.delivered();
        assert_eq!(delivered.len(), 1, "deliveries: {:?}", delivered);
        delivered[0].clone()
    }
}

impl DocumentSender for Outbox {
    fn send(&self, url: &str, body: &str, headers: &[(String, String)]) -> fedkit_lib::Result<u16> {
        self.delivered.lock().unwrap().push(Delivered {
            url: url.to_string(),
            body: body.to_string(),
            headers: headers.to_vec(),
        });
        Ok(202)
    }
}

/// Compact JSON with sorted keys; stands in for URDNA2015.
pub struct JsonCanonicalizer;

impl Canonicalizer for JsonCanonicalizer {
    fn canonicalize(&self, document: &serde_json::Value) -> fedkit_lib::Result<String> {
        Ok(serde_json::to_string(document)?)
    }
}

/// Actor documents served by URL, as a remote server would.
#[derive(Default)]
pub struct Actors {
    documents: HashMap<String, serde_json::Value>,
}

impl Actors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` at `url`.
    pub fn serve(mut self, url: &str, document: serde_json::Value) -> Self {
        self.documents.insert(url.to_string(), document);
        self
    }

    /// Serve the user's own actor document at its id.
    pub fn with_user(self, user: &LocalUser) -> Self {
        let url = user.id.clone();
        self.serve(&url, actor_document(user))
    }
}

impl DocumentFetcher for Actors {
    fn fetch(&self, url: &str) -> fedkit_lib::Result<FetchedDocument> {
        Ok(match self.documents.get(url) {
            Some(document) => FetchedDocument::new(document.to_string(), 200),
            None => FetchedDocument::new("", 404),
        })
    }
}

/// ActivityStreams actor document for `user`, with its `#main-key`.
pub fn actor_document(user: &LocalUser) -> serde_json::Value {
    ActivityPubEntity::from_entity(user.profile().into())
        .unwrap()
        .to_as2(None)
        .unwrap()
}
