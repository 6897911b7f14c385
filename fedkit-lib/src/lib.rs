//! Fedkit library.
//!
//! Social federation over one canonical content model. Posts, comments,
//! reactions, follows, profiles, retractions, shares and images are decoded
//! from and encoded to the **Diaspora** and **ActivityPub** protocols.
//!
//! This crate stays stateless and performs no I/O of its own: fetching,
//! delivery, profile lookup and RDF canonicalisation are delegated to the
//! caller through the traits in [`transport`].
//!
//! # Features
//!
//! - **Entity model**: protocol-neutral entities with capability-driven validation
//! - **Protocol registry**: identify the protocol of a payload, request or id
//! - **Diaspora**: Magic Envelopes, relayable signatures, encrypted private payloads
//! - **ActivityPub**: AS2 mapping, HTTP signatures, LD signatures, actor resolution
//! - **Pipelines**: [`handle_receive`], [`handle_create_payload`] and [`handle_send`]
//!
//! # Example
//!
//! ```
//! use fedkit_lib::entities::{Base, Post};
//! use fedkit_lib::outbound::{handle_create_payload, Outgoing};
//! use fedkit_lib::{LocalUser, Protocol};
//!
//! # fn main() -> fedkit_lib::Result<()> {
//! let alice = LocalUser::new("https://example.com/u/alice", "alice@example.com");
//!
//! let mut post = Post::new(
//!     Base::new("https://example.com/u/alice/posts/1", alice.id.clone()),
//!     "Hello **fediverse**",
//! );
//! post.public = true;
//!
//! let payload = handle_create_payload(
//!     &Outgoing::Entity(post.into()),
//!     &alice,
//!     Protocol::ActivityPub,
//!     None,
//!     None,
//! )?;
//! assert!(payload.contains("\"Create\""));
//! # Ok(())
//! # }
//! ```

use rsa::{RsaPrivateKey, RsaPublicKey};

pub mod cache;
pub mod config;
pub mod crypto;
pub mod entities;
pub mod errors;
pub mod inbound;
pub mod outbound;
pub mod prelude;
pub mod protocols;
pub mod transport;

/// Test utilities for federation testing.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::FederationConfig;
pub use errors::{FederationError, FederationErrorCode};
pub use inbound::{handle_receive, ReceiveContext, ReceivedMessage};
pub use outbound::{handle_create_payload, handle_send, DeliveryReport, Recipient};
/// RSA key types used throughout the public API.
pub use rsa;

pub use protocols::{
    identify_protocol_by_id, identify_protocol_by_payload, identify_protocol_by_request, Protocol,
};

/// Common result alias for Fedkit operations.
pub type Result<T> = std::result::Result<T, FederationError>;

/// A user of the host application acting as sender or recipient.
///
/// `id` is the ActivityPub actor id and `handle` the Diaspora `user@host`
/// handle. The private key is needed to sign outbound payloads and to
/// decrypt private inbound ones.
///
/// # Example
///
/// ```
/// use fedkit_lib::LocalUser;
///
/// let user = LocalUser::new("https://example.com/u/alice", "alice@example.com");
/// assert_eq!(user.key_id(), "https://example.com/u/alice#main-key");
/// assert!(user.private_key().is_err());
/// ```
#[derive(Clone)]
pub struct LocalUser {
    pub id: String,
    pub handle: String,
    private_key: Option<RsaPrivateKey>,
}

impl LocalUser {
    pub fn new(id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
            private_key: None,
        }
    }

    pub fn with_private_key(mut self, key: RsaPrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Attach a PEM encoded (PKCS#1 or PKCS#8) private key.
    pub fn with_private_key_pem(self, pem: &str) -> Result<Self> {
        Ok(self.with_private_key(crypto::parse_private_key(pem)?))
    }

    /// The user's private key, or `MissingPrivateKey`.
    pub fn private_key(&self) -> Result<&RsaPrivateKey> {
        self.private_key
            .as_ref()
            .ok_or_else(|| FederationError::MissingPrivateKey(self.id.clone()))
    }

    pub fn public_key(&self) -> Result<RsaPublicKey> {
        Ok(self.private_key()?.to_public_key())
    }

    /// ActivityPub key id, `{id}#main-key`.
    pub fn key_id(&self) -> String {
        format!("{}#main-key", self.id)
    }

    /// Minimal public profile: ids, handle and public key.
    pub fn profile(&self) -> entities::Profile {
        let base = entities::Base::new(self.id.clone(), self.id.clone()).with_handle(self.handle.clone());
        let mut profile = entities::Profile::new(base);
        profile.public = true;
        if let Some(pem) = self
            .private_key
            .as_ref()
            .and_then(|key| crypto::public_key_pem(&key.to_public_key()).ok())
        {
            profile.public_key = pem;
        }
        profile
    }
}

impl std::fmt::Debug for LocalUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUser")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
