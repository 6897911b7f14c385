//! Diaspora protocol.
//!
//! Inbound, a payload is either a public Magic Envelope or a JSON document
//! holding an encrypted one. [`DiasporaProtocol::receive`] decrypts when
//! needed, verifies the envelope against the sender's key and hands the
//! message to [`mappers::message_to_objects`]. Outbound, [`build_send`]
//! renders an entity, wraps it in a signed envelope and encrypts it when a
//! recipient key is given.

pub mod encrypted;
pub mod entities;
pub mod magic_envelope;
pub mod mappers;
pub mod signatures;
pub mod xml;

use chrono::{DateTime, NaiveDateTime, Utc};
use rsa::RsaPublicKey;
use tracing::debug;

pub use entities::DiasporaEntity;
pub use magic_envelope::MagicEnvelope;

use self::xml::XmlElement;
use crate::entities::Entity;
use crate::transport::{InboundRequest, ProfileResolver};
use crate::{FederationError, LocalUser, Result};

pub(crate) const DIASPORA: &str = "diaspora";

/// Timestamp format used in Diaspora documents.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a Diaspora timestamp; RFC 3339 with fractions is accepted too.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Diaspora payload probe: encrypted JSON or a Magic Envelope document.
pub fn identify_payload(body: &str) -> bool {
    let body = body.trim();
    if body.starts_with('{') {
        return is_encrypted_payload(body);
    }
    if body.starts_with('<') {
        return XmlElement::parse(body).is_ok_and(|root| {
            root.local_name() == "env" && root.namespace() == Some(magic_envelope::NAMESPACE)
        });
    }
    false
}

fn is_encrypted_payload(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .is_ok_and(|value| value.get("encrypted_magic_envelope").is_some())
}

/// A verified inbound envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedEnvelope {
    /// Handle of the verified signer.
    pub sender: String,
    /// Decoded payload.
    pub message: String,
    /// Payload was encrypted to the receiving user.
    pub private: bool,
}

/// Inbound side of the Diaspora protocol.
pub struct DiasporaProtocol<'a> {
    resolver: &'a dyn ProfileResolver,
}

impl<'a> DiasporaProtocol<'a> {
    /// `resolver` supplies sender and author public keys.
    pub fn new(resolver: &'a dyn ProfileResolver) -> Self {
        Self { resolver }
    }

    /// Decrypt (if private) and verify an inbound payload.
    ///
    /// Private payloads need `user` with a private key. A failed
    /// verification aborts the whole payload.
    pub fn receive(
        &self,
        request: &InboundRequest,
        user: Option<&LocalUser>,
    ) -> Result<ReceivedEnvelope> {
        let body = request.body.trim();
        let (document, private) = if body.starts_with('{') {
            let user = user.ok_or_else(|| {
                FederationError::MissingPrivateKey("no receiving user for a private payload".to_string())
            })?;
            let key = user.private_key()?;
            (encrypted::decrypt_json(body, key)?, true)
        } else {
            (body.to_string(), false)
        };

        let envelope = MagicEnvelope::parse(&document)?;
        let sender = envelope.sender_handle()?;
        let profile = self
            .resolver
            .resolve(&sender)?
            .ok_or_else(|| FederationError::NoSenderKey(sender.clone()))?;
        let key = profile
            .rsa_public_key()
            .ok_or_else(|| FederationError::NoSenderKey(sender.clone()))?;
        envelope.verify(&key)?;
        debug!(sender = %sender, private, "verified Magic Envelope");

        Ok(ReceivedEnvelope {
            sender,
            message: envelope.message()?,
            private,
        })
    }

    /// Map a verified envelope's message to entities.
    pub fn message_to_objects(
        &self,
        envelope: &ReceivedEnvelope,
        user: Option<&LocalUser>,
    ) -> Result<Vec<Entity>> {
        let receiving_user = if envelope.private { user } else { None };
        mappers::message_to_objects(
            &envelope.message,
            &envelope.sender,
            Some(self.resolver),
            receiving_user,
        )
    }
}

/// Render, sign and optionally encrypt an outbound entity.
pub fn build_send(
    entity: &DiasporaEntity,
    author: &LocalUser,
    recipient_key: Option<&RsaPublicKey>,
) -> Result<String> {
    let message = entity.to_xml_string()?;
    let envelope = MagicEnvelope::build(&message, author.private_key()?, &author.handle, false)?;
    let document = envelope.render();
    match recipient_key {
        Some(key) => encrypted::encrypt_to_json(&document, key),
        None => Ok(document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Base, Post};
    use crate::errors::FederationErrorCode;
    use crate::test_utils::{alice, bob, fixed_time, StaticResolver};

    fn post() -> DiasporaEntity {
        let mut post = Post::new(
            Base::new("0123456789abcdef", "alice@example.com")
                .with_guid("0123456789abcdef")
                .with_handle("alice@example.com")
                .with_created_at(fixed_time()),
            "hello",
        );
        post.public = true;
        DiasporaEntity::from_entity(post.into()).unwrap()
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(format_timestamp(&fixed_time()), "2019-03-18T11:22:33Z");
        assert_eq!(parse_timestamp("2019-03-18T11:22:33Z"), Some(fixed_time()));
        assert!(parse_timestamp("2019-03-18T11:22:33.000Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_public_send_and_receive() {
        let payload = build_send(&post(), &alice(), None).unwrap();
        assert!(identify_payload(&payload));

        let resolver = StaticResolver::new().with_profile(alice().profile());
        let protocol = DiasporaProtocol::new(&resolver);
        let envelope = protocol.receive(&InboundRequest::new(payload), None).unwrap();
        assert_eq!(envelope.sender, "alice@example.com");
        assert!(!envelope.private);

        let entities = protocol.message_to_objects(&envelope, None).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].raw_content(), Some("hello"));
    }

    #[test]
    fn test_private_send_and_receive() {
        let bob = bob();
        let payload = build_send(&post(), &alice(), Some(&bob.public_key().unwrap())).unwrap();
        assert!(identify_payload(&payload));

        let resolver = StaticResolver::new().with_profile(alice().profile());
        let protocol = DiasporaProtocol::new(&resolver);
        let envelope = protocol
            .receive(&InboundRequest::new(payload.clone()), Some(&bob))
            .unwrap();
        assert!(envelope.private);
        let entities = protocol.message_to_objects(&envelope, Some(&bob)).unwrap();
        assert_eq!(entities[0].base().receivers, vec![bob.id.clone()]);

        let err = protocol
            .receive(&InboundRequest::new(payload), None)
            .unwrap_err();
        assert_eq!(err.code(), FederationErrorCode::MissingPrivateKey);
    }

    #[test]
    fn test_unknown_sender_has_no_key() {
        let payload = build_send(&post(), &alice(), None).unwrap();
        let resolver = StaticResolver::new();
        let err = DiasporaProtocol::new(&resolver)
            .receive(&InboundRequest::new(payload), None)
            .unwrap_err();
        assert_eq!(err.code(), FederationErrorCode::NoSenderKey);
    }

    #[test]
    fn test_forged_sender_fails_verification() {
        let payload = build_send(&post(), &alice(), None).unwrap();
        let mut impostor = alice().profile();
        impostor.public_key = bob().profile().public_key;
        let resolver = StaticResolver::new().with_profile(impostor);
        let err = DiasporaProtocol::new(&resolver)
            .receive(&InboundRequest::new(payload), None)
            .unwrap_err();
        assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
    }
}
