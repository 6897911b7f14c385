//! ActivityPub protocol.
//!
//! Inbound activities must carry a valid HTTP signature. When the signing
//! key belongs to someone other than the activity's actor (relayed or
//! forwarded activities), the document must also carry an LD signature by
//! that actor. Outbound, [`build_document`] renders the ActivityStreams
//! document, addresses it to a single recipient or LD-signs it for public
//! delivery.

pub mod context;
pub mod entities;
pub mod http_signatures;
pub mod ld_signatures;
pub mod mappers;
pub mod resolver;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

pub use entities::ActivityPubEntity;
pub use resolver::ActivityPubResolver;

use crate::config::FederationConfig;
use crate::entities::Entity;
use crate::transport::{Canonicalizer, InboundRequest, ProfileResolver};
use crate::{FederationError, LocalUser, Result};

/// Media type of outbound documents.
pub const CONTENT_TYPE: &str = "application/activity+json";

/// ActivityPub payload probe: a JSON object with `@context`.
pub fn identify_payload(body: &str) -> bool {
    let body = body.trim();
    body.starts_with('{')
        && serde_json::from_str::<Value>(body).is_ok_and(|value| value.get("@context").is_some())
}

/// A verified inbound activity.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedActivity {
    /// Actor the activity speaks for.
    pub sender: String,
    /// Owner of the HTTP signature key.
    pub signer: String,
    /// Normalised document.
    pub document: Value,
}

/// Inbound side of the ActivityPub protocol.
pub struct ActivityPubProtocol<'a> {
    resolver: &'a dyn ProfileResolver,
    config: &'a FederationConfig,
    canonicalizer: Option<&'a dyn Canonicalizer>,
    receiver: Option<&'a str>,
}

impl<'a> ActivityPubProtocol<'a> {
    pub fn new(resolver: &'a dyn ProfileResolver, config: &'a FederationConfig) -> Self {
        Self {
            resolver,
            config,
            canonicalizer: None,
            receiver: None,
        }
    }

    /// Enable LD signature checks for relayed activities.
    pub fn with_canonicalizer(mut self, canonicalizer: &'a dyn Canonicalizer) -> Self {
        self.canonicalizer = Some(canonicalizer);
        self
    }

    /// Actor id of the receiving user, added to decoded entities' receivers.
    pub fn with_receiver(mut self, receiver: &'a str) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Verify an inbound request at the current time.
    pub fn receive(&self, request: &InboundRequest) -> Result<ReceivedActivity> {
        self.receive_at(request, Utc::now())
    }

    /// Verify an inbound request as of `now`.
    pub fn receive_at(&self, request: &InboundRequest, now: DateTime<Utc>) -> Result<ReceivedActivity> {
        let raw: Value = serde_json::from_str(request.body.trim())?;
        if !raw.is_object() {
            return Err(FederationError::invalid_data("body", "not a JSON object"));
        }

        let signer = http_signatures::verify_request(request, self.resolver, self.config, now)?;
        let actor = raw
            .get("actor")
            .and_then(mappers::id_of)
            .unwrap_or(signer.as_str())
            .to_string();

        if actor != signer {
            self.verify_relayed(&raw, &actor, &signer)?;
        }

        let mut document = raw;
        context::normalize_inbound(&mut document);
        Ok(ReceivedActivity {
            sender: actor,
            signer,
            document,
        })
    }

    fn verify_relayed(&self, document: &Value, actor: &str, signer: &str) -> Result<()> {
        let canonicalizer = self.canonicalizer.ok_or_else(|| {
            FederationError::SignatureVerification(format!(
                "{} signed an activity by {} and LD signatures cannot be checked",
                signer, actor
            ))
        })?;
        let creator = ld_signatures::creator(document).ok_or_else(|| {
            FederationError::SignatureVerification(format!(
                "{} signed an activity by {} without an LD signature",
                signer, actor
            ))
        })?;
        let profile = self
            .resolver
            .resolve(creator)?
            .ok_or_else(|| FederationError::NoSenderKey(creator.to_string()))?;
        if profile.base.id != actor {
            return Err(FederationError::SignatureVerification(format!(
                "LD signature key {} does not belong to {}",
                creator, actor
            )));
        }
        let key = profile
            .rsa_public_key()
            .ok_or_else(|| FederationError::NoSenderKey(creator.to_string()))?;
        ld_signatures::verify(document, &key, canonicalizer)?;
        debug!(actor, signer, "verified LD signature of relayed activity");
        Ok(())
    }

    /// Map a verified activity to entities.
    pub fn message_to_objects(&self, received: &ReceivedActivity) -> Result<Vec<Entity>> {
        mappers::message_to_objects_for(&received.document, &received.sender, self.receiver)
    }
}

/// Replace the audience of a document with a single recipient.
pub fn address_to(document: &mut Value, recipient: &str) {
    document["to"] = json!([recipient]);
    document["cc"] = json!([]);
    if let Some(object) = document.get_mut("object").filter(|object| object.get("to").is_some()) {
        object["to"] = json!([recipient]);
        object["cc"] = json!([]);
    }
}

/// Outbound document for `entity`.
///
/// With `recipient` the document is addressed to that actor only. Without
/// it the document is meant for public delivery and is LD-signed by
/// `author` when a canonicalizer is given and the config allows it.
pub fn build_document(
    entity: &ActivityPubEntity,
    author: &LocalUser,
    recipient: Option<&str>,
    canonicalizer: Option<&dyn Canonicalizer>,
    config: &FederationConfig,
) -> Result<Value> {
    let mut document = entity.to_as2(config.tag_base_url.as_deref())?;
    match (recipient, canonicalizer) {
        (Some(recipient), _) => address_to(&mut document, recipient),
        (None, Some(canonicalizer)) if config.ld_sign_public_activities => {
            context::ensure_security(&mut document);
            ld_signatures::sign(
                &mut document,
                author.private_key()?,
                &author.key_id(),
                canonicalizer,
                Utc::now(),
            )?;
        }
        _ => {}
    }
    Ok(document)
}

/// Serialised outbound document.
pub fn build_send(
    entity: &ActivityPubEntity,
    author: &LocalUser,
    recipient: Option<&str>,
    canonicalizer: Option<&dyn Canonicalizer>,
    config: &FederationConfig,
) -> Result<String> {
    Ok(serde_json::to_string(&build_document(
        entity,
        author,
        recipient,
        canonicalizer,
        config,
    )?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Base, Follow};
    use crate::errors::FederationErrorCode;
    use crate::test_utils::{alice, bob, SortedKeysCanonicalizer, StaticResolver};
    use http_signatures::{sign_request, signed_request};

    const INBOX: &str = "https://example.org/inbox";

    fn follow() -> ActivityPubEntity {
        let alice = alice();
        ActivityPubEntity::from_entity(
            Follow::new(
                Base::new(format!("{}/follows/1", alice.id), alice.id.clone()),
                bob().id,
                true,
            )
            .into(),
        )
        .unwrap()
    }

    fn deliver(body: &str, signer: &LocalUser) -> InboundRequest {
        let headers = sign_request(
            INBOX,
            body,
            CONTENT_TYPE,
            signer.private_key().unwrap(),
            &signer.key_id(),
            Utc::now(),
        )
        .unwrap();
        signed_request(INBOX, body, headers)
    }

    fn resolver() -> StaticResolver {
        StaticResolver::new()
            .with_profile(alice().profile())
            .with_profile(bob().profile())
    }

    #[test]
    fn test_identify_payload() {
        assert!(identify_payload(r#"{"@context": "https://www.w3.org/ns/activitystreams"}"#));
        assert!(!identify_payload(r#"{"type": "Note"}"#));
        assert!(!identify_payload("<xml/>"));
    }

    #[test]
    fn test_receive_signed_by_actor() {
        let config = FederationConfig::default();
        let body = build_send(&follow(), &alice(), Some(&bob().id), None, &config).unwrap();
        let resolver = resolver();
        let protocol = ActivityPubProtocol::new(&resolver, &config);

        let received = protocol.receive(&deliver(&body, &alice())).unwrap();
        assert_eq!(received.sender, alice().id);
        let entities = protocol.message_to_objects(&received).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].target_id(), Some(bob().id.as_str()));
    }

    #[test]
    fn test_unsigned_request_is_rejected() {
        let config = FederationConfig::default();
        let body = build_send(&follow(), &alice(), None, None, &config).unwrap();
        let resolver = resolver();
        let err = ActivityPubProtocol::new(&resolver, &config)
            .receive(&InboundRequest::new(body))
            .unwrap_err();
        assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
    }

    #[test]
    fn test_relayed_activity_needs_ld_signature() {
        let config = FederationConfig::default();
        let resolver = resolver();
        let canonicalizer = SortedKeysCanonicalizer;

        // Bob relays an activity by Alice without an LD signature.
        let unsigned = build_send(&follow(), &alice(), None, None, &config).unwrap();
        let err = ActivityPubProtocol::new(&resolver, &config)
            .with_canonicalizer(&canonicalizer)
            .receive(&deliver(&unsigned, &bob()))
            .unwrap_err();
        assert_eq!(err.code(), FederationErrorCode::SignatureVerification);

        // With Alice's LD signature the relay is accepted.
        let signed = build_send(&follow(), &alice(), None, Some(&canonicalizer), &config).unwrap();
        let received = ActivityPubProtocol::new(&resolver, &config)
            .with_canonicalizer(&canonicalizer)
            .receive(&deliver(&signed, &bob()))
            .unwrap();
        assert_eq!(received.sender, alice().id);
        assert_eq!(received.signer, bob().id);

        // Without a canonicalizer the LD signature cannot be checked.
        assert!(ActivityPubProtocol::new(&resolver, &config)
            .receive(&deliver(&signed, &bob()))
            .is_err());
    }

    #[test]
    fn test_ld_signing_can_be_disabled() {
        let config = FederationConfig::default().with_ld_signatures(false);
        let doc = build_document(&follow(), &alice(), None, Some(&SortedKeysCanonicalizer), &config)
            .unwrap();
        assert!(doc.get("signature").is_none());

        let doc = build_document(
            &follow(),
            &alice(),
            None,
            Some(&SortedKeysCanonicalizer),
            &FederationConfig::default(),
        )
        .unwrap();
        assert_eq!(doc["signature"]["creator"], alice().key_id());
    }

    #[test]
    fn test_address_to() {
        let mut doc = json!({"to": ["a"], "cc": ["b"], "object": {"to": ["a"], "cc": []}});
        address_to(&mut doc, "https://example.org/u/bob");
        assert_eq!(doc["to"], json!(["https://example.org/u/bob"]));
        assert_eq!(doc["cc"], json!([]));
        assert_eq!(doc["object"]["to"], json!(["https://example.org/u/bob"]));
    }
}
