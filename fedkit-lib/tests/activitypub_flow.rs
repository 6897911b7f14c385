//! End-to-end ActivityPub federation between two local users.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{
    actor_document, alice, bob, Actors, Delivered, Directory, JsonCanonicalizer, Outbox,
};
use fedkit_lib::entities::{Base, Entity, Follow, Post};
use fedkit_lib::outbound::{Outgoing, SendContext};
use fedkit_lib::protocols::activitypub::{
    self, http_signatures, ActivityPubEntity, ActivityPubResolver,
};
use fedkit_lib::{
    handle_receive, handle_send, FederationConfig, FederationErrorCode, LocalUser, Protocol,
    ReceiveContext, Recipient,
};
use serde_json::json;

const INBOX: &str = "https://example.org/inbox";

fn alice_post() -> Outgoing {
    let alice = alice();
    let mut post = Post::new(
        Base::new(format!("{}/posts/1", alice.id), alice.id.clone())
            .with_created_at(Utc.with_ymd_and_hms(2019, 3, 18, 11, 22, 33).unwrap()),
        "Hello **fediverse** #rust",
    );
    post.public = true;
    Outgoing::Entity(post.into())
}

fn publish(outgoing: &Outgoing) -> Delivered {
    let outbox = Outbox::new();
    let ctx = SendContext::new().with_canonicalizer(&JsonCanonicalizer);
    let recipients = [Recipient::public(INBOX, Protocol::ActivityPub)];
    handle_send(outgoing, &alice(), &recipients, None, &outbox, &ctx).unwrap();
    outbox.only()
}

/// The same body forwarded by `relay` under its own HTTP signature.
fn forwarded_by(relay: &LocalUser, body: &str) -> Delivered {
    signed_with(relay, &relay.key_id(), body)
}

/// `body` signed with `signer`'s key, announced under `key_id`.
fn signed_with(signer: &LocalUser, key_id: &str, body: &str) -> Delivered {
    let headers = http_signatures::sign_request(
        INBOX,
        body,
        activitypub::CONTENT_TYPE,
        signer.private_key().unwrap(),
        key_id,
        Utc::now(),
    )
    .unwrap();
    Delivered {
        url: INBOX.to_string(),
        body: body.to_string(),
        headers,
    }
}

#[test]
fn test_public_note_round_trip() {
    let delivered = publish(&alice_post());
    let directory = Directory::new().with_user(&alice());
    let bob = bob();

    let message = handle_receive(
        &delivered.to_request(),
        &ReceiveContext::new(&directory).with_user(&bob),
    )
    .unwrap();
    assert_eq!(message.protocol, Protocol::ActivityPub);
    assert_eq!(message.sender, alice().id);
    let [entity @ Entity::Post(post)] = message.entities.as_slice() else {
        panic!("expected one post, got {:?}", message.entities);
    };
    assert_eq!(post.raw_content, "Hello **fediverse** #rust");
    assert!(post.public);
    assert!(post.base.receivers.contains(&bob.id));
    assert_eq!(entity.tags(), vec!["rust".to_string()]);
    assert!(entity.rendered_content(None).contains("<strong>fediverse</strong>"));
}

#[test]
fn test_relayed_activity_needs_a_valid_ld_signature() {
    let delivered = publish(&alice_post());
    let relayed = forwarded_by(&bob(), &delivered.body);
    let directory = Directory::new().with_user(&alice()).with_user(&bob());

    let ctx = ReceiveContext::new(&directory).with_canonicalizer(&JsonCanonicalizer);
    let message = handle_receive(&relayed.to_request(), &ctx).unwrap();
    assert_eq!(message.sender, alice().id);
    assert_eq!(message.entities.len(), 1);

    let err = handle_receive(&relayed.to_request(), &ReceiveContext::new(&directory)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::SignatureVerification);

    let tampered = forwarded_by(&bob(), &delivered.body.replace("fediverse", "fedivers3"));
    let err = handle_receive(&tampered.to_request(), &ctx).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
}

#[test]
fn test_impersonation_without_ld_signature_is_rejected() {
    let outbox = Outbox::new();
    let recipients = [Recipient::private(INBOX, bob().id, Protocol::ActivityPub, None)];
    handle_send(&alice_post(), &alice(), &recipients, None, &outbox, &SendContext::new()).unwrap();
    let private = outbox.only();
    assert!(!private.body.contains("\"signature\""));

    let relayed = forwarded_by(&bob(), &private.body);
    let directory = Directory::new().with_user(&alice()).with_user(&bob());
    let ctx = ReceiveContext::new(&directory).with_canonicalizer(&JsonCanonicalizer);
    let err = handle_receive(&relayed.to_request(), &ctx).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
}

#[test]
fn test_follow_and_unfollow() {
    let alice = alice();
    let bob = bob();
    let directory = Directory::new().with_user(&alice);
    let recipients = [Recipient::private(
        "https://example.org/u/bob/inbox",
        bob.id.clone(),
        Protocol::ActivityPub,
        None,
    )];

    for following in [true, false] {
        let follow = Follow::new(
            Base::new(format!("{}#follows/1", alice.id), alice.id.clone()),
            bob.id.clone(),
            following,
        );
        let outbox = Outbox::new();
        handle_send(
            &Outgoing::Entity(follow.into()),
            &alice,
            &recipients,
            None,
            &outbox,
            &SendContext::new(),
        )
        .unwrap();

        let message = handle_receive(&outbox.only().to_request(), &ReceiveContext::new(&directory)).unwrap();
        let [Entity::Follow(follow)] = message.entities.as_slice() else {
            panic!("expected one follow, got {:?}", message.entities);
        };
        assert_eq!(follow.following, following);
        assert_eq!(follow.target_id, bob.id);
        assert_eq!(follow.base.id, format!("{}#follows/1", alice.id));
    }
}

#[test]
fn test_stale_http_signature_is_rejected() {
    let delivered = publish(&alice_post());
    let alice = alice();
    let headers = http_signatures::sign_request(
        INBOX,
        &delivered.body,
        activitypub::CONTENT_TYPE,
        alice.private_key().unwrap(),
        &alice.key_id(),
        Utc::now() - Duration::days(2),
    )
    .unwrap();
    let stale = Delivered {
        headers,
        ..delivered
    };
    let directory = Directory::new().with_user(&alice);
    let err = handle_receive(&stale.to_request(), &ReceiveContext::new(&directory)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
}

#[test]
fn test_unknown_signer_is_rejected() {
    let delivered = publish(&alice_post());
    let directory = Directory::new().with_user(&bob());
    let err = handle_receive(&delivered.to_request(), &ReceiveContext::new(&directory)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::NoSenderKey);
}

/// Alice following Bob, addressed to Bob and not LD-signed.
fn alice_follows_bob() -> String {
    let alice = alice();
    let follow = Follow::new(
        Base::new(format!("{}#follows/1", alice.id), alice.id.clone()),
        bob().id,
        true,
    );
    let entity = ActivityPubEntity::from_entity(follow.into()).unwrap();
    activitypub::build_send(&entity, &alice, Some(&bob().id), None, &FederationConfig::default())
        .unwrap()
}

#[test]
fn test_signer_resolved_from_actor_document() {
    let actors = Actors::new().with_user(&alice());
    let resolver = ActivityPubResolver::new(&actors);
    let delivered = signed_with(&alice(), &alice().key_id(), &alice_follows_bob());

    let message = handle_receive(&delivered.to_request(), &ReceiveContext::new(&resolver)).unwrap();
    assert_eq!(message.sender, alice().id);
    assert_eq!(message.entities.len(), 1);
}

#[test]
fn test_actor_document_claiming_another_id_is_rejected() {
    // Mallory's server answers with a document that claims to be Alice
    // but carries Bob's key, which Mallory controls.
    let mallory = "https://evil.example/u/mallory";
    let key_id = format!("{}#main-key", mallory);
    let mut forged = actor_document(&alice());
    forged["publicKey"] = json!({
        "id": &key_id,
        "owner": alice().id,
        "publicKeyPem": bob().profile().public_key,
    });
    let actors = Actors::new().serve(mallory, forged);
    let resolver = ActivityPubResolver::new(&actors);

    let delivered = signed_with(&bob(), &key_id, &alice_follows_bob());
    let err = handle_receive(&delivered.to_request(), &ReceiveContext::new(&resolver)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
}

#[test]
fn test_honest_document_for_another_actor_is_rejected() {
    // Mallory's own document resolves, but Mallory is not the actor.
    let mallory = "https://evil.example/u/mallory";
    let key_id = format!("{}#main-key", mallory);
    let mut document = actor_document(&alice());
    document["id"] = json!(mallory);
    document["publicKey"] = json!({
        "id": &key_id,
        "owner": mallory,
        "publicKeyPem": bob().profile().public_key,
    });
    let actors = Actors::new().serve(mallory, document);
    let resolver = ActivityPubResolver::new(&actors);

    let delivered = signed_with(&bob(), &key_id, &alice_follows_bob());
    let err = handle_receive(&delivered.to_request(), &ReceiveContext::new(&resolver)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
}

#[test]
fn test_key_owned_by_another_actor_is_rejected() {
    let mut document = actor_document(&alice());
    document["publicKey"]["owner"] = json!(bob().id);
    let actors = Actors::new().serve(&alice().id, document);
    let resolver = ActivityPubResolver::new(&actors);

    let delivered = signed_with(&alice(), &alice().key_id(), &alice_follows_bob());
    let err = handle_receive(&delivered.to_request(), &ReceiveContext::new(&resolver)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
}
