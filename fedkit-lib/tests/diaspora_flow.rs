//! End-to-end Diaspora federation between two local users.
//!
//! ```bash
//! cargo test -p fedkit-lib --test diaspora_flow
//! ```

mod common;

use chrono::{TimeZone, Utc};
use common::{alice, bob, Directory, Outbox};
use fedkit_lib::entities::{Base, Comment, Entity, EntityKind, Post, Retraction};
use fedkit_lib::outbound::{get_outbound_entity, OutboundEntity, Outgoing, SendContext};
use fedkit_lib::transport::InboundRequest;
use fedkit_lib::{
    handle_create_payload, handle_receive, handle_send, FederationErrorCode, LocalUser, Protocol,
    ReceiveContext, Recipient,
};

const POST_GUID: &str = "a0b1c2d3e4f5a6b7c8d9";
const COMMENT_GUID: &str = "f9e8d7c6b5a4f3e2d1c0";

fn created_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 3, 18, 11, 22, 33).unwrap()
}

fn base_for(user: &LocalUser, guid: &str) -> Base {
    Base::new(guid, user.handle.clone())
        .with_guid(guid)
        .with_handle(user.handle.clone())
        .with_created_at(created_at())
}

fn public_post() -> Outgoing {
    let mut post = Post::new(base_for(&alice(), POST_GUID), "Hello #diaspora from @{bob@example.org}");
    post.public = true;
    Outgoing::Entity(post.into())
}

fn bob_comment() -> Outgoing {
    let mut comment = Comment::new(base_for(&bob(), COMMENT_GUID), POST_GUID, "Hi alice");
    comment.target_guid = POST_GUID.to_string();
    Outgoing::Entity(comment.into())
}

#[test]
fn test_public_post_reaches_every_pod_once() {
    let outbox = Outbox::new();
    let recipients = [
        Recipient::public("https://pod-one.example/receive/public", Protocol::Diaspora),
        Recipient::public("https://pod-two.example/receive/public", Protocol::Diaspora),
        Recipient::public("https://pod-one.example/receive/public", Protocol::Diaspora),
    ];
    let report = handle_send(&public_post(), &alice(), &recipients, None, &outbox, &SendContext::new()).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.delivered.len(), 2);

    let directory = Directory::new().with_user(&alice());
    for delivered in outbox.delivered() {
        let message = handle_receive(&delivered.to_request(), &ReceiveContext::new(&directory)).unwrap();
        assert_eq!(message.protocol, Protocol::Diaspora);
        assert_eq!(message.sender, "alice@example.com");
        let [Entity::Post(post)] = message.entities.as_slice() else {
            panic!("expected one post, got {:?}", message.entities);
        };
        assert_eq!(post.base.guid, POST_GUID);
        assert!(post.public);
        assert_eq!(post.base.created_at, created_at());
        assert!(post.base.mentions.contains("bob@example.org"));
        assert!(message.entities[0].tags().contains(&"diaspora".to_string()));
    }
}

#[test]
fn test_private_post_is_readable_by_the_recipient_only() {
    let bob = bob();
    let payload = handle_create_payload(
        &public_post(),
        &alice(),
        Protocol::Diaspora,
        Some(&bob.public_key().unwrap()),
        None,
    )
    .unwrap();
    let request = InboundRequest::new(payload);
    let directory = Directory::new().with_user(&alice());

    let message = handle_receive(&request, &ReceiveContext::new(&directory).with_user(&bob)).unwrap();
    assert_eq!(message.entities.len(), 1);
    assert_eq!(message.entities[0].base().receivers, vec![bob.id.clone()]);

    let err = handle_receive(&request, &ReceiveContext::new(&directory)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::MissingPrivateKey);

    let keyless_bob = LocalUser::new(bob.id.clone(), bob.handle.clone());
    let err = handle_receive(&request, &ReceiveContext::new(&directory).with_user(&keyless_bob)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::MissingPrivateKey);

    let err = handle_receive(&request, &ReceiveContext::new(&directory).with_user(&alice())).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::Crypto);
}

#[test]
fn test_comment_is_relayed_by_the_post_author() {
    let alice = alice();
    let bob = bob();
    let directory = Directory::new().with_user(&alice).with_user(&bob);

    // bob -> alice
    let payload = handle_create_payload(&bob_comment(), &bob, Protocol::Diaspora, None, None).unwrap();
    let message = handle_receive(&InboundRequest::new(payload), &ReceiveContext::new(&directory)).unwrap();
    let [comment @ Entity::Comment(_)] = message.entities.as_slice() else {
        panic!("expected one comment, got {:?}", message.entities);
    };
    assert!(!comment.base().signature.is_empty());

    // alice relays it to her other followers
    let relayed = handle_create_payload(
        &Outgoing::Entity(comment.clone()),
        &alice,
        Protocol::Diaspora,
        None,
        Some(&alice),
    )
    .unwrap();
    let message = handle_receive(&InboundRequest::new(relayed), &ReceiveContext::new(&directory)).unwrap();
    assert_eq!(message.sender, alice.handle);
    let [Entity::Comment(comment)] = message.entities.as_slice() else {
        panic!("expected one comment, got {:?}", message.entities);
    };
    assert_eq!(comment.base.handle, bob.handle);
    assert_eq!(comment.target_guid, POST_GUID);
    assert_eq!(comment.raw_content, "Hi alice");
    assert!(comment
        .base
        .source_object
        .as_deref()
        .is_some_and(|doc| doc.contains("<parent_author_signature>")));
}

#[test]
fn test_forged_comment_is_dropped() {
    let alice = alice();
    // signed with alice's key while claiming bob as author
    let OutboundEntity::Diaspora(forged) =
        get_outbound_entity(&bob_comment(), Protocol::Diaspora, &alice).unwrap()
    else {
        panic!("expected a Diaspora entity");
    };
    let payload =
        handle_create_payload(&Outgoing::from(forged), &alice, Protocol::Diaspora, None, None).unwrap();
    let directory = Directory::new().with_user(&alice).with_user(&bob());
    let message = handle_receive(&InboundRequest::new(payload), &ReceiveContext::new(&directory)).unwrap();
    assert!(message.entities.is_empty());
}

#[test]
fn test_envelope_signed_by_the_wrong_key_is_rejected() {
    let payload = handle_create_payload(&public_post(), &alice(), Protocol::Diaspora, None, None).unwrap();
    let mut impostor = alice().profile();
    impostor.public_key = bob().profile().public_key;
    let directory = Directory::new().with_profile(&alice(), impostor);

    let err = handle_receive(&InboundRequest::new(payload), &ReceiveContext::new(&directory)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::SignatureVerification);
}

#[test]
fn test_unknown_sender_is_rejected() {
    let payload = handle_create_payload(&public_post(), &alice(), Protocol::Diaspora, None, None).unwrap();
    let directory = Directory::new().with_user(&bob());
    let err = handle_receive(&InboundRequest::new(payload), &ReceiveContext::new(&directory)).unwrap_err();
    assert_eq!(err.code(), FederationErrorCode::NoSenderKey);
}

#[test]
fn test_retraction_round_trip() {
    let alice = alice();
    let mut retraction = Retraction::new(
        Base::new(format!("diaspora://{}/retraction/{}", alice.handle, POST_GUID), alice.handle.clone())
            .with_handle(alice.handle.clone()),
        POST_GUID,
        EntityKind::Post,
    );
    retraction.target_guid = POST_GUID.to_string();

    let payload =
        handle_create_payload(&Outgoing::Entity(retraction.into()), &alice, Protocol::Diaspora, None, None)
            .unwrap();
    let directory = Directory::new().with_user(&alice);
    let message = handle_receive(&InboundRequest::new(payload), &ReceiveContext::new(&directory)).unwrap();
    let [Entity::Retraction(retraction)] = message.entities.as_slice() else {
        panic!("expected one retraction, got {:?}", message.entities);
    };
    assert_eq!(retraction.target_guid, POST_GUID);
    assert_eq!(retraction.entity_type, "Post");
    assert_eq!(
        retraction.base.id,
        format!("diaspora://alice@example.com/retraction/{}", POST_GUID)
    );
}
