//! Canonical entities to ActivityStreams 2.0 documents.

use serde_json::{json, Map, Value};

use super::context::{attach_context, PUBLIC};
use crate::entities::{
    Base, Comment, ContentType, Entity, EntityKind, Follow, Image, Post, Profile, Reaction,
    Retraction, Share,
};
use crate::{FederationError, Result};

pub(crate) const ACTIVITYPUB: &str = "activitypub";

/// Timestamp format for `published`.
pub const PUBLISHED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// An entity that has an ActivityPub representation.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityPubEntity {
    pub entity: Entity,
}

impl ActivityPubEntity {
    /// Wrap an entity. Kinds without an ActivityPub form raise `Conversion`.
    pub fn from_entity(entity: Entity) -> Result<Self> {
        match entity.kind() {
            EntityKind::Relationship | EntityKind::Image => {
                Err(FederationError::conversion(entity.kind().as_str(), ACTIVITYPUB))
            }
            _ => Ok(Self { entity }),
        }
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }

    /// The document without `@context`.
    pub fn to_object(&self, tag_base_url: Option<&str>) -> Result<Value> {
        match &self.entity {
            Entity::Post(post) => Ok(create(&post.base, note_from_post(post, tag_base_url))),
            Entity::Comment(comment) => {
                Ok(create(&comment.base, note_from_comment(comment, tag_base_url)))
            }
            Entity::Reaction(reaction) => like(reaction),
            Entity::Follow(follow) => Ok(follow_activity(follow)),
            Entity::Share(share) => Ok(announce(share)),
            Entity::Retraction(retraction) => Ok(retraction_activity(retraction)),
            Entity::Profile(profile) => Ok(person(profile, tag_base_url)),
            other => Err(FederationError::conversion(other.kind().as_str(), ACTIVITYPUB)),
        }
    }

    /// The complete document with a minimal `@context`.
    pub fn to_as2(&self, tag_base_url: Option<&str>) -> Result<Value> {
        Ok(attach_context(self.to_object(tag_base_url)?))
    }
}

/// Followers collection of an actor.
pub fn followers_of(actor_id: &str) -> String {
    format!("{}/followers", actor_id.trim_end_matches('/'))
}

fn published(base: &Base) -> Value {
    json!(base.created_at.format(PUBLISHED_FORMAT).to_string())
}

fn mention_uris(base: &Base) -> Vec<String> {
    base.mentions
        .iter()
        .filter(|m| m.starts_with("http://") || m.starts_with("https://"))
        .cloned()
        .collect()
}

fn addressing(base: &Base, public: bool) -> (Vec<String>, Vec<String>) {
    let mentions = mention_uris(base);
    if public {
        let mut cc = vec![followers_of(&base.actor_id)];
        cc.extend(mentions);
        (vec![PUBLIC.to_string()], cc)
    } else if base.receivers.is_empty() {
        (vec![followers_of(&base.actor_id)], mentions)
    } else {
        (base.receivers.clone(), mentions)
    }
}

fn attachment(image: &Image) -> Value {
    let mut object = Map::new();
    object.insert("type".into(), json!("Image"));
    object.insert("url".into(), json!(image.url));
    if !image.media_type.is_empty() {
        object.insert("mediaType".into(), json!(image.media_type));
    }
    let name = if image.name.is_empty() {
        &image.raw_content
    } else {
        &image.name
    };
    if !name.is_empty() {
        object.insert("name".into(), json!(name));
    }
    if image.width > 0 {
        object.insert("width".into(), json!(image.width));
    }
    if image.height > 0 {
        object.insert("height".into(), json!(image.height));
    }
    Value::Object(object)
}

struct NoteParts<'a> {
    base: &'a Base,
    raw_content: &'a str,
    content_type: ContentType,
    public: bool,
    in_reply_to: Option<&'a str>,
}

fn note(parts: NoteParts<'_>, tag_base_url: Option<&str>) -> Value {
    let base = parts.base;
    let entity_tags = crate::entities::content::tags(parts.raw_content);
    let (to, cc) = addressing(base, parts.public);

    let mut tag: Vec<Value> = entity_tags
        .iter()
        .map(|name| {
            json!({
                "type": "Hashtag",
                "name": format!("#{}", name),
                "href": tag_base_url
                    .map(|url| format!("{}{}", url, urlencoding::encode(name)))
                    .unwrap_or_default(),
            })
        })
        .collect();
    tag.extend(
        mention_uris(base)
            .into_iter()
            .map(|uri| json!({"type": "Mention", "href": uri, "name": uri})),
    );

    let mut object = Map::new();
    object.insert("id".into(), json!(base.id));
    object.insert("type".into(), json!("Note"));
    object.insert("attributedTo".into(), json!(base.actor_id));
    object.insert(
        "content".into(),
        json!(crate::entities::content::render(
            parts.raw_content,
            parts.content_type,
            tag_base_url
        )),
    );
    if parts.content_type == ContentType::Markdown {
        object.insert(
            "source".into(),
            json!({"content": parts.raw_content, "mediaType": parts.content_type.media_type()}),
        );
    }
    object.insert("published".into(), published(base));
    object.insert("url".into(), json!(base.id));
    if let Some(target) = parts.in_reply_to {
        object.insert("inReplyTo".into(), json!(target));
    }
    object.insert("to".into(), json!(to));
    object.insert("cc".into(), json!(cc));
    object.insert("tag".into(), Value::Array(tag));

    let attachments: Vec<Value> = base
        .children
        .iter()
        .filter_map(|child| match child {
            Entity::Image(image) if !image.inline => Some(attachment(image)),
            _ => None,
        })
        .collect();
    if !attachments.is_empty() {
        object.insert("attachment".into(), Value::Array(attachments));
    }
    if entity_tags.iter().any(|t| t == "nsfw") {
        object.insert("sensitive".into(), json!(true));
    }
    if !base.guid.is_empty() {
        object.insert("diaspora:guid".into(), json!(base.guid));
    }
    Value::Object(object)
}

fn note_from_post(post: &Post, tag_base_url: Option<&str>) -> Value {
    note(
        NoteParts {
            base: &post.base,
            raw_content: &post.raw_content,
            content_type: post.content_type,
            public: post.public,
            in_reply_to: None,
        },
        tag_base_url,
    )
}

fn note_from_comment(comment: &Comment, tag_base_url: Option<&str>) -> Value {
    // Comments follow the visibility of what they reply to; without that
    // information they are addressed publicly.
    note(
        NoteParts {
            base: &comment.base,
            raw_content: &comment.raw_content,
            content_type: comment.content_type,
            public: comment.base.receivers.is_empty(),
            in_reply_to: Some(&comment.target_id),
        },
        tag_base_url,
    )
}

fn create(base: &Base, object: Value) -> Value {
    let id = if base.activity_id.is_empty() {
        format!("{}#create", base.id)
    } else {
        base.activity_id.clone()
    };
    json!({
        "id": id,
        "type": "Create",
        "actor": base.actor_id,
        "published": published(base),
        "to": object["to"].clone(),
        "cc": object["cc"].clone(),
        "object": object,
    })
}

fn like(reaction: &Reaction) -> Result<Value> {
    if reaction.reaction != "like" {
        return Err(FederationError::conversion(
            format!("Reaction({})", reaction.reaction),
            ACTIVITYPUB,
        ));
    }
    Ok(json!({
        "id": reaction.base.id,
        "type": "Like",
        "actor": reaction.base.actor_id,
        "object": reaction.target_id,
        "published": published(&reaction.base),
    }))
}

fn undo(base: &Base, object: Value) -> Value {
    let id = if base.activity_id.is_empty() {
        format!("{}#undo-{}", base.actor_id, uuid::Uuid::new_v4())
    } else {
        base.activity_id.clone()
    };
    json!({
        "id": id,
        "type": "Undo",
        "actor": base.actor_id,
        "object": object,
    })
}

fn follow_activity(follow: &Follow) -> Value {
    let inner = json!({
        "id": follow.base.id,
        "type": "Follow",
        "actor": follow.base.actor_id,
        "object": follow.target_id,
    });
    if follow.following {
        inner
    } else {
        undo(&follow.base, inner)
    }
}

fn announce(share: &Share) -> Value {
    let (to, cc) = addressing(&share.base, share.public);
    json!({
        "id": share.base.id,
        "type": "Announce",
        "actor": share.base.actor_id,
        "object": share.target_id,
        "published": published(&share.base),
        "to": to,
        "cc": cc,
    })
}

fn retraction_activity(retraction: &Retraction) -> Value {
    let base = &retraction.base;
    let undone = |kind: &str| {
        json!({
            "id": retraction.target_id,
            "type": kind,
            "actor": base.actor_id,
        })
    };
    match retraction.entity_type.as_str() {
        "Share" => json!({
            "id": base.id,
            "type": "Undo",
            "actor": base.actor_id,
            "object": undone("Announce"),
        }),
        "Reaction" => json!({
            "id": base.id,
            "type": "Undo",
            "actor": base.actor_id,
            "object": undone("Like"),
        }),
        "Follow" => json!({
            "id": base.id,
            "type": "Undo",
            "actor": base.actor_id,
            "object": undone("Follow"),
        }),
        _ => json!({
            "id": base.id,
            "type": "Delete",
            "actor": base.actor_id,
            "object": {"id": retraction.target_id, "type": "Tombstone"},
            "published": published(base),
            "to": [PUBLIC],
        }),
    }
}

fn person(profile: &Profile, tag_base_url: Option<&str>) -> Value {
    let base = &profile.base;
    let id = base.id.trim_end_matches('/');
    let username = if profile.username.is_empty() {
        base.handle.split('@').next().unwrap_or_default().to_string()
    } else {
        profile.username.clone()
    };
    let inbox = if profile.inboxes.private.is_empty() {
        format!("{}/inbox", id)
    } else {
        profile.inboxes.private.clone()
    };

    let mut object = Map::new();
    object.insert("id".into(), json!(base.id));
    object.insert("type".into(), json!("Person"));
    object.insert("name".into(), json!(profile.name));
    object.insert("preferredUsername".into(), json!(username));
    object.insert(
        "summary".into(),
        json!(crate::entities::content::render(
            &profile.raw_content,
            ContentType::Markdown,
            tag_base_url
        )),
    );
    object.insert(
        "url".into(),
        json!(if profile.url.is_empty() { &base.id } else { &profile.url }),
    );
    object.insert("inbox".into(), json!(inbox));
    object.insert("outbox".into(), json!(format!("{}/outbox", id)));
    object.insert("followers".into(), json!(followers_of(id)));
    object.insert("following".into(), json!(format!("{}/following", id)));
    if !profile.inboxes.public.is_empty() {
        object.insert("endpoints".into(), json!({"sharedInbox": profile.inboxes.public}));
    }
    object.insert(
        "manuallyApprovesFollowers".into(),
        json!(profile.manually_approves_followers),
    );
    if !profile.public_key.is_empty() {
        object.insert(
            "publicKey".into(),
            json!({
                "id": format!("{}#main-key", base.id),
                "owner": base.id,
                "publicKeyPem": profile.public_key,
            }),
        );
    }
    let images = &profile.image_urls;
    let icon = [&images.large, &images.medium, &images.small]
        .into_iter()
        .find(|url| !url.is_empty());
    if let Some(icon) = icon {
        object.insert("icon".into(), json!({"type": "Image", "url": icon}));
    }
    if !base.guid.is_empty() {
        object.insert("diaspora:guid".into(), json!(base.guid));
    }
    Value::Object(object)
}
