//! ActivityStreams documents to canonical entities.
//!
//! Decoding is lenient about shape: references may be plain ids, embedded
//! objects or arrays of either, and `type` may be a string or an array.
//! Unknown types are skipped. `Delete` carries little information about what
//! is being deleted, so its `entity_type` is a best-effort guess from the
//! embedded object's type, falling back to `Object`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::context::{is_public, PUBLIC};
use crate::entities::capabilities::OBJECT_ENTITY_TYPE;
use crate::entities::{
    Base, Comment, ContentType, Entity, EntityKind, Follow, Image, Post, Profile, Reaction,
    Retraction, Share,
};
use crate::protocols::Protocol;
use crate::Result;

/// Actor document types decoded as profiles.
pub const ACTOR_TYPES: [&str; 5] = ["Person", "Service", "Application", "Group", "Organization"];

const NOTE_TYPES: [&str; 3] = ["Note", "Article", "Page"];

/// First `type` of a document.
pub fn type_of(value: &Value) -> Option<&str> {
    match value.get("type")? {
        Value::String(kind) => Some(kind),
        Value::Array(kinds) => kinds.iter().find_map(Value::as_str),
        _ => None,
    }
}

/// Id of a reference: a string, an object's `id`, or the first of an array.
pub fn id_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(id) => Some(id),
        Value::Object(map) => map.get("id").and_then(Value::as_str),
        Value::Array(items) => items.iter().find_map(id_of),
        _ => None,
    }
}

fn url_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(url) => Some(url),
        Value::Object(map) => map
            .get("href")
            .and_then(Value::as_str)
            .or_else(|| map.get("url").and_then(url_of)),
        Value::Array(items) => items.iter().find_map(url_of),
        _ => None,
    }
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn reference(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(id_of)
        .unwrap_or_default()
        .to_string()
}

fn addresses(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    for key in ["to", "cc"] {
        match value.get(key) {
            Some(Value::String(address)) => found.push(address.clone()),
            Some(Value::Array(items)) => {
                found.extend(items.iter().filter_map(id_of).map(str::to_string))
            }
            _ => {}
        }
    }
    let mut seen = HashSet::new();
    found.retain(|address| address != PUBLIC && seen.insert(address.clone()));
    found
}

fn parse_published(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.get("published")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn base_of(value: &Value, actor_key: &str) -> Base {
    let mut base = Base::new(reference(value, "id"), reference(value, actor_key));
    if let Some(created_at) = parse_published(value) {
        base.created_at = created_at;
    }
    base.guid = value
        .get("diaspora:guid")
        .or_else(|| value.get("guid"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    base.receivers = addresses(value);
    base
}

/// Decode an inbound activity into validated entities.
///
/// Entities failing validation are logged and dropped, as are entities
/// authored by someone other than the verified `sender`.
pub fn message_to_objects(document: &Value, sender: &str) -> Result<Vec<Entity>> {
    message_to_objects_for(document, sender, None)
}

/// [`message_to_objects`], adding `receiver` to each entity's receivers
/// before validation.
pub fn message_to_objects_for(
    document: &Value,
    sender: &str,
    receiver: Option<&str>,
) -> Result<Vec<Entity>> {
    let Some(mut entity) = element_to_entity(document) else {
        debug!(kind = ?type_of(document), "no entity for ActivityPub document, skipping");
        return Ok(Vec::new());
    };

    let source = serde_json::to_string(document)?;
    {
        let extracted = entity.extract_mentions();
        let base = entity.base_mut();
        base.source_protocol = Some(Protocol::ActivityPub);
        base.source_object = Some(source);
        base.mentions.extend(extracted);
        for child in &mut base.children {
            child.base_mut().source_protocol = Some(Protocol::ActivityPub);
        }
        if let Some(receiver) = receiver {
            if !base.receivers.iter().any(|known| known == receiver) {
                base.receivers.push(receiver.to_string());
            }
        }
    }

    let actor = entity.base().actor_id.clone();
    if actor != sender {
        warn!(sender, author = %actor, kind = %entity.kind(), "entity author does not match sender, skipping");
        return Ok(Vec::new());
    }

    if let Err(err) = entity.validate() {
        error!(error = %err, raw = %document, "dropping invalid ActivityPub entity");
        return Ok(Vec::new());
    }
    Ok(vec![entity])
}

/// Map one document (activity or bare object) to an entity.
pub fn element_to_entity(value: &Value) -> Option<Entity> {
    let kind = type_of(value)?;
    match kind {
        "Create" | "Update" => {
            let object = value.get("object").filter(|object| object.is_object())?;
            let mut entity = element_to_entity(object)?;
            let base = entity.base_mut();
            base.activity_id = reference(value, "id");
            if base.actor_id.is_empty() {
                base.actor_id = reference(value, "actor");
            }
            if base.receivers.is_empty() {
                base.receivers = addresses(value);
            }
            Some(entity)
        }
        kind if NOTE_TYPES.contains(&kind) => Some(note(value)),
        kind if ACTOR_TYPES.contains(&kind) => profile_from_document(value).map(Entity::from),
        "Follow" => Some(
            Follow {
                base: base_of(value, "actor"),
                target_id: reference(value, "object"),
                following: true,
                ..Follow::default()
            }
            .into(),
        ),
        "Like" => Some(
            Reaction {
                base: base_of(value, "actor"),
                target_id: reference(value, "object"),
                reaction: "like".to_string(),
                ..Reaction::default()
            }
            .into(),
        ),
        "Announce" => Some(
            Share {
                base: base_of(value, "actor"),
                target_id: reference(value, "object"),
                entity_type: EntityKind::Post.as_str().to_string(),
                public: is_public(value),
                ..Share::default()
            }
            .into(),
        ),
        "Undo" => undo(value),
        "Delete" => Some(delete(value).into()),
        _ => None,
    }
}

fn note(value: &Value) -> Entity {
    let mut base = base_of(value, "attributedTo");
    if base.actor_id.is_empty() {
        base.actor_id = reference(value, "actor");
    }

    let source = value.get("source");
    let markdown = source
        .and_then(|s| s.get("mediaType"))
        .and_then(Value::as_str)
        .is_some_and(|media_type| media_type == ContentType::Markdown.media_type());
    let (raw_content, content_type) = match source {
        Some(source) if markdown => (text(source, "content"), ContentType::Markdown),
        _ => (text(value, "content"), ContentType::Html),
    };

    if let Some(Value::Array(tags)) = value.get("tag") {
        base.mentions = tags
            .iter()
            .filter(|tag| type_of(tag) == Some("Mention"))
            .filter_map(|tag| tag.get("href").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
    }
    base.children = attachments(value);

    let in_reply_to = reference(value, "inReplyTo");
    if in_reply_to.is_empty() {
        Post {
            base,
            raw_content,
            content_type,
            public: is_public(value),
            ..Post::default()
        }
        .into()
    } else {
        Comment {
            base,
            raw_content,
            content_type,
            target_id: in_reply_to,
            ..Comment::default()
        }
        .into()
    }
}

fn attachments(value: &Value) -> Vec<Entity> {
    let items = match value.get("attachment") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item) if item.is_object() => vec![item],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter(|item| {
            let media_type = text(item, "mediaType");
            match type_of(item) {
                Some("Image") => media_type.is_empty() || media_type.starts_with("image/"),
                Some("Document") => media_type.starts_with("image/"),
                _ => false,
            }
        })
        .filter_map(|item| {
            let url = item.get("url").and_then(url_of)?;
            Some(
                Image {
                    name: text(item, "name"),
                    media_type: text(item, "mediaType"),
                    width: item.get("width").and_then(Value::as_u64).unwrap_or(0) as u32,
                    height: item.get("height").and_then(Value::as_u64).unwrap_or(0) as u32,
                    ..Image::new(url)
                }
                .into(),
            )
        })
        .collect()
}

fn undo(value: &Value) -> Option<Entity> {
    let object = value.get("object").filter(|object| object.is_object())?;
    let mut base = base_of(value, "actor");
    let target = reference(object, "id");
    let entity_type = match type_of(object)? {
        "Follow" => {
            base.activity_id = std::mem::take(&mut base.id);
            base.id = target;
            return Some(
                Follow {
                    base,
                    target_id: reference(object, "object"),
                    following: false,
                    ..Follow::default()
                }
                .into(),
            );
        }
        "Announce" => EntityKind::Share,
        "Like" => EntityKind::Reaction,
        other => {
            debug!(kind = other, "unsupported Undo, skipping");
            return None;
        }
    };
    Some(Retraction::new(base, target, entity_type).into())
}

fn delete(value: &Value) -> Retraction {
    let base = base_of(value, "actor");
    let object = value.get("object").unwrap_or(&Value::Null);
    let target = id_of(object).unwrap_or_default().to_string();

    let object_kind = type_of(object).map(|kind| match kind {
        "Tombstone" => object.get("formerType").and_then(Value::as_str).unwrap_or(kind),
        kind => kind,
    });
    let entity_type = match object_kind {
        Some(kind) if NOTE_TYPES.contains(&kind) => {
            if reference(object, "inReplyTo").is_empty() {
                EntityKind::Post.as_str()
            } else {
                EntityKind::Comment.as_str()
            }
        }
        Some(kind) if ACTOR_TYPES.contains(&kind) => EntityKind::Profile.as_str(),
        _ if !target.is_empty() && target == base.actor_id => EntityKind::Profile.as_str(),
        _ => OBJECT_ENTITY_TYPE,
    };
    Retraction {
        base,
        target_id: target,
        entity_type: entity_type.to_string(),
        ..Retraction::default()
    }
}

/// Decode an actor document.
pub fn profile_from_document(value: &Value) -> Option<Profile> {
    let kind = type_of(value)?;
    if !ACTOR_TYPES.contains(&kind) {
        return None;
    }
    let mut base = base_of(value, "id");
    base.receivers.clear();

    let public_key = match value.get("publicKey") {
        Some(Value::Array(keys)) => keys.iter().find_map(|key| key.get("publicKeyPem")),
        Some(key) => key.get("publicKeyPem"),
        None => None,
    }
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_string();
    let icon = value
        .get("icon")
        .and_then(url_of)
        .unwrap_or_default()
        .to_string();

    let mut profile = Profile::new(base);
    profile.name = text(value, "name");
    profile.username = text(value, "preferredUsername");
    profile.raw_content = text(value, "summary");
    profile.url = value
        .get("url")
        .and_then(url_of)
        .unwrap_or_default()
        .to_string();
    profile.image_urls.large = icon.clone();
    profile.image_urls.medium = icon.clone();
    profile.image_urls.small = icon;
    profile.inboxes.private = text(value, "inbox");
    profile.inboxes.public = value
        .get("endpoints")
        .map(|endpoints| text(endpoints, "sharedInbox"))
        .unwrap_or_default();
    profile.public_key = public_key;
    profile.manually_approves_followers = value
        .get("manuallyApprovesFollowers")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    profile.public = value
        .get("discoverable")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    profile.nsfw = value
        .get("sensitive")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Some(profile)
}
