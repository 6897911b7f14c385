//! Diaspora XML to canonical entities.

use std::collections::HashMap;

use tracing::{error, warn};

use super::entities::DiasporaEntity;
use super::xml::XmlElement;
use super::parse_timestamp;
use crate::entities::{
    Base, Comment, Entity, EntityKind, Follow, Image, Post, Profile, Reaction, Retraction, Share,
};
use crate::protocols::Protocol;
use crate::transport::ProfileResolver;
use crate::{LocalUser, Result};

/// Strip the legacy `<XML><post>...</post></XML>` wrapper.
pub fn unwrap_legacy(root: XmlElement) -> XmlElement {
    if root.local_name() != "XML" {
        return root;
    }
    root.child("post")
        .and_then(|post| post.children.first())
        .cloned()
        .unwrap_or(root)
}

/// Decode a Diaspora message into validated entities.
///
/// Entities failing validation are logged and dropped. So are
/// non-relayable entities whose author is not the envelope sender.
pub fn message_to_objects(
    message: &str,
    sender: &str,
    resolver: Option<&dyn ProfileResolver>,
    user: Option<&LocalUser>,
) -> Result<Vec<Entity>> {
    let root = unwrap_legacy(XmlElement::parse(message.trim())?);
    let Some(mut dentity) = element_to_entity(&root) else {
        warn!(tag = %root.name, "unknown Diaspora entity, skipping");
        return Ok(Vec::new());
    };

    let source = root.to_xml_string();
    {
        let entity = &mut dentity.entity;
        let mentions = entity.extract_mentions();
        let base = entity.base_mut();
        base.source_protocol = Some(Protocol::Diaspora);
        base.source_object = Some(source);
        base.mentions = mentions;
        if let Some(user) = user {
            base.receivers.push(user.id.clone());
        }
        for child in &mut base.children {
            child.base_mut().source_protocol = Some(Protocol::Diaspora);
        }
    }

    if let (Entity::Profile(profile), Some(resolver)) = (&mut dentity.entity, resolver) {
        if let Ok(Some(known)) = resolver.resolve(&profile.base.handle) {
            if !known.base.guid.is_empty() {
                profile.base.guid = known.base.guid;
            }
        }
    }

    let handle = dentity.entity.base().handle.clone();
    if !dentity.entity.is_relayable() && handle != sender {
        warn!(
            sender,
            author = %handle,
            kind = %dentity.entity.kind(),
            "entity author does not match sender, skipping"
        );
        return Ok(Vec::new());
    }

    if let Err(err) = dentity.validate(resolver) {
        error!(error = %err, raw = %root.to_xml_string(), "dropping invalid Diaspora entity");
        return Ok(Vec::new());
    }
    Ok(vec![dentity.into_entity()])
}

/// Map one element to a Diaspora entity. `None` for unknown element names.
pub fn element_to_entity(element: &XmlElement) -> Option<DiasporaEntity> {
    let fields: HashMap<&str, &str> = element
        .children
        .iter()
        .filter(|child| child.children.is_empty())
        .map(|child| (child.local_name(), child.text.as_str()))
        .collect();
    let get = |key: &str| fields.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
    let flag = |key: &str| fields.get(key).is_some_and(|v| v.trim() == "true");

    let handle = get("author");
    let guid = get("guid");
    let mut base = Base::new(guid.clone(), handle.clone())
        .with_guid(guid.clone())
        .with_handle(handle.clone());
    if let Some(created_at) = fields.get("created_at").and_then(|v| parse_timestamp(v)) {
        base.created_at = created_at;
    }
    base.signature = get("author_signature");

    let mut parent_signature = String::new();
    let entity: Entity = match element.local_name() {
        "status_message" => {
            base.children = element
                .children
                .iter()
                .filter(|child| child.local_name() == "photo")
                .filter_map(|photo| match element_to_entity(photo)?.entity {
                    image @ Entity::Image(_) => Some(image),
                    _ => None,
                })
                .collect();
            Post {
                base,
                raw_content: get("text"),
                public: flag("public"),
                provider_display_name: get("provider_display_name"),
                ..Post::default()
            }
            .into()
        }
        "comment" => {
            parent_signature = get("parent_author_signature");
            let target = get("parent_guid");
            let root_target = get("thread_parent_guid");
            Comment {
                base,
                raw_content: get("text"),
                target_id: target.clone(),
                target_guid: target,
                root_target_id: root_target.clone(),
                root_target_guid: root_target,
                ..Comment::default()
            }
            .into()
        }
        "like" => {
            parent_signature = get("parent_author_signature");
            let target = get("parent_guid");
            let positive = fields.get("positive").map_or(true, |v| v.trim() != "false");
            Reaction {
                base,
                target_id: target.clone(),
                target_guid: target,
                target_type: get("parent_type"),
                reaction: if positive { "like" } else { "dislike" }.to_string(),
            }
            .into()
        }
        "photo" => {
            let width = get("width").parse().unwrap_or(0);
            let height = get("height").parse().unwrap_or(0);
            Image {
                base,
                raw_content: get("text"),
                url: format!("{}{}", get("remote_photo_path"), get("remote_photo_name")),
                public: flag("public"),
                width,
                height,
                ..Image::default()
            }
            .into()
        }
        "profile" => {
            base.id = handle.clone();
            let name = format!("{} {}", get("first_name"), get("last_name"))
                .trim()
                .to_string();
            let tag_list = get("tag_string")
                .split_whitespace()
                .map(|tag| tag.trim_start_matches('#').to_string())
                .filter(|tag| !tag.is_empty())
                .collect();
            let mut profile = Profile::new(base);
            profile.name = name;
            profile.raw_content = get("bio");
            profile.gender = get("gender");
            profile.location = get("location");
            profile.public = flag("searchable");
            profile.nsfw = flag("nsfw");
            profile.image_urls.large = get("image_url");
            profile.image_urls.medium = get("image_url_medium");
            profile.image_urls.small = get("image_url_small");
            profile.tag_list = tag_list;
            profile.into()
        }
        "retraction" => {
            let target = get("target_guid");
            base.id = format!("diaspora://{}/retraction/{}", handle, target);
            base.guid = String::new();
            Retraction {
                base,
                target_id: target.clone(),
                target_guid: target,
                entity_type: entity_type_from_target_type(&get("target_type")),
            }
            .into()
        }
        "contact" => {
            let recipient = get("recipient");
            base.id = format!("diaspora://{}/contact/{}", handle, recipient);
            base.guid = String::new();
            Follow {
                base,
                target_id: recipient.clone(),
                target_handle: recipient,
                following: flag("following"),
            }
            .into()
        }
        "reshare" => {
            let target = get("root_guid");
            Share {
                base,
                target_id: target.clone(),
                target_guid: target,
                target_handle: get("root_author"),
                entity_type: EntityKind::Post.as_str().to_string(),
                raw_content: get("text"),
                // Reshares are public unless flagged otherwise
                public: fields.get("public").map_or(true, |v| v.trim() != "false"),
                provider_display_name: get("provider_display_name"),
            }
            .into()
        }
        _ => return None,
    };

    let mut dentity = DiasporaEntity::from_entity(entity).ok()?;
    dentity.parent_signature = parent_signature;
    Some(dentity)
}

/// Canonical entity kind for a Diaspora `target_type`.
pub fn entity_type_from_target_type(target_type: &str) -> String {
    match target_type {
        "Like" => EntityKind::Reaction.as_str(),
        "Photo" => EntityKind::Image.as_str(),
        "StatusMessage" | "Post" => EntityKind::Post.as_str(),
        "Reshare" => EntityKind::Share.as_str(),
        "Comment" => EntityKind::Comment.as_str(),
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixed_time, DIASPORA_PROFILE};

    #[test]
    fn test_profile_fixture() {
        let entities = message_to_objects(DIASPORA_PROFILE, "bob@example.com", None, None).unwrap();
        assert_eq!(entities.len(), 1);
        let Entity::Profile(profile) = &entities[0] else {
            panic!("expected a profile, got {:?}", entities[0]);
        };
        assert_eq!(profile.name, "Bob Bobertson");
        assert!(profile.public);
        assert!(!profile.nsfw);
        assert_eq!(profile.tag_list, vec!["socialfederation", "federation"]);
        assert_eq!(profile.raw_content, "A cool bio");
        assert_eq!(profile.location, "Helsinki");
        assert_eq!(profile.base.id, "bob@example.com");
        assert_eq!(profile.base.source_protocol, Some(Protocol::Diaspora));
    }

    #[test]
    fn test_status_message_with_legacy_wrapper() {
        let message = "<XML><post><status_message><text>hello #World</text><guid>0123456789abcdef</guid><author>alice@example.com</author><public>true</public><created_at>2019-03-18T11:22:33Z</created_at></status_message></post></XML>";
        let entities = message_to_objects(message, "alice@example.com", None, None).unwrap();
        let Entity::Post(post) = &entities[0] else {
            panic!("expected a post");
        };
        assert_eq!(post.raw_content, "hello #World");
        assert_eq!(post.base.id, "0123456789abcdef");
        assert_eq!(post.base.actor_id, "alice@example.com");
        assert_eq!(post.base.created_at, fixed_time());
        assert!(post.public);
        assert_eq!(entities[0].tags(), vec!["world".to_string()]);
    }

    #[test]
    fn test_sender_mismatch_is_dropped() {
        let message = "<status_message><text>hi</text><guid>0123456789abcdef</guid><author>alice@example.com</author></status_message>";
        let entities = message_to_objects(message, "mallory@example.com", None, None).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_invalid_entity_is_dropped() {
        let message = "<status_message><guid>short</guid><author>alice@example.com</author></status_message>";
        let entities = message_to_objects(message, "alice@example.com", None, None).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_unknown_element_is_skipped() {
        let entities = message_to_objects("<poll><guid>x</guid></poll>", "a@b.c", None, None).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_malformed_xml_raises() {
        assert!(message_to_objects("<status_message>", "a@b.c", None, None).is_err());
    }

    #[test]
    fn test_retraction_and_contact() {
        let retraction = element_to_entity(
            &XmlElement::parse("<retraction><author>alice@example.com</author><target_guid>0123456789abcdef</target_guid><target_type>Photo</target_type></retraction>").unwrap(),
        )
        .unwrap();
        let Entity::Retraction(retraction) = retraction.entity else {
            panic!("expected a retraction");
        };
        assert_eq!(retraction.entity_type, "Image");
        assert_eq!(retraction.target_id, "0123456789abcdef");

        let contact = element_to_entity(
            &XmlElement::parse("<contact><author>alice@example.com</author><recipient>bob@example.com</recipient><following>true</following><sharing>true</sharing></contact>").unwrap(),
        )
        .unwrap();
        let Entity::Follow(follow) = contact.entity else {
            panic!("expected a follow");
        };
        assert!(follow.following);
        assert_eq!(follow.target_handle, "bob@example.com");
    }
}
