//! Protocol-neutral social entities.
//!
//! Every entity kind is a plain struct holding a shared [`Base`] plus its own
//! fields. [`Entity`] is the closed union the codecs and pipelines pass
//! around. Validation is driven by each kind's static capability list (see
//! [`capabilities`]) and its allowed child kinds.
//!
//! # Example
//!
//! ```
//! use fedkit_lib::entities::{Base, Entity, Post};
//!
//! let post = Post::new(
//!     Base::new("https://example.com/post/1", "https://example.com/u/alice"),
//!     "Hello #fediverse",
//! );
//! let entity = Entity::from(post);
//! assert!(entity.validate().is_ok());
//! assert_eq!(entity.tags(), vec!["fediverse".to_string()]);
//! ```

mod base;
pub mod capabilities;
pub mod content;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub use base::{now_seconds, Base};
pub use capabilities::{Capability, FieldRule, FieldValue};
pub use content::ContentType;

use crate::errors::{ValidationError, ValidationIssue};

/// Discriminant of [`Entity`], also used for `entity_type` references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Post,
    Comment,
    Reaction,
    Follow,
    Relationship,
    Profile,
    Retraction,
    Share,
    Image,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 9] = [
        Self::Post,
        Self::Comment,
        Self::Reaction,
        Self::Follow,
        Self::Relationship,
        Self::Profile,
        Self::Retraction,
        Self::Share,
        Self::Image,
    ];

    /// Kind name as used in `entity_type` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "Post",
            Self::Comment => "Comment",
            Self::Reaction => "Reaction",
            Self::Follow => "Follow",
            Self::Relationship => "Relationship",
            Self::Profile => "Profile",
            Self::Retraction => "Retraction",
            Self::Share => "Share",
            Self::Image => "Image",
        }
    }

    /// Capabilities of the kind, in validation order.
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability as C;
        match self {
            Self::Post => &[C::Identity, C::RawContent, C::Public, C::CreatedAt],
            Self::Comment => &[C::Identity, C::RawContent, C::Participation, C::TargetId, C::CreatedAt],
            Self::Reaction => &[C::Identity, C::Participation, C::TargetId, C::CreatedAt, C::Reaction],
            Self::Follow => &[C::Identity, C::CreatedAt, C::TargetId, C::Following],
            Self::Relationship => &[C::Identity, C::CreatedAt, C::TargetId, C::Relationship],
            Self::Profile => &[C::Identity, C::CreatedAt, C::OptionalRawContent, C::Public, C::Email],
            Self::Retraction => &[C::Identity, C::CreatedAt, C::TargetId, C::EntityType],
            Self::Share => &[
                C::Identity,
                C::CreatedAt,
                C::TargetId,
                C::EntityType,
                C::OptionalRawContent,
                C::Public,
            ],
            Self::Image => &[C::OptionalRawContent, C::CreatedAt, C::ImageUrl],
        }
    }

    /// Kinds allowed as children.
    pub fn allowed_children(&self) -> &'static [EntityKind] {
        match self {
            Self::Post | Self::Comment | Self::Profile => &[EntityKind::Image],
            _ => &[],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind: {}", s))
    }
}

/// A status update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Post {
    pub base: Base,
    pub raw_content: String,
    pub content_type: ContentType,
    pub public: bool,
    pub provider_display_name: String,
    pub location: String,
}

impl Post {
    pub fn new(base: Base, raw_content: impl Into<String>) -> Self {
        Self {
            base,
            raw_content: raw_content.into(),
            ..Self::default()
        }
    }
}

/// A reply to a post or another comment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Comment {
    pub base: Base,
    pub raw_content: String,
    pub content_type: ContentType,
    /// Id of the entity replied to.
    pub target_id: String,
    /// Guid of the entity replied to (Diaspora).
    pub target_guid: String,
    /// Id of the thread root, when different from the target.
    pub root_target_id: String,
    /// Guid of the thread root (Diaspora `thread_parent_guid`).
    pub root_target_guid: String,
}

impl Comment {
    pub fn new(base: Base, target_id: impl Into<String>, raw_content: impl Into<String>) -> Self {
        Self {
            base,
            target_id: target_id.into(),
            raw_content: raw_content.into(),
            ..Self::default()
        }
    }
}

/// A reaction (like) to another entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reaction {
    pub base: Base,
    pub target_id: String,
    pub target_guid: String,
    /// Diaspora `parent_type` of the target, usually `Post`.
    pub target_type: String,
    pub reaction: String,
}

impl Reaction {
    /// A "like" of `target_id`.
    pub fn like(base: Base, target_id: impl Into<String>) -> Self {
        Self {
            base,
            target_id: target_id.into(),
            target_type: "Post".to_string(),
            reaction: "like".to_string(),
            ..Self::default()
        }
    }
}

/// Start or stop following someone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Follow {
    pub base: Base,
    pub target_id: String,
    pub target_handle: String,
    /// False when un-following.
    pub following: bool,
}

impl Follow {
    pub fn new(base: Base, target_id: impl Into<String>, following: bool) -> Self {
        Self {
            base,
            target_id: target_id.into(),
            following,
            ..Self::default()
        }
    }
}

/// A relationship change other than following (sharing, blocking, ...).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Relationship {
    pub base: Base,
    pub target_id: String,
    pub target_handle: String,
    pub relationship: String,
}

/// Profile image urls by size.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileImages {
    pub small: String,
    pub medium: String,
    pub large: String,
}

/// Delivery inboxes of an actor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inboxes {
    /// Personal inbox.
    pub private: String,
    /// Shared inbox, or the personal one when the host has none.
    pub public: String,
}

/// A user profile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Profile {
    pub base: Base,
    /// Biography.
    pub raw_content: String,
    pub public: bool,
    pub email: String,
    pub name: String,
    pub gender: String,
    pub image_urls: ProfileImages,
    pub location: String,
    pub nsfw: bool,
    /// Public key PEM.
    pub public_key: String,
    pub tag_list: Vec<String>,
    /// Profile page url.
    pub url: String,
    pub username: String,
    pub inboxes: Inboxes,
    pub manually_approves_followers: bool,
}

impl Profile {
    pub fn new(base: Base) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Parsed public key, when the profile carries a valid PEM.
    pub fn rsa_public_key(&self) -> Option<rsa::RsaPublicKey> {
        if self.public_key.trim().is_empty() {
            return None;
        }
        crate::crypto::parse_public_key(&self.public_key).ok()
    }
}

/// Removal of a previously sent entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Retraction {
    pub base: Base,
    pub target_id: String,
    pub target_guid: String,
    /// Kind of the retracted entity, or `Object` when unknown.
    pub entity_type: String,
}

impl Retraction {
    pub fn new(base: Base, target_id: impl Into<String>, entity_type: EntityKind) -> Self {
        Self {
            base,
            target_id: target_id.into(),
            entity_type: entity_type.as_str().to_string(),
            ..Self::default()
        }
    }
}

/// A reshare / boost.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Share {
    pub base: Base,
    pub target_id: String,
    pub target_guid: String,
    /// Author of the shared entity.
    pub target_handle: String,
    pub entity_type: String,
    pub raw_content: String,
    pub public: bool,
    pub provider_display_name: String,
}

impl Share {
    pub fn new(base: Base, target_id: impl Into<String>) -> Self {
        Self {
            base,
            target_id: target_id.into(),
            entity_type: EntityKind::Post.as_str().to_string(),
            public: true,
            ..Self::default()
        }
    }
}

/// An image, standalone or attached to another entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
    pub base: Base,
    /// Caption.
    pub raw_content: String,
    pub url: String,
    pub name: String,
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    /// Image was embedded in the content rather than attached.
    pub inline: bool,
    pub public: bool,
}

impl Image {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Any canonical entity.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Post(Post),
    Comment(Comment),
    Reaction(Reaction),
    Follow(Follow),
    Relationship(Relationship),
    Profile(Profile),
    Retraction(Retraction),
    Share(Share),
    Image(Image),
}

macro_rules! impl_from_variant {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }
        )*
    };
}

impl_from_variant!(Post, Comment, Reaction, Follow, Relationship, Profile, Retraction, Share, Image);

/// Signature check run last by [`Entity::validate_with`].
pub type SignatureCheck<'a> = &'a dyn Fn(&Entity) -> Result<(), String>;

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Post(_) => EntityKind::Post,
            Self::Comment(_) => EntityKind::Comment,
            Self::Reaction(_) => EntityKind::Reaction,
            Self::Follow(_) => EntityKind::Follow,
            Self::Relationship(_) => EntityKind::Relationship,
            Self::Profile(_) => EntityKind::Profile,
            Self::Retraction(_) => EntityKind::Retraction,
            Self::Share(_) => EntityKind::Share,
            Self::Image(_) => EntityKind::Image,
        }
    }

    pub fn base(&self) -> &Base {
        match self {
            Self::Post(e) => &e.base,
            Self::Comment(e) => &e.base,
            Self::Reaction(e) => &e.base,
            Self::Follow(e) => &e.base,
            Self::Relationship(e) => &e.base,
            Self::Profile(e) => &e.base,
            Self::Retraction(e) => &e.base,
            Self::Share(e) => &e.base,
            Self::Image(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut Base {
        match self {
            Self::Post(e) => &mut e.base,
            Self::Comment(e) => &mut e.base,
            Self::Reaction(e) => &mut e.base,
            Self::Follow(e) => &mut e.base,
            Self::Relationship(e) => &mut e.base,
            Self::Profile(e) => &mut e.base,
            Self::Retraction(e) => &mut e.base,
            Self::Share(e) => &mut e.base,
            Self::Image(e) => &mut e.base,
        }
    }

    /// Comments and reactions can be relayed by the thread owner.
    pub fn is_relayable(&self) -> bool {
        matches!(self, Self::Comment(_) | Self::Reaction(_))
    }

    /// Value of a named field for validation.
    pub fn field(&self, name: &str) -> FieldValue<'_> {
        let base = self.base();
        match name {
            "id" => return FieldValue::Text(&base.id),
            "actor_id" => return FieldValue::Text(&base.actor_id),
            "guid" => return FieldValue::Text(&base.guid),
            "handle" => return FieldValue::Text(&base.handle),
            "signature" => return FieldValue::Text(&base.signature),
            "created_at" => return FieldValue::Timestamp(base.created_at),
            _ => {}
        }
        match (self, name) {
            (Self::Post(e), "raw_content") => FieldValue::Text(&e.raw_content),
            (Self::Post(e), "public") => FieldValue::Flag(e.public),
            (Self::Comment(e), "raw_content") => FieldValue::Text(&e.raw_content),
            (Self::Comment(_), "participation") => FieldValue::Text("comment"),
            (Self::Comment(e), "target_id") => FieldValue::Text(&e.target_id),
            (Self::Comment(e), "target_guid") => FieldValue::Text(&e.target_guid),
            (Self::Reaction(_), "participation") => FieldValue::Text("reaction"),
            (Self::Reaction(e), "target_id") => FieldValue::Text(&e.target_id),
            (Self::Reaction(e), "target_guid") => FieldValue::Text(&e.target_guid),
            (Self::Reaction(e), "reaction") => FieldValue::Text(&e.reaction),
            (Self::Follow(e), "target_id") => FieldValue::Text(&e.target_id),
            (Self::Follow(e), "target_handle") => FieldValue::Text(&e.target_handle),
            (Self::Follow(e), "following") => FieldValue::Flag(e.following),
            (Self::Relationship(e), "target_id") => FieldValue::Text(&e.target_id),
            (Self::Relationship(e), "target_handle") => FieldValue::Text(&e.target_handle),
            (Self::Relationship(e), "relationship") => FieldValue::Text(&e.relationship),
            (Self::Profile(e), "raw_content") => FieldValue::Text(&e.raw_content),
            (Self::Profile(e), "public") => FieldValue::Flag(e.public),
            (Self::Profile(e), "email") => FieldValue::Text(&e.email),
            (Self::Retraction(e), "target_id") => FieldValue::Text(&e.target_id),
            (Self::Retraction(e), "target_guid") => FieldValue::Text(&e.target_guid),
            (Self::Retraction(e), "entity_type") => FieldValue::Text(&e.entity_type),
            (Self::Share(e), "target_id") => FieldValue::Text(&e.target_id),
            (Self::Share(e), "target_guid") => FieldValue::Text(&e.target_guid),
            (Self::Share(e), "target_handle") => FieldValue::Text(&e.target_handle),
            (Self::Share(e), "entity_type") => FieldValue::Text(&e.entity_type),
            (Self::Share(e), "raw_content") => FieldValue::Text(&e.raw_content),
            (Self::Share(e), "public") => FieldValue::Flag(e.public),
            (Self::Image(e), "raw_content") => FieldValue::Text(&e.raw_content),
            (Self::Image(e), "url") => FieldValue::Text(&e.url),
            (Self::Image(e), "public") => FieldValue::Flag(e.public),
            _ => FieldValue::Absent,
        }
    }

    /// Validate against the kind's own capabilities and child rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_with(&[], None)
    }

    /// Validate with extra capabilities and an optional signature check.
    ///
    /// Rules run in declaration order (kind capabilities first, then
    /// `extra`); every failure is collected rather than stopping at the first.
    pub fn validate_with(
        &self,
        extra: &[Capability],
        signature_check: Option<SignatureCheck<'_>>,
    ) -> Result<(), ValidationError> {
        let kind = self.kind();
        let mut issues = Vec::new();

        for capability in kind.capabilities().iter().chain(extra) {
            for rule in capability.rules() {
                let value = self.field(rule.field);
                if !value.is_present() {
                    if rule.required {
                        issues.push(ValidationIssue::Missing(rule.field));
                    }
                    continue;
                }
                if let (Some(validator), FieldValue::Text(text)) = (rule.validator, value) {
                    if let Err(reason) = validator(text) {
                        issues.push(ValidationIssue::Invalid {
                            field: rule.field,
                            reason,
                        });
                    }
                }
            }
        }

        let allowed = kind.allowed_children();
        for child in &self.base().children {
            if !allowed.contains(&child.kind()) {
                issues.push(ValidationIssue::DisallowedChild(
                    child.kind().as_str().to_string(),
                ));
            }
        }

        if let Some(check) = signature_check {
            if let Err(reason) = check(self) {
                issues.push(ValidationIssue::Signature(reason));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                entity: kind.as_str().to_string(),
                issues,
            })
        }
    }

    /// Raw text content, for kinds that carry it.
    pub fn raw_content(&self) -> Option<&str> {
        match self {
            Self::Post(e) => Some(&e.raw_content),
            Self::Comment(e) => Some(&e.raw_content),
            Self::Profile(e) => Some(&e.raw_content),
            Self::Share(e) => Some(&e.raw_content),
            Self::Image(e) => Some(&e.raw_content),
            _ => None,
        }
    }

    fn content_type(&self) -> ContentType {
        match self {
            Self::Post(e) => e.content_type,
            Self::Comment(e) => e.content_type,
            _ => ContentType::Markdown,
        }
    }

    /// Content rendered as HTML.
    pub fn rendered_content(&self, tag_base_url: Option<&str>) -> String {
        self.raw_content()
            .map(|raw| content::render(raw, self.content_type(), tag_base_url))
            .unwrap_or_default()
    }

    /// Hashtags in the content.
    pub fn tags(&self) -> Vec<String> {
        self.raw_content().map(content::tags).unwrap_or_default()
    }

    /// Mentions written into the content.
    pub fn extract_mentions(&self) -> BTreeSet<String> {
        self.raw_content()
            .map(content::extract_mentions)
            .unwrap_or_default()
    }

    /// Id of the entity this one points at, if any.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Comment(e) => Some(&e.target_id),
            Self::Reaction(e) => Some(&e.target_id),
            Self::Follow(e) => Some(&e.target_id),
            Self::Relationship(e) => Some(&e.target_id),
            Self::Retraction(e) => Some(&e.target_id),
            Self::Share(e) => Some(&e.target_id),
            _ => None,
        }
    }
}
