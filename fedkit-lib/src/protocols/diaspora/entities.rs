//! Diaspora counterparts of the canonical entities.
//!
//! A [`DiasporaEntity`] wraps a canonical [`Entity`] with the state only
//! Diaspora needs: the parent author's co-signature and a prepared outbound
//! document. Rendering follows the element order Diaspora pods expect,
//! omitting empty values.

use rsa::RsaPrivateKey;
use tracing::debug;

use super::signatures::{
    create_relayable_signature, set_parent_signature, verify_relayable_signature,
};
use super::xml::XmlElement;
use super::{format_timestamp, DIASPORA};
use crate::entities::{Capability, Entity, EntityKind, Image, SignatureCheck};
use crate::errors::ValidationError;
use crate::transport::ProfileResolver;
use crate::{FederationError, Result};

/// An entity in its Diaspora form.
#[derive(Clone, Debug, PartialEq)]
pub struct DiasporaEntity {
    pub entity: Entity,
    /// `parent_author_signature` of a relayable.
    pub parent_signature: String,
    outbound_doc: Option<XmlElement>,
}

impl DiasporaEntity {
    /// Wrap a canonical entity, failing for kinds Diaspora cannot express.
    pub fn from_entity(entity: Entity) -> Result<Self> {
        if element_name(entity.kind()).is_none() {
            return Err(FederationError::conversion(entity.kind().as_str(), DIASPORA));
        }
        Ok(Self {
            entity,
            parent_signature: String::new(),
            outbound_doc: None,
        })
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }

    /// Extra capabilities Diaspora requires per kind.
    pub fn extra_capabilities(kind: EntityKind) -> &'static [Capability] {
        use Capability as C;
        match kind {
            EntityKind::Post | EntityKind::Image => &[C::Handle, C::Guid],
            EntityKind::Comment | EntityKind::Reaction | EntityKind::Share => {
                &[C::Handle, C::Guid, C::TargetGuid]
            }
            EntityKind::Retraction => &[C::Handle, C::TargetGuid],
            EntityKind::Follow => &[C::Handle, C::TargetHandle],
            EntityKind::Profile | EntityKind::Relationship => &[C::Handle],
        }
    }

    /// Validate with Diaspora's rules.
    ///
    /// Inbound relayables must carry an author signature that verifies
    /// against the author's key, looked up through `resolver`.
    pub fn validate(
        &self,
        resolver: Option<&dyn ProfileResolver>,
    ) -> std::result::Result<(), ValidationError> {
        let extra = Self::extra_capabilities(self.entity.kind());
        if self.entity.is_relayable() && self.entity.base().is_inbound() {
            let check: SignatureCheck<'_> =
                &|entity: &Entity| verify_author_signature(entity, resolver);
            self.entity.validate_with(extra, Some(check))
        } else {
            self.entity.validate_with(extra, None)
        }
    }

    /// True when a relayable carries an author signature.
    pub fn is_signed(&self) -> bool {
        !self.entity.base().signature.is_empty()
    }

    /// Sign a relayable as its author.
    pub fn sign(&mut self, private_key: &RsaPrivateKey) -> Result<()> {
        let doc = self.to_xml()?;
        let signature = create_relayable_signature(private_key, &doc)?;
        self.entity.base_mut().signature = signature;
        self.outbound_doc = None;
        Ok(())
    }

    /// Co-sign a relayable as the parent author.
    ///
    /// Works on the received document when there is one, so fields this
    /// library does not model survive relaying. The result is kept as the
    /// outbound document.
    pub fn sign_with_parent(&mut self, private_key: &RsaPrivateKey) -> Result<()> {
        let mut doc = match self.entity.base().source_object.as_deref() {
            Some(source) => XmlElement::parse(source)?,
            None => self.to_xml()?,
        };
        let signature = create_relayable_signature(private_key, &doc)?;
        set_parent_signature(&mut doc, &signature);
        debug!(guid = %self.entity.base().guid, "added parent author signature");
        self.parent_signature = signature;
        self.outbound_doc = Some(doc);
        Ok(())
    }

    /// Document to send: the prepared outbound document, else a fresh rendering.
    pub fn to_xml(&self) -> Result<XmlElement> {
        if let Some(doc) = &self.outbound_doc {
            return Ok(doc.clone());
        }
        render(&self.entity, &self.parent_signature)
    }

    /// Serialised outbound document.
    pub fn to_xml_string(&self) -> Result<String> {
        Ok(self.to_xml()?.to_xml_string())
    }
}

fn verify_author_signature(
    entity: &Entity,
    resolver: Option<&dyn ProfileResolver>,
) -> std::result::Result<(), String> {
    let base = entity.base();
    if base.signature.is_empty() {
        return Err("author signature is missing".to_string());
    }
    let source = base
        .source_object
        .as_deref()
        .ok_or_else(|| "no source document to verify".to_string())?;
    let doc = XmlElement::parse(source).map_err(|e| e.to_string())?;
    let resolver = resolver.ok_or_else(|| "no resolver for the author key".to_string())?;
    let profile = resolver
        .resolve(&base.handle)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("could not resolve author {}", base.handle))?;
    let key = profile
        .rsa_public_key()
        .ok_or_else(|| format!("no public key for author {}", base.handle))?;
    verify_relayable_signature(&key, &doc, &base.signature).map_err(|e| e.to_string())
}

/// Root element name for an entity kind.
pub fn element_name(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Post => Some("status_message"),
        EntityKind::Comment => Some("comment"),
        EntityKind::Reaction => Some("like"),
        EntityKind::Follow => Some("contact"),
        EntityKind::Profile => Some("profile"),
        EntityKind::Retraction => Some("retraction"),
        EntityKind::Share => Some("reshare"),
        EntityKind::Image => Some("photo"),
        EntityKind::Relationship => None,
    }
}

/// Diaspora `target_type` for a retracted entity kind.
pub fn retraction_target_type(entity_type: &str) -> &str {
    match entity_type {
        "Reaction" => "Like",
        "Image" => "Photo",
        "Share" => "Reshare",
        other => other,
    }
}

fn push(doc: &mut XmlElement, name: &str, value: &str) {
    if !value.is_empty() {
        doc.children.push(XmlElement::text_element(name, value));
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn render(entity: &Entity, parent_signature: &str) -> Result<XmlElement> {
    let name = element_name(entity.kind())
        .ok_or_else(|| FederationError::conversion(entity.kind().as_str(), DIASPORA))?;
    let mut doc = XmlElement::new(name);
    let base = entity.base();
    let created_at = format_timestamp(&base.created_at);

    match entity {
        Entity::Post(post) => {
            push(&mut doc, "text", &post.raw_content);
            push(&mut doc, "guid", &base.guid);
            push(&mut doc, "author", &base.handle);
            push(&mut doc, "public", flag(post.public));
            push(&mut doc, "created_at", &created_at);
            push(&mut doc, "provider_display_name", &post.provider_display_name);
            for child in &base.children {
                if let Entity::Image(image) = child {
                    doc.children.push(render_photo(image));
                }
            }
        }
        Entity::Comment(comment) => {
            push(&mut doc, "guid", &base.guid);
            push(&mut doc, "parent_guid", &comment.target_guid);
            push(&mut doc, "thread_parent_guid", &comment.root_target_guid);
            push(&mut doc, "author_signature", &base.signature);
            push(&mut doc, "parent_author_signature", parent_signature);
            push(&mut doc, "text", &comment.raw_content);
            push(&mut doc, "author", &base.handle);
            push(&mut doc, "created_at", &created_at);
        }
        Entity::Reaction(reaction) => {
            let parent_type = if reaction.target_type.is_empty() {
                "Post"
            } else {
                reaction.target_type.as_str()
            };
            push(&mut doc, "parent_type", parent_type);
            push(&mut doc, "guid", &base.guid);
            push(&mut doc, "parent_guid", &reaction.target_guid);
            push(&mut doc, "author_signature", &base.signature);
            push(&mut doc, "parent_author_signature", parent_signature);
            push(&mut doc, "positive", flag(reaction.reaction == "like"));
            push(&mut doc, "author", &base.handle);
        }
        Entity::Image(image) => return Ok(render_photo(image)),
        Entity::Profile(profile) => {
            let (first_name, last_name) = profile
                .name
                .trim()
                .split_once(' ')
                .unwrap_or((profile.name.trim(), ""));
            let tag_string = profile
                .tag_list
                .iter()
                .map(|tag| format!("#{}", tag))
                .collect::<Vec<_>>()
                .join(" ");
            push(&mut doc, "author", &base.handle);
            push(&mut doc, "first_name", first_name);
            push(&mut doc, "last_name", last_name.trim());
            push(&mut doc, "image_url", &profile.image_urls.large);
            push(&mut doc, "image_url_small", &profile.image_urls.small);
            push(&mut doc, "image_url_medium", &profile.image_urls.medium);
            push(&mut doc, "gender", &profile.gender);
            push(&mut doc, "bio", &profile.raw_content);
            push(&mut doc, "location", &profile.location);
            push(&mut doc, "searchable", flag(profile.public));
            push(&mut doc, "nsfw", flag(profile.nsfw));
            push(&mut doc, "tag_string", &tag_string);
        }
        Entity::Retraction(retraction) => {
            push(&mut doc, "author", &base.handle);
            push(&mut doc, "target_guid", &retraction.target_guid);
            push(
                &mut doc,
                "target_type",
                retraction_target_type(&retraction.entity_type),
            );
        }
        Entity::Follow(follow) => {
            let recipient = if follow.target_handle.is_empty() {
                follow.target_id.as_str()
            } else {
                follow.target_handle.as_str()
            };
            push(&mut doc, "author", &base.handle);
            push(&mut doc, "recipient", recipient);
            push(&mut doc, "following", flag(follow.following));
            push(&mut doc, "sharing", flag(follow.following));
        }
        Entity::Share(share) => {
            push(&mut doc, "author", &base.handle);
            push(&mut doc, "guid", &base.guid);
            push(&mut doc, "created_at", &created_at);
            push(&mut doc, "root_author", &share.target_handle);
            push(&mut doc, "root_guid", &share.target_guid);
            push(&mut doc, "provider_display_name", &share.provider_display_name);
            push(&mut doc, "public", flag(share.public));
            push(&mut doc, "text", &share.raw_content);
        }
        Entity::Relationship(_) => {
            return Err(FederationError::conversion("Relationship", DIASPORA));
        }
    }
    Ok(doc)
}

fn render_photo(image: &Image) -> XmlElement {
    let base = &image.base;
    let (path, name) = match image.url.rfind('/') {
        Some(index) => image.url.split_at(index + 1),
        None => ("", image.url.as_str()),
    };
    let mut doc = XmlElement::new("photo");
    push(&mut doc, "guid", &base.guid);
    push(&mut doc, "author", &base.handle);
    push(&mut doc, "public", flag(image.public));
    push(&mut doc, "created_at", &format_timestamp(&base.created_at));
    push(&mut doc, "remote_photo_path", path);
    push(&mut doc, "remote_photo_name", name);
    push(&mut doc, "text", &image.raw_content);
    if image.height > 0 {
        push(&mut doc, "height", &image.height.to_string());
    }
    if image.width > 0 {
        push(&mut doc, "width", &image.width.to_string());
    }
    doc
}
