//! Fields shared by every entity.

use std::collections::BTreeSet;

use chrono::{DateTime, Timelike, Utc};

use super::Entity;
use crate::protocols::Protocol;

/// Common attributes and decode bookkeeping.
///
/// Text fields use the empty string for "not set"; validation treats empty
/// and missing alike.
#[derive(Clone, Debug, PartialEq)]
pub struct Base {
    /// Global identifier (URI for ActivityPub, `diaspora://` style or guid for Diaspora).
    pub id: String,
    /// Identifier of the author.
    pub actor_id: String,
    /// Diaspora guid.
    pub guid: String,
    /// Diaspora `user@host` handle of the author.
    pub handle: String,
    /// Author signature (Diaspora relayables).
    pub signature: String,
    /// ActivityPub id of the activity wrapping the object, if any.
    pub activity_id: String,
    /// Creation time, second precision.
    pub created_at: DateTime<Utc>,
    /// Nested entities, e.g. images attached to a post.
    pub children: Vec<Entity>,
    /// Handles or actor ids mentioned in the content.
    pub mentions: BTreeSet<String>,
    /// Recipient ids the entity was addressed to.
    pub receivers: Vec<String>,
    /// Protocol the entity was decoded from.
    pub source_protocol: Option<Protocol>,
    /// Wire text the entity was decoded from.
    pub source_object: Option<String>,
}

impl Default for Base {
    fn default() -> Self {
        Self {
            id: String::new(),
            actor_id: String::new(),
            guid: String::new(),
            handle: String::new(),
            signature: String::new(),
            activity_id: String::new(),
            created_at: now_seconds(),
            children: Vec::new(),
            mentions: BTreeSet::new(),
            receivers: Vec::new(),
            source_protocol: None,
            source_object: None,
        }
    }
}

impl Base {
    /// Create a base with the given id and author.
    pub fn new(id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            actor_id: actor_id.into(),
            ..Self::default()
        }
    }

    /// Set the Diaspora guid.
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = guid.into();
        self
    }

    /// Set the Diaspora handle.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }

    /// Set the creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Attach a child entity.
    pub fn with_child(mut self, child: impl Into<Entity>) -> Self {
        self.children.push(child.into());
        self
    }

    /// True if the entity was decoded from wire data.
    pub fn is_inbound(&self) -> bool {
        self.source_protocol.is_some()
    }
}

/// Current time truncated to whole seconds, the precision both wire formats carry.
pub fn now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}
