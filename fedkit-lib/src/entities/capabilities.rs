//! Capability descriptors and field rules.
//!
//! A capability names a group of fields an entity carries together with the
//! rules validation applies to them. Entity kinds declare an ordered, static
//! capability list; [`Entity::validate`](super::Entity::validate) walks those
//! lists instead of discovering fields at runtime.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::EntityKind;

/// Value of a named field, as seen by validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue<'a> {
    /// Text field; empty text counts as absent.
    Text(&'a str),
    /// Boolean field; always present.
    Flag(bool),
    /// Timestamp field; always present.
    Timestamp(DateTime<Utc>),
    /// The entity has no such field.
    Absent,
}

impl FieldValue<'_> {
    /// True if the value satisfies a "required" rule.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Text(text) => !text.trim().is_empty(),
            Self::Flag(_) | Self::Timestamp(_) => true,
            Self::Absent => false,
        }
    }
}

/// Validator applied to non-empty text values.
pub type FieldValidator = fn(&str) -> Result<(), String>;

/// One `(field, required, validator)` rule contributed by a capability.
#[derive(Clone, Copy, Debug)]
pub struct FieldRule {
    /// Field name as exposed by `Entity::field`.
    pub field: &'static str,
    /// Field must be present and non-empty.
    pub required: bool,
    /// Additional check on the field value.
    pub validator: Option<FieldValidator>,
}

impl FieldRule {
    const fn required(field: &'static str) -> Self {
        Self {
            field,
            required: true,
            validator: None,
        }
    }

    const fn optional(field: &'static str) -> Self {
        Self {
            field,
            required: false,
            validator: None,
        }
    }

    const fn checked(field: &'static str, required: bool, validator: FieldValidator) -> Self {
        Self {
            field,
            required,
            validator: Some(validator),
        }
    }
}

/// Named capability an entity kind is composed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Identity,
    CreatedAt,
    RawContent,
    OptionalRawContent,
    Public,
    Guid,
    TargetId,
    TargetGuid,
    Participation,
    EntityType,
    Handle,
    TargetHandle,
    Reaction,
    Following,
    Relationship,
    Email,
    ImageUrl,
}

static IDENTITY: [FieldRule; 2] = [FieldRule::required("id"), FieldRule::required("actor_id")];
static CREATED_AT: [FieldRule; 1] = [FieldRule::required("created_at")];
static RAW_CONTENT: [FieldRule; 1] = [FieldRule::required("raw_content")];
static OPTIONAL_RAW_CONTENT: [FieldRule; 1] = [FieldRule::optional("raw_content")];
static PUBLIC: [FieldRule; 1] = [FieldRule::optional("public")];
static GUID: [FieldRule; 1] = [FieldRule::checked("guid", true, validate_guid)];
static TARGET_ID: [FieldRule; 1] = [FieldRule::required("target_id")];
static TARGET_GUID: [FieldRule; 1] = [FieldRule::checked("target_guid", true, validate_guid)];
static PARTICIPATION: [FieldRule; 1] = [FieldRule::checked(
    "participation",
    true,
    validate_participation,
)];
static ENTITY_TYPE: [FieldRule; 1] = [FieldRule::checked("entity_type", true, validate_entity_type)];
static HANDLE: [FieldRule; 1] = [FieldRule::checked("handle", true, validate_handle)];
static TARGET_HANDLE: [FieldRule; 1] = [FieldRule::checked("target_handle", true, validate_handle)];
static REACTION: [FieldRule; 1] = [FieldRule::checked("reaction", true, validate_reaction)];
static FOLLOWING: [FieldRule; 1] = [FieldRule::required("following")];
static RELATIONSHIP: [FieldRule; 1] = [FieldRule::checked(
    "relationship",
    true,
    validate_relationship,
)];
static EMAIL: [FieldRule; 1] = [FieldRule::checked("email", false, validate_email)];
static IMAGE_URL: [FieldRule; 1] = [FieldRule::required("url")];

impl Capability {
    /// Field rules contributed by this capability, in order.
    pub fn rules(self) -> &'static [FieldRule] {
        match self {
            Self::Identity => &IDENTITY,
            Self::CreatedAt => &CREATED_AT,
            Self::RawContent => &RAW_CONTENT,
            Self::OptionalRawContent => &OPTIONAL_RAW_CONTENT,
            Self::Public => &PUBLIC,
            Self::Guid => &GUID,
            Self::TargetId => &TARGET_ID,
            Self::TargetGuid => &TARGET_GUID,
            Self::Participation => &PARTICIPATION,
            Self::EntityType => &ENTITY_TYPE,
            Self::Handle => &HANDLE,
            Self::TargetHandle => &TARGET_HANDLE,
            Self::Reaction => &REACTION,
            Self::Following => &FOLLOWING,
            Self::Relationship => &RELATIONSHIP,
            Self::Email => &EMAIL,
            Self::ImageUrl => &IMAGE_URL,
        }
    }
}

/// Minimum length of Diaspora guids.
pub const MIN_GUID_LENGTH: usize = 16;

/// Participation kinds accepted by the `Participation` capability.
pub const PARTICIPATION_KINDS: [&str; 3] = ["reaction", "subscription", "comment"];

/// Reactions accepted by the `Reaction` capability.
pub const REACTION_KINDS: [&str; 1] = ["like"];

/// Relationship kinds accepted by the `Relationship` capability.
pub const RELATIONSHIP_KINDS: [&str; 4] = ["sharing", "following", "ignoring", "blocking"];

/// Retraction target used for ActivityPub deletes of unknown type.
pub const OBJECT_ENTITY_TYPE: &str = "Object";

fn validate_guid(value: &str) -> Result<(), String> {
    if value.chars().count() < MIN_GUID_LENGTH {
        return Err(format!(
            "must be at least {} characters long",
            MIN_GUID_LENGTH
        ));
    }
    Ok(())
}

fn validate_participation(value: &str) -> Result<(), String> {
    one_of(value, &PARTICIPATION_KINDS)
}

fn validate_reaction(value: &str) -> Result<(), String> {
    one_of(value, &REACTION_KINDS)
}

fn validate_relationship(value: &str) -> Result<(), String> {
    one_of(value, &RELATIONSHIP_KINDS)
}

fn validate_entity_type(value: &str) -> Result<(), String> {
    if value == OBJECT_ENTITY_TYPE || value.parse::<EntityKind>().is_ok() {
        Ok(())
    } else {
        Err(format!("{} is not a known entity type", value))
    }
}

fn validate_handle(value: &str) -> Result<(), String> {
    static HANDLE_RE: OnceLock<Regex> = OnceLock::new();
    let re = HANDLE_RE.get_or_init(|| {
        Regex::new(r"^[\w.+-]+@[\w.-]+\.\w+(?::\d+)?$").expect("handle regex is valid")
    });
    if re.is_match(value) {
        Ok(())
    } else {
        Err("not a valid user@host handle".to_string())
    }
}

fn validate_email(value: &str) -> Result<(), String> {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid"));
    if re.is_match(value) {
        Ok(())
    } else {
        Err("not a valid email address".to_string())
    }
}

fn one_of(value: &str, allowed: &[&str]) -> Result<(), String> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(format!("must be one of {}", allowed.join(", ")))
    }
}
