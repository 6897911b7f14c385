//! Outbound pipeline: convert, sign, render, deliver.
//!
//! [`handle_create_payload`] produces one payload for one protocol.
//! [`handle_send`] fans an entity out to a list of recipients:
//!
//! - public Diaspora recipients share one Magic Envelope
//! - private Diaspora recipients each get a payload encrypted to their key
//! - public ActivityPub recipients share one document, LD-signed when a
//!   canonicalizer is configured
//! - private ActivityPub recipients each get a document addressed to them
//!
//! Every ActivityPub request carries an HTTP signature by the author.
//! Conversion failures abort the call; failed deliveries are logged and
//! recorded in the [`DeliveryReport`].

use chrono::Utc;
use rsa::RsaPublicKey;
use tracing::{debug, info, warn};

use crate::config::FederationConfig;
use crate::entities::Entity;
use crate::protocols::activitypub::{self, http_signatures, ActivityPubEntity};
use crate::protocols::diaspora::{self, DiasporaEntity};
use crate::protocols::Protocol;
use crate::transport::{Canonicalizer, DocumentSender};
use crate::{FederationError, LocalUser, Result};

/// Media type of public Diaspora payloads.
pub const MAGIC_ENVELOPE_CONTENT_TYPE: &str = "application/magic-envelope+xml";
/// Media type of encrypted Diaspora payloads.
pub const ENCRYPTED_CONTENT_TYPE: &str = "application/json";

/// Something to send: a canonical entity or one already in protocol form.
#[derive(Clone, Debug, PartialEq)]
pub enum Outgoing {
    Entity(Entity),
    Diaspora(DiasporaEntity),
    ActivityPub(ActivityPubEntity),
}

impl Outgoing {
    /// The canonical entity.
    pub fn entity(&self) -> &Entity {
        match self {
            Self::Entity(entity) => entity,
            Self::Diaspora(diaspora) => &diaspora.entity,
            Self::ActivityPub(activitypub) => &activitypub.entity,
        }
    }
}

impl From<Entity> for Outgoing {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<DiasporaEntity> for Outgoing {
    fn from(entity: DiasporaEntity) -> Self {
        Self::Diaspora(entity)
    }
}

impl From<ActivityPubEntity> for Outgoing {
    fn from(entity: ActivityPubEntity) -> Self {
        Self::ActivityPub(entity)
    }
}

/// An entity in the form one protocol sends.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundEntity {
    Diaspora(DiasporaEntity),
    ActivityPub(ActivityPubEntity),
}

/// Convert `outgoing` for `protocol`.
///
/// Protocol-specific input for the same protocol passes through unchanged.
/// Unsigned Diaspora relayables are signed with the author's key.
///
/// # Errors
/// `Conversion` when the entity has no form in `protocol`.
pub fn get_outbound_entity(
    outgoing: &Outgoing,
    protocol: Protocol,
    author: &LocalUser,
) -> Result<OutboundEntity> {
    match (outgoing, protocol) {
        (Outgoing::ActivityPub(entity), Protocol::ActivityPub) => {
            Ok(OutboundEntity::ActivityPub(entity.clone()))
        }
        (other, Protocol::ActivityPub) => Ok(OutboundEntity::ActivityPub(
            ActivityPubEntity::from_entity(other.entity().clone())?,
        )),
        (other, Protocol::Diaspora) => {
            let mut entity = match other {
                Outgoing::Diaspora(entity) => entity.clone(),
                other => DiasporaEntity::from_entity(other.entity().clone())?,
            };
            if entity.entity.is_relayable() && !entity.is_signed() {
                entity.sign(author.private_key()?)?;
                debug!(kind = %entity.entity.kind(), "signed relayable as author");
            }
            Ok(OutboundEntity::Diaspora(entity))
        }
    }
}

fn prepare_diaspora(
    outgoing: &Outgoing,
    author: &LocalUser,
    parent_user: Option<&LocalUser>,
) -> Result<DiasporaEntity> {
    let OutboundEntity::Diaspora(mut entity) = get_outbound_entity(outgoing, Protocol::Diaspora, author)? else {
        return Err(FederationError::Internal("expected a Diaspora entity".to_string()));
    };
    if let Some(parent) = parent_user {
        if entity.entity.is_relayable() {
            entity.sign_with_parent(parent.private_key()?)?;
        }
    }
    Ok(entity)
}

fn prepare_activitypub(outgoing: &Outgoing, author: &LocalUser) -> Result<ActivityPubEntity> {
    match get_outbound_entity(outgoing, Protocol::ActivityPub, author)? {
        OutboundEntity::ActivityPub(entity) => Ok(entity),
        OutboundEntity::Diaspora(_) => Err(FederationError::Internal(
            "expected an ActivityPub entity".to_string(),
        )),
    }
}

/// Render a single payload.
///
/// For Diaspora the payload is a Magic Envelope, encrypted when
/// `recipient_key` is given. `parent_user` co-signs relayables being
/// relayed on behalf of the parent's author. ActivityPub payloads are
/// rendered with the default configuration and are not LD-signed.
pub fn handle_create_payload(
    outgoing: &Outgoing,
    author: &LocalUser,
    protocol: Protocol,
    recipient_key: Option<&RsaPublicKey>,
    parent_user: Option<&LocalUser>,
) -> Result<String> {
    match protocol {
        Protocol::Diaspora => {
            let entity = prepare_diaspora(outgoing, author, parent_user)?;
            diaspora::build_send(&entity, author, recipient_key)
        }
        Protocol::ActivityPub => {
            let entity = prepare_activitypub(outgoing, author)?;
            activitypub::build_send(&entity, author, None, None, &FederationConfig::default())
        }
    }
}

/// A delivery target.
#[derive(Clone, Debug, PartialEq)]
pub struct Recipient {
    /// Inbox url.
    pub endpoint: String,
    /// Recipient id: ActivityPub actor id or Diaspora handle.
    pub fid: String,
    pub protocol: Protocol,
    /// Public delivery (shared payload) versus addressed to `fid`.
    pub public: bool,
    /// Encryption key of a private Diaspora recipient.
    pub public_key: Option<RsaPublicKey>,
}

impl Recipient {
    /// A public recipient reached through `endpoint`.
    pub fn public(endpoint: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            endpoint: endpoint.into(),
            fid: String::new(),
            protocol,
            public: true,
            public_key: None,
        }
    }

    /// A private recipient.
    pub fn private(
        endpoint: impl Into<String>,
        fid: impl Into<String>,
        protocol: Protocol,
        public_key: Option<RsaPublicKey>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            fid: fid.into(),
            protocol,
            public: false,
            public_key,
        }
    }

    fn check(&self) -> Result<()> {
        match (self.protocol, self.public) {
            (Protocol::Diaspora, true) if self.public_key.is_some() => Err(FederationError::invalid_data(
                "recipient",
                format!("public Diaspora recipient {} must not carry a key", self.endpoint),
            )),
            (Protocol::Diaspora, false) if self.public_key.is_none() => Err(FederationError::invalid_data(
                "recipient",
                format!("private Diaspora recipient {} needs a key", self.endpoint),
            )),
            (Protocol::ActivityPub, false) if self.fid.is_empty() => Err(FederationError::invalid_data(
                "recipient",
                format!("private ActivityPub recipient {} needs an id", self.endpoint),
            )),
            _ => Ok(()),
        }
    }
}

/// A successful delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub url: String,
    pub status: u16,
}

/// A failed delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedDelivery {
    pub url: String,
    pub reason: String,
}

/// Outcome of [`handle_send`], one entry per request made.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<Delivery>,
    pub failed: Vec<FailedDelivery>,
}

impl DeliveryReport {
    /// True when nothing failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, url: &str, reason: String) {
        warn!(url, reason = %reason, "delivery failed");
        self.failed.push(FailedDelivery {
            url: url.to_string(),
            reason,
        });
    }
}

/// Optional collaborators and settings for [`handle_send`].
#[derive(Default)]
pub struct SendContext<'a> {
    canonicalizer: Option<&'a dyn Canonicalizer>,
    config: FederationConfig,
}

impl<'a> SendContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// LD-sign public ActivityPub documents.
    pub fn with_canonicalizer(mut self, canonicalizer: &'a dyn Canonicalizer) -> Self {
        self.canonicalizer = Some(canonicalizer);
        self
    }

    pub fn with_config(mut self, config: FederationConfig) -> Self {
        self.config = config;
        self
    }
}

fn deliver(
    sender: &dyn DocumentSender,
    url: &str,
    body: &str,
    headers: &[(String, String)],
    report: &mut DeliveryReport,
) {
    match sender.send(url, body, headers) {
        Ok(status) if (200..300).contains(&status) => {
            debug!(url, status, "delivered");
            report.delivered.push(Delivery {
                url: url.to_string(),
                status,
            });
        }
        Ok(status) => report.fail(url, format!("HTTP {}", status)),
        Err(err) => report.fail(url, err.to_string()),
    }
}

fn push_unique(endpoints: &mut Vec<String>, endpoint: &str) {
    if !endpoints.iter().any(|known| known == endpoint) {
        endpoints.push(endpoint.to_string());
    }
}

/// Deliver `outgoing` to `recipients` through `sender`.
///
/// # Errors
/// - `InvalidData` for inconsistent recipients (checked before any delivery)
/// - `Conversion` when the entity has no form in a recipient's protocol
/// - `MissingPrivateKey` when the author (or parent user) has no key
///
/// Delivery failures do not raise; see [`DeliveryReport::failed`].
#[tracing::instrument(skip_all, fields(kind = %outgoing.entity().kind(), recipients = recipients.len()))]
pub fn handle_send(
    outgoing: &Outgoing,
    author: &LocalUser,
    recipients: &[Recipient],
    parent_user: Option<&LocalUser>,
    sender: &dyn DocumentSender,
    ctx: &SendContext<'_>,
) -> Result<DeliveryReport> {
    for recipient in recipients {
        recipient.check()?;
    }
    let mut report = DeliveryReport::default();

    let diaspora_recipients: Vec<&Recipient> = recipients
        .iter()
        .filter(|r| r.protocol == Protocol::Diaspora)
        .collect();
    if !diaspora_recipients.is_empty() {
        let entity = prepare_diaspora(outgoing, author, parent_user)?;
        let mut public_endpoints = Vec::new();
        for recipient in diaspora_recipients.iter().filter(|r| r.public) {
            push_unique(&mut public_endpoints, &recipient.endpoint);
        }
        if !public_endpoints.is_empty() {
            let payload = diaspora::build_send(&entity, author, None)?;
            let headers = [("Content-Type".to_string(), MAGIC_ENVELOPE_CONTENT_TYPE.to_string())];
            for endpoint in &public_endpoints {
                deliver(sender, endpoint, &payload, &headers, &mut report);
            }
        }
        for recipient in diaspora_recipients.iter().filter(|r| !r.public) {
            let payload = diaspora::build_send(&entity, author, recipient.public_key.as_ref())?;
            let headers = [("Content-Type".to_string(), ENCRYPTED_CONTENT_TYPE.to_string())];
            deliver(sender, &recipient.endpoint, &payload, &headers, &mut report);
        }
    }

    let activitypub_recipients: Vec<&Recipient> = recipients
        .iter()
        .filter(|r| r.protocol == Protocol::ActivityPub)
        .collect();
    if !activitypub_recipients.is_empty() {
        let entity = prepare_activitypub(outgoing, author)?;
        let key = author.private_key()?;
        let key_id = author.key_id();
        let mut signed_delivery = |endpoint: &str, body: &str, report: &mut DeliveryReport| {
            match http_signatures::sign_request(
                endpoint,
                body,
                activitypub::CONTENT_TYPE,
                key,
                &key_id,
                Utc::now(),
            ) {
                Ok(headers) => deliver(sender, endpoint, body, &headers, report),
                Err(err) => report.fail(endpoint, err.to_string()),
            }
        };

        let mut public_endpoints = Vec::new();
        for recipient in activitypub_recipients.iter().filter(|r| r.public) {
            push_unique(&mut public_endpoints, &recipient.endpoint);
        }
        if !public_endpoints.is_empty() {
            let body = activitypub::build_send(&entity, author, None, ctx.canonicalizer, &ctx.config)?;
            for endpoint in &public_endpoints {
                signed_delivery(endpoint, &body, &mut report);
            }
        }
        for recipient in activitypub_recipients.iter().filter(|r| !r.public) {
            let body = activitypub::build_send(
                &entity,
                author,
                Some(&recipient.fid),
                None,
                &ctx.config,
            )?;
            signed_delivery(&recipient.endpoint, &body, &mut report);
        }
    }

    info!(
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "send finished"
    );
    Ok(report)
}
