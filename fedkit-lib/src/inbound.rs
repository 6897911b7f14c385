//! Inbound pipeline: identify, verify, decode.
//!
//! [`handle_receive`] picks the protocol from the request, lets the codec
//! verify the payload (failure rejects the whole payload) and maps it to
//! entities. Entities that fail validation are dropped by the codec and do
//! not fail the call.

use tracing::{debug, info};

use crate::config::FederationConfig;
use crate::entities::Entity;
use crate::protocols::activitypub::ActivityPubProtocol;
use crate::protocols::diaspora::DiasporaProtocol;
use crate::protocols::{identify_protocol_by_request, Protocol};
use crate::transport::{Canonicalizer, InboundRequest, ProfileResolver};
use crate::{LocalUser, Result};

/// Collaborators and settings for [`handle_receive`].
pub struct ReceiveContext<'a> {
    resolver: &'a dyn ProfileResolver,
    user: Option<&'a LocalUser>,
    canonicalizer: Option<&'a dyn Canonicalizer>,
    config: FederationConfig,
}

impl<'a> ReceiveContext<'a> {
    /// `resolver` supplies sender public keys.
    pub fn new(resolver: &'a dyn ProfileResolver) -> Self {
        Self {
            resolver,
            user: None,
            canonicalizer: None,
            config: FederationConfig::default(),
        }
    }

    /// Receiving user, needed for private Diaspora payloads.
    pub fn with_user(mut self, user: &'a LocalUser) -> Self {
        self.user = Some(user);
        self
    }

    /// Canonicalizer for LD signatures on relayed ActivityPub activities.
    pub fn with_canonicalizer(mut self, canonicalizer: &'a dyn Canonicalizer) -> Self {
        self.canonicalizer = Some(canonicalizer);
        self
    }

    pub fn with_config(mut self, config: FederationConfig) -> Self {
        self.config = config;
        self
    }
}

/// Result of [`handle_receive`].
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedMessage {
    /// Verified sender: a Diaspora handle or an ActivityPub actor id.
    pub sender: String,
    pub protocol: Protocol,
    pub entities: Vec<Entity>,
}

/// Receive an inbound payload.
///
/// # Errors
/// - `NoSuitableProtocol` when no protocol recognises the request
/// - `SignatureVerification`, `NoSenderKey`, `Crypto` when the payload
///   cannot be authenticated
/// - `MissingPrivateKey` for a private Diaspora payload without a
///   receiving user key
#[tracing::instrument(skip_all, fields(body_len = request.body.len()))]
pub fn handle_receive(request: &InboundRequest, ctx: &ReceiveContext<'_>) -> Result<ReceivedMessage> {
    let protocol = identify_protocol_by_request(request)?;
    debug!(%protocol, "identified inbound protocol");

    let (sender, entities) = match protocol {
        Protocol::Diaspora => {
            let diaspora = DiasporaProtocol::new(ctx.resolver);
            let envelope = diaspora.receive(request, ctx.user)?;
            let entities = diaspora.message_to_objects(&envelope, ctx.user)?;
            (envelope.sender, entities)
        }
        Protocol::ActivityPub => {
            let mut activitypub = ActivityPubProtocol::new(ctx.resolver, &ctx.config);
            if let Some(canonicalizer) = ctx.canonicalizer {
                activitypub = activitypub.with_canonicalizer(canonicalizer);
            }
            if let Some(user) = ctx.user {
                activitypub = activitypub.with_receiver(&user.id);
            }
            let received = activitypub.receive(request)?;
            let entities = activitypub.message_to_objects(&received)?;
            (received.sender, entities)
        }
    };

    info!(%protocol, %sender, entities = entities.len(), "received payload");
    Ok(ReceivedMessage {
        sender,
        protocol,
        entities,
    })
}
