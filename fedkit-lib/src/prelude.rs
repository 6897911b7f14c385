//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use fedkit_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - Entities: `Entity`, `EntityKind`, `Base` and the entity structs
//! - Error types: `FederationError`, `FederationErrorCode`, `Result`
//! - Pipelines: `handle_receive`, `handle_create_payload`, `handle_send`
//! - Collaborator traits: `ProfileResolver`, `DocumentFetcher`, `DocumentSender`, `Canonicalizer`

// Entities
pub use crate::entities::{
    Base, Comment, Entity, EntityKind, Follow, Image, Post, Profile, Reaction, Relationship,
    Retraction, Share,
};

// Error handling
pub use crate::errors::{FederationError, FederationErrorCode};
pub use crate::Result;

// Configuration and identities
pub use crate::config::FederationConfig;
pub use crate::LocalUser;

// Pipelines
pub use crate::inbound::{handle_receive, ReceiveContext, ReceivedMessage};
pub use crate::outbound::{
    handle_create_payload, handle_send, DeliveryReport, Outgoing, Recipient, SendContext,
};
pub use crate::protocols::Protocol;

// Collaborators
pub use crate::transport::{
    Canonicalizer, DocumentFetcher, DocumentSender, InboundRequest, ProfileResolver,
};

#[cfg(feature = "http-client")]
pub use crate::transport::HttpClient;
