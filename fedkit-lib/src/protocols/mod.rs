//! Protocol registry.
//!
//! The supported protocols are a closed set. Identification walks
//! [`PROTOCOLS`] in priority order and returns the first match; ActivityPub
//! comes first because the Diaspora probes are laxer.
//!
//! # Example
//!
//! ```
//! use fedkit_lib::protocols::{identify_protocol_by_id, Protocol};
//!
//! assert_eq!(
//!     identify_protocol_by_id("https://example.com/users/alice").unwrap(),
//!     Protocol::ActivityPub
//! );
//! assert_eq!(
//!     identify_protocol_by_id("alice@example.com").unwrap(),
//!     Protocol::Diaspora
//! );
//! assert!(identify_protocol_by_id("not an id").is_err());
//! ```

pub mod activitypub;
pub mod diaspora;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::transport::InboundRequest;
use crate::{FederationError, Result};

/// A supported federation protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    ActivityPub,
    Diaspora,
}

/// Protocols in identification priority order.
pub const PROTOCOLS: [Protocol; 2] = [Protocol::ActivityPub, Protocol::Diaspora];

impl Protocol {
    /// Protocol name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActivityPub => "activitypub",
            Self::Diaspora => "diaspora",
        }
    }

    /// True if the payload body looks like this protocol.
    pub fn identify_payload(&self, body: &str) -> bool {
        match self {
            Self::ActivityPub => activitypub::identify_payload(body),
            Self::Diaspora => diaspora::identify_payload(body),
        }
    }

    /// True if the request looks like this protocol.
    pub fn identify_request(&self, request: &InboundRequest) -> bool {
        self.identify_payload(&request.body)
    }

    /// True if the identifier has this protocol's format.
    pub fn identify_id(&self, id: &str) -> bool {
        static HANDLE_RE: OnceLock<Regex> = OnceLock::new();
        match self {
            Self::ActivityPub => id.starts_with("http://") || id.starts_with("https://"),
            Self::Diaspora => HANDLE_RE
                .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+@[\w.-]+$").expect("handle regex is valid"))
                .is_match(id),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First protocol whose payload probe matches.
pub fn identify_protocol_by_payload(body: &str) -> Result<Protocol> {
    PROTOCOLS
        .into_iter()
        .find(|protocol| protocol.identify_payload(body))
        .ok_or_else(|| FederationError::NoSuitableProtocol("payload".to_string()))
}

/// First protocol whose request probe matches.
pub fn identify_protocol_by_request(request: &InboundRequest) -> Result<Protocol> {
    PROTOCOLS
        .into_iter()
        .find(|protocol| protocol.identify_request(request))
        .ok_or_else(|| FederationError::NoSuitableProtocol("request".to_string()))
}

/// First protocol whose identifier format matches.
pub fn identify_protocol_by_id(id: &str) -> Result<Protocol> {
    PROTOCOLS
        .into_iter()
        .find(|protocol| protocol.identify_id(id))
        .ok_or_else(|| FederationError::NoSuitableProtocol(format!("id {}", id)))
}
