//! Error types for Fedkit operations.
//!
//! This module provides structured error types for the federation pipelines,
//! separating failures that abort a whole payload (dispatch, envelope crypto,
//! conversion) from failures that only drop a single entity (validation).

use std::fmt;

/// Error codes for FFI and host integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FederationErrorCode {
    /// No protocol recognised the payload or identifier
    NoSuitableProtocol = 1000,
    /// Transport/network layer error
    Transport = 2000,
    /// Fetch or delivery timed out
    ConnectionTimeout = 2001,
    /// Signature did not verify
    SignatureVerification = 3000,
    /// Cryptographic primitive failed (decrypt, key parsing, ...)
    Crypto = 3001,
    /// No public key could be found for the sender
    NoSenderKey = 3002,
    /// The receiving user has no private key to decrypt with
    MissingPrivateKey = 3003,
    /// Entity failed validation
    Validation = 4000,
    /// No mapping from a canonical entity to the target protocol
    Conversion = 4001,
    /// Invalid request/data
    InvalidData = 5000,
    /// Serialization error
    Serialization = 5001,
    /// Internal/unexpected error
    Internal = 9999,
}

/// A single reason an entity failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A required field is absent or empty.
    Missing(&'static str),
    /// A field holds a value its validator rejected.
    Invalid {
        /// Field name
        field: &'static str,
        /// Reason for rejection
        reason: String,
    },
    /// A child entity kind is not allowed under this entity.
    DisallowedChild(String),
    /// The entity signature could not be verified.
    Signature(String),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(
                f,
                "attribute {} cannot be empty since it is required",
                field
            ),
            Self::Invalid { field, reason } => write!(f, "{} is not valid: {}", field, reason),
            Self::DisallowedChild(kind) => write!(f, "child {} is not allowed", kind),
            Self::Signature(reason) => write!(f, "signature: {}", reason),
        }
    }
}

/// Validation failure for one entity, carrying every issue found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Kind of entity that failed (e.g. "Comment").
    pub entity: String,
    /// All issues found, in rule order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Names of the required fields reported missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                ValidationIssue::Missing(field) => Some(*field),
                _ => None,
            })
            .collect()
    }

    /// True if any issue is a disallowed child.
    pub fn has_disallowed_child(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::DisallowedChild(_)))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let issues: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{} is invalid: {}", self.entity, issues.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Comprehensive error type for Fedkit operations.
#[derive(Debug)]
pub enum FederationError {
    /// No registered protocol recognised the payload or identifier.
    NoSuitableProtocol(String),

    /// Transport/network layer error.
    Transport(String),

    /// Fetch or delivery timed out.
    ConnectionTimeout {
        /// Target URL
        url: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// A signature over a payload, document or request did not verify.
    SignatureVerification(String),

    /// A cryptographic primitive failed.
    Crypto(String),

    /// No public key could be found for the sender.
    NoSenderKey(String),

    /// The receiving user has no private key for decryption.
    MissingPrivateKey(String),

    /// Entity validation failed.
    Validation(ValidationError),

    /// Canonical entity cannot be expressed in the target protocol.
    Conversion {
        /// Entity kind being converted
        entity: String,
        /// Target protocol name
        protocol: String,
    },

    /// Invalid data provided.
    InvalidData {
        /// Field or parameter name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Serialization/deserialization error.
    Serialization(String),

    /// Internal/unexpected error.
    Internal(String),
}

impl FederationError {
    /// Get the error code for host integration.
    pub fn code(&self) -> FederationErrorCode {
        match self {
            Self::NoSuitableProtocol(_) => FederationErrorCode::NoSuitableProtocol,
            Self::Transport(_) => FederationErrorCode::Transport,
            Self::ConnectionTimeout { .. } => FederationErrorCode::ConnectionTimeout,
            Self::SignatureVerification(_) => FederationErrorCode::SignatureVerification,
            Self::Crypto(_) => FederationErrorCode::Crypto,
            Self::NoSenderKey(_) => FederationErrorCode::NoSenderKey,
            Self::MissingPrivateKey(_) => FederationErrorCode::MissingPrivateKey,
            Self::Validation(_) => FederationErrorCode::Validation,
            Self::Conversion { .. } => FederationErrorCode::Conversion,
            Self::InvalidData { .. } => FederationErrorCode::InvalidData,
            Self::Serialization(_) => FederationErrorCode::Serialization,
            Self::Internal(_) => FederationErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// The library itself never retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConnectionTimeout { .. })
    }

    /// Returns true if the whole payload must be rejected.
    ///
    /// Only entity validation failures are recoverable at the payload level.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }

    /// Create an invalid data error.
    pub fn invalid_data(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a conversion error.
    pub fn conversion(entity: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self::Conversion {
            entity: entity.into(),
            protocol: protocol.into(),
        }
    }
}

impl fmt::Display for FederationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuitableProtocol(what) => {
                write!(f, "no suitable protocol found for {}", what)
            }
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::ConnectionTimeout { url, timeout_ms } => {
                write!(f, "request to {} timed out after {}ms", url, timeout_ms)
            }
            Self::SignatureVerification(msg) => {
                write!(f, "signature verification failed: {}", msg)
            }
            Self::Crypto(msg) => write!(f, "crypto error: {}", msg),
            Self::NoSenderKey(sender) => {
                write!(f, "could not find a public key for sender {}", sender)
            }
            Self::MissingPrivateKey(msg) => {
                write!(f, "cannot decrypt private message: {}", msg)
            }
            Self::Validation(err) => write!(f, "validation failed: {}", err),
            Self::Conversion { entity, protocol } => write!(
                f,
                "don't know how to convert {} to {} protocol entities",
                entity, protocol
            ),
            Self::InvalidData { field, reason } => write!(f, "invalid {}: {}", field, reason),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for FederationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FederationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<ValidationError> for FederationError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<crate::crypto::CryptoError> for FederationError {
    fn from(err: crate::crypto::CryptoError) -> Self {
        match err {
            crate::crypto::CryptoError::BadSignature => {
                Self::SignatureVerification(err.to_string())
            }
            other => Self::Crypto(other.to_string()),
        }
    }
}

impl From<crate::protocols::diaspora::xml::XmlError> for FederationError {
    fn from(err: crate::protocols::diaspora::xml::XmlError) -> Self {
        Self::Serialization(err.to_string())
    }
}
