//! Diaspora Magic Envelope.
//!
//! The envelope carries a base64url payload, the RSA-SHA256 signature over
//! `data.type.encoding.alg` (each part base64 encoded) and the author handle
//! as `key_id`:
//!
//! ```text
//! <me:env xmlns:me="http://salmon-protocol.org/ns/magic-env">
//!   <me:encoding>base64url</me:encoding>
//!   <me:alg>RSA-SHA256</me:alg>
//!   <me:data type="application/xml">...</me:data>
//!   <me:sig key_id="...">...</me:sig>
//! </me:env>
//! ```

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use rsa::{RsaPrivateKey, RsaPublicKey};

use super::xml::{XmlElement, XmlError};
use crate::crypto::{self, decode_base64_lenient};
use crate::{FederationError, Result};

/// Magic Envelope XML namespace.
pub const NAMESPACE: &str = "http://salmon-protocol.org/ns/magic-env";
pub const DATA_TYPE: &str = "application/xml";
pub const ENCODING: &str = "base64url";
pub const ALGORITHM: &str = "RSA-SHA256";

/// A built or received Magic Envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagicEnvelope {
    data: String,
    signature: String,
    key_id: String,
}

impl MagicEnvelope {
    /// Sign `message` as `handle`.
    ///
    /// With `wrap_payload` the message is wrapped in the legacy
    /// `<XML><post>...</post></XML>` container first.
    pub fn build(
        message: &str,
        private_key: &RsaPrivateKey,
        handle: &str,
        wrap_payload: bool,
    ) -> Result<Self> {
        let payload = if wrap_payload {
            format!("<XML><post>{}</post></XML>", message)
        } else {
            message.to_string()
        };
        let data = URL_SAFE.encode(payload.as_bytes());
        let signature = crypto::sign_sha256(private_key, signature_input(&data).as_bytes())?;
        Ok(Self {
            data,
            signature: URL_SAFE.encode(signature),
            key_id: URL_SAFE.encode(handle.as_bytes()),
        })
    }

    /// Parse an envelope document.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = XmlElement::parse(xml.trim())?;
        if doc.local_name() != "env" {
            return Err(XmlError::UnexpectedElement {
                expected: "env".to_string(),
                found: doc.name,
            }
            .into());
        }
        if let Some(alg) = doc.child_text("alg") {
            if alg.trim() != ALGORITHM {
                return Err(FederationError::invalid_data(
                    "alg",
                    format!("unsupported algorithm {}", alg.trim()),
                ));
            }
        }
        let data = doc
            .child_text("data")
            .ok_or_else(|| FederationError::invalid_data("data", "envelope has no data"))?;
        let sig = doc
            .child("sig")
            .ok_or_else(|| FederationError::invalid_data("sig", "envelope has no signature"))?;
        Ok(Self {
            data: data.trim().to_string(),
            signature: sig.text.trim().to_string(),
            key_id: sig.attribute("key_id").unwrap_or_default().to_string(),
        })
    }

    /// The envelope as an XML element.
    pub fn to_element(&self) -> XmlElement {
        XmlElement::new("me:env")
            .with_attribute("xmlns:me", NAMESPACE)
            .with_child(XmlElement::text_element("me:encoding", ENCODING))
            .with_child(XmlElement::text_element("me:alg", ALGORITHM))
            .with_child(
                XmlElement::text_element("me:data", self.data.as_str())
                    .with_attribute("type", DATA_TYPE),
            )
            .with_child(
                XmlElement::text_element("me:sig", self.signature.as_str())
                    .with_attribute("key_id", self.key_id.as_str()),
            )
    }

    /// Serialised envelope document.
    pub fn render(&self) -> String {
        self.to_element().to_xml_string()
    }

    /// Base64url payload as carried in `<me:data>`.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Base64url signature as carried in `<me:sig>`.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Decoded payload text.
    pub fn message(&self) -> Result<String> {
        let bytes = decode_base64_lenient(&self.data)?;
        String::from_utf8(bytes)
            .map_err(|e| FederationError::invalid_data("data", format!("payload is not UTF-8: {}", e)))
    }

    /// Handle of the signer, decoded from `key_id`.
    pub fn sender_handle(&self) -> Result<String> {
        if self.key_id.is_empty() {
            return Err(FederationError::invalid_data("key_id", "envelope names no sender"));
        }
        let bytes = decode_base64_lenient(&self.key_id)?;
        String::from_utf8(bytes)
            .map_err(|e| FederationError::invalid_data("key_id", format!("not UTF-8: {}", e)))
    }

    /// Verify the signature against the sender's public key.
    pub fn verify(&self, public_key: &RsaPublicKey) -> Result<()> {
        let signature = decode_base64_lenient(&self.signature)?;
        crypto::verify_sha256(public_key, signature_input(&self.data).as_bytes(), &signature)?;
        Ok(())
    }
}

fn signature_input(data: &str) -> String {
    format!(
        "{}.{}.{}.{}",
        data,
        STANDARD.encode(DATA_TYPE),
        STANDARD.encode(ENCODING),
        STANDARD.encode(ALGORITHM)
    )
}
