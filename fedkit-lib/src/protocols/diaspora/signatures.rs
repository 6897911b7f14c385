//! Relayable signatures.
//!
//! Comments and likes are relayed to the thread's participants by the owner
//! of the parent post, so they carry the author's signature (and optionally
//! the parent author's) over the `;`-joined text of their child elements.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::{RsaPrivateKey, RsaPublicKey};

use super::xml::XmlElement;
use crate::crypto::{self, decode_base64_lenient};
use crate::Result;

pub const AUTHOR_SIGNATURE: &str = "author_signature";
pub const PARENT_AUTHOR_SIGNATURE: &str = "parent_author_signature";

/// The signed text: every child's text in document order, minus the
/// signature elements themselves. Empty children still contribute an empty
/// field, so `<a>x</a><b/><c>y</c>` signs as `x;;y`.
pub fn signature_text(doc: &XmlElement) -> String {
    doc.children
        .iter()
        .filter(|child| {
            let name = child.local_name();
            name != AUTHOR_SIGNATURE && name != PARENT_AUTHOR_SIGNATURE
        })
        .map(|child| child.text.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

/// Sign a relayable document, returning standard base64.
pub fn create_relayable_signature(private_key: &RsaPrivateKey, doc: &XmlElement) -> Result<String> {
    let signature = crypto::sign_sha256(private_key, signature_text(doc).as_bytes())?;
    Ok(STANDARD.encode(signature))
}

/// Verify a relayable signature over `doc`.
pub fn verify_relayable_signature(
    public_key: &RsaPublicKey,
    doc: &XmlElement,
    signature: &str,
) -> Result<()> {
    let signature = decode_base64_lenient(signature)?;
    crypto::verify_sha256(public_key, signature_text(doc).as_bytes(), &signature)?;
    Ok(())
}

/// Insert or replace the `parent_author_signature` element.
///
/// A new element goes right after `author_signature` when present, else at the end.
pub fn set_parent_signature(doc: &mut XmlElement, signature: &str) {
    if let Some(existing) = doc.child_mut(PARENT_AUTHOR_SIGNATURE) {
        existing.text = signature.to_string();
        return;
    }
    let element = XmlElement::text_element(PARENT_AUTHOR_SIGNATURE, signature);
    match doc
        .children
        .iter()
        .position(|child| child.local_name() == AUTHOR_SIGNATURE)
    {
        Some(index) => doc.children.insert(index + 1, element),
        None => doc.children.push(element),
    }
}
