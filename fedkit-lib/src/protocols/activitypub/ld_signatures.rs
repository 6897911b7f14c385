//! Linked Data signatures (`RsaSignature2017`).
//!
//! The signed data is `sha256_hex(canon(options)) + sha256_hex(canon(doc))`
//! where `options` holds the signature's `creator` and `created` under the
//! security context and `doc` is the document without its `signature`.
//! Canonicalisation itself is delegated to a [`Canonicalizer`].

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Number, Value};

use super::context::SECURITY;
use crate::crypto::{self, decode_base64_lenient};
use crate::transport::Canonicalizer;
use crate::{FederationError, Result};

pub const SIGNATURE_TYPE: &str = "RsaSignature2017";

fn exponent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)0*E\+?(-)?0*(\d)").expect("valid exponent regex"))
}

/// Replace floats with an integral value by integers, recursively.
pub fn coerce_integral_floats(value: &mut Value) {
    match value {
        Value::Number(number) if number.is_f64() => {
            if let Some(float) = number.as_f64() {
                if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
                    *number = Number::from(float as i64);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(coerce_integral_floats),
        Value::Object(map) => map.values_mut().for_each(coerce_integral_floats),
        _ => {}
    }
}

/// Shorten `xsd:double` exponents: `1.5E+01` becomes `1.5E1`.
pub fn normalize_exponents(nquads: &str) -> String {
    exponent_regex().replace_all(nquads, "${1}E${2}${3}").into_owned()
}

fn hash_canonical(canonicalizer: &dyn Canonicalizer, document: &Value) -> Result<String> {
    let mut document = document.clone();
    coerce_integral_floats(&mut document);
    let nquads = normalize_exponents(&canonicalizer.canonicalize(&document)?);
    Ok(crypto::sha256_hex(nquads.as_bytes()))
}

fn signed_data(
    canonicalizer: &dyn Canonicalizer,
    document: &Value,
    creator: &str,
    created: &str,
) -> Result<String> {
    let options = json!({
        "@context": SECURITY,
        "creator": creator,
        "created": created,
    });
    let mut unsigned = document.clone();
    if let Some(map) = unsigned.as_object_mut() {
        map.remove("signature");
    }
    Ok(format!(
        "{}{}",
        hash_canonical(canonicalizer, &options)?,
        hash_canonical(canonicalizer, &unsigned)?
    ))
}

/// Add a `signature` block to `document`.
pub fn sign(
    document: &mut Value,
    private_key: &RsaPrivateKey,
    creator: &str,
    canonicalizer: &dyn Canonicalizer,
    created: DateTime<Utc>,
) -> Result<()> {
    let created = created.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let data = signed_data(canonicalizer, document, creator, &created)?;
    let signature = crypto::sign_sha256(private_key, data.as_bytes())?;

    let map = document
        .as_object_mut()
        .ok_or_else(|| FederationError::invalid_data("document", "not a JSON object"))?;
    map.insert(
        "signature".to_string(),
        json!({
            "type": SIGNATURE_TYPE,
            "creator": creator,
            "created": created,
            "signatureValue": STANDARD.encode(signature),
        }),
    );
    Ok(())
}

/// `creator` of the document's signature block, if any.
pub fn creator(document: &Value) -> Option<&str> {
    document.get("signature")?.get("creator")?.as_str()
}

/// Verify the document's signature block with `public_key`.
pub fn verify(
    document: &Value,
    public_key: &RsaPublicKey,
    canonicalizer: &dyn Canonicalizer,
) -> Result<()> {
    let block = document
        .get("signature")
        .ok_or_else(|| FederationError::SignatureVerification("document is not signed".to_string()))?;
    let field = |name: &str| {
        block.get(name).and_then(Value::as_str).ok_or_else(|| {
            FederationError::SignatureVerification(format!("signature has no {}", name))
        })
    };
    let signature_type = field("type")?;
    if signature_type != SIGNATURE_TYPE {
        return Err(FederationError::SignatureVerification(format!(
            "unsupported signature type {}",
            signature_type
        )));
    }
    let data = signed_data(canonicalizer, document, field("creator")?, field("created")?)?;
    let signature = decode_base64_lenient(field("signatureValue")?)?;
    crypto::verify_sha256(public_key, data.as_bytes(), &signature)?;
    Ok(())
}
