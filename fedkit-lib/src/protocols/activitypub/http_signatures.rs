//! HTTP message signatures (draft-cavage) for inbound and outbound requests.
//!
//! Inbound verification:
//!
//! 1. parse the `Signature` header
//! 2. resolve `keyId` to a profile through the [`ProfileResolver`]
//! 3. check the `Date` header against the configured window
//! 4. rebuild the signing string from the declared headers
//! 5. verify the RSA-SHA256 signature, then the `Digest` header if signed
//!
//! The verified key owner's actor id is returned to the caller, who decides
//! whether it may speak for the activity's actor.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::FederationConfig;
use crate::crypto::{self, decode_base64_lenient};
use crate::transport::{InboundRequest, ProfileResolver};
use crate::{FederationError, Result};

/// Pseudo-header covering method and path.
pub const REQUEST_TARGET: &str = "(request-target)";

/// Headers signed on outbound requests, in order.
pub const OUTBOUND_HEADERS: [&str; 5] = [REQUEST_TARGET, "host", "date", "digest", "content-type"];

const ACCEPTED_ALGORITHMS: [&str; 2] = ["rsa-sha256", "hs2019"];

/// Parsed `Signature` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub key_id: String,
    pub algorithm: Option<String>,
    /// Lowercased header names; `["date"]` when the header omits the list.
    pub headers: Vec<String>,
    pub signature: String,
}

impl SignatureHeader {
    /// Parse `keyId="...",algorithm="...",headers="...",signature="..."`.
    pub fn parse(value: &str) -> Result<Self> {
        let mut key_id = None;
        let mut algorithm = None;
        let mut headers = None;
        let mut signature = None;

        for part in split_params(value) {
            let Some((name, raw)) = part.split_once('=') else {
                continue;
            };
            let value = raw.trim().trim_matches('"').to_string();
            match name.trim() {
                "keyId" => key_id = Some(value),
                "algorithm" => algorithm = Some(value.to_ascii_lowercase()),
                "headers" => {
                    headers = Some(
                        value
                            .split_whitespace()
                            .map(|h| h.to_ascii_lowercase())
                            .collect::<Vec<_>>(),
                    )
                }
                "signature" => signature = Some(value),
                _ => {}
            }
        }

        let key_id = key_id.ok_or_else(|| FederationError::invalid_data("Signature", "missing keyId"))?;
        let signature =
            signature.ok_or_else(|| FederationError::invalid_data("Signature", "missing signature"))?;
        Ok(Self {
            key_id,
            algorithm,
            headers: headers.unwrap_or_else(|| vec!["date".to_string()]),
            signature,
        })
    }

    /// Render back to header form.
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("keyId=\"{}\"", self.key_id)];
        if let Some(algorithm) = &self.algorithm {
            parts.push(format!("algorithm=\"{}\"", algorithm));
        }
        parts.push(format!("headers=\"{}\"", self.headers.join(" ")));
        parts.push(format!("signature=\"{}\"", self.signature));
        parts.join(",")
    }
}

// Commas inside quoted values must not split parameters.
fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (index, ch) in value.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&value[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// `SHA-256=<base64>` digest of a body.
pub fn digest_header(body: &str) -> String {
    format!("SHA-256={}", STANDARD.encode(Sha256::digest(body.as_bytes())))
}

/// Signing string for `headers` as taken from `lookup`.
fn build_signing_string<'a>(
    headers: &[String],
    method: &str,
    path: &str,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> Result<String> {
    let mut lines = Vec::with_capacity(headers.len());
    for name in headers {
        let line = if name == REQUEST_TARGET {
            format!("{}: {} {}", REQUEST_TARGET, method.to_ascii_lowercase(), path)
        } else {
            let value = lookup(name).ok_or_else(|| {
                FederationError::SignatureVerification(format!("signed header {} is missing", name))
            })?;
            format!("{}: {}", name, value.trim())
        };
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Signing string of an inbound request.
pub fn signing_string(request: &InboundRequest, headers: &[String]) -> Result<String> {
    let host = url::Url::parse(&request.url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let path = request.path();
    build_signing_string(headers, &request.method, &path, |name| {
        request
            .header(name)
            .or_else(|| if name == "host" { host.as_deref() } else { None })
    })
}

/// Check `Date` against `now` with `max_age` into the past and `max_skew`
/// into the future.
pub fn check_date(date: &str, now: DateTime<Utc>, max_age: Duration, max_skew: Duration) -> Result<()> {
    let sent = DateTime::parse_from_rfc2822(date.trim())
        .map_err(|e| FederationError::SignatureVerification(format!("bad Date header: {}", e)))?
        .with_timezone(&Utc);
    if now - sent > max_age {
        return Err(FederationError::SignatureVerification(format!(
            "request date {} is too old",
            date
        )));
    }
    if sent - now > max_skew {
        return Err(FederationError::SignatureVerification(format!(
            "request date {} is in the future",
            date
        )));
    }
    Ok(())
}

fn check_digest(request: &InboundRequest) -> Result<()> {
    let header = request
        .header("digest")
        .ok_or_else(|| FederationError::SignatureVerification("Digest header is missing".to_string()))?;
    let expected = digest_header(&request.body);
    let matches = header.split(',').any(|part| {
        let part = part.trim();
        part.get(..8).is_some_and(|prefix| prefix.eq_ignore_ascii_case("SHA-256="))
            && part[8..] == expected[8..]
    });
    if matches {
        Ok(())
    } else {
        Err(FederationError::SignatureVerification(
            "body does not match Digest header".to_string(),
        ))
    }
}

/// Verify a request against a known public key.
pub fn verify_with_key(
    request: &InboundRequest,
    public_key: &RsaPublicKey,
    config: &FederationConfig,
    now: DateTime<Utc>,
) -> Result<SignatureHeader> {
    let header = request
        .header("signature")
        .ok_or_else(|| FederationError::SignatureVerification("request is not signed".to_string()))?;
    let parsed = SignatureHeader::parse(header)?;
    verify_parsed(request, &parsed, public_key, config, now)?;
    Ok(parsed)
}

fn verify_parsed(
    request: &InboundRequest,
    parsed: &SignatureHeader,
    public_key: &RsaPublicKey,
    config: &FederationConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(algorithm) = &parsed.algorithm {
        if !ACCEPTED_ALGORITHMS.contains(&algorithm.as_str()) {
            return Err(FederationError::SignatureVerification(format!(
                "unsupported algorithm {}",
                algorithm
            )));
        }
    }

    let date = request
        .header("date")
        .ok_or_else(|| FederationError::SignatureVerification("Date header is missing".to_string()))?;
    check_date(
        date,
        now,
        Duration::seconds(config.signature_max_age_secs),
        Duration::seconds(config.signature_max_skew_secs),
    )?;

    let text = signing_string(request, &parsed.headers)?;
    let signature = decode_base64_lenient(&parsed.signature)?;
    crypto::verify_sha256(public_key, text.as_bytes(), &signature)?;

    if parsed.headers.iter().any(|h| h == "digest") {
        check_digest(request)?;
    }
    Ok(())
}

/// Verify an inbound request, resolving the key through `resolver`.
///
/// Returns the actor id owning the signing key.
pub fn verify_request(
    request: &InboundRequest,
    resolver: &dyn ProfileResolver,
    config: &FederationConfig,
    now: DateTime<Utc>,
) -> Result<String> {
    let header = request
        .header("signature")
        .ok_or_else(|| FederationError::SignatureVerification("request is not signed".to_string()))?;
    let parsed = SignatureHeader::parse(header)?;

    let profile = resolver
        .resolve(&parsed.key_id)?
        .ok_or_else(|| FederationError::NoSenderKey(parsed.key_id.clone()))?;
    let key = profile
        .rsa_public_key()
        .ok_or_else(|| FederationError::NoSenderKey(parsed.key_id.clone()))?;

    verify_parsed(request, &parsed, &key, config, now)?;
    debug!(key_id = %parsed.key_id, signer = %profile.base.id, "verified HTTP signature");
    Ok(profile.base.id)
}

/// Headers for an outbound POST of `body` to `url`, including `Signature`.
pub fn sign_request(
    url: &str,
    body: &str,
    content_type: &str,
    private_key: &RsaPrivateKey,
    key_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>> {
    let parsed = url::Url::parse(url).map_err(|e| FederationError::invalid_data("url", e.to_string()))?;
    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(FederationError::invalid_data("url", "url has no host")),
    };
    let path = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };

    let headers = vec![
        ("Host".to_string(), host),
        ("Date".to_string(), now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
        ("Digest".to_string(), digest_header(body)),
        ("Content-Type".to_string(), content_type.to_string()),
    ];
    let names: Vec<String> = OUTBOUND_HEADERS.iter().map(|h| h.to_string()).collect();
    let text = build_signing_string(&names, "post", &path, |name| {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    })?;
    let signature = crypto::sign_sha256(private_key, text.as_bytes())?;

    let header = SignatureHeader {
        key_id: key_id.to_string(),
        algorithm: Some("rsa-sha256".to_string()),
        headers: names,
        signature: STANDARD.encode(signature),
    };
    let mut headers = headers;
    headers.push(("Signature".to_string(), header.to_header_value()));
    Ok(headers)
}

/// An inbound request carrying the headers from [`sign_request`].
pub fn signed_request(url: &str, body: &str, headers: Vec<(String, String)>) -> InboundRequest {
    InboundRequest {
        body: body.to_string(),
        headers,
        method: "POST".to_string(),
        url: url.to_string(),
    }
}
