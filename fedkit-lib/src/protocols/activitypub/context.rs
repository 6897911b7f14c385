//! JSON-LD `@context` handling.
//!
//! Outbound documents get a minimal context: the activity streams
//! vocabulary plus only the extensions the document actually uses. Inbound
//! documents are normalised so that quirks of different servers do not
//! break signature verification or mapping.

use serde_json::{json, Map, Value};

/// Core vocabulary.
pub const ACTIVITYSTREAMS: &str = "https://www.w3.org/ns/activitystreams";
/// Security vocabulary (keys and signatures).
pub const SECURITY: &str = "https://w3id.org/security/v1";
/// The public collection.
pub const PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";

/// A vocabulary extension a document may need.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Extension {
    Sensitive,
    Hashtag,
    ManuallyApprovesFollowers,
    DiasporaGuid,
}

impl Extension {
    pub const ALL: [Extension; 4] = [
        Self::Sensitive,
        Self::Hashtag,
        Self::ManuallyApprovesFollowers,
        Self::DiasporaGuid,
    ];

    /// Term definitions contributed by the extension.
    fn definitions(self) -> Vec<(&'static str, Value)> {
        match self {
            Self::Sensitive => vec![("sensitive", json!("as:sensitive"))],
            Self::Hashtag => vec![("Hashtag", json!("as:Hashtag"))],
            Self::ManuallyApprovesFollowers => vec![(
                "manuallyApprovesFollowers",
                json!("as:manuallyApprovesFollowers"),
            )],
            Self::DiasporaGuid => vec![
                ("diaspora", json!("https://diasporafoundation.org/ns/")),
                ("guid", json!("diaspora:guid")),
            ],
        }
    }
}

#[derive(Default)]
struct Usage {
    extensions: Vec<Extension>,
    security: bool,
}

impl Usage {
    fn add(&mut self, extension: Extension) {
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
    }

    fn walk(&mut self, value: &Value) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    match key.as_str() {
                        "sensitive" => self.add(Extension::Sensitive),
                        "manuallyApprovesFollowers" => self.add(Extension::ManuallyApprovesFollowers),
                        "diaspora:guid" => self.add(Extension::DiasporaGuid),
                        "publicKey" | "signature" => self.security = true,
                        "type" if child == "Hashtag" => self.add(Extension::Hashtag),
                        _ => {}
                    }
                    self.walk(child);
                }
            }
            Value::Array(items) => items.iter().for_each(|item| self.walk(item)),
            _ => {}
        }
    }
}

fn extension_object(extensions: &[Extension]) -> Map<String, Value> {
    let mut object = Map::new();
    for extension in extensions {
        for (term, definition) in extension.definitions() {
            object.insert(term.to_string(), definition);
        }
    }
    object
}

/// Minimal context for an outbound document.
pub fn build_context(document: &Value) -> Value {
    let mut usage = Usage::default();
    usage.walk(document);
    usage.extensions.sort();

    let mut context = vec![json!(ACTIVITYSTREAMS)];
    if usage.security {
        context.push(json!(SECURITY));
    }
    if !usage.extensions.is_empty() {
        context.push(Value::Object(extension_object(&usage.extensions)));
    }
    Value::Array(context)
}

/// Set `@context` as the first key of an outbound document.
pub fn attach_context(document: Value) -> Value {
    let context = build_context(&document);
    let mut out = Map::new();
    out.insert("@context".to_string(), context);
    if let Value::Object(map) = document {
        for (key, value) in map {
            if key != "@context" {
                out.insert(key, value);
            }
        }
    }
    Value::Object(out)
}

/// Add the security vocabulary to a document's context if missing.
pub fn ensure_security(document: &mut Value) {
    let Some(map) = document.as_object_mut() else {
        return;
    };
    let context = map
        .entry("@context")
        .or_insert_with(|| json!([ACTIVITYSTREAMS]));
    if let Value::String(single) = context {
        *context = json!([single.clone()]);
    }
    if let Value::Array(items) = context {
        if !items.iter().any(|item| item == SECURITY) {
            let position = items
                .iter()
                .position(|item| item.is_object())
                .unwrap_or(items.len());
            items.insert(position, json!(SECURITY));
        }
    }
}

/// Normalise an inbound document in place.
///
/// - `Public` and `as:Public` become the full public collection URI
/// - `@language` is dropped from context objects
/// - the security vocabulary is added when the document is signed
/// - the full known extension set is merged into the context
pub fn normalize_inbound(document: &mut Value) {
    rewrite_public(document);
    let signed = document.get("signature").is_some();
    let Some(map) = document.as_object_mut() else {
        return;
    };
    let Some(context) = map.get_mut("@context") else {
        return;
    };
    if let Value::String(single) = context {
        *context = json!([single.clone()]);
    }
    let Value::Array(items) = context else {
        return;
    };

    for item in items.iter_mut() {
        if let Value::Object(object) = item {
            object.remove("@language");
        }
    }
    items.retain(|item| !matches!(item, Value::Object(object) if object.is_empty()));

    if signed && !items.iter().any(|item| item == SECURITY) {
        items.push(json!(SECURITY));
    }

    let mut merged = extension_object(&Extension::ALL);
    items.retain(|item| match item {
        Value::Object(object) => {
            for (key, value) in object {
                merged.insert(key.clone(), value.clone());
            }
            false
        }
        _ => true,
    });
    items.push(Value::Object(merged));
}

fn rewrite_public(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if matches!(key.as_str(), "to" | "cc" | "bto" | "bcc" | "audience") {
                    rewrite_public_addresses(child);
                } else {
                    rewrite_public(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_public),
        _ => {}
    }
}

fn rewrite_public_addresses(value: &mut Value) {
    match value {
        Value::String(address) if address == "Public" || address == "as:Public" => {
            *address = PUBLIC.to_string();
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_public_addresses),
        _ => {}
    }
}

/// True if the public collection appears in `to` or `cc`.
pub fn is_public(document: &Value) -> bool {
    ["to", "cc"].iter().any(|key| {
        document
            .get(*key)
            .map(|value| match value {
                Value::String(s) => is_public_address(s),
                Value::Array(items) => items
                    .iter()
                    .any(|item| item.as_str().is_some_and(is_public_address)),
                _ => false,
            })
            .unwrap_or(false)
    })
}

fn is_public_address(address: &str) -> bool {
    address == PUBLIC || address == "Public" || address == "as:Public"
}
