//! Profile lookup by fetching actor documents.

use serde_json::Value;
use tracing::debug;

use super::mappers::{id_of, profile_from_document, type_of, ACTOR_TYPES};
use crate::entities::Profile;
use crate::transport::{DocumentFetcher, ProfileResolver};
use crate::{FederationError, Result};

/// Resolves actor ids and key ids through a [`DocumentFetcher`].
///
/// A key id (`https://host/u/alice#main-key`) is fetched without its
/// fragment. If the response is a key document rather than an actor, its
/// `owner` is fetched in turn. Handles cannot be resolved this way and
/// yield `Ok(None)`.
///
/// Every fetched document must carry the id it was fetched by, and the
/// requested key must be published by the actor that owns it. A document
/// that breaks either rule fails with `SignatureVerification`.
///
/// Wrap the fetcher in a [`CachingFetcher`](crate::cache::CachingFetcher)
/// to avoid refetching the same actor for every request.
pub struct ActivityPubResolver<F> {
    fetcher: F,
}

impl<F: DocumentFetcher> ActivityPubResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    fn fetch_json(&self, url: &str) -> Result<Option<Value>> {
        let document = self.fetcher.fetch(url)?;
        if !document.is_success() {
            debug!(url, status = document.status, "actor fetch failed");
            return Ok(None);
        }
        match serde_json::from_str(&document.body) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!(url, error = %err, "actor document is not JSON");
                Ok(None)
            }
        }
    }
}

impl<F: DocumentFetcher> ProfileResolver for ActivityPubResolver<F> {
    fn resolve(&self, identifier: &str) -> Result<Option<Profile>> {
        if !(identifier.starts_with("https://") || identifier.starts_with("http://")) {
            return Ok(None);
        }
        let url = without_fragment(identifier);
        let Some(document) = self.fetch_json(url)? else {
            return Ok(None);
        };
        if id_of(&document).map(without_fragment) != Some(url) {
            return Err(mismatch(format!("document fetched from {} claims another id", url)));
        }

        if type_of(&document).is_some_and(|kind| ACTOR_TYPES.contains(&kind)) {
            let key_id = (identifier != url).then_some(identifier);
            return actor_profile(&document, url, key_id).map(Some);
        }

        // A standalone key document: its owner must list this key.
        let owner = document
            .get("owner")
            .and_then(Value::as_str)
            .filter(|owner| *owner != url);
        let Some(owner) = owner else {
            return Ok(None);
        };
        let Some(actor) = self.fetch_json(owner)? else {
            return Ok(None);
        };
        if id_of(&actor) != Some(owner) {
            return Err(mismatch(format!("document fetched from {} claims another id", owner)));
        }
        actor_profile(&actor, owner, Some(identifier)).map(Some)
    }
}

fn without_fragment(id: &str) -> &str {
    id.split('#').next().unwrap_or(id)
}

fn mismatch(reason: String) -> FederationError {
    FederationError::SignatureVerification(reason)
}

fn key_entries(actor: &Value) -> Vec<&Value> {
    match actor.get("publicKey") {
        Some(Value::Array(keys)) => keys.iter().collect(),
        Some(key @ Value::Object(_)) => vec![key],
        _ => Vec::new(),
    }
}

/// Profile of an actor document whose id is `actor_id`.
///
/// With `key_id`, the actor must publish that key and own it. Without one,
/// the first published key is used and must be owned by the actor.
fn actor_profile(actor: &Value, actor_id: &str, key_id: Option<&str>) -> Result<Profile> {
    let mut profile = profile_from_document(actor)
        .ok_or_else(|| mismatch(format!("{} is not an actor", actor_id)))?;
    let keys = key_entries(actor);
    let key = match key_id {
        Some(key_id) => keys
            .into_iter()
            .find(|key| key.get("id").and_then(Value::as_str) == Some(key_id))
            .ok_or_else(|| mismatch(format!("{} does not publish key {}", actor_id, key_id)))?,
        None => match keys.into_iter().next() {
            Some(key) => key,
            None => return Ok(profile),
        },
    };
    if key.get("owner").and_then(Value::as_str) != Some(actor_id) {
        return Err(mismatch(format!("key of {} has another owner", actor_id)));
    }
    profile.public_key = key
        .get("publicKeyPem")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(profile)
}
