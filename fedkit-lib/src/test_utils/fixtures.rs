//! Fixed keys, users, timestamps and payloads.

use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::crypto::{parse_private_key, parse_public_key};
use crate::LocalUser;

pub const ALICE_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/alice_private.pem");
pub const ALICE_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/alice_public.pem");
pub const BOB_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/bob_private.pem");
pub const BOB_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/bob_public.pem");

pub const ALICE_ID: &str = "https://example.com/u/alice";
pub const ALICE_HANDLE: &str = "alice@example.com";
pub const BOB_ID: &str = "https://example.org/u/bob";
pub const BOB_HANDLE: &str = "bob@example.org";

/// Diaspora profile of `bob@example.com`.
pub const DIASPORA_PROFILE: &str = "<profile>\
<author>bob@example.com</author>\
<first_name>Bob</first_name>\
<last_name>Bobertson</last_name>\
<image_url>https://example.com/uploads/images/thumb_large_a795f872c93309597345.jpg</image_url>\
<image_url_medium>https://example.com/uploads/images/thumb_medium_a795f872c93309597345.jpg</image_url_medium>\
<image_url_small>https://example.com/uploads/images/thumb_small_a795f872c93309597345.jpg</image_url_small>\
<gender></gender>\
<bio>A cool bio</bio>\
<location>Helsinki</location>\
<searchable>true</searchable>\
<nsfw>false</nsfw>\
<tag_string>#socialfederation #federation</tag_string>\
</profile>";

/// Mastodon-style public note by [`ALICE_ID`].
pub const ACTIVITYPUB_NOTE: &str = r##"{
  "@context": ["https://www.w3.org/ns/activitystreams", {"@language": "und", "sensitive": "as:sensitive"}],
  "id": "https://example.com/u/alice/statuses/1/activity",
  "type": "Create",
  "actor": "https://example.com/u/alice",
  "published": "2019-03-18T11:22:33Z",
  "to": ["as:Public"],
  "cc": ["https://example.com/u/alice/followers"],
  "object": {
    "id": "https://example.com/u/alice/statuses/1",
    "type": "Note",
    "attributedTo": "https://example.com/u/alice",
    "content": "<p>Hello <a href=\"https://example.com/tags/fediverse\">#fediverse</a></p>",
    "published": "2019-03-18T11:22:33Z",
    "to": ["as:Public"],
    "cc": ["https://example.com/u/alice/followers"],
    "sensitive": false,
    "tag": [{"type": "Hashtag", "name": "#fediverse", "href": "https://example.com/tags/fediverse"}]
  }
}"##;

/// 2019-03-18T11:22:33Z
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 3, 18, 11, 22, 33).unwrap()
}

pub fn alice_private_key() -> RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| parse_private_key(ALICE_PRIVATE_PEM).unwrap())
        .clone()
}

pub fn alice_public_key() -> RsaPublicKey {
    parse_public_key(ALICE_PUBLIC_PEM).unwrap()
}

pub fn bob_private_key() -> RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| parse_private_key(BOB_PRIVATE_PEM).unwrap())
        .clone()
}

pub fn bob_public_key() -> RsaPublicKey {
    parse_public_key(BOB_PUBLIC_PEM).unwrap()
}

/// Local user with id [`ALICE_ID`], handle [`ALICE_HANDLE`] and Alice's key.
pub fn alice() -> LocalUser {
    LocalUser::new(ALICE_ID, ALICE_HANDLE).with_private_key(alice_private_key())
}

/// Local user with id [`BOB_ID`], handle [`BOB_HANDLE`] and Bob's key.
pub fn bob() -> LocalUser {
    LocalUser::new(BOB_ID, BOB_HANDLE).with_private_key(bob_private_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_keys_match() {
        assert_eq!(alice_private_key().to_public_key(), alice_public_key());
        assert_eq!(bob_private_key().to_public_key(), bob_public_key());
        assert_ne!(alice_public_key(), bob_public_key());
    }

    #[test]
    fn test_users() {
        assert_eq!(alice().key_id(), "https://example.com/u/alice#main-key");
        assert_eq!(bob().public_key().unwrap(), bob_public_key());
    }
}
