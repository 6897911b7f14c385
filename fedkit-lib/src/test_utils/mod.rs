//! Test utilities for Fedkit.
//!
//! This module provides testing infrastructure including:
//! - Fixed RSA key pairs and the local users `alice` and `bob`
//! - Payload fixtures for both protocols
//! - In-memory resolver, fetcher and sender collaborators
//! - Assertion helpers for pipeline results
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fedkit_lib::test_utils::{alice, RecordingSender, StaticResolver};
//!
//! let resolver = StaticResolver::new().with_profile(alice().profile());
//! let sender = RecordingSender::new();
//! ```

mod assertions;
mod fixtures;
mod mock_network;

pub use fixtures::{
    alice, alice_private_key, alice_public_key, bob, bob_private_key, bob_public_key, fixed_time,
    ACTIVITYPUB_NOTE, ALICE_HANDLE, ALICE_ID, ALICE_PRIVATE_PEM, ALICE_PUBLIC_PEM, BOB_HANDLE,
    BOB_ID, BOB_PRIVATE_PEM, BOB_PUBLIC_PEM, DIASPORA_PROFILE,
};

pub use mock_network::{
    RecordingSender, SentDocument, SortedKeysCanonicalizer, StaticFetcher, StaticResolver,
};

pub use assertions::{assert_entity_kinds, assert_error_code, assert_valid};
