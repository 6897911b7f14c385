//! Assertion helpers for pipeline results.

use std::fmt::Debug;

use crate::entities::{Entity, EntityKind};
use crate::errors::FederationErrorCode;
use crate::Result;

/// Assert that `result` failed with `code`.
///
/// # Panics
/// Panics if the result is `Ok` or carries a different code.
pub fn assert_error_code<T: Debug>(result: &Result<T>, code: FederationErrorCode) {
    match result {
        Ok(value) => panic!("expected {:?} error, got Ok({:?})", code, value),
        Err(err) => assert_eq!(err.code(), code, "unexpected error: {}", err),
    }
}

/// Assert the kinds of decoded entities, in order.
///
/// # Panics
/// Panics if the kinds differ.
pub fn assert_entity_kinds(entities: &[Entity], kinds: &[EntityKind]) {
    let actual: Vec<EntityKind> = entities.iter().map(Entity::kind).collect();
    assert_eq!(actual, kinds, "decoded entities: {:?}", entities);
}

/// Assert that an entity passes validation.
///
/// # Panics
/// Panics with the validation issues otherwise.
pub fn assert_valid(entity: &Entity) {
    if let Err(err) = entity.validate() {
        panic!("{} should be valid: {}", entity.kind(), err);
    }
}
