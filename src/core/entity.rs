//! Purpose: Define the trait implemented by every materializable target type.
//! Exports: `Entity`, `EntityRef`, `downcast`, `canonical_value`, `relation_mismatch`.
//! Role: Object-safe seam between the generic builder and concrete domain types.
//! Invariants: `canonical_json` is deterministic for a given instance (sorted keys).
//! Invariants: Shared instances are `Arc`-shared; the registry never clones entity data.
use crate::core::error::{Error, ErrorKind};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// A materializable type. Instances are built by an `EntityConverter`, shared
/// through the relation registry, and attached to parents via checked
/// downcasts.
pub trait Entity: Any + Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Canonical JSON encoding used for registry fingerprints. Must be
    /// deterministic; `canonical_value` gives the sorted-key encoding for
    /// any `Serialize` type.
    fn canonical_json(&self) -> Result<Value, Error>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

pub type EntityRef = Arc<dyn Entity>;

/// Encode a `Serialize` type for fingerprinting. `serde_json`'s default map
/// representation sorts keys, so equal values always encode identically.
pub fn canonical_value<T: Serialize>(entity: &T) -> Result<Value, Error> {
    serde_json::to_value(entity).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("canonical encoding failed")
            .with_source(err)
    })
}

/// Checked downcast of a shared entity. Returns the original reference on
/// mismatch so callers can report the actual type.
pub fn downcast<T: Entity>(entity: EntityRef) -> Result<Arc<T>, EntityRef> {
    if !entity.as_any().is::<T>() {
        return Err(entity);
    }
    match entity.into_any().downcast::<T>() {
        Ok(typed) => Ok(typed),
        Err(_) => unreachable!("concrete type checked before downcast"),
    }
}

/// Error for a relation attach whose converter produced the wrong type.
/// Always a wiring bug, never a data problem.
pub fn relation_mismatch(expected: &'static str, actual: &'static str) -> Error {
    Error::new(ErrorKind::Config)
        .with_message(format!("relation type mismatch: expected {expected}, got {actual}"))
}
