//! Purpose: Deduplicate relation instances by content fingerprint within named scopes.
//! Exports: `RelationRegistry`, `fingerprint`.
//! Role: Collapses semantically identical relation payloads to one shared instance.
//! Invariants: Check-then-insert is atomic per call; stored instances are never mutated.
//! Invariants: Lifetime (per request vs long-lived) is the constructing host's explicit choice.
use crate::core::entity::{Entity, EntityRef};
use crate::core::error::{Error, ErrorKind};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

/// Scoped dedup cache. A long-lived registry accumulates entries for as long
/// as it lives; hosts wanting per-request scoping construct a fresh instance
/// per request (or call `reset`).
#[derive(Default)]
pub struct RelationRegistry {
    scopes: Mutex<HashMap<String, HashMap<String, EntityRef>>>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `instance` through `scope`: a fingerprint hit returns the
    /// previously stored instance (the passed-in one is dropped), a miss
    /// stores and returns the passed-in instance unchanged.
    pub fn dedupe(&self, scope: &str, instance: EntityRef) -> Result<EntityRef, Error> {
        let key = fingerprint(instance.as_ref())?;
        let mut scopes = self.scopes.lock().map_err(|_| {
            Error::new(ErrorKind::Internal).with_message("relation registry lock poisoned")
        })?;
        let entries = scopes.entry(scope.to_string()).or_default();
        if let Some(existing) = entries.get(&key) {
            tracing::debug!(scope, fingerprint = %key, "registry hit, sharing stored instance");
            return Ok(existing.clone());
        }
        tracing::trace!(scope, fingerprint = %key, "registry miss, storing new instance");
        entries.insert(key, instance.clone());
        Ok(instance)
    }

    /// Number of distinct instances stored under `scope`.
    pub fn scope_len(&self, scope: &str) -> usize {
        match self.scopes.lock() {
            Ok(scopes) => scopes.get(scope).map_or(0, HashMap::len),
            Err(_) => 0,
        }
    }

    /// Drop every scope. Hosts running a long-lived registry call this at
    /// whatever boundary they chose (request end, periodic sweep).
    pub fn reset(&self) {
        if let Ok(mut scopes) = self.scopes.lock() {
            scopes.clear();
        }
    }
}

/// Content fingerprint: hex SHA-256 of the canonical JSON encoding.
pub fn fingerprint(entity: &dyn Entity) -> Result<String, Error> {
    let canonical = entity.canonical_json()?;
    let encoded = serde_json::to_string(&canonical).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("fingerprint encoding failed")
            .with_source(err)
    })?;
    let digest = Sha256::digest(encoded.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}
