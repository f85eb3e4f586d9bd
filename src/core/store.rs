//! Purpose: Abstract load-by-id collaborator used when a relation arrives as a bare identifier.
//! Exports: `EntityStore`, `MemoryStore`, `NoStore`.
//! Role: Persistence seam; the core never talks to a database directly.
//! Invariants: A miss is `Ok(None)`; the builder turns it into a NotFound error with context.
use crate::core::entity::EntityRef;
use crate::core::error::{Error, ErrorKind};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Lookup of an existing record by type name and identifier. Identifiers are
/// the raw JSON scalar from the payload (string or number).
pub trait EntityStore: Send + Sync {
    fn load_by_id(&self, type_name: &str, id: &Value) -> Result<Option<EntityRef>, Error>;
}

/// Store for hosts whose payloads always embed relations. Every lookup
/// misses, so a bare-id relation surfaces as NotFound.
pub struct NoStore;

impl EntityStore for NoStore {
    fn load_by_id(&self, _type_name: &str, _id: &Value) -> Result<Option<EntityRef>, Error> {
        Ok(None)
    }
}

/// In-memory store keyed by `(type name, id)`. Reference implementation for
/// tests and single-process hosts.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, String), EntityRef>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, type_name: &str, id: &Value, entity: EntityRef) {
        if let Ok(mut records) = self.records.lock() {
            records.insert((type_name.to_string(), id.to_string()), entity);
        }
    }
}

impl EntityStore for MemoryStore {
    fn load_by_id(&self, type_name: &str, id: &Value) -> Result<Option<EntityRef>, Error> {
        let records = self.records.lock().map_err(|_| {
            Error::new(ErrorKind::Internal).with_message("memory store lock poisoned")
        })?;
        Ok(records
            .get(&(type_name.to_string(), id.to_string()))
            .cloned())
    }
}
