//! Purpose: Thin boundary deciding whether a request body feeds a given converter.
//! Exports: `DispatchAdapter`, `DispatchOutcome`, `Attributes`.
//! Role: Parses the raw body, routes the matching top-level key, stores the result.
//! Invariants: A missing top-level key is NotApplicable, never an error.
//! Invariants: Parse failures surface the decoder message as a single-violation report.
use crate::core::builder::{BuildContext, Materialized, Materializer};
use crate::core::entity::{Entity, EntityRef};
use crate::core::error::{Error, ErrorKind};
use crate::core::validate::{Violation, ViolationReport};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchOutcome {
    Applied,
    NotApplicable,
}

/// Bag of named build results, standing in for the host's request
/// attributes.
#[derive(Default)]
pub struct Attributes {
    values: HashMap<String, EntityRef>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, entity: EntityRef) {
        self.values.insert(name.into(), entity);
    }

    pub fn get(&self, name: &str) -> Option<&EntityRef> {
        self.values.get(name)
    }

    /// Typed lookup; `None` when the attribute is unset or of another type.
    pub fn get_as<T: Entity>(&self, name: &str) -> Option<Arc<T>> {
        let entity = self.values.get(name)?.clone();
        crate::core::entity::downcast::<T>(entity).ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// Adapter binding one root converter to the request boundary. The host asks
/// `supports` per declared attribute, then hands matching requests to
/// `apply`.
pub struct DispatchAdapter {
    converter: Arc<dyn Materializer>,
}

impl DispatchAdapter {
    pub fn new(converter: Arc<dyn Materializer>) -> Self {
        Self { converter }
    }

    /// Whether this adapter handles the declared attribute name.
    pub fn supports(&self, attribute: &str) -> bool {
        attribute == self.converter.node_name()
    }

    /// Parse `body`, build the graph for the configured top-level key, and
    /// store it under that key in `attributes`. An empty body or an absent
    /// key leaves the attributes untouched and reports NotApplicable.
    pub fn apply(
        &self,
        body: &str,
        attributes: &mut Attributes,
        ctx: &mut BuildContext<'_>,
    ) -> Result<DispatchOutcome, Error> {
        if body.is_empty() {
            return Ok(DispatchOutcome::NotApplicable);
        }

        let node_name = self.converter.node_name();
        let raw: Value = serde_json::from_str(body).map_err(|err| {
            let mut report = ViolationReport::new();
            report.add(Violation::new(format!("JSON error: {err}"), node_name));
            Error::new(ErrorKind::Malformed)
                .with_message(format!(
                    "wrong parameter to create new {}",
                    self.converter.type_name()
                ))
                .with_report(report)
                .with_source(err)
        })?;

        let Some(node) = raw.get(node_name) else {
            return Ok(DispatchOutcome::NotApplicable);
        };

        let entity = match self.converter.materialize(node, node_name, ctx)? {
            Materialized::One(entity) => entity,
            Materialized::Many(_) => {
                return Err(Error::new(ErrorKind::Malformed)
                    .with_message(format!("{node_name} payload must be a single object"))
                    .with_property_path(node_name)
                    .with_value(node.clone()));
            }
        };

        attributes.set(node_name, entity);
        Ok(DispatchOutcome::Applied)
    }
}
