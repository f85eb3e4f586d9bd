//! Purpose: Declarative classification of a target type's properties for the graph builder.
//! Exports: `TypeDescriptor`, `DescriptorBuilder`, `ScalarSpec`, `RelationSpec`, coercion helpers.
//! Role: Replaces reflection with a typed write-function table fixed at configuration time.
//! Invariants: The three property categories are disjoint; violations fail descriptor construction.
//! Invariants: Descriptors are immutable once built; lookups are pure.
use crate::core::builder::Materializer;
use crate::core::entity::EntityRef;
use crate::core::error::{Error, ErrorKind};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub type WriteFn<T> = fn(&mut T, &Value) -> Result<(), Error>;
pub type AttachFn<T> = fn(&mut T, EntityRef) -> Result<(), Error>;
pub type CallbackFn<T> = fn(&EntityRef, &mut T) -> Result<(), Error>;

/// Scalar property: value copied from JSON through a typed writer.
pub struct ScalarSpec<T> {
    name: &'static str,
    write: WriteFn<T>,
}

impl<T> ScalarSpec<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn write(&self, target: &mut T, value: &Value) -> Result<(), Error> {
        (self.write)(target, value)
    }
}

/// Relation property: materialized through a converter, then attached to the
/// parent via a typed attach function. Multiplicity is fixed by which
/// builder method registered the spec, never inferred from the JSON shape.
pub struct RelationSpec<T> {
    name: &'static str,
    converter: Arc<dyn Materializer>,
    attach: AttachFn<T>,
    registry_scope: Option<&'static str>,
    callback: Option<CallbackFn<T>>,
}

impl<T> RelationSpec<T> {
    pub fn new(name: &'static str, converter: Arc<dyn Materializer>, attach: AttachFn<T>) -> Self {
        Self {
            name,
            converter,
            attach,
            registry_scope: None,
            callback: None,
        }
    }

    /// Dedup scope for this relation; identical payloads within one scope
    /// collapse to a single shared instance. Scopes apply to single
    /// relations only; `DescriptorBuilder::build` rejects a scoped multi
    /// spec.
    pub fn with_registry_scope(mut self, scope: &'static str) -> Self {
        self.registry_scope = Some(scope);
        self
    }

    /// Hook invoked with `(relation, parent_so_far)` before each attachment,
    /// for cross-wiring such as back-references.
    pub fn with_callback(mut self, callback: CallbackFn<T>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn converter(&self) -> &dyn Materializer {
        self.converter.as_ref()
    }

    pub fn registry_scope(&self) -> Option<&'static str> {
        self.registry_scope
    }

    pub fn callback(&self) -> Option<CallbackFn<T>> {
        self.callback
    }

    pub fn attach(&self, target: &mut T, relation: EntityRef) -> Result<(), Error> {
        (self.attach)(target, relation)
    }
}

/// Field classifier for one target type: identity plus the three disjoint
/// property categories.
pub struct TypeDescriptor<T> {
    type_name: &'static str,
    node_name: &'static str,
    scalars: Vec<ScalarSpec<T>>,
    singles: Vec<RelationSpec<T>>,
    multis: Vec<RelationSpec<T>>,
}

impl<T> TypeDescriptor<T> {
    pub fn builder(type_name: &'static str, node_name: &'static str) -> DescriptorBuilder<T> {
        DescriptorBuilder {
            type_name,
            node_name,
            scalars: Vec::new(),
            singles: Vec::new(),
            multis: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn node_name(&self) -> &'static str {
        self.node_name
    }

    pub fn scalar_properties(&self) -> &[ScalarSpec<T>] {
        &self.scalars
    }

    pub fn single_relations(&self) -> &[RelationSpec<T>] {
        &self.singles
    }

    pub fn multi_relations(&self) -> &[RelationSpec<T>] {
        &self.multis
    }
}

// Write/attach tables carry no useful output; show the classification only.
impl<T> fmt::Debug for TypeDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |specs: &[RelationSpec<T>]| -> Vec<&'static str> {
            specs.iter().map(|spec| spec.name).collect()
        };
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("node_name", &self.node_name)
            .field(
                "scalars",
                &self.scalars.iter().map(|spec| spec.name).collect::<Vec<_>>(),
            )
            .field("singles", &names(&self.singles))
            .field("multis", &names(&self.multis))
            .finish()
    }
}

/// Fail-fast descriptor construction. Identity or category mistakes are
/// wiring bugs, surfaced here at configuration time rather than per request.
pub struct DescriptorBuilder<T> {
    type_name: &'static str,
    node_name: &'static str,
    scalars: Vec<ScalarSpec<T>>,
    singles: Vec<RelationSpec<T>>,
    multis: Vec<RelationSpec<T>>,
}

impl<T> DescriptorBuilder<T> {
    pub fn scalar(mut self, name: &'static str, write: WriteFn<T>) -> Self {
        self.scalars.push(ScalarSpec { name, write });
        self
    }

    pub fn single(mut self, spec: RelationSpec<T>) -> Self {
        self.singles.push(spec);
        self
    }

    pub fn multi(mut self, spec: RelationSpec<T>) -> Self {
        self.multis.push(spec);
        self
    }

    pub fn build(self) -> Result<TypeDescriptor<T>, Error> {
        if self.type_name.is_empty() || self.node_name.is_empty() {
            return Err(Error::new(ErrorKind::Config)
                .with_message("descriptor must declare both a type name and a JSON node name"));
        }

        let mut seen = HashSet::new();
        let names = self
            .scalars
            .iter()
            .map(|spec| spec.name)
            .chain(self.singles.iter().map(|spec| spec.name))
            .chain(self.multis.iter().map(|spec| spec.name));
        for name in names {
            if name.is_empty() {
                return Err(Error::new(ErrorKind::Config).with_message(format!(
                    "descriptor for {} declares a property with an empty name",
                    self.type_name
                )));
            }
            if !seen.insert(name) {
                return Err(Error::new(ErrorKind::Config).with_message(format!(
                    "descriptor for {} declares property {name} in more than one place",
                    self.type_name
                )));
            }
        }

        if let Some(spec) = self.multis.iter().find(|spec| spec.registry_scope.is_some()) {
            return Err(Error::new(ErrorKind::Config).with_message(format!(
                "multi relation {} on {} cannot use a registry scope; dedup applies to single relations",
                spec.name, self.type_name
            )));
        }

        Ok(TypeDescriptor {
            type_name: self.type_name,
            node_name: self.node_name,
            scalars: self.scalars,
            singles: self.singles,
            multis: self.multis,
        })
    }
}

fn wrong_type(property: &str, expected: &str, value: &Value) -> Error {
    Error::new(ErrorKind::Malformed)
        .with_message(format!("{property} must be {expected}"))
        .with_property_path(property)
        .with_value(value.clone())
}

pub fn expect_str(value: &Value, property: &str) -> Result<String, Error> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(property, "a string", value))
}

pub fn expect_i64(value: &Value, property: &str) -> Result<i64, Error> {
    value
        .as_i64()
        .ok_or_else(|| wrong_type(property, "an integer", value))
}

pub fn expect_f64(value: &Value, property: &str) -> Result<f64, Error> {
    value
        .as_f64()
        .ok_or_else(|| wrong_type(property, "a number", value))
}

pub fn expect_bool(value: &Value, property: &str) -> Result<bool, Error> {
    value
        .as_bool()
        .ok_or_else(|| wrong_type(property, "a boolean", value))
}
