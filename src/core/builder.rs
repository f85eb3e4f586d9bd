//! Purpose: Recursive graph builder turning JSON objects into validated entity graphs.
//! Exports: `Materializer`, `Materialized`, `BuildContext`, `EntityConverter`.
//! Role: Core algorithm; descriptors say what to populate, this module does the walking.
//! Invariants: Passes run scalars, then multi-relations, then single-relations, then validation.
//! Invariants: Absent or null JSON keys are skipped; the type default stands.
//! Invariants: Attach failures are warn-logged and raised, never swallowed.
use crate::core::descriptor::{RelationSpec, TypeDescriptor};
use crate::core::entity::{Entity, EntityRef};
use crate::core::error::{Error, ErrorKind};
use crate::core::registry::RelationRegistry;
use crate::core::store::EntityStore;
use crate::core::validate::Validator;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Result of materializing a JSON fragment: one instance for object or
/// identifier input, a sequence for array input.
pub enum Materialized {
    One(EntityRef),
    Many(Vec<EntityRef>),
}

/// A component able to materialize relation instances from JSON fragments.
/// The builder depends only on this seam; `EntityConverter` is the stock
/// implementation.
pub trait Materializer: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Top-level JSON key this converter answers to.
    fn node_name(&self) -> &'static str;

    /// Property name treated as the identifier in reference payloads.
    fn id_property(&self) -> &str {
        "id"
    }

    fn materialize(
        &self,
        json: &Value,
        property: &str,
        ctx: &mut BuildContext<'_>,
    ) -> Result<Materialized, Error>;
}

// Property-path stack rendered as `parent.child[2].leaf` for diagnostics.
#[derive(Default)]
struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    fn pop(&mut self) {
        self.segments.pop();
    }

    fn render(&self) -> String {
        self.segments.join(".").replace(".[", "[")
    }
}

/// Collaborators for one build invocation. The registry instance decides the
/// dedup lifetime: hand every request a fresh one for per-request scoping,
/// or share one long-lived instance and own the retention consequences.
pub struct BuildContext<'a> {
    registry: &'a RelationRegistry,
    store: &'a dyn EntityStore,
    validator: &'a dyn Validator,
    path: PropertyPath,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        registry: &'a RelationRegistry,
        store: &'a dyn EntityStore,
        validator: &'a dyn Validator,
    ) -> Self {
        Self {
            registry,
            store,
            validator,
            path: PropertyPath::default(),
        }
    }

    /// Current position in the payload, for diagnostics.
    pub fn property_path(&self) -> String {
        self.path.render()
    }
}

/// Descriptor-driven materializer for one target type. Recursion happens
/// through the relation specs' converters, which are `Materializer`
/// implementations themselves.
pub struct EntityConverter<T> {
    descriptor: TypeDescriptor<T>,
    id_property: String,
}

impl<T: Entity + Default> EntityConverter<T> {
    pub fn new(descriptor: TypeDescriptor<T>) -> Self {
        Self {
            descriptor,
            id_property: "id".to_string(),
        }
    }

    pub fn with_id_property(mut self, name: impl Into<String>) -> Self {
        self.id_property = name.into();
        self
    }

    pub fn descriptor(&self) -> &TypeDescriptor<T> {
        &self.descriptor
    }

    /// Build one typed instance from a JSON object. Root entry point; the
    /// object-safe path goes through `Materializer::materialize`.
    pub fn build(&self, json: &Value, ctx: &mut BuildContext<'_>) -> Result<Arc<T>, Error> {
        ctx.path.push(self.descriptor.node_name());
        let result = match json.as_object() {
            Some(map) => self.build_entity(map, ctx),
            None => Err(Error::new(ErrorKind::Malformed)
                .with_message(format!(
                    "{} payload must be a JSON object",
                    self.descriptor.node_name()
                ))
                .with_property_path(ctx.path.render())
                .with_value(json.clone())),
        };
        ctx.path.pop();
        result
    }

    fn build_entity(
        &self,
        map: &Map<String, Value>,
        ctx: &mut BuildContext<'_>,
    ) -> Result<Arc<T>, Error> {
        let mut entity = T::default();
        self.apply_scalars(map, &mut entity, ctx)?;
        self.apply_multi_relations(map, &mut entity, ctx)?;
        self.apply_single_relations(map, &mut entity, ctx)?;
        self.run_validation(&entity, ctx)?;
        Ok(Arc::new(entity))
    }

    fn apply_scalars(
        &self,
        map: &Map<String, Value>,
        entity: &mut T,
        ctx: &mut BuildContext<'_>,
    ) -> Result<(), Error> {
        for spec in self.descriptor.scalar_properties() {
            let Some(value) = map.get(spec.name()) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            ctx.path.push(spec.name());
            let full_path = ctx.path.render();
            let written = spec.write(entity, value);
            ctx.path.pop();
            written.map_err(|err| err.with_property_path(full_path))?;
        }
        Ok(())
    }

    fn apply_multi_relations(
        &self,
        map: &Map<String, Value>,
        entity: &mut T,
        ctx: &mut BuildContext<'_>,
    ) -> Result<(), Error> {
        for spec in self.descriptor.multi_relations() {
            let Some(value) = map.get(spec.name()) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if !value.is_array() {
                ctx.path.push(spec.name());
                let full_path = ctx.path.render();
                ctx.path.pop();
                return Err(Error::new(ErrorKind::Malformed)
                    .with_message(format!("{} must be a sequence", spec.name()))
                    .with_property_path(full_path)
                    .with_value(value.clone()));
            }

            let relations = match spec.converter().materialize(value, spec.name(), ctx)? {
                Materialized::Many(relations) => relations,
                Materialized::One(_) => {
                    return Err(Error::new(ErrorKind::Config).with_message(format!(
                        "converter for {} produced a single instance for a sequence",
                        spec.name()
                    )));
                }
            };

            ctx.path.push(spec.name());
            let attached = self.attach_sequence(entity, spec, relations, ctx);
            ctx.path.pop();
            attached?;
        }
        Ok(())
    }

    // Per element: callback first (cross-wiring), then attach, in input order.
    fn attach_sequence(
        &self,
        entity: &mut T,
        spec: &RelationSpec<T>,
        relations: Vec<EntityRef>,
        ctx: &mut BuildContext<'_>,
    ) -> Result<(), Error> {
        for (index, relation) in relations.into_iter().enumerate() {
            ctx.path.push(format!("[{index}]"));
            let result = self.wire_and_attach(entity, spec, relation, ctx);
            ctx.path.pop();
            result?;
        }
        Ok(())
    }

    fn wire_and_attach(
        &self,
        entity: &mut T,
        spec: &RelationSpec<T>,
        relation: EntityRef,
        ctx: &BuildContext<'_>,
    ) -> Result<(), Error> {
        if let Some(callback) = spec.callback() {
            callback(&relation, entity)
                .map_err(|err| err.with_property_path(ctx.path.render()))?;
        }
        self.attach_relation(entity, spec, relation, ctx)
    }

    fn apply_single_relations(
        &self,
        map: &Map<String, Value>,
        entity: &mut T,
        ctx: &mut BuildContext<'_>,
    ) -> Result<(), Error> {
        for spec in self.descriptor.single_relations() {
            let Some(value) = map.get(spec.name()) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if value.is_array() {
                ctx.path.push(spec.name());
                let full_path = ctx.path.render();
                ctx.path.pop();
                return Err(Error::new(ErrorKind::Malformed)
                    .with_message(format!("{} holds exactly one related object", spec.name()))
                    .with_property_path(full_path)
                    .with_value(value.clone()));
            }

            let relation = match spec.converter().materialize(value, spec.name(), ctx)? {
                Materialized::One(relation) => relation,
                Materialized::Many(_) => {
                    return Err(Error::new(ErrorKind::Config).with_message(format!(
                        "converter for {} produced a sequence for a single relation",
                        spec.name()
                    )));
                }
            };

            let relation = match spec.registry_scope() {
                Some(scope) => ctx.registry.dedupe(scope, relation)?,
                None => relation,
            };

            ctx.path.push(spec.name());
            let attached = self.attach_relation(entity, spec, relation, ctx);
            ctx.path.pop();
            attached?;
        }
        Ok(())
    }

    fn attach_relation(
        &self,
        entity: &mut T,
        spec: &RelationSpec<T>,
        relation: EntityRef,
        ctx: &BuildContext<'_>,
    ) -> Result<(), Error> {
        let relation_type = relation.type_name();
        match spec.attach(entity, relation) {
            Ok(()) => Ok(()),
            Err(err) => {
                let full_path = ctx.path.render();
                tracing::warn!(
                    property = %full_path,
                    parent = self.descriptor.type_name(),
                    relation = relation_type,
                    "relation attach failed: {err}"
                );
                Err(err.with_property_path(full_path))
            }
        }
    }

    fn run_validation(&self, entity: &T, ctx: &mut BuildContext<'_>) -> Result<(), Error> {
        let report = ctx.validator.validate(entity);
        if report.is_empty() {
            return Ok(());
        }
        Err(Error::new(ErrorKind::Validation)
            .with_message(format!(
                "validation failed for {}",
                self.descriptor.type_name()
            ))
            .with_property_path(ctx.path.render())
            .with_report(report))
    }

    fn materialize_value(
        &self,
        json: &Value,
        ctx: &mut BuildContext<'_>,
    ) -> Result<Materialized, Error> {
        match json {
            Value::Array(items) => {
                let mut relations = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    ctx.path.push(format!("[{index}]"));
                    let built = self.materialize_one(item, ctx);
                    ctx.path.pop();
                    relations.push(built?);
                }
                Ok(Materialized::Many(relations))
            }
            _ => Ok(Materialized::One(self.materialize_one(json, ctx)?)),
        }
    }

    // Object payload: embedded build. Scalar payload: identifier lookup.
    fn materialize_one(&self, json: &Value, ctx: &mut BuildContext<'_>) -> Result<EntityRef, Error> {
        match json {
            Value::Object(map) => {
                let entity: EntityRef = self.build_entity(map, ctx)?;
                Ok(entity)
            }
            Value::String(_) | Value::Number(_) => self.load_reference(json, ctx),
            other => Err(Error::new(ErrorKind::Malformed)
                .with_message(format!(
                    "{} must be an embedded object or an identifier",
                    self.descriptor.type_name()
                ))
                .with_property_path(ctx.path.render())
                .with_value(other.clone())),
        }
    }

    fn load_reference(&self, id: &Value, ctx: &mut BuildContext<'_>) -> Result<EntityRef, Error> {
        match ctx.store.load_by_id(self.descriptor.type_name(), id)? {
            Some(entity) => Ok(entity),
            None => Err(Error::new(ErrorKind::NotFound)
                .with_message(format!(
                    "{} {id} does not exist",
                    self.descriptor.type_name()
                ))
                .with_property_path(ctx.path.render())
                .with_value(id.clone())),
        }
    }
}

impl<T: Entity + Default> Materializer for EntityConverter<T> {
    fn type_name(&self) -> &'static str {
        self.descriptor.type_name()
    }

    fn node_name(&self) -> &'static str {
        self.descriptor.node_name()
    }

    fn id_property(&self) -> &str {
        &self.id_property
    }

    fn materialize(
        &self,
        json: &Value,
        property: &str,
        ctx: &mut BuildContext<'_>,
    ) -> Result<Materialized, Error> {
        ctx.path.push(property);
        let result = self.materialize_value(json, ctx);
        ctx.path.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildContext, EntityConverter, Materializer};
    use crate::core::descriptor::{RelationSpec, TypeDescriptor, expect_str};
    use crate::core::entity::{Entity, EntityRef, canonical_value, downcast, relation_mismatch};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::registry::RelationRegistry;
    use crate::core::store::{MemoryStore, NoStore};
    use crate::core::validate::AcceptAll;
    use serde::Serialize;
    use serde_json::{Value, json};
    use std::any::Any;
    use std::sync::Arc;

    #[derive(Debug, Default, Serialize)]
    struct Tag {
        label: String,
    }

    impl Entity for Tag {
        fn type_name(&self) -> &'static str {
            "Tag"
        }

        fn canonical_json(&self) -> Result<Value, Error> {
            canonical_value(self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[derive(Debug, Default, Serialize)]
    struct Note {
        title: String,
        body: String,
        #[serde(skip)]
        tags: Vec<Arc<Tag>>,
    }

    impl Entity for Note {
        fn type_name(&self) -> &'static str {
            "Note"
        }

        fn canonical_json(&self) -> Result<Value, Error> {
            canonical_value(self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn tag_converter() -> Arc<dyn Materializer> {
        let descriptor = TypeDescriptor::<Tag>::builder("Tag", "tag")
            .scalar("label", |tag, value| {
                tag.label = expect_str(value, "label")?;
                Ok(())
            })
            .build()
            .expect("tag descriptor");
        Arc::new(EntityConverter::new(descriptor))
    }

    fn attach_tag(note: &mut Note, relation: EntityRef) -> Result<(), Error> {
        let tag = downcast::<Tag>(relation)
            .map_err(|other| relation_mismatch("Tag", other.type_name()))?;
        note.tags.push(tag);
        Ok(())
    }

    fn note_converter() -> EntityConverter<Note> {
        let descriptor = TypeDescriptor::<Note>::builder("Note", "note")
            .scalar("title", |note, value| {
                note.title = expect_str(value, "title")?;
                Ok(())
            })
            .scalar("body", |note, value| {
                note.body = expect_str(value, "body")?;
                Ok(())
            })
            .multi(RelationSpec::new("tags", tag_converter(), attach_tag))
            .build()
            .expect("note descriptor");
        EntityConverter::new(descriptor)
    }

    #[test]
    fn scalar_round_trip_and_defaults() {
        let registry = RelationRegistry::new();
        let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
        let converter = note_converter();

        let note = converter
            .build(&json!({"title": "A", "body": null}), &mut ctx)
            .expect("build");
        assert_eq!(note.title, "A");
        assert_eq!(note.body, "");
        assert!(note.tags.is_empty());
    }

    #[test]
    fn multi_relations_preserve_input_order() {
        let registry = RelationRegistry::new();
        let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
        let converter = note_converter();

        let note = converter
            .build(
                &json!({"title": "A", "tags": [{"label": "t1"}, {"label": "t2"}, {"label": "t3"}]}),
                &mut ctx,
            )
            .expect("build");
        let labels: Vec<&str> = note.tags.iter().map(|tag| tag.label.as_str()).collect();
        assert_eq!(labels, ["t1", "t2", "t3"]);
    }

    #[test]
    fn non_object_root_is_malformed() {
        let registry = RelationRegistry::new();
        let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
        let converter = note_converter();

        let err = converter.build(&json!("not an object"), &mut ctx).expect_err("root");
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.property_path(), Some("note"));
    }

    #[test]
    fn multi_relation_requires_a_sequence() {
        let registry = RelationRegistry::new();
        let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
        let converter = note_converter();

        let err = converter
            .build(&json!({"tags": {"label": "t1"}}), &mut ctx)
            .expect_err("shape");
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.property_path(), Some("note.tags"));
    }

    #[test]
    fn scalar_type_error_names_the_nested_path() {
        let registry = RelationRegistry::new();
        let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
        let converter = note_converter();

        let err = converter
            .build(&json!({"tags": [{"label": "ok"}, {"label": 7}]}), &mut ctx)
            .expect_err("nested scalar");
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.property_path(), Some("note.tags[1].label"));
        assert_eq!(err.value(), Some(&json!(7)));
    }

    #[test]
    fn bare_identifier_resolves_through_the_store() {
        let store = MemoryStore::new();
        store.insert(
            "Tag",
            &json!(42),
            Arc::new(Tag {
                label: "stored".to_string(),
            }),
        );
        let registry = RelationRegistry::new();
        let mut ctx = BuildContext::new(&registry, &store, &AcceptAll);
        let converter = note_converter();

        let note = converter
            .build(&json!({"tags": [42]}), &mut ctx)
            .expect("build");
        assert_eq!(note.tags[0].label, "stored");
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let registry = RelationRegistry::new();
        let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
        let converter = note_converter();

        let err = converter
            .build(&json!({"tags": [42]}), &mut ctx)
            .expect_err("missing record");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.property_path(), Some("note.tags[0]"));
        assert_eq!(err.value(), Some(&json!(42)));
    }

    #[test]
    fn attach_mismatch_is_a_config_error() {
        // A Note-producing converter wired into a slot whose attach expects Tag.
        let inner = TypeDescriptor::<Note>::builder("Note", "note")
            .build()
            .expect("inner descriptor");
        let wrong: Arc<dyn Materializer> = Arc::new(EntityConverter::new(inner));

        let descriptor = TypeDescriptor::<Note>::builder("Note", "note")
            .multi(RelationSpec::new("tags", wrong, attach_tag))
            .build()
            .expect("descriptor");
        let converter = EntityConverter::new(descriptor);

        let registry = RelationRegistry::new();
        let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
        let err = converter
            .build(&json!({"tags": [{}]}), &mut ctx)
            .expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.property_path(), Some("note.tags[0]"));
        assert!(err.to_string().contains("expected Tag, got Note"));
    }

    #[test]
    fn id_property_defaults_and_overrides() {
        let converter = note_converter();
        assert_eq!(converter.id_property(), "id");

        let descriptor = TypeDescriptor::<Tag>::builder("Tag", "tag")
            .build()
            .expect("descriptor");
        let converter = EntityConverter::new(descriptor).with_id_property("slug");
        assert_eq!(converter.id_property(), "slug");
    }
}
