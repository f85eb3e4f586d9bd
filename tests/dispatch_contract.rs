//! Purpose: Contract coverage for the request dispatch boundary.
//! Exports: Integration tests only.
//! Role: Verify applicability routing, parse-failure reporting, and attribute storage.
//! Invariants: A missing top-level key never raises; malformed bodies never yield partial graphs.

use hydrator::api::{
    AcceptAll, Attributes, BuildContext, DispatchAdapter, DispatchOutcome, Entity,
    EntityConverter, Error, ErrorKind, NoStore, RelationRegistry, RuleValidator, TypeDescriptor,
    Violation, canonical_value, expect_str, to_status_code,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::any::Any;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Default, Serialize)]
struct Article {
    title: String,
}

impl Entity for Article {
    fn type_name(&self) -> &'static str {
        "Article"
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

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

fn article_adapter() -> DispatchAdapter {
    let descriptor = TypeDescriptor::<Article>::builder("Article", "article")
        .scalar("title", |article, value| {
            article.title = expect_str(value, "title")?;
            Ok(())
        })
        .build()
        .expect("descriptor");
    DispatchAdapter::new(Arc::new(EntityConverter::new(descriptor)))
}

#[test]
fn supports_matches_the_configured_name() {
    let adapter = article_adapter();
    assert!(adapter.supports("article"));
    assert!(!adapter.supports("person"));
}

#[test]
fn missing_top_level_key_is_not_applicable() {
    init_tracing();
    let adapter = article_adapter();
    let registry = RelationRegistry::new();
    let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
    let mut attributes = Attributes::new();

    let outcome = adapter
        .apply(r#"{"person": {"name": "X"}}"#, &mut attributes, &mut ctx)
        .expect("apply");
    assert_eq!(outcome, DispatchOutcome::NotApplicable);
    assert!(!attributes.contains("article"));
}

#[test]
fn malformed_body_yields_no_partial_graph() {
    let adapter = article_adapter();
    let registry = RelationRegistry::new();
    let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
    let mut attributes = Attributes::new();

    let err = adapter
        .apply(r#"{"article": {"title": "A""#, &mut attributes, &mut ctx)
        .expect_err("truncated body");
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert_eq!(to_status_code(err.kind()), 400);
    let report = err.report().expect("report");
    assert!(report.violations()[0].message.starts_with("JSON error:"));
    assert!(!attributes.contains("article"));
}

#[test]
fn applied_body_stores_the_built_attribute() {
    let adapter = article_adapter();
    let registry = RelationRegistry::new();
    let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
    let mut attributes = Attributes::new();

    let outcome = adapter
        .apply(r#"{"article": {"title": "A"}}"#, &mut attributes, &mut ctx)
        .expect("apply");
    assert_eq!(outcome, DispatchOutcome::Applied);
    let article = attributes.get_as::<Article>("article").expect("attribute");
    assert_eq!(article.title, "A");
}

#[test]
fn validation_failures_surface_through_the_adapter() {
    let adapter = article_adapter();
    let validator = RuleValidator::new().rule::<Article, _>(|article, report| {
        if article.title.is_empty() {
            report.add(Violation::new("title must not be empty", "article.title"));
        }
    });
    let registry = RelationRegistry::new();
    let mut ctx = BuildContext::new(&registry, &NoStore, &validator);
    let mut attributes = Attributes::new();

    let err = adapter
        .apply(r#"{"article": {}}"#, &mut attributes, &mut ctx)
        .expect_err("invalid article");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(to_status_code(err.kind()), 422);
    assert!(!attributes.contains("article"));
}

#[test]
fn non_object_payload_under_the_key_is_malformed() {
    let adapter = article_adapter();
    let registry = RelationRegistry::new();
    let mut ctx = BuildContext::new(&registry, &NoStore, &AcceptAll);
    let mut attributes = Attributes::new();

    let err = adapter
        .apply(r#"{"article": true}"#, &mut attributes, &mut ctx)
        .expect_err("boolean payload");
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert_eq!(err.value(), Some(&json!(true)));
    assert!(!attributes.contains("article"));
}
