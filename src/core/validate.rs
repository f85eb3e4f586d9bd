//! Purpose: Rule-based validation gate run on every freshly built instance.
//! Exports: `Violation`, `ViolationReport`, `Validator`, `RuleValidator`, `AcceptAll`.
//! Role: Shared contract for surfacing per-field violations to callers.
//! Invariants: Reports are ordered; an empty report means the instance is valid.
//! Invariants: Validators never mutate the instance under inspection.
use crate::core::entity::Entity;
use serde::Serialize;
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    pub message: String,
    pub property_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_value: Option<Value>,
}

impl Violation {
    pub fn new(message: impl Into<String>, property_path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            property_path: property_path.into(),
            invalid_value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.invalid_value = Some(value);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViolationReport {
    violations: Vec<Violation>,
}

impl ViolationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

/// Externally pluggable rule engine. The builder invokes this once per built
/// instance, after all three passes; relation instances were already checked
/// during their own recursive builds.
pub trait Validator: Send + Sync {
    fn validate(&self, entity: &dyn Entity) -> ViolationReport;
}

/// Validator that accepts everything. Useful for hosts that validate
/// elsewhere and for tests that exercise the builder alone.
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _entity: &dyn Entity) -> ViolationReport {
        ViolationReport::new()
    }
}

type Rule = Box<dyn Fn(&dyn Entity, &mut ViolationReport) + Send + Sync>;

/// Rule set keyed by concrete entity type. Rules registered for a type run
/// in registration order; types without rules pass trivially.
#[derive(Default)]
pub struct RuleValidator {
    rules: HashMap<TypeId, Vec<Rule>>,
}

impl RuleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule<T, F>(mut self, check: F) -> Self
    where
        T: Entity,
        F: Fn(&T, &mut ViolationReport) + Send + Sync + 'static,
    {
        let wrapped: Rule = Box::new(move |entity, report| {
            if let Some(typed) = entity.as_any().downcast_ref::<T>() {
                check(typed, report);
            }
        });
        self.rules.entry(TypeId::of::<T>()).or_default().push(wrapped);
        self
    }
}

impl Validator for RuleValidator {
    fn validate(&self, entity: &dyn Entity) -> ViolationReport {
        let mut report = ViolationReport::new();
        if let Some(rules) = self.rules.get(&entity.as_any().type_id()) {
            for rule in rules {
                rule(entity, &mut report);
            }
        }
        report
    }
}
