//! Purpose: Define the stable public API boundary for the materializer.
//! Exports: Core types and operations needed by hosts wiring converters into a request pipeline.
//! Role: Public, additive-only surface; internal module layout stays free to move.
//! Invariants: This module is the only path hosts need to import from.

mod dispatch;

#[doc(hidden)]
pub use crate::core::error::to_status_code;
pub use crate::core::builder::{BuildContext, EntityConverter, Materialized, Materializer};
pub use crate::core::descriptor::{
    DescriptorBuilder, RelationSpec, ScalarSpec, TypeDescriptor, expect_bool, expect_f64,
    expect_i64, expect_str,
};
pub use crate::core::entity::{Entity, EntityRef, canonical_value, downcast, relation_mismatch};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::registry::{RelationRegistry, fingerprint};
pub use crate::core::store::{EntityStore, MemoryStore, NoStore};
pub use crate::core::validate::{
    AcceptAll, RuleValidator, Validator, Violation, ViolationReport,
};
pub use dispatch::{Attributes, DispatchAdapter, DispatchOutcome};
