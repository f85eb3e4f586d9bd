//! Purpose: Library crate that materializes typed object graphs from untyped JSON payloads.
//! Exports: `core` (descriptors, builder, registry, validation, errors) and `api` (dispatch boundary).
//! Role: Embeddable materializer core; transport and persistence stay with the host.
//! Invariants: Builds are synchronous; the relation registry is the only shared mutable state.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
