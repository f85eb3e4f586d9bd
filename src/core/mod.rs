// Core modules implementing descriptors, graph building, dedup, and error modeling.
pub mod builder;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod registry;
pub mod store;
pub mod validate;
