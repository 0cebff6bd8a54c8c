//! Purpose: The model layer: fields, per-model metadata, registry, managers and models.
//! Exports: Submodules plus the commonly used types re-exported at this level.
//! Role: Everything between a caller's query and the `Transport` call.
pub mod builtin;
pub mod fields;
pub mod manager;
pub mod model;
pub mod object_manager;
pub mod options;
pub mod registry;

pub use builtin::default_registry;
pub use fields::{Choice, Field, FieldKind, FieldValue};
pub use manager::{Lookup, Manager, Record, ResultIter};
pub use model::Model;
pub use options::{Endpoint, Options};
pub use registry::Registry;
