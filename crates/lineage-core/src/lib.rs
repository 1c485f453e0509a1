//! Lineage Core - temporal version resolution for policy lineages.
//!
//! This crate holds the domain model and the pure algorithms:
//! - Lineage codes, object types and the object type registry
//! - Versions on the published timeline and in module overlays
//! - Resolution of one effective version per lineage (`resolver`)
//! - Module lifecycle rules and completion merge planning (`lifecycle`)
//! - Hierarchy checks and pluggable module validators
//! - Relation overwrite planning with change-log entries
//!
//! Persistence lives in `lineage-store`; orchestration and boundary logging
//! in `lineage-engine`.

pub mod errors;
pub mod hierarchy;
pub mod lifecycle;
pub mod logging_facility;
pub mod memory;
pub mod model;
pub mod registry;
pub mod relations;
pub mod resolver;
pub mod validation;

// Re-export commonly used types
pub use errors::{ExError, ExErrorKind, LineageError, Result};
pub use lifecycle::TransitionOptions;
pub use memory::MemoryStore;
pub use model::{
    Action, LineageCode, Module, ModuleId, ModuleState, NewVersion, ObjectType, Relation,
    RelationInput, Version,
};
pub use registry::ObjectTypeRegistry;
pub use resolver::{resolve, ResolveMode, VersionSource};
pub use validation::{
    DenyAllModuleValidator, ModuleValidator, NoopModuleValidator, RequiredFieldsValidator,
    Severity, ValidationError,
};
