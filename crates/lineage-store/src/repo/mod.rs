//! Repositories over the SQLite schema.
//!
//! Every function takes a `&Connection`; pass a `&Transaction` (it derefs to
//! a connection) to make several calls one atomic unit.

pub mod change_log_repo;
pub mod module_repo;
pub mod relation_repo;
pub mod version_repo;

pub use change_log_repo::ChangeLogRepo;
pub use module_repo::{ModuleRepo, NewModule};
pub use relation_repo::RelationRepo;
pub use version_repo::VersionRepo;
