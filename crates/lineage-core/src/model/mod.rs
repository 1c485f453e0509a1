pub mod change_log;
pub mod code;
pub mod module;
pub mod object_type;
pub mod relation;
pub mod version;

pub use change_log::{ChangeLogEntry, PendingChangeLog, ACTION_OVERWRITE_RELATIONS};
pub use code::LineageCode;
pub use module::{Module, ModuleState, StatusEntry};
pub use object_type::{ObjectType, HIERARCHY_CODE_FIELD, TITLE_FIELD};
pub use relation::{PeerRelation, Relation, RelationInput};
pub use version::{check_monotonic, now, Action, ModuleId, NewVersion, Version};
