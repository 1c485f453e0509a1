//! Audit trail of relation changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::LineageCode;

pub const ACTION_OVERWRITE_RELATIONS: &str = "overwrite_relations";

/// A stored, immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: i64,
    pub actor_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub subject_code: LineageCode,
    pub action_data: Value,
    pub before: Value,
    pub after: Value,
}

/// An audit entry waiting to be written; the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChangeLog {
    pub actor_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub subject_code: LineageCode,
    pub action_data: Value,
    pub before: Value,
    pub after: Value,
}

impl PendingChangeLog {
    pub fn into_entry(self, id: i64) -> ChangeLogEntry {
        ChangeLogEntry {
            id,
            actor_id: self.actor_id,
            timestamp: self.timestamp,
            action_type: self.action_type,
            subject_code: self.subject_code,
            action_data: self.action_data,
            before: self.before,
            after: self.after,
        }
    }
}
