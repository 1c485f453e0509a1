//! Modules: draft workspaces and their lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{LineageError, Result};
use crate::model::ModuleId;

/// Lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Draft,
    Activated,
    Completed,
    Closed,
}

impl ModuleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleState::Draft => "draft",
            ModuleState::Activated => "activated",
            ModuleState::Completed => "completed",
            ModuleState::Closed => "closed",
        }
    }

    /// Completed and Closed modules never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ModuleState::Completed | ModuleState::Closed)
    }

    /// Whether the module's overlay takes part in resolution.
    pub fn overlay_visible(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleState {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ModuleState::Draft),
            "activated" => Ok(ModuleState::Activated),
            "completed" => Ok(ModuleState::Completed),
            "closed" => Ok(ModuleState::Closed),
            other => Err(LineageError::Serialization {
                message: format!("unknown module state '{}'", other),
            }),
        }
    }
}

/// One entry of a module's append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub state: ModuleState,
    pub changed_at: DateTime<Utc>,
    pub actor_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub module_id: ModuleId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Optimistic concurrency token; bumped on every state change and overlay write.
    pub row_version: i64,
    /// Oldest first.
    pub status_history: Vec<StatusEntry>,
}

impl Module {
    /// Current state: the last status entry, Draft when there is none.
    pub fn state(&self) -> ModuleState {
        self.status_history
            .last()
            .map_or(ModuleState::Draft, |entry| entry.state)
    }

    /// Fail with `ModuleClosed` if the module no longer accepts edits.
    pub fn ensure_editable(&self) -> Result<()> {
        let state = self.state();
        if state.is_terminal() {
            return Err(LineageError::ModuleClosed {
                module_id: self.module_id.get(),
                state,
            });
        }
        Ok(())
    }
}
