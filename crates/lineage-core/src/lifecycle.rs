//! Module lifecycle rules.
//!
//! ```text
//! Draft --> Activated --> Completed
//!                    \--> Closed
//! ```
//!
//! Completion merges the module's overlay into the published timeline. The
//! merge itself is planned here as a list of new published versions; the store
//! writes them in the same transaction that flips the module state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{LineageError, Result};
use crate::model::{Action, LineageCode, ModuleId, ModuleState, NewVersion, Version};

/// Caller-supplied knobs for a transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionOptions {
    /// Validity start for merged versions; defaults to the completion time.
    pub start_validity: Option<DateTime<Utc>>,
    /// Row version the caller last saw; a mismatch fails with `Conflict`.
    pub expected_row_version: Option<i64>,
}

impl TransitionOptions {
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start_validity = Some(start);
        self
    }

    pub fn expecting_row_version(mut self, row_version: i64) -> Self {
        self.expected_row_version = Some(row_version);
        self
    }
}

/// Check that `from -> to` is a legal move.
///
/// A completion requested for a module that is already Completed is reported
/// as a conflict: it is what the slower of two racing completions sees.
pub fn validate_transition(module_id: ModuleId, from: ModuleState, to: ModuleState) -> Result<()> {
    use ModuleState::*;

    match (from, to) {
        (Draft, Activated) | (Activated, Completed) | (Activated, Closed) => Ok(()),
        (Completed, Completed) => Err(LineageError::TransitionConflict {
            module_id: module_id.get(),
            reason: "module is already completed".to_string(),
        }),
        _ => Err(LineageError::InvalidTransition {
            module_id: module_id.get(),
            from,
            to,
        }),
    }
}

/// Published versions produced by completing a module.
///
/// `overlay` is the module's overlay view (latest per lineage, hidden and
/// deleted lineages already dropped). Each entry becomes one published
/// version stamped `completed_at`; terminations become tombstones.
pub fn plan_merge(
    overlay: &BTreeMap<LineageCode, Version>,
    completed_at: DateTime<Utc>,
    options: &TransitionOptions,
) -> Vec<NewVersion> {
    let start = options.start_validity.unwrap_or(completed_at);

    overlay
        .values()
        .map(|draft| {
            let merged = NewVersion::new(
                draft.code.clone(),
                ModuleId::PUBLISHED,
                draft.action,
                draft.payload.clone(),
                completed_at,
            )
            .with_validity(start, None)
            .with_prior(draft.version_id);

            if draft.action == Action::Terminate {
                merged.with_flags(false, true)
            } else {
                merged
            }
        })
        .collect()
}
