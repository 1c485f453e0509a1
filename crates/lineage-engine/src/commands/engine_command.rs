//! Engine-level commands as data.
//!
//! Lets a transport layer hand the engine one value per request instead of
//! calling the command functions directly. Commands deserialize from JSON
//! tagged by `command`:
//!
//! ```json
//! {"command": "transition", "module_id": 7, "target": "completed"}
//! ```

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use lineage_core::lifecycle::TransitionOptions;
use lineage_core::model::{
    ChangeLogEntry, LineageCode, ModuleId, ModuleState, ObjectType, PeerRelation,
    RelationInput, Version,
};
use lineage_core::registry::ObjectTypeRegistry;
use lineage_core::resolver::ResolveMode;
use lineage_core::validation::{ModuleValidator, ValidationError};
use lineage_core_types::correlation::RequestContext;
use lineage_store::errors::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::commands::transition::TransitionOutcome;
use crate::commands::{check, relations, resolve, transition};

/// Engine commands that need the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    /// Resolve a set of lineages; `module_id: None` means published only.
    Resolve {
        codes: BTreeSet<LineageCode>,
        module_id: Option<ModuleId>,
        as_of: DateTime<Utc>,
        #[serde(default)]
        mode: ResolveMode,
    },
    /// Resolve everything visible from a module or the published timeline.
    ResolveAll {
        module_id: Option<ModuleId>,
        as_of: DateTime<Utc>,
        #[serde(default)]
        mode: ResolveMode,
    },
    /// Move a module to a new state; completion merges its overlay.
    Transition {
        module_id: ModuleId,
        target: ModuleState,
        #[serde(default)]
        options: TransitionOptions,
    },
    /// Replace all relations of a lineage.
    ///
    /// `allowed_peers: None` takes the peer types from the registry.
    OverwriteRelations {
        code: LineageCode,
        relations: Vec<RelationInput>,
        #[serde(default)]
        allowed_peers: Option<Vec<ObjectType>>,
    },
    /// Relations of a lineage, seen from that lineage.
    ListRelations { code: LineageCode },
    /// Hierarchy check of a module's view.
    CheckModule { module_id: ModuleId },
}

/// Result of applying an engine command.
#[derive(Debug, Clone)]
pub enum EngineCommandResult {
    Resolved(BTreeMap<LineageCode, Version>),
    Transitioned(TransitionOutcome),
    RelationsOverwritten(ChangeLogEntry),
    Relations(Vec<PeerRelation>),
    Checked(Vec<ValidationError>),
}

/// Apply an engine command with the registry and completion validator in effect.
pub fn apply_engine_command(
    cmd: EngineCommand,
    conn: &mut Connection,
    registry: &ObjectTypeRegistry,
    validator: &dyn ModuleValidator,
    ctx: &RequestContext,
) -> Result<EngineCommandResult> {
    match cmd {
        EngineCommand::Resolve {
            codes,
            module_id,
            as_of,
            mode,
        } => resolve::resolve(conn, &codes, module_id, as_of, mode, ctx)
            .map(EngineCommandResult::Resolved),
        EngineCommand::ResolveAll {
            module_id,
            as_of,
            mode,
        } => resolve::resolve_all(conn, module_id, as_of, mode, ctx)
            .map(EngineCommandResult::Resolved),
        EngineCommand::Transition {
            module_id,
            target,
            options,
        } => transition::transition(conn, module_id, target, &options, registry, validator, ctx)
            .map(EngineCommandResult::Transitioned),
        EngineCommand::OverwriteRelations {
            code,
            relations: inputs,
            allowed_peers,
        } => match allowed_peers {
            Some(allowed) => relations::overwrite_relations(conn, &code, &inputs, &allowed, ctx),
            None => relations::overwrite_relations_with_registry(conn, &code, &inputs, registry, ctx),
        }
        .map(EngineCommandResult::RelationsOverwritten),
        EngineCommand::ListRelations { code } => {
            relations::list_relations(conn, &code, ctx).map(EngineCommandResult::Relations)
        }
        EngineCommand::CheckModule { module_id } => {
            check::check_module(conn, module_id, registry, ctx).map(EngineCommandResult::Checked)
        }
    }
}
