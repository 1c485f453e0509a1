//! Planning of relation overwrites.
//!
//! Overwriting the relations of a lineage replaces every relation touching it
//! with a new set and records one change-log entry describing the before and
//! after sets. This module validates the request and builds that plan; the
//! store applies it in one transaction.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::errors::{LineageError, Result};
use crate::model::{
    LineageCode, ObjectType, PendingChangeLog, Relation, RelationInput,
    ACTION_OVERWRITE_RELATIONS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct OverwritePlan {
    pub subject: LineageCode,
    /// Rows currently touching the subject; all of them go.
    pub remove: Vec<Relation>,
    /// Canonical rows to insert.
    pub insert: Vec<Relation>,
    pub change_log: PendingChangeLog,
}

fn peer_set_json(subject: &LineageCode, relations: &[Relation]) -> Value {
    let mut peers: Vec<_> = relations
        .iter()
        .filter_map(|r| r.as_peer_relation(subject))
        .collect();
    peers.sort_by(|a, b| a.peer.cmp(&b.peer));
    Value::Array(
        peers
            .into_iter()
            .map(|p| json!({"peer": p.peer, "description": p.description}))
            .collect(),
    )
}

/// Validate `requested` and build the overwrite plan for `subject`.
///
/// # Errors
///
/// - `SelfRelation` if a peer equals the subject
/// - `DuplicatePeer` if a peer is listed twice
/// - `InvalidPeerType` if a peer's type is not in `allowed_peers`
pub fn plan_overwrite(
    subject: &LineageCode,
    requested: &[RelationInput],
    allowed_peers: &[ObjectType],
    existing: Vec<Relation>,
    actor_id: Option<String>,
    at: DateTime<Utc>,
) -> Result<OverwritePlan> {
    let mut seen = BTreeSet::new();
    let mut insert = Vec::with_capacity(requested.len());

    for input in requested {
        if !allowed_peers.contains(&input.peer.object_type()) {
            return Err(LineageError::InvalidPeerType {
                code: subject.to_string(),
                peer: input.peer.to_string(),
                peer_type: input.peer.object_type().to_string(),
            });
        }
        if !seen.insert(&input.peer) {
            return Err(LineageError::DuplicatePeer {
                code: subject.to_string(),
                peer: input.peer.to_string(),
            });
        }
        insert.push(Relation::new(
            subject.clone(),
            input.peer.clone(),
            input.description.clone(),
        )?);
    }

    let remove: Vec<Relation> = existing.into_iter().filter(|r| r.touches(subject)).collect();

    let change_log = PendingChangeLog {
        actor_id,
        timestamp: at,
        action_type: ACTION_OVERWRITE_RELATIONS.to_string(),
        subject_code: subject.clone(),
        action_data: json!({
            "allowed_peers": allowed_peers.iter().map(ObjectType::as_str).collect::<Vec<_>>(),
        }),
        before: peer_set_json(subject, &remove),
        after: peer_set_json(subject, &insert),
    };

    Ok(OverwritePlan {
        subject: subject.clone(),
        remove,
        insert,
        change_log,
    })
}
