//! Symmetric relation rows.

#![allow(clippy::result_large_err)]

use lineage_core::model::{ChangeLogEntry, LineageCode, PeerRelation, Relation};
use lineage_core::relations::OverwritePlan;
use rusqlite::Connection;

use crate::codec::parse_code;
use crate::errors::{from_rusqlite, Result};
use crate::repo::ChangeLogRepo;

pub struct RelationRepo;

impl RelationRepo {
    /// All rows with `code` on either side.
    pub fn touching(conn: &Connection, code: &LineageCode) -> Result<Vec<Relation>> {
        let mut stmt = conn
            .prepare(
                "SELECT code_a, code_b, description FROM relations
                 WHERE code_a = ?1 OR code_b = ?1
                 ORDER BY code_a, code_b",
            )
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([code.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(from_rusqlite)?;

        let mut relations = Vec::new();
        for row in rows {
            let (a, b, description) = row.map_err(from_rusqlite)?;
            relations.push(Relation {
                code_a: parse_code("relations", &a)?,
                code_b: parse_code("relations", &b)?,
                description,
            });
        }
        Ok(relations)
    }

    /// Relations of `code` seen from its side, ordered by peer.
    pub fn list(conn: &Connection, code: &LineageCode) -> Result<Vec<PeerRelation>> {
        let mut peers: Vec<PeerRelation> = Self::touching(conn, code)?
            .iter()
            .filter_map(|r| r.as_peer_relation(code))
            .collect();
        peers.sort_by(|a, b| a.peer.cmp(&b.peer));
        Ok(peers)
    }

    /// Write the change-log entry, drop the old rows, insert the new ones.
    ///
    /// Not atomic on its own; run it inside a transaction.
    pub fn apply_overwrite(conn: &Connection, plan: &OverwritePlan) -> Result<ChangeLogEntry> {
        let entry = ChangeLogRepo::insert(conn, &plan.change_log)?;

        let removed = conn
            .execute(
                "DELETE FROM relations WHERE code_a = ?1 OR code_b = ?1",
                [plan.subject.as_str()],
            )
            .map_err(from_rusqlite)?;

        let mut stmt = conn
            .prepare("INSERT INTO relations (code_a, code_b, description) VALUES (?1, ?2, ?3)")
            .map_err(from_rusqlite)?;
        for relation in &plan.insert {
            stmt.execute(rusqlite::params![
                relation.code_a.as_str(),
                relation.code_b.as_str(),
                relation.description,
            ])
            .map_err(from_rusqlite)?;
        }

        tracing::debug!(
            lineage_code = %plan.subject,
            removed,
            inserted = plan.insert.len(),
            change_log_id = entry.id,
            "relations overwritten"
        );
        Ok(entry)
    }
}
