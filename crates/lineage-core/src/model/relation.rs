//! Symmetric relations between lineages.

use serde::{Deserialize, Serialize};

use crate::errors::{LineageError, Result};
use crate::model::LineageCode;

/// An unordered pair of lineages, stored with `code_a < code_b`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub code_a: LineageCode,
    pub code_b: LineageCode,
    pub description: String,
}

impl Relation {
    /// Build the canonical form of the pair; self relations are rejected.
    pub fn new(x: LineageCode, y: LineageCode, description: impl Into<String>) -> Result<Self> {
        if x == y {
            return Err(LineageError::SelfRelation {
                code: x.to_string(),
            });
        }
        let (code_a, code_b) = if x < y { (x, y) } else { (y, x) };
        Ok(Self {
            code_a,
            code_b,
            description: description.into(),
        })
    }

    pub fn touches(&self, code: &LineageCode) -> bool {
        &self.code_a == code || &self.code_b == code
    }

    /// The other side of the pair, if `code` is one side.
    pub fn peer_of(&self, code: &LineageCode) -> Option<&LineageCode> {
        if &self.code_a == code {
            Some(&self.code_b)
        } else if &self.code_b == code {
            Some(&self.code_a)
        } else {
            None
        }
    }

    /// View the relation from one side.
    pub fn as_peer_relation(&self, code: &LineageCode) -> Option<PeerRelation> {
        self.peer_of(code).map(|peer| PeerRelation {
            code: code.clone(),
            peer: peer.clone(),
            description: self.description.clone(),
        })
    }
}

/// A relation seen from one of its sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRelation {
    pub code: LineageCode,
    pub peer: LineageCode,
    pub description: String,
}

/// One requested relation in an overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInput {
    pub peer: LineageCode,
    pub description: String,
}

impl RelationInput {
    pub fn new(peer: LineageCode, description: impl Into<String>) -> Self {
        Self {
            peer,
            description: description.into(),
        }
    }
}
