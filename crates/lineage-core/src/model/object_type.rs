//! Closed set of object types.
//!
//! Every lineage belongs to exactly one object type, encoded as the prefix of
//! its code. The type decides which other types it may be related to by
//! default. Any object may name a parent lineage through `Hierarchy_Code`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::{LineageError, Result};
use crate::model::LineageCode;

/// Payload field holding the parent lineage code.
pub const HIERARCHY_CODE_FIELD: &str = "Hierarchy_Code";

/// Payload field every object is expected to fill in.
pub const TITLE_FIELD: &str = "Title";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Ambitie,
    Beleidsdoel,
    Beleidskeuze,
    Beleidsregel,
    Maatregel,
    Gebiedsprogramma,
    VisieAlgemeen,
    Werkingsgebied,
}

const POLICY_PEERS: &[ObjectType] = &[
    ObjectType::Ambitie,
    ObjectType::Beleidsdoel,
    ObjectType::Beleidskeuze,
    ObjectType::Beleidsregel,
    ObjectType::Maatregel,
    ObjectType::Gebiedsprogramma,
];

impl ObjectType {
    pub const ALL: [ObjectType; 8] = [
        ObjectType::Ambitie,
        ObjectType::Beleidsdoel,
        ObjectType::Beleidskeuze,
        ObjectType::Beleidsregel,
        ObjectType::Maatregel,
        ObjectType::Gebiedsprogramma,
        ObjectType::VisieAlgemeen,
        ObjectType::Werkingsgebied,
    ];

    /// Code prefix for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Ambitie => "ambitie",
            ObjectType::Beleidsdoel => "beleidsdoel",
            ObjectType::Beleidskeuze => "beleidskeuze",
            ObjectType::Beleidsregel => "beleidsregel",
            ObjectType::Maatregel => "maatregel",
            ObjectType::Gebiedsprogramma => "gebiedsprogramma",
            ObjectType::VisieAlgemeen => "visie_algemeen",
            ObjectType::Werkingsgebied => "werkingsgebied",
        }
    }

    /// Object types this type may be related to when no override is configured.
    pub fn default_relation_peers(&self) -> &'static [ObjectType] {
        match self {
            ObjectType::VisieAlgemeen | ObjectType::Werkingsgebied => &[],
            _ => POLICY_PEERS,
        }
    }

    /// Check the structural shape of a payload.
    ///
    /// The payload must be a JSON object. Its `Hierarchy_Code`, when present,
    /// must be null or a well-formed lineage code.
    pub fn validate(&self, code: &LineageCode, payload: &Value) -> Result<()> {
        let object = payload
            .as_object()
            .ok_or_else(|| LineageError::InvalidPayload {
                code: code.to_string(),
                reason: "payload must be a JSON object".to_string(),
            })?;

        let field = HIERARCHY_CODE_FIELD;
        match object.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(parent)) => {
                LineageCode::parse(parent).map_err(|_| LineageError::InvalidPayload {
                    code: code.to_string(),
                    reason: format!("{} '{}' is not a lineage code", field, parent),
                })?;
            }
            Some(other) => {
                return Err(LineageError::InvalidPayload {
                    code: code.to_string(),
                    reason: format!("{} must be a string, got {}", field, other),
                })
            }
        }

        Ok(())
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        ObjectType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LineageError::UnknownObjectType {
                object_type: s.to_string(),
            })
    }
}
