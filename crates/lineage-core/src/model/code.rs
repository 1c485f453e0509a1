//! Lineage identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{LineageError, Result};
use crate::model::ObjectType;

/// Canonical lineage identifier `"<type>-<sequence>"`.
///
/// The type prefix may itself contain underscores (`visie_algemeen-1`), so the
/// code is split on its last `-`. The sequence is a positive integer without
/// leading zeros, which keeps the string form canonical: two codes are equal
/// exactly when their strings are. Ordering is by the string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LineageCode {
    code: String,
    object_type: ObjectType,
    sequence: u64,
}

impl LineageCode {
    /// Largest sequence a code may carry; the store keeps it as a SQLite integer.
    pub const MAX_SEQUENCE: u64 = i64::MAX as u64;

    pub fn new(object_type: ObjectType, sequence: u64) -> Result<Self> {
        if sequence == 0 {
            return Err(LineageError::InvalidLineageCode {
                code: format!("{}-0", object_type),
                reason: "sequence must be positive".to_string(),
            });
        }
        if sequence > Self::MAX_SEQUENCE {
            return Err(LineageError::InvalidLineageCode {
                code: format!("{}-{}", object_type, sequence),
                reason: "sequence out of range".to_string(),
            });
        }
        Ok(Self {
            code: format!("{}-{}", object_type, sequence),
            object_type,
            sequence,
        })
    }

    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| LineageError::InvalidLineageCode {
            code: s.to_string(),
            reason: reason.to_string(),
        };

        let (prefix, digits) = s
            .rsplit_once('-')
            .ok_or_else(|| invalid("expected <type>-<sequence>"))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("sequence must be a decimal number"));
        }
        if digits.starts_with('0') {
            return Err(invalid("sequence must be positive without leading zeros"));
        }
        let sequence: u64 = digits
            .parse()
            .map_err(|_| invalid("sequence out of range"))?;
        let object_type = prefix
            .parse::<ObjectType>()
            .map_err(|_| invalid("unknown object type"))?;

        Self::new(object_type, sequence)
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for LineageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl FromStr for LineageCode {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LineageCode {
    type Error = LineageError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<LineageCode> for String {
    fn from(code: LineageCode) -> Self {
        code.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_code() {
        let code = LineageCode::parse("beleidskeuze-12").unwrap();
        assert_eq!(code.object_type(), ObjectType::Beleidskeuze);
        assert_eq!(code.sequence(), 12);
        assert_eq!(code.as_str(), "beleidskeuze-12");
    }

    #[test]
    fn test_parse_type_with_underscore() {
        let code = LineageCode::parse("visie_algemeen-1").unwrap();
        assert_eq!(code.object_type(), ObjectType::VisieAlgemeen);
    }

    #[test]
    fn test_rejects_malformed_codes() {
        for bad in [
            "",
            "ambitie",
            "ambitie-",
            "ambitie-0",
            "ambitie-01",
            "ambitie--1",
            "ambitie-1a",
            "onbekend-1",
            "-1",
        ] {
            let err = LineageCode::parse(bad).unwrap_err();
            assert!(
                matches!(err, LineageError::InvalidLineageCode { .. }),
                "expected rejection of {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_sequence_limited_to_store_range() {
        let max = LineageCode::parse("ambitie-9223372036854775807").unwrap();
        assert_eq!(max.sequence(), LineageCode::MAX_SEQUENCE);

        let err = LineageCode::parse("ambitie-9223372036854775808").unwrap_err();
        assert!(matches!(err, LineageError::InvalidLineageCode { .. }));
        assert!(LineageCode::new(ObjectType::Ambitie, u64::MAX).is_err());
    }

    #[test]
    fn test_new_matches_parse() {
        let built = LineageCode::new(ObjectType::Maatregel, 3).unwrap();
        assert_eq!(built, LineageCode::parse("maatregel-3").unwrap());
        assert!(LineageCode::new(ObjectType::Maatregel, 0).is_err());
    }

    #[test]
    fn test_orders_by_string_form() {
        let a = LineageCode::parse("ambitie-10").unwrap();
        let b = LineageCode::parse("ambitie-2").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_serde_as_plain_string() {
        let code = LineageCode::parse("ambitie-1").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"ambitie-1\"");
        let back: LineageCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
        assert!(serde_json::from_str::<LineageCode>("\"ambitie-x\"").is_err());
    }
}
