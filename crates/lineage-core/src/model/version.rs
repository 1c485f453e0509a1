//! Versions and the timelines they live on.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{LineageError, Result};
use crate::model::LineageCode;

/// Current UTC time truncated to whole milliseconds.
///
/// Storage keeps Unix milliseconds, so every timestamp the system produces
/// goes through here to compare equal after a round trip.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Identifier of the timeline a version belongs to.
///
/// `ModuleId::PUBLISHED` (0) is the published timeline; every positive id is
/// the overlay of one module.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ModuleId(i64);

impl ModuleId {
    pub const PUBLISHED: ModuleId = ModuleId(0);

    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    pub fn is_published(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ModuleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// What a version does to its lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Edit,
    Terminate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Terminate => "terminate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Action::Create),
            "edit" => Ok(Action::Edit),
            "terminate" => Ok(Action::Terminate),
            other => Err(LineageError::Serialization {
                message: format!("unknown action '{}'", other),
            }),
        }
    }
}

/// An immutable version of a lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub version_id: Uuid,
    pub code: LineageCode,
    pub module_id: ModuleId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub start_validity: DateTime<Utc>,
    /// Open end when `None`.
    pub end_validity: Option<DateTime<Utc>>,
    pub payload: Value,
    pub prior_version: Option<Uuid>,
    pub action: Action,
    pub hidden: bool,
    pub deleted: bool,
    /// Insertion sequence assigned by the store; breaks `modified_at` ties.
    pub seq: i64,
}

impl Version {
    /// Ordering key used to pick "the latest" version of a lineage.
    pub fn rank(&self) -> (DateTime<Utc>, i64) {
        (self.modified_at, self.seq)
    }

    /// Whether the validity window `[start, end)` contains `at`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.start_validity <= at && self.end_validity.map_or(true, |end| at < end)
    }

    /// String field of the payload, if present and a string.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }
}

/// A version that has not been stored yet.
///
/// The store assigns `seq` on append; everything else is decided by the
/// caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVersion {
    pub version_id: Uuid,
    pub code: LineageCode,
    pub module_id: ModuleId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub start_validity: DateTime<Utc>,
    pub end_validity: Option<DateTime<Utc>>,
    pub payload: Value,
    pub prior_version: Option<Uuid>,
    pub action: Action,
    pub hidden: bool,
    pub deleted: bool,
}

impl NewVersion {
    /// A version stamped at `at`, valid from `at` with an open end.
    pub fn new(
        code: LineageCode,
        module_id: ModuleId,
        action: Action,
        payload: Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            version_id: Uuid::now_v7(),
            code,
            module_id,
            created_at: at,
            modified_at: at,
            start_validity: at,
            end_validity: None,
            payload,
            prior_version: None,
            action,
            hidden: false,
            deleted: false,
        }
    }

    pub fn with_validity(mut self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        self.start_validity = start;
        self.end_validity = end;
        self
    }

    pub fn with_prior(mut self, prior: Uuid) -> Self {
        self.prior_version = Some(prior);
        self
    }

    pub fn with_flags(mut self, hidden: bool, deleted: bool) -> Self {
        self.hidden = hidden;
        self.deleted = deleted;
        self
    }

    pub fn into_version(self, seq: i64) -> Version {
        Version {
            version_id: self.version_id,
            code: self.code,
            module_id: self.module_id,
            created_at: self.created_at,
            modified_at: self.modified_at,
            start_validity: self.start_validity,
            end_validity: self.end_validity,
            payload: self.payload,
            prior_version: self.prior_version,
            action: self.action,
            hidden: self.hidden,
            deleted: self.deleted,
            seq,
        }
    }
}

/// Reject an append that would move a timeline backwards.
///
/// `latest` is the current top `modified_at` for the same (code, module).
pub fn check_monotonic(new: &NewVersion, latest: Option<DateTime<Utc>>) -> Result<()> {
    match latest {
        Some(latest) if new.modified_at < latest => Err(LineageError::NonMonotonicVersion {
            code: new.code.to_string(),
            module_id: new.module_id.get(),
            latest: latest.to_rfc3339(),
            attempted: new.modified_at.to_rfc3339(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn code() -> LineageCode {
        LineageCode::parse("ambitie-1").unwrap()
    }

    #[test]
    fn test_now_is_millisecond_precise() {
        let t = now();
        assert_eq!(t.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_validity_window_is_half_open() {
        let t0 = now();
        let v = NewVersion::new(code(), ModuleId::PUBLISHED, Action::Create, json!({}), t0)
            .with_validity(t0, Some(t0 + Duration::days(1)))
            .into_version(1);

        assert!(!v.is_valid_at(t0 - Duration::milliseconds(1)));
        assert!(v.is_valid_at(t0));
        assert!(!v.is_valid_at(t0 + Duration::days(1)));
    }

    #[test]
    fn test_open_end_is_valid_forever() {
        let t0 = now();
        let v = NewVersion::new(code(), ModuleId::PUBLISHED, Action::Create, json!({}), t0)
            .into_version(1);
        assert!(v.is_valid_at(t0 + Duration::days(365 * 100)));
    }

    #[test]
    fn test_monotonic_check() {
        let t0 = now();
        let new = NewVersion::new(code(), ModuleId::new(3), Action::Edit, json!({}), t0);

        assert!(check_monotonic(&new, None).is_ok());
        assert!(check_monotonic(&new, Some(t0)).is_ok());
        let err = check_monotonic(&new, Some(t0 + Duration::seconds(1))).unwrap_err();
        assert!(matches!(
            err,
            LineageError::NonMonotonicVersion { module_id: 3, .. }
        ));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("terminate".parse::<Action>().unwrap(), Action::Terminate);
        assert!("remove".parse::<Action>().is_err());
    }
}
