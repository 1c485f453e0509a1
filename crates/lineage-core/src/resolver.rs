//! Version resolution.
//!
//! Decides, for a set of lineages and an optional module, which single version
//! of each lineage is in effect at a point in time. All the ranking and
//! precedence rules live in [`resolve`]; a [`VersionSource`] only has to hand
//! over candidate versions. Sources are free to pre-filter (the SQLite source
//! returns just the top row per lineage) because the rules are re-applied
//! here.
//!
//! ## Rules
//!
//! 1. Published timeline: the candidate with the greatest
//!    `(modified_at, seq)` among those created at or before `as_of` (and, in
//!    `Effective` mode, valid at `as_of`). A picked tombstone (`deleted`)
//!    means the lineage has no published result.
//! 2. Overlay: only for a module that is neither Completed nor Closed. The
//!    module's latest version per lineage; if it is hidden or deleted the
//!    module says nothing about that lineage.
//! 3. Merge: an overlay version wins over the published one, ties included,
//!    unless its action is Terminate, in which case the lineage is omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::ExError;
use crate::model::{Action, LineageCode, ModuleId, ModuleState, Version};

/// Which time axis `as_of` applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Latest recorded version, regardless of its validity window.
    #[default]
    Latest,
    /// Latest version whose validity window contains `as_of`.
    Effective,
}

/// Where versions come from.
pub trait VersionSource {
    /// Published versions that may be the answer for `codes`.
    ///
    /// Returning more than necessary is fine; returning less is not.
    fn published_candidates(
        &self,
        codes: &BTreeSet<LineageCode>,
        as_of: DateTime<Utc>,
        mode: ResolveMode,
    ) -> Result<Vec<Version>, ExError>;

    /// Versions in `module_id`'s overlay that may be the latest for `codes`.
    fn overlay_candidates(
        &self,
        module_id: ModuleId,
        codes: &BTreeSet<LineageCode>,
    ) -> Result<Vec<Version>, ExError>;

    /// Current state of a module, `None` if it does not exist.
    fn module_state(&self, module_id: ModuleId) -> Result<Option<ModuleState>, ExError>;

    /// Every lineage with a published version or a version in `module_id`'s overlay.
    fn known_codes(&self, module_id: Option<ModuleId>) -> Result<BTreeSet<LineageCode>, ExError>;
}

fn newer(current: Option<&Version>, candidate: &Version) -> bool {
    current.map_or(true, |c| candidate.rank() > c.rank())
}

/// Top published version per lineage, tombstones removed.
pub fn pick_published<'a>(
    candidates: impl IntoIterator<Item = &'a Version>,
    codes: &BTreeSet<LineageCode>,
    as_of: DateTime<Utc>,
    mode: ResolveMode,
) -> BTreeMap<LineageCode, Version> {
    let mut top: BTreeMap<LineageCode, &Version> = BTreeMap::new();
    for v in candidates {
        if !v.module_id.is_published() || !codes.contains(&v.code) || v.created_at > as_of {
            continue;
        }
        if mode == ResolveMode::Effective && !v.is_valid_at(as_of) {
            continue;
        }
        if newer(top.get(&v.code).copied(), v) {
            top.insert(v.code.clone(), v);
        }
    }
    top.into_iter()
        .filter(|(_, v)| !v.deleted)
        .map(|(code, v)| (code, v.clone()))
        .collect()
}

/// Latest overlay version per lineage, dropping lineages whose latest version
/// is hidden or deleted.
///
/// Terminations are kept; they are needed both for merging at completion and
/// for omitting the lineage during resolution.
pub fn pick_overlay<'a>(
    candidates: impl IntoIterator<Item = &'a Version>,
    module_id: ModuleId,
    codes: &BTreeSet<LineageCode>,
) -> BTreeMap<LineageCode, Version> {
    let mut top: BTreeMap<LineageCode, &Version> = BTreeMap::new();
    for v in candidates {
        if v.module_id != module_id || !codes.contains(&v.code) {
            continue;
        }
        if newer(top.get(&v.code).copied(), v) {
            top.insert(v.code.clone(), v);
        }
    }
    top.into_iter()
        .filter(|(_, v)| !v.hidden && !v.deleted)
        .map(|(code, v)| (code, v.clone()))
        .collect()
}

/// Combine published and overlay picks for `codes`.
pub fn merge(
    codes: &BTreeSet<LineageCode>,
    mut published: BTreeMap<LineageCode, Version>,
    mut overlay: BTreeMap<LineageCode, Version>,
) -> BTreeMap<LineageCode, Version> {
    let mut resolved = BTreeMap::new();
    for code in codes {
        match overlay.remove(code) {
            Some(v) if v.action == Action::Terminate => {}
            Some(v) => {
                resolved.insert(code.clone(), v);
            }
            None => {
                if let Some(v) = published.remove(code) {
                    resolved.insert(code.clone(), v);
                }
            }
        }
    }
    resolved
}

/// The module's overlay as it would be merged: latest version per lineage,
/// hidden and deleted lineages dropped, terminations kept.
///
/// # Errors
///
/// Propagates source failures.
pub fn overlay_view<S: VersionSource + ?Sized>(
    source: &S,
    module_id: ModuleId,
) -> Result<BTreeMap<LineageCode, Version>, ExError> {
    let codes = source.known_codes(Some(module_id))?;
    let candidates = source.overlay_candidates(module_id, &codes)?;
    Ok(pick_overlay(&candidates, module_id, &codes))
}

/// Resolve `codes` against the published timeline and, if given and still
/// open, a module's overlay.
///
/// Lineages without a result are omitted; resolution never fails because a
/// lineage is unknown. The result is ordered by code.
///
/// # Errors
///
/// Propagates source failures.
pub fn resolve<S: VersionSource + ?Sized>(
    source: &S,
    codes: &BTreeSet<LineageCode>,
    module_id: Option<ModuleId>,
    as_of: DateTime<Utc>,
    mode: ResolveMode,
) -> Result<BTreeMap<LineageCode, Version>, ExError> {
    if codes.is_empty() {
        return Ok(BTreeMap::new());
    }

    let published_candidates = source.published_candidates(codes, as_of, mode)?;
    let published = pick_published(&published_candidates, codes, as_of, mode);

    let overlay = match module_id.filter(|m| !m.is_published()) {
        Some(m) => match source.module_state(m)? {
            Some(state) if state.overlay_visible() => {
                let candidates = source.overlay_candidates(m, codes)?;
                pick_overlay(&candidates, m, codes)
            }
            _ => BTreeMap::new(),
        },
        None => BTreeMap::new(),
    };

    let resolved = merge(codes, published, overlay);
    tracing::debug!(
        requested = codes.len(),
        resolved = resolved.len(),
        module_id = module_id.map(|m| m.get()),
        ?mode,
        "resolved lineages"
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{now, NewVersion};
    use chrono::Duration;
    use serde_json::json;

    fn c(s: &str) -> LineageCode {
        LineageCode::parse(s).unwrap()
    }

    fn codes(list: &[&str]) -> BTreeSet<LineageCode> {
        list.iter().map(|s| c(s)).collect()
    }

    fn v(code: &str, module: i64, action: Action, at: DateTime<Utc>, seq: i64) -> Version {
        NewVersion::new(
            c(code),
            ModuleId::new(module),
            action,
            json!({"Title": format!("{}#{}", code, seq)}),
            at,
        )
        .into_version(seq)
    }

    #[test]
    fn test_published_ties_broken_by_seq() {
        let t = now();
        let vs = vec![
            v("ambitie-1", 0, Action::Create, t, 1),
            v("ambitie-1", 0, Action::Edit, t, 2),
        ];
        let picked = pick_published(&vs, &codes(&["ambitie-1"]), t, ResolveMode::Latest);
        assert_eq!(picked[&c("ambitie-1")].seq, 2);
    }

    #[test]
    fn test_published_ignores_future_versions() {
        let t = now();
        let vs = vec![
            v("ambitie-1", 0, Action::Create, t, 1),
            v("ambitie-1", 0, Action::Edit, t + Duration::hours(1), 2),
        ];
        let picked = pick_published(&vs, &codes(&["ambitie-1"]), t, ResolveMode::Latest);
        assert_eq!(picked[&c("ambitie-1")].seq, 1);
    }

    #[test]
    fn test_effective_mode_respects_validity_window() {
        let t = now();
        let mut later = v("ambitie-1", 0, Action::Edit, t, 2);
        later.start_validity = t + Duration::days(1);
        let vs = vec![v("ambitie-1", 0, Action::Create, t, 1), later];

        let effective = pick_published(&vs, &codes(&["ambitie-1"]), t, ResolveMode::Effective);
        assert_eq!(effective[&c("ambitie-1")].seq, 1);

        let latest = pick_published(&vs, &codes(&["ambitie-1"]), t, ResolveMode::Latest);
        assert_eq!(latest[&c("ambitie-1")].seq, 2);
    }

    #[test]
    fn test_published_tombstone_hides_lineage() {
        let t = now();
        let mut tomb = v("ambitie-1", 0, Action::Terminate, t, 2);
        tomb.deleted = true;
        let vs = vec![v("ambitie-1", 0, Action::Create, t, 1), tomb];
        let picked = pick_published(&vs, &codes(&["ambitie-1"]), t, ResolveMode::Effective);
        assert!(picked.is_empty());
    }

    #[test]
    fn test_overlay_hidden_latest_contributes_nothing() {
        let t = now();
        let mut removed = v("ambitie-1", 3, Action::Edit, t, 2);
        removed.hidden = true;
        removed.deleted = true;
        let vs = vec![v("ambitie-1", 3, Action::Edit, t, 1), removed];
        let picked = pick_overlay(&vs, ModuleId::new(3), &codes(&["ambitie-1"]));
        assert!(picked.is_empty());
    }

    #[test]
    fn test_overlay_ignores_other_modules() {
        let t = now();
        let vs = vec![v("ambitie-1", 4, Action::Edit, t, 1)];
        let picked = pick_overlay(&vs, ModuleId::new(3), &codes(&["ambitie-1"]));
        assert!(picked.is_empty());
    }

    #[test]
    fn test_merge_precedence() {
        let t = now();
        let all = codes(&["ambitie-1", "ambitie-2", "ambitie-3", "ambitie-4"]);
        let published: BTreeMap<_, _> = ["ambitie-1", "ambitie-2", "ambitie-3"]
            .iter()
            .map(|s| (c(s), v(s, 0, Action::Create, t, 1)))
            .collect();
        let overlay: BTreeMap<_, _> = [
            (c("ambitie-1"), v("ambitie-1", 3, Action::Edit, t, 5)),
            (c("ambitie-2"), v("ambitie-2", 3, Action::Terminate, t, 6)),
            (c("ambitie-4"), v("ambitie-4", 3, Action::Create, t, 7)),
        ]
        .into_iter()
        .collect();

        let resolved = merge(&all, published, overlay);

        assert_eq!(resolved[&c("ambitie-1")].module_id, ModuleId::new(3));
        assert!(!resolved.contains_key(&c("ambitie-2")));
        assert_eq!(resolved[&c("ambitie-3")].module_id, ModuleId::PUBLISHED);
        assert_eq!(resolved[&c("ambitie-4")].seq, 7);
    }
}
