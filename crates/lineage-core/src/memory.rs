//! In-memory version store.
//!
//! Holds the same data as the SQLite store without persistence or
//! transactions. Useful for exercising resolution rules directly and as the
//! reference model in property tests.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{ExError, LineageError, Result};
use crate::model::{
    check_monotonic, LineageCode, Module, ModuleId, ModuleState, NewVersion, StatusEntry, Version,
};
use crate::resolver::{ResolveMode, VersionSource};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    versions: Vec<Version>,
    modules: BTreeMap<ModuleId, Module>,
    next_seq: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version, enforcing per-timeline monotonic `modified_at`.
    ///
    /// # Errors
    ///
    /// `NonMonotonicVersion` if an existing version of the same lineage on the
    /// same timeline was modified later, `ModuleNotFound` or `ModuleClosed`
    /// for overlay versions of missing or finished modules.
    pub fn append(&mut self, new: NewVersion) -> Result<Version> {
        if !new.module_id.is_published() {
            let module =
                self.modules
                    .get(&new.module_id)
                    .ok_or(LineageError::ModuleNotFound {
                        module_id: new.module_id.get(),
                    })?;
            module.ensure_editable()?;
        }

        let latest = self
            .versions
            .iter()
            .filter(|v| v.code == new.code && v.module_id == new.module_id)
            .map(|v| v.modified_at)
            .max();
        check_monotonic(&new, latest)?;

        self.next_seq += 1;
        let version = new.into_version(self.next_seq);
        self.versions.push(version.clone());
        Ok(version)
    }

    /// Register a Draft module.
    pub fn create_module(&mut self, module_id: ModuleId, title: &str, at: DateTime<Utc>) -> Module {
        let module = Module {
            module_id,
            title: title.to_string(),
            description: String::new(),
            created_at: at,
            modified_at: at,
            row_version: 0,
            status_history: Vec::new(),
        };
        self.modules.insert(module_id, module.clone());
        module
    }

    /// Record a new state without checking the transition.
    ///
    /// # Errors
    ///
    /// `ModuleNotFound` if the module does not exist.
    pub fn set_state(
        &mut self,
        module_id: ModuleId,
        state: ModuleState,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let module = self
            .modules
            .get_mut(&module_id)
            .ok_or(LineageError::ModuleNotFound {
                module_id: module_id.get(),
            })?;
        module.status_history.push(StatusEntry {
            state,
            changed_at: at,
            actor_id: None,
        });
        module.modified_at = at;
        module.row_version += 1;
        Ok(())
    }

    pub fn module(&self, module_id: ModuleId) -> Option<&Module> {
        self.modules.get(&module_id)
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }
}

impl VersionSource for MemoryStore {
    fn published_candidates(
        &self,
        codes: &BTreeSet<LineageCode>,
        _as_of: DateTime<Utc>,
        _mode: ResolveMode,
    ) -> std::result::Result<Vec<Version>, ExError> {
        Ok(self
            .versions
            .iter()
            .filter(|v| v.module_id.is_published() && codes.contains(&v.code))
            .cloned()
            .collect())
    }

    fn overlay_candidates(
        &self,
        module_id: ModuleId,
        codes: &BTreeSet<LineageCode>,
    ) -> std::result::Result<Vec<Version>, ExError> {
        Ok(self
            .versions
            .iter()
            .filter(|v| v.module_id == module_id && codes.contains(&v.code))
            .cloned()
            .collect())
    }

    fn module_state(
        &self,
        module_id: ModuleId,
    ) -> std::result::Result<Option<ModuleState>, ExError> {
        Ok(self.modules.get(&module_id).map(Module::state))
    }

    fn known_codes(
        &self,
        module_id: Option<ModuleId>,
    ) -> std::result::Result<BTreeSet<LineageCode>, ExError> {
        Ok(self
            .versions
            .iter()
            .filter(|v| v.module_id.is_published() || Some(v.module_id) == module_id)
            .map(|v| v.code.clone())
            .collect())
    }
}
