//! Parent-pointer checks over a prospective view.
//!
//! Any object may name a parent lineage through its hierarchy field
//! (`Hierarchy_Code` unless the registry says otherwise). A beleidskeuze
//! typically names its beleidsdoel and a maatregel its beleidskeuze. Before a
//! module is completed every such pointer in the module-scoped view must land
//! on a lineage that is itself visible in that view. The parent's type is not
//! checked.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::errors::ExError;
use crate::model::{LineageCode, ModuleId, Version};
use crate::registry::ObjectTypeRegistry;
use crate::resolver::{resolve, ResolveMode, VersionSource};
use crate::validation::ValidationError;

pub const RULE_REQUIRED_HIERARCHY_CODE: &str = "required_hierarchy_code";

/// Report every visible object whose parent is not visible in `view`.
pub fn check_view(
    view: &BTreeMap<LineageCode, Version>,
    registry: &ObjectTypeRegistry,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (code, version) in view {
        let field = registry.hierarchy_field(code.object_type());
        let Some(parent) = version.payload_str(field) else {
            continue;
        };
        let present = LineageCode::parse(parent).map_or(false, |p| view.contains_key(&p));
        if !present {
            errors.push(ValidationError::blocking(
                code.clone(),
                RULE_REQUIRED_HIERARCHY_CODE,
                format!("parent lineage {} missing or will be removed", parent),
            ));
        }
    }
    errors
}

/// Check the hierarchy of everything visible from `module_id` at `as_of`.
///
/// Resolves every lineage known to the published timeline or the module's
/// overlay in `Effective` mode, then applies [`check_view`].
///
/// # Errors
///
/// Propagates source failures.
pub fn check_module<S: VersionSource + ?Sized>(
    source: &S,
    module_id: ModuleId,
    as_of: DateTime<Utc>,
    registry: &ObjectTypeRegistry,
) -> Result<Vec<ValidationError>, ExError> {
    let codes = source.known_codes(Some(module_id))?;
    let view = resolve(
        source,
        &codes,
        Some(module_id),
        as_of,
        ResolveMode::Effective,
    )?;
    let errors = check_view(&view, registry);
    tracing::debug!(
        module_id = module_id.get(),
        visible = view.len(),
        errors = errors.len(),
        "hierarchy checked"
    );
    Ok(errors)
}
