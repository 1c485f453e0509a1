//! Module validation collaborators.
//!
//! A `ModuleValidator` inspects the prospective view of a module before it is
//! completed. Any `Blocking` error it reports stops the completion.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{LineageCode, ModuleId, ObjectType, Version};
use crate::registry::ObjectTypeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    Warning,
}

/// A single finding about one lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: LineageCode,
    pub rule: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationError {
    pub fn blocking(
        code: LineageCode,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            rule: rule.into(),
            message: message.into(),
            severity: Severity::Blocking,
        }
    }

    pub fn warning(code: LineageCode, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::blocking(code, rule, message)
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// What a validator gets to look at.
pub struct ModuleView<'a> {
    pub module_id: ModuleId,
    /// Effective resolution scoped to the module, as of now.
    pub resolved: &'a BTreeMap<LineageCode, Version>,
    /// Lineages the module's overlay contributes to (including terminations).
    pub touched: &'a BTreeSet<LineageCode>,
}

/// Pre-completion check supplied by the caller.
pub trait ModuleValidator: Send + Sync {
    fn validate(&self, view: &ModuleView<'_>) -> Vec<ValidationError>;
}

/// Validator that never objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopModuleValidator;

impl ModuleValidator for NoopModuleValidator {
    fn validate(&self, _view: &ModuleView<'_>) -> Vec<ValidationError> {
        Vec::new()
    }
}

/// Validator that blocks every lineage the module touches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllModuleValidator;

impl ModuleValidator for DenyAllModuleValidator {
    fn validate(&self, view: &ModuleView<'_>) -> Vec<ValidationError> {
        view.touched
            .iter()
            .map(|code| {
                ValidationError::blocking(code.clone(), "deny_all", "completion denied by policy")
            })
            .collect()
    }
}

/// Requires configured payload fields to be present and non-empty.
///
/// Only objects the module changed and that are still visible are checked.
#[derive(Debug, Clone)]
pub struct RequiredFieldsValidator {
    required: BTreeMap<ObjectType, Vec<String>>,
}

impl RequiredFieldsValidator {
    pub const RULE: &'static str = "required_object_fields";

    pub fn from_registry(registry: &ObjectTypeRegistry) -> Self {
        let required = ObjectType::ALL
            .iter()
            .map(|t| (*t, registry.required_fields(*t).to_vec()))
            .collect();
        Self { required }
    }
}

fn is_filled(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

impl ModuleValidator for RequiredFieldsValidator {
    fn validate(&self, view: &ModuleView<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for code in view.touched {
            let Some(version) = view.resolved.get(code) else {
                continue;
            };
            let Some(fields) = self.required.get(&code.object_type()) else {
                continue;
            };
            for field in fields {
                if !is_filled(version.payload.get(field)) {
                    errors.push(ValidationError::blocking(
                        code.clone(),
                        Self::RULE,
                        format!("field {} is required", field),
                    ));
                }
            }
        }
        errors
    }
}

/// Keep only the errors that stop a completion.
pub fn blocking(errors: Vec<ValidationError>) -> Vec<ValidationError> {
    errors.into_iter().filter(ValidationError::is_blocking).collect()
}
