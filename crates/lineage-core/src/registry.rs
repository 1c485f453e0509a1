//! Object type registry.
//!
//! Built once at startup and passed explicitly to whatever needs it. The
//! built-in table can be overridden per type from TOML:
//!
//! ```toml
//! [types.beleidskeuze]
//! relation_peers = ["ambitie", "maatregel"]
//! required_fields = ["Title", "Omschrijving"]
//! hierarchy_field = "Parent_Code"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::errors::Result;
use crate::model::{LineageCode, ObjectType, HIERARCHY_CODE_FIELD, TITLE_FIELD};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TypeSettings {
    relation_peers: Vec<ObjectType>,
    required_fields: Vec<String>,
    hierarchy_field: String,
}

impl TypeSettings {
    fn builtin(object_type: ObjectType) -> Self {
        Self {
            relation_peers: object_type.default_relation_peers().to_vec(),
            required_fields: vec![TITLE_FIELD.to_string()],
            hierarchy_field: HIERARCHY_CODE_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTypeRegistry {
    types: BTreeMap<ObjectType, TypeSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    types: BTreeMap<String, TypeOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeOverride {
    relation_peers: Option<Vec<String>>,
    required_fields: Option<Vec<String>>,
    hierarchy_field: Option<String>,
}

impl ObjectTypeRegistry {
    /// Registry with the built-in settings for every object type.
    pub fn builtin() -> Self {
        Self {
            types: ObjectType::ALL
                .iter()
                .map(|t| (*t, TypeSettings::builtin(*t)))
                .collect(),
        }
    }

    /// Built-in registry with the overrides from a TOML document applied.
    ///
    /// # Errors
    ///
    /// `Config` for malformed TOML or unknown keys, `UnknownObjectType` for a
    /// type name that is not part of the closed set.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(source)?;
        let mut registry = Self::builtin();

        for (name, overrides) in file.types {
            let object_type: ObjectType = name.parse()?;
            let settings = registry
                .types
                .entry(object_type)
                .or_insert_with(|| TypeSettings::builtin(object_type));

            if let Some(peers) = overrides.relation_peers {
                settings.relation_peers = peers
                    .iter()
                    .map(|p| p.parse::<ObjectType>())
                    .collect::<Result<Vec<_>>>()?;
            }
            if let Some(fields) = overrides.required_fields {
                settings.required_fields = fields;
            }
            if let Some(field) = overrides.hierarchy_field {
                settings.hierarchy_field = field;
            }
        }

        tracing::debug!(types = registry.types.len(), "object type registry loaded");
        Ok(registry)
    }

    /// Object types `object_type` may be related to.
    pub fn relation_peers(&self, object_type: ObjectType) -> &[ObjectType] {
        self.types
            .get(&object_type)
            .map(|s| s.relation_peers.as_slice())
            .unwrap_or(&[])
    }

    pub fn required_fields(&self, object_type: ObjectType) -> &[String] {
        self.types
            .get(&object_type)
            .map(|s| s.required_fields.as_slice())
            .unwrap_or(&[])
    }

    /// Payload field naming the parent lineage of an `object_type` object.
    pub fn hierarchy_field(&self, object_type: ObjectType) -> &str {
        self.types
            .get(&object_type)
            .map(|s| s.hierarchy_field.as_str())
            .unwrap_or(HIERARCHY_CODE_FIELD)
    }

    /// Structural payload check for the code's object type.
    pub fn validate_payload(&self, code: &LineageCode, payload: &serde_json::Value) -> Result<()> {
        code.object_type().validate(code, payload)
    }
}

impl Default for ObjectTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
