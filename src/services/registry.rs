use crate::domain::constants::{
    CONSTRAINTS_GROUP, TEMPLATES_GROUP, TEMPLATE_KIND, TEMPLATE_VERSIONS,
};
use crate::domain::models::{field_str, resource_key, GroupVersionKind, TemplateDocument};
use crate::services::config::ResourcesConfig;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Template,
    Constraint,
    Ignored,
}

#[derive(thiserror::Error, Debug)]
pub enum ConversionError {
    #[error("unsupported template version {api_version} for {key}")]
    UnsupportedVersion { api_version: String, key: String },
    #[error("template {key} does not match the template shape: {source}")]
    Shape {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Known policy resource types. Built once from configuration and passed by
/// reference to parsing and to the engine adapter.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    constraint_group: String,
    template_group: String,
    template_kind: String,
    template_versions: Vec<String>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self {
            constraint_group: CONSTRAINTS_GROUP.to_string(),
            template_group: TEMPLATES_GROUP.to_string(),
            template_kind: TEMPLATE_KIND.to_string(),
            template_versions: TEMPLATE_VERSIONS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl ResourceRegistry {
    pub fn from_config(cfg: &ResourcesConfig) -> Self {
        Self {
            constraint_group: cfg.constraint_group.clone(),
            template_group: cfg.template_group.clone(),
            template_kind: cfg.template_kind.clone(),
            template_versions: cfg.template_versions.clone(),
        }
    }

    pub fn is_constraint(&self, obj: &Value) -> bool {
        gvk_of(obj).group == self.constraint_group
    }

    pub fn is_template(&self, obj: &Value) -> bool {
        let gvk = gvk_of(obj);
        gvk.group == self.template_group && gvk.kind == self.template_kind
    }

    pub fn classify(&self, obj: &Value) -> Classification {
        if self.is_constraint(obj) {
            Classification::Constraint
        } else if self.is_template(obj) {
            Classification::Template
        } else {
            Classification::Ignored
        }
    }

    /// Converts a document already classified as a template into its typed shape.
    pub fn to_template(&self, obj: Value) -> Result<TemplateDocument, ConversionError> {
        let key = resource_key(
            field_str(&obj, &["apiVersion"]),
            field_str(&obj, &["kind"]),
            field_str(&obj, &["metadata", "namespace"]),
            field_str(&obj, &["metadata", "name"]),
        );
        let gvk = gvk_of(&obj);
        if !self.template_versions.iter().any(|v| *v == gvk.version) {
            return Err(ConversionError::UnsupportedVersion {
                api_version: field_str(&obj, &["apiVersion"]).to_string(),
                key,
            });
        }
        serde_json::from_value(obj).map_err(|source| ConversionError::Shape { key, source })
    }
}

fn gvk_of(obj: &Value) -> GroupVersionKind {
    GroupVersionKind::from_api_version(
        field_str(obj, &["apiVersion"]),
        field_str(obj, &["kind"]),
    )
}
