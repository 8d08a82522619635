use crate::domain::constants::KEY_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct JsonErr {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Identity key shared by templates, constraints and reviewed resources.
///
/// Empty fields render as `-`, and every `/` becomes `:` so the key never
/// looks like a path.
pub fn resource_key(api_version: &str, kind: &str, namespace: &str, name: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        or_placeholder(api_version),
        or_placeholder(kind),
        or_placeholder(namespace),
        or_placeholder(name)
    )
    .replace('/', ":")
}

fn or_placeholder(s: &str) -> &str {
    if s.is_empty() {
        KEY_PLACEHOLDER
    } else {
        s
    }
}

/// Reads a string at `path` inside a generic object, empty when absent.
pub fn field_str<'a>(value: &'a Value, path: &[&str]) -> &'a str {
    let mut cur = value;
    for segment in path {
        match cur.get(segment) {
            Some(next) => cur = next,
            None => return "",
        }
    }
    cur.as_str().unwrap_or("")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Strongly typed view of a ConstraintTemplate document.
///
/// Fields without a typed slot are kept in `extra` so re-serializing is lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TemplateSpec,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    #[serde(default)]
    pub crd: Crd,
    #[serde(default)]
    pub targets: Vec<TemplateTarget>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Crd {
    #[serde(default)]
    pub spec: CrdSpec,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrdSpec {
    #[serde(default)]
    pub names: Names,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Names {
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub short_names: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    #[serde(
        rename = "openAPIV3Schema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub open_api_v3_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_schema: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateTarget {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rego: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code: Vec<TemplateCode>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCode {
    pub engine: String,
    pub source: Value,
}

/// A policy instantiation: generic object view plus the bytes it was read from.
#[derive(Debug, Clone)]
pub struct Constraint {
    object: Value,
    raw: Vec<u8>,
}

impl Constraint {
    pub fn new(object: Value, raw: Vec<u8>) -> Self {
        Self { object, raw }
    }

    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn api_version(&self) -> &str {
        field_str(&self.object, &["apiVersion"])
    }

    pub fn kind(&self) -> &str {
        field_str(&self.object, &["kind"])
    }

    pub fn namespace(&self) -> &str {
        field_str(&self.object, &["metadata", "namespace"])
    }

    pub fn name(&self) -> &str {
        field_str(&self.object, &["metadata", "name"])
    }

    pub fn resource_key(&self) -> String {
        resource_key(self.api_version(), self.kind(), self.namespace(), self.name())
    }
}

/// A policy definition: typed template view plus the bytes it was read from.
#[derive(Debug, Clone)]
pub struct ConstraintTemplate {
    document: TemplateDocument,
    raw: Vec<u8>,
}

impl ConstraintTemplate {
    pub fn new(document: TemplateDocument, raw: Vec<u8>) -> Self {
        Self { document, raw }
    }

    pub fn document(&self) -> &TemplateDocument {
        &self.document
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Kind of the constraints this template instantiates.
    pub fn constraint_kind(&self) -> &str {
        &self.document.spec.crd.spec.names.kind
    }

    pub fn resource_key(&self) -> String {
        let d = &self.document;
        resource_key(
            &d.api_version,
            &d.kind,
            &d.metadata.namespace,
            &d.metadata.name,
        )
    }
}

#[derive(Serialize)]
pub struct InspectReport {
    pub templates: Vec<String>,
    pub constraints: Vec<String>,
    pub duplicates: Vec<String>,
}

#[derive(Serialize)]
pub struct BuildReport {
    pub templates: usize,
    pub constraints: usize,
    pub yaml: String,
    pub archive: Option<String>,
    pub file: Option<String>,
    pub oci_manifest_digest: Option<String>,
}
