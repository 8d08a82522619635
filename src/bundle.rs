use crate::domain::constants::DOCUMENT_MARKER;
use crate::domain::models::{field_str, Constraint, ConstraintTemplate};
use crate::services::registry::{Classification, ConversionError, ResourceRegistry};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum BundleError {
    #[error("failed to convert constraint template: {0}")]
    TemplateConversion(#[from] ConversionError),
}

/// One document of a multi-document stream that parsed to a mapping.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub raw: Vec<u8>,
    pub value: Value,
}

/// Ordered templates and constraints, each keeping its source bytes.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    templates: Vec<ConstraintTemplate>,
    constraints: Vec<Constraint>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `other`'s templates and constraints after our own.
    pub fn merge(&mut self, other: Bundle) {
        self.templates.extend(other.templates);
        self.constraints.extend(other.constraints);
    }

    pub fn templates(&self) -> &[ConstraintTemplate] {
        &self.templates
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.constraints.is_empty()
    }

    /// Identity keys present more than once, sorted.
    pub fn duplicate_keys(&self) -> Vec<String> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let keys = self
            .templates
            .iter()
            .map(|t| t.resource_key())
            .chain(self.constraints.iter().map(|c| c.resource_key()));
        for key in keys {
            *counts.entry(key).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(k, _)| k)
            .collect()
    }
}

fn is_marker_line(line: &[u8]) -> bool {
    let marker = DOCUMENT_MARKER.as_bytes();
    line.starts_with(marker)
        && line
            .get(marker.len())
            .map(|b| b.is_ascii_whitespace())
            .unwrap_or(true)
}

/// Splits a stream on `---` marker lines, returning the raw fragments.
///
/// Content after the marker on the same line (other than a comment) is kept
/// as the first line of the following fragment.
pub fn split_fragments(buf: &[u8]) -> Vec<Vec<u8>> {
    let marker_len = DOCUMENT_MARKER.len();
    let mut out = Vec::new();
    let mut current = Vec::new();
    for line in buf.split_inclusive(|b| *b == b'\n') {
        if !is_marker_line(line) {
            current.extend_from_slice(line);
            continue;
        }
        out.push(std::mem::take(&mut current));
        let rest = line[marker_len..].trim_ascii();
        if !rest.is_empty() && !rest.starts_with(b"#") {
            current.extend_from_slice(rest);
            current.push(b'\n');
        }
    }
    out.push(current);
    out
}

/// Splits a stream into documents, keeping only fragments that parse to a mapping.
pub fn split_documents(buf: &[u8]) -> Vec<ParsedDocument> {
    split_fragments(buf)
        .into_iter()
        .filter_map(|raw| match serde_yaml::from_slice::<Value>(&raw) {
            Ok(value @ Value::Object(_)) => Some(ParsedDocument { raw, value }),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, length = raw.len(), "skipping malformed document");
                None
            }
        })
        .collect()
}

/// Parses a multi-document stream into a bundle, in source order.
///
/// Unrecognized and malformed documents are dropped; only a template that
/// cannot be converted to its typed shape fails the call.
pub fn parse_policies(buf: &[u8], registry: &ResourceRegistry) -> Result<Bundle, BundleError> {
    let mut bundle = Bundle::new();
    for doc in split_documents(buf) {
        debug!(length = doc.raw.len(), "document");
        match registry.classify(&doc.value) {
            Classification::Constraint => {
                bundle.constraints.push(Constraint::new(doc.value, doc.raw));
            }
            Classification::Template => {
                let typed = registry.to_template(doc.value)?;
                bundle
                    .templates
                    .push(ConstraintTemplate::new(typed, doc.raw));
            }
            Classification::Ignored => {
                debug!(
                    api_version = field_str(&doc.value, &["apiVersion"]),
                    kind = field_str(&doc.value, &["kind"]),
                    "ignoring non-policy document"
                );
            }
        }
    }
    Ok(bundle)
}
