use crate::bundle::{split_documents, Bundle, ParsedDocument};
use crate::domain::constants::{ACTION_DENY, ACTION_WARN};
use crate::domain::models::{field_str, resource_key, GroupVersionKind};
use crate::services::config::LoadMode;
use crate::services::engine::{EngineError, PolicyEngine, ReviewOptions, ReviewRequest, Violation};
use crate::services::reporting::{Report, ReportError, ResourceResult};
use serde_json::Value;
use tracing::{error, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum ValidateError {
    #[error("{0}")]
    Configuration(String),
    #[error("failed to load {key}: {source}")]
    EngineLoad {
        key: String,
        #[source]
        source: EngineError,
    },
    #[error("unrecognized enforcement action {action:?} from {constraint}")]
    UnrecognizedEnforcementAction { action: String, constraint: String },
    #[error("duplicate resource key {0} in one input")]
    DuplicateReportKey(String),
    #[error("review of {key} failed: {source}")]
    Review {
        key: String,
        #[source]
        source: EngineError,
    },
    #[error("document {index} is not a resource: {reason}")]
    Document { index: usize, reason: String },
}

impl From<ReportError> for ValidateError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::DuplicateKey(key) => ValidateError::DuplicateReportKey(key),
        }
    }
}

/// A policy the engine refused while loading in skip-invalid mode.
#[derive(Debug)]
pub struct LoadFailure {
    pub key: String,
    pub error: EngineError,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub load: LoadMode,
    pub review: ReviewOptions,
}

/// Validation orchestrator: owns a loaded engine and reviews manifests.
pub struct Client<E> {
    engine: E,
    options: ReviewOptions,
    templates: usize,
    constraints: usize,
}

impl<E: PolicyEngine> Client<E> {
    /// Loads every template, then every constraint, in bundle order.
    pub fn with_bundle(
        bundle: &Bundle,
        mut engine: E,
        options: ClientOptions,
    ) -> Result<(Self, Vec<LoadFailure>), ValidateError> {
        let mut failures = Vec::new();
        let mut templates = 0usize;
        let mut constraints = 0usize;

        for t in bundle.templates() {
            let key = t.resource_key();
            match engine.add_template(t) {
                Ok(()) => templates += 1,
                Err(e) => reject(options.load, &mut failures, key, e)?,
            }
        }
        for c in bundle.constraints() {
            let key = c.resource_key();
            match engine.add_constraint(c) {
                Ok(()) => constraints += 1,
                Err(e) => reject(options.load, &mut failures, key, e)?,
            }
        }
        info!(templates, constraints, rejected = failures.len(), "loaded policies");

        let client = Self {
            engine,
            options: options.review,
            templates,
            constraints,
        };
        Ok((client, failures))
    }

    /// Reviews every resource document in `manifests`.
    ///
    /// Failures for a single document are logged, recorded in the report and
    /// do not stop the remaining documents.
    pub fn validate(&self, manifests: &[u8]) -> Result<Report, ValidateError> {
        if self.constraints == 0 {
            return Err(ValidateError::Configuration(
                "no constraints to validate".to_string(),
            ));
        }
        if self.templates == 0 {
            return Err(ValidateError::Configuration(
                "no templates to validate".to_string(),
            ));
        }

        let mut report = Report::new();
        for (index, doc) in split_documents(manifests).iter().enumerate() {
            let outcome = self.review_document(index, doc).and_then(|messages| {
                let unrecognized = messages.unrecognized;
                report.add_result(messages.result)?;
                Ok(unrecognized)
            });
            match outcome {
                Ok(unrecognized) => {
                    for e in unrecognized {
                        error!(document = index, error = %e, "ignoring violation");
                        report.record_failure(subject_of(index, &doc.value), &e);
                    }
                }
                Err(e) => {
                    error!(document = index, error = %e, "skipping document");
                    report.record_failure(subject_of(index, &doc.value), &e);
                }
            }
        }
        Ok(report)
    }

    fn review_document(
        &self,
        index: usize,
        doc: &ParsedDocument,
    ) -> Result<ReviewMessages, ValidateError> {
        let req = build_review_request(index, &doc.value)?;
        let key = object_key(&doc.value);
        let violations = self
            .engine
            .review(&req, &self.options)
            .map_err(|source| ValidateError::Review {
                key: key.clone(),
                source,
            })?;
        Ok(validation_messages(key, &violations, &req))
    }
}

fn reject(
    mode: LoadMode,
    failures: &mut Vec<LoadFailure>,
    key: String,
    error: EngineError,
) -> Result<(), ValidateError> {
    match mode {
        LoadMode::Strict => Err(ValidateError::EngineLoad { key, source: error }),
        LoadMode::SkipInvalid => {
            warn!(%key, %error, "engine rejected policy");
            failures.push(LoadFailure { key, error });
            Ok(())
        }
    }
}

fn object_key(obj: &Value) -> String {
    resource_key(
        field_str(obj, &["apiVersion"]),
        field_str(obj, &["kind"]),
        field_str(obj, &["metadata", "namespace"]),
        field_str(obj, &["metadata", "name"]),
    )
}

fn subject_of(index: usize, obj: &Value) -> String {
    if field_str(obj, &["kind"]).is_empty() {
        format!("document {}", index)
    } else {
        object_key(obj)
    }
}

/// Builds the review request for one resource document.
pub fn build_review_request(index: usize, obj: &Value) -> Result<ReviewRequest, ValidateError> {
    let api_version = field_str(obj, &["apiVersion"]);
    let kind = field_str(obj, &["kind"]);
    if api_version.is_empty() || kind.is_empty() {
        return Err(ValidateError::Document {
            index,
            reason: "apiVersion and kind are required".to_string(),
        });
    }
    Ok(ReviewRequest {
        kind: GroupVersionKind::from_api_version(api_version, kind),
        namespace: field_str(obj, &["metadata", "namespace"]).to_string(),
        name: field_str(obj, &["metadata", "name"]).to_string(),
        object: obj.clone(),
    })
}

/// Interpreted engine results for one resource.
#[derive(Debug, Default)]
pub struct ReviewMessages {
    pub result: ResourceResult,
    /// Violations whose enforcement action is neither deny nor warn.
    pub unrecognized: Vec<ValidateError>,
}

/// Sorts engine results into the resource's denials and warnings.
///
/// Violations with an unknown action are returned beside the result so the
/// recognized ones are never lost.
pub fn validation_messages(key: String, violations: &[Violation], req: &ReviewRequest) -> ReviewMessages {
    let mut out = ReviewMessages {
        result: ResourceResult {
            key,
            ..ResourceResult::default()
        },
        unrecognized: Vec::new(),
    };
    for v in violations {
        let constraint = format!(
            "{}/{}/{}:{}",
            v.constraint.group, v.constraint.version, v.constraint.kind, v.constraint.name
        );
        let resource = format!(
            "{}/{}/{}:{}/{}",
            req.kind.group, req.kind.version, req.kind.kind, req.namespace, req.name
        );
        let action = v.enforcement_action.as_str();
        let msg = format!(
            "{} {} {}: {} ({})",
            constraint, action, resource, v.message, v.target
        );
        match action {
            ACTION_DENY => out.result.denials.push(msg),
            ACTION_WARN => out.result.warnings.push(msg),
            _ => out
                .unrecognized
                .push(ValidateError::UnrecognizedEnforcementAction {
                    action: action.to_string(),
                    constraint,
                }),
        }
    }
    out
}
