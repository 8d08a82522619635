pub const DOCUMENT_MARKER: &str = "---";

pub const CONSTRAINTS_GROUP: &str = "constraints.gatekeeper.sh";
pub const TEMPLATES_GROUP: &str = "templates.gatekeeper.sh";
pub const TEMPLATE_KIND: &str = "ConstraintTemplate";
pub const TEMPLATE_VERSIONS: &[&str] = &["v1", "v1beta1", "v1alpha1"];

/// Enforcement point used by the admission webhook; reviews default to it.
pub const WEBHOOK_ENFORCEMENT_POINT: &str = "validation.gatekeeper.sh";

pub const ACTION_DENY: &str = "deny";
pub const ACTION_WARN: &str = "warn";

pub const DEFAULT_BUNDLE_FILE: &str = "policies.yaml";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

pub const KEY_PLACEHOLDER: &str = "-";

pub const EXPERIMENTAL_ENV: &str = "GATEPEEKER_EXPERIMENTAL";
pub const OCI_DEFAULT_TAG: &str = "latest";
