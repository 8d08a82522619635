use crate::domain::constants::{
    CONSTRAINTS_GROUP, DEFAULT_BUNDLE_FILE, DEFAULT_HTTP_TIMEOUT_MS, TEMPLATES_GROUP,
    TEMPLATE_KIND, TEMPLATE_VERSIONS, WEBHOOK_ENFORCEMENT_POINT,
};
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LoadMode {
    /// First engine rejection aborts client construction.
    #[default]
    Strict,
    /// Rejected policies are reported and left out.
    SkipInvalid,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_enforcement_point")]
    pub enforcement_point: String,
    #[serde(default = "default_true")]
    pub tracing: bool,
    #[serde(default)]
    pub load: LoadMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: vec![],
            enforcement_point: default_enforcement_point(),
            tracing: true,
            load: LoadMode::Strict,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BundleConfig {
    #[serde(default = "default_bundle_file")]
    pub file_name: String,
    #[serde(default)]
    pub base_dir: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            file_name: default_bundle_file(),
            base_dir: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResourcesConfig {
    #[serde(default = "default_constraint_group")]
    pub constraint_group: String,
    #[serde(default = "default_template_group")]
    pub template_group: String,
    #[serde(default = "default_template_kind")]
    pub template_kind: String,
    #[serde(default = "default_template_versions")]
    pub template_versions: Vec<String>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            constraint_group: default_constraint_group(),
            template_group: default_template_group(),
            template_kind: default_template_kind(),
            template_versions: default_template_versions(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_enforcement_point() -> String {
    WEBHOOK_ENFORCEMENT_POINT.to_string()
}

fn default_bundle_file() -> String {
    DEFAULT_BUNDLE_FILE.to_string()
}

fn default_constraint_group() -> String {
    CONSTRAINTS_GROUP.to_string()
}

fn default_template_group() -> String {
    TEMPLATES_GROUP.to_string()
}

fn default_template_kind() -> String {
    TEMPLATE_KIND.to_string()
}

fn default_template_versions() -> Vec<String> {
    TEMPLATE_VERSIONS.iter().map(|v| v.to_string()).collect()
}

fn default_http_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/gatepeeker/config.toml"))
}

/// Loads configuration from `explicit`, or from the per-user default path.
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(Config::default()),
        },
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse_config(raw: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::{load_config, parse_config, LoadMode};
    use std::path::Path;

    #[test]
    fn empty_config_uses_gatekeeper_defaults() {
        let cfg = parse_config("").expect("empty config parses");
        assert_eq!(cfg.resources.constraint_group, "constraints.gatekeeper.sh");
        assert_eq!(cfg.resources.template_kind, "ConstraintTemplate");
        assert_eq!(cfg.engine.enforcement_point, "validation.gatekeeper.sh");
        assert!(cfg.engine.tracing);
        assert_eq!(cfg.engine.load, LoadMode::Strict);
        assert_eq!(cfg.bundle.file_name, "policies.yaml");
        assert!(cfg.engine.command.is_none());
    }

    #[test]
    fn engine_section_overrides() {
        let cfg = parse_config(
            r#"[engine]
command = "sh"
args = ["engine.sh"]
load = "skip-invalid"
tracing = false

[bundle]
file_name = "bundle.yaml"
base_dir = "policies"
"#,
        )
        .expect("config parses");
        assert_eq!(cfg.engine.command.as_deref(), Some("sh"));
        assert_eq!(cfg.engine.args, vec!["engine.sh".to_string()]);
        assert_eq!(cfg.engine.load, LoadMode::SkipInvalid);
        assert!(!cfg.engine.tracing);
        assert_eq!(cfg.bundle.file_name, "bundle.yaml");
        assert_eq!(cfg.bundle.base_dir, "policies");
    }

    #[test]
    fn unknown_load_mode_is_rejected() {
        assert!(parse_config("[engine]\nload = \"sometimes\"\n").is_err());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/gatepeeker.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
