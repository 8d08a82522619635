mod common;

use common::{
    path_str, policies_yaml, TestEnv, CONSTRAINT, LABELED_NAMESPACE, TEMPLATE,
    UNLABELED_NAMESPACE,
};
use flate2::read::GzDecoder;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::io::Read;

fn error_code(out: &[u8]) -> String {
    let v: Value = serde_json::from_slice(out).expect("valid json error");
    assert_eq!(v["ok"], false);
    v["error"]["code"].as_str().unwrap_or_default().to_string()
}

#[test]
fn build_from_stdin_preserves_policy_bytes() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .arg("build")
        .write_stdin(policies_yaml())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(out).expect("utf8 yaml"), policies_yaml());
}

#[test]
fn build_drops_documents_that_are_not_policies() {
    let env = TestEnv::new();
    let input = format!("{LABELED_NAMESPACE}---\nnot: [valid\n---\n{TEMPLATE}---\n# just a comment\n---\n{CONSTRAINT}");
    env.cmd()
        .arg("build")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(contains("kind: K8sRequiredLabels"))
        .stdout(contains("kind: Namespace").not());
}

#[test]
fn build_puts_templates_first_across_sources() {
    let env = TestEnv::new();
    let only_template = env.write("template.yaml", TEMPLATE);
    let out = env
        .cmd()
        .args(["build", "--policies", path_str(&only_template)])
        .write_stdin(CONSTRAINT)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let yaml = String::from_utf8(out).expect("utf8 yaml");
    assert_eq!(yaml, format!("---\n{TEMPLATE}---\n{CONSTRAINT}"));
}

#[test]
fn build_of_nothing_prints_nothing() {
    let env = TestEnv::new();
    env.cmd()
        .arg("build")
        .write_stdin("")
        .assert()
        .success()
        .stdout("");
}

#[test]
fn build_reports_missing_policy_source() {
    let env = TestEnv::new();
    let missing = env.root.join("missing.yaml");
    let out = env
        .cmd()
        .args(["--json", "build", "--policies", path_str(&missing)])
        .write_stdin("")
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stdout
        .clone();
    assert_eq!(error_code(&out), "SOURCE");
}

#[test]
fn build_rejects_unsupported_scheme() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "build", "--policies", "s3://bucket/policies.yaml"])
        .write_stdin("")
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    assert_eq!(error_code(&out), "SOURCE");
}

#[test]
fn build_writes_gzipped_archive() {
    let env = TestEnv::new();
    let archive = env.root.join("bundle.tar.gz");
    env.cmd()
        .args(["build", "--policies", env.policies_arg(), "--archive", path_str(&archive)])
        .write_stdin("")
        .assert()
        .success();

    let file = fs::File::open(&archive).expect("archive exists");
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let mut found = None;
    for entry in tar.entries().expect("tar entries") {
        let mut entry = entry.expect("tar entry");
        if entry.path().expect("entry path").to_str() == Some("policies.yaml") {
            let mut body = String::new();
            entry.read_to_string(&mut body).expect("read entry");
            found = Some(body);
        }
    }
    assert_eq!(found.as_deref(), Some(policies_yaml().as_str()));
}

#[test]
fn build_writes_bundle_under_output_dir() {
    let env = TestEnv::new();
    let config = env.write(
        "bundle.toml",
        "[bundle]\nbase_dir = \"gatekeeper\"\nfile_name = \"bundle.yaml\"\n",
    );
    let out_dir = env.root.join("out");
    env.cmd()
        .args(["--config", path_str(&config)])
        .args(["build", "--policies", env.policies_arg(), "--output-dir", path_str(&out_dir)])
        .write_stdin("")
        .assert()
        .success();

    let written = fs::read_to_string(out_dir.join("gatekeeper/bundle.yaml")).expect("bundle file");
    assert_eq!(written, policies_yaml());
}

#[test]
fn build_oci_is_gated_behind_experimental_env() {
    let env = TestEnv::new();
    let layout = env.root.join("oci");
    env.cmd()
        .args(["build", "--policies", env.policies_arg(), "--build-oci", path_str(&layout)])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(contains("GATEPEEKER_EXPERIMENTAL"));
    assert!(!layout.exists());

    let out = env
        .cmd()
        .env("GATEPEEKER_EXPERIMENTAL", "1")
        .args(["--json", "build", "--policies", env.policies_arg(), "--build-oci", path_str(&layout)])
        .write_stdin("")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: Value = serde_json::from_slice(&out).expect("valid json");
    let digest = v["data"]["oci_manifest_digest"].as_str().expect("digest");
    assert!(digest.starts_with("sha256:"));
    assert!(layout.join("oci-layout").exists());
    let index = fs::read_to_string(layout.join("index.json")).expect("index.json");
    assert!(index.contains(digest));
}

#[test]
fn inspect_lists_keys_and_duplicates() {
    let env = TestEnv::new();
    let v = env.run_json(
        &["inspect", "--policies", env.policies_arg(), "--policies", env.policies_arg()],
        "",
    );
    assert_eq!(v["ok"], true);
    let templates = v["data"]["templates"].as_array().expect("templates");
    assert_eq!(templates.len(), 2);
    assert_eq!(
        templates[0],
        "templates.gatekeeper.sh:v1:ConstraintTemplate:-:k8srequiredlabels"
    );
    let duplicates = v["data"]["duplicates"].as_array().expect("duplicates");
    assert_eq!(duplicates.len(), 2);
}

#[test]
fn validate_denies_resource_missing_label() {
    let env = TestEnv::new();
    env.configured()
        .args(["validate", "--policies", env.policies_arg()])
        .write_stdin(UNLABELED_NAMESPACE)
        .assert()
        .code(2)
        .stdout(contains("FAILED v1:Namespace:-:default"))
        .stdout(contains("you must provide labels"));
}

#[test]
fn validate_passes_labeled_resource() {
    let env = TestEnv::new();
    env.configured()
        .args(["validate", "--policies", env.policies_arg()])
        .write_stdin(LABELED_NAMESPACE)
        .assert()
        .success()
        .stdout(contains("PASS v1:Namespace:-:payments"));
}

#[test]
fn validate_reads_manifest_sources_and_counts_denials() {
    let env = TestEnv::new();
    let manifests = env.write(
        "manifests.yaml",
        &format!("{LABELED_NAMESPACE}---\n{UNLABELED_NAMESPACE}"),
    );
    let out = env
        .configured()
        .args(["--json", "validate", "--policies", env.policies_arg(), path_str(&manifests)])
        .write_stdin("")
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let v: Value = serde_json::from_slice(&out).expect("valid json");
    assert_eq!(v["ok"], false);
    assert_eq!(v["data"]["resources"], 2);
    assert_eq!(v["data"]["failure_count"], 1);
    let results = &v["data"]["inputs"][0]["report"]["results"];
    assert!(results["v1:Namespace:-:default"]["denials"][0]
        .as_str()
        .expect("denial")
        .contains("all-must-have-owner"));
    assert_eq!(
        results["v1:Namespace:-:payments"]["denials"]
            .as_array()
            .map(Vec::len),
        Some(0)
    );
}

#[test]
fn validate_without_constraints_is_a_configuration_error() {
    let env = TestEnv::new();
    let only_template = env.write("template.yaml", TEMPLATE);
    let out = env
        .configured()
        .args(["--json", "validate", "--policies", path_str(&only_template)])
        .write_stdin(UNLABELED_NAMESPACE)
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    assert_eq!(error_code(&out), "CONFIG");
}

#[test]
fn validate_without_engine_is_a_configuration_error() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "validate", "--policies", env.policies_arg()])
        .write_stdin(UNLABELED_NAMESPACE)
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    assert_eq!(error_code(&out), "CONFIG");
}

#[test]
fn validate_with_constraint_for_unknown_template_fails_to_load() {
    let env = TestEnv::new();
    let only_constraint = env.write("constraint.yaml", CONSTRAINT);
    let template = env.write("template.yaml", &TEMPLATE.replace("K8sRequiredLabels", "K8sOther"));
    let out = env
        .configured()
        .args(["--json", "validate"])
        .args(["--policies", path_str(&template), "--policies", path_str(&only_constraint)])
        .write_stdin(UNLABELED_NAMESPACE)
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    assert_eq!(error_code(&out), "ENGINE");
}

#[test]
fn validate_with_nothing_to_read_fails() {
    let env = TestEnv::new();
    let missing = env.root.join("missing.yaml");
    env.configured()
        .args(["validate", "--policies", env.policies_arg(), path_str(&missing)])
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(contains("no files were validated"));
}

#[test]
fn validate_records_documents_without_kind() {
    let env = TestEnv::new();
    let input = format!("{LABELED_NAMESPACE}---\napiVersion: v1\nmetadata:\n  name: nameless\n");
    env.configured()
        .args(["validate", "--policies", env.policies_arg()])
        .write_stdin(input)
        .assert()
        .code(1)
        .stdout(contains("PASS v1:Namespace:-:payments"))
        .stdout(contains("ERROR"));
}
