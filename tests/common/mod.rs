#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TEMPLATE: &str = r#"apiVersion: templates.gatekeeper.sh/v1
kind: ConstraintTemplate
metadata:
  name: k8srequiredlabels
spec:
  crd:
    spec:
      names:
        kind: K8sRequiredLabels
      validation:
        openAPIV3Schema:
          type: object
          properties:
            labels:
              type: array
              items:
                type: object
                properties:
                  key:
                    type: string
  targets:
    - target: admission.k8s.gatekeeper.sh
      rego: |
        package k8srequiredlabels

        violation[{"msg": msg}] {
          provided := {label | input.review.object.metadata.labels[label]}
          required := {label | label := input.parameters.labels[_].key}
          missing := required - provided
          count(missing) > 0
          msg := sprintf("you must provide labels: %v", [missing])
        }
"#;

pub const CONSTRAINT: &str = r#"apiVersion: constraints.gatekeeper.sh/v1beta1
kind: K8sRequiredLabels
metadata:
  name: all-must-have-owner
spec:
  match:
    kinds:
      - apiGroups: [""]
        kinds: ["Namespace"]
  parameters:
    labels:
      - key: owner
"#;

pub const LABELED_NAMESPACE: &str = r#"apiVersion: v1
kind: Namespace
metadata:
  name: payments
  labels:
    owner: me.agilebank.demo
"#;

pub const UNLABELED_NAMESPACE: &str = r#"apiVersion: v1
kind: Namespace
metadata:
  name: default
"#;

/// Denies any review whose object carries no `owner` label.
const ENGINE_SCRIPT: &str = r#"#!/bin/sh
input=$(cat)
case "$input" in
  *'"owner":"'*)
    echo '{"results":[]}'
    ;;
  *)
    echo '{"results":[{"constraint":{"group":"constraints.gatekeeper.sh","version":"v1beta1","kind":"K8sRequiredLabels","name":"all-must-have-owner"},"msg":"you must provide labels: {\"owner\"}","target":"admission.k8s.gatekeeper.sh","enforcementAction":"deny"}]}'
    ;;
esac
"#;

pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
    pub home: PathBuf,
    pub policies: PathBuf,
    pub config: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        let home = root.join("home");
        fs::create_dir_all(&home).expect("create isolated home");

        let policies = root.join("policies.yaml");
        fs::write(&policies, policies_yaml()).expect("write policies");

        let script = root.join("engine.sh");
        fs::write(&script, ENGINE_SCRIPT).expect("write engine stub");

        let config = root.join("config.toml");
        fs::write(
            &config,
            format!(
                "[engine]\ncommand = \"sh\"\nargs = [{:?}]\n",
                script.to_str().expect("script path utf8")
            ),
        )
        .expect("write config");

        Self {
            _tmp: tmp,
            root,
            home,
            policies,
            config,
        }
    }

    /// Command with an isolated HOME and no configuration file.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("gatepeeker");
        cmd.env("HOME", &self.home)
            .env_remove("GATEPEEKER_CONFIG")
            .env_remove("GATEPEEKER_EXPERIMENTAL")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Command wired to the stub engine.
    pub fn configured(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    pub fn policies_arg(&self) -> &str {
        self.policies.to_str().expect("policies path utf8")
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn run_json(&self, args: &[&str], stdin: &str) -> Value {
        let out = self
            .configured()
            .arg("--json")
            .args(args)
            .write_stdin(stdin)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }
}

pub fn policies_yaml() -> String {
    format!("---\n{TEMPLATE}---\n{CONSTRAINT}")
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("path utf8")
}
