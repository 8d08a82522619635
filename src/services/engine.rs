//! Evaluation engine seam.
//!
//! The engine is external: gatepeeker only shapes its inputs (templates,
//! constraints, review requests) and reads back violation results.
//! `ExecEngine` drives an engine command that speaks JSON over stdin/stdout.

use crate::domain::models::{Constraint, ConstraintTemplate, GroupVersionKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// One resource submitted for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRequest {
    pub kind: GroupVersionKind,
    pub namespace: String,
    pub name: String,
    pub object: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOptions {
    pub enforcement_point: String,
    pub tracing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConstraintRef {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub constraint: ConstraintRef,
    #[serde(rename = "msg")]
    pub message: String,
    #[serde(default)]
    pub target: String,
    pub enforcement_action: String,
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("template {0} does not declare a constraint kind")]
    MissingConstraintKind(String),
    #[error("template {0} declares no targets")]
    NoTargets(String),
    #[error("constraint {0} has no name")]
    UnnamedConstraint(String),
    #[error("no template loaded for constraint kind {kind} ({key})")]
    UnknownConstraintKind { kind: String, key: String },
    #[error("failed to start engine {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("engine {command} exited with {status}: {stderr}")]
    Exit {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("engine response could not be decoded: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),
}

pub trait PolicyEngine {
    fn add_template(&mut self, template: &ConstraintTemplate) -> Result<(), EngineError>;
    fn add_constraint(&mut self, constraint: &Constraint) -> Result<(), EngineError>;
    fn review(
        &self,
        request: &ReviewRequest,
        options: &ReviewOptions,
    ) -> Result<Vec<Violation>, EngineError>;
}

#[derive(Deserialize)]
struct EngineResponse {
    #[serde(default)]
    results: Vec<Violation>,
    #[serde(default)]
    trace: Option<Value>,
}

/// Engine adapter spawning `command args...` once per review.
///
/// Loaded policies are held by the adapter and sent with every request.
#[derive(Debug, Clone)]
pub struct ExecEngine {
    command: String,
    args: Vec<String>,
    templates: Vec<(String, Value)>,
    constraints: Vec<Value>,
}

impl ExecEngine {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            templates: vec![],
            constraints: vec![],
        }
    }

    fn request_body(
        &self,
        request: &ReviewRequest,
        options: &ReviewOptions,
    ) -> Result<Vec<u8>, EngineError> {
        let templates: Vec<&Value> = self.templates.iter().map(|(_, t)| t).collect();
        let payload = serde_json::json!({
            "templates": templates,
            "constraints": self.constraints,
            "review": request,
            "enforcementPoint": options.enforcement_point,
            "tracing": options.tracing,
        });
        Ok(serde_json::to_vec(&payload)?)
    }
}

fn decode_response(stdout: &[u8]) -> Result<Vec<Violation>, EngineError> {
    let resp: EngineResponse = serde_json::from_slice(stdout)?;
    if let Some(trace) = resp.trace {
        debug!(%trace, "engine trace");
    }
    Ok(resp.results)
}

impl PolicyEngine for ExecEngine {
    fn add_template(&mut self, template: &ConstraintTemplate) -> Result<(), EngineError> {
        let key = template.resource_key();
        let kind = template.constraint_kind().to_string();
        if kind.is_empty() {
            return Err(EngineError::MissingConstraintKind(key));
        }
        if template.document().spec.targets.is_empty() {
            return Err(EngineError::NoTargets(key));
        }
        let body = serde_json::to_value(template.document())?;
        match self.templates.iter_mut().find(|(k, _)| *k == kind) {
            Some(existing) => existing.1 = body,
            None => self.templates.push((kind, body)),
        }
        Ok(())
    }

    fn add_constraint(&mut self, constraint: &Constraint) -> Result<(), EngineError> {
        let key = constraint.resource_key();
        if constraint.name().is_empty() {
            return Err(EngineError::UnnamedConstraint(key));
        }
        if !self.templates.iter().any(|(k, _)| k == constraint.kind()) {
            return Err(EngineError::UnknownConstraintKind {
                kind: constraint.kind().to_string(),
                key,
            });
        }
        let same = |v: &Value| {
            v.get("kind").and_then(Value::as_str) == Some(constraint.kind())
                && v.pointer("/metadata/name").and_then(Value::as_str) == Some(constraint.name())
        };
        match self.constraints.iter_mut().find(|v| same(v)) {
            Some(existing) => *existing = constraint.object().clone(),
            None => self.constraints.push(constraint.object().clone()),
        }
        Ok(())
    }

    fn review(
        &self,
        request: &ReviewRequest,
        options: &ReviewOptions,
    ) -> Result<Vec<Violation>, EngineError> {
        let body = self.request_body(request, options)?;
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        // The engine may answer before draining stdin; write from another thread.
        let stdin = child.stdin.take();
        let writer = std::thread::spawn(move || -> io::Result<()> {
            match stdin {
                Some(mut s) => s.write_all(&body),
                None => Ok(()),
            }
        });
        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(io::Error::other("engine stdin writer panicked").into()),
        }

        if !output.status.success() {
            return Err(EngineError::Exit {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        decode_response(&output.stdout)
    }
}
