use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ReportError {
    #[error("a result for {0} was already recorded")]
    DuplicateKey(String),
}

/// Outcome of reviewing one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceResult {
    pub key: String,
    pub warnings: Vec<String>,
    pub denials: Vec<String>,
}

impl ResourceResult {
    pub fn status(&self) -> &'static str {
        if self.denials.is_empty() {
            "PASS"
        } else {
            "FAILED"
        }
    }

    pub fn failure_count(&self) -> usize {
        self.denials.len()
    }
}

/// A document that could not be reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub subject: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    results: BTreeMap<String, ResourceResult>,
    failure_count: usize,
    failures: Vec<DocumentFailure>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `result`; an existing key is never overwritten.
    pub fn add_result(&mut self, result: ResourceResult) -> Result<(), ReportError> {
        if self.results.contains_key(&result.key) {
            return Err(ReportError::DuplicateKey(result.key));
        }
        self.failure_count += result.failure_count();
        self.results.insert(result.key.clone(), result);
        Ok(())
    }

    pub fn record_failure(&mut self, subject: impl Into<String>, error: impl ToString) {
        self.failures.push(DocumentFailure {
            subject: subject.into(),
            error: error.to_string(),
        });
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    #[cfg(test)]
    pub fn results(&self) -> impl Iterator<Item = &ResourceResult> {
        self.results.values()
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&ResourceResult> {
        self.results.get(key)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn failures(&self) -> &[DocumentFailure] {
        &self.failures
    }

    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        for (key, result) in &self.results {
            writeln!(w, "{} {}", result.status(), key)?;
            for warning in &result.warnings {
                writeln!(w, "  WARNING {}", warning)?;
            }
            for denial in &result.denials {
                writeln!(w, "  FAILED {}", denial)?;
            }
        }
        for failure in &self.failures {
            writeln!(w, "ERROR {}: {}", failure.subject, failure.error)?;
        }
        Ok(())
    }
}
