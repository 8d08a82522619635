//! Service layer containing business logic and side-effect helpers.
//!
//! ## Service map
//! - `registry.rs` — known policy resource types + document classification.
//! - `writers.rs` — YAML rendering, filesystem layout, tar.gz archives.
//! - `oci.rs` — OCI image-layout packaging.
//! - `engine.rs` — evaluation engine seam + external-process adapter.
//! - `validating.rs` — validation orchestrator (load, review, interpret).
//! - `reporting.rs` — keyed per-resource report + rendering.
//! - `sources.rs` — source location parsing and byte loading.
//! - `config.rs` — TOML configuration.
//! - `output.rs` — JSON/text output helpers.
//!
//! ## Conventions
//! - Prefer pure helpers where possible.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.

pub mod config;
pub mod engine;
pub mod oci;
pub mod output;
pub mod registry;
pub mod reporting;
pub mod sources;
pub mod validating;
pub mod writers;
