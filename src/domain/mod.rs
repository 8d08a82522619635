//! Shared data model layer (structs/constants only).
//!
//! ## Files
//! - `models.rs` — policy records, identity keys, output envelopes.
//! - `constants.rs` — API groups, enforcement vocabulary, defaults.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem/network/engine side effects.
//!
//! ## Compatibility note
//! Changes in the output structs affect `--json` outputs.
//! Keep schema-impacting changes synchronized with `docs/contracts/*`.

pub mod constants;
pub mod models;
