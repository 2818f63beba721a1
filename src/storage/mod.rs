//!
//! mediconnect-auth storage module
//! -------------------------------
//! This module implements the on-device key-value store backing the session
//! layer. Each key maps to one JSON document at `<root>/<key>.json`; writes go
//! through a temp file and an atomic rename so a restart immediately after any
//! mutation observes either the previous or the new state, never a torn one.
//!
//! Key responsibilities:
//! - Exact serde round-trips for any serializable record.
//! - Soft-failing reads on the startup path (absence is `Ok(None)`).
//! - Unconditional removal for logout.
//!
//! The public API centers around `SessionStorage`, a cheap `Clone` handle over
//! the configured root folder.

mod paths;
pub mod kv;

pub use kv::SessionStorage;
