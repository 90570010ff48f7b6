//! CLI command implementations.
//!
//! Each handler returns the process exit code on success.
//!
//! # Command Modules
//!
//! - [`estimate`] - Per-zoom tile counts for a project
//! - [`run`] - Full generation pipeline
//! - [`validate`] - Disk-only validation report
//! - [`script`] - Print the synthesized worker program

pub mod common;
pub mod estimate;
pub mod run;
pub mod script;
pub mod validate;
