//! tilegen - raster tile generation orchestration
//!
//! Turns a project's geographic scope and zoom range into a complete set of
//! `{z}/{x}/{y}.png` tiles fetched from an external rendering endpoint. The
//! engine never renders anything itself; it plans the tile grid, synthesizes
//! a worker program that fetches the tiles inside the rendering stack's
//! environment, supervises that worker and retries whatever is missing.
//!
//! # Modules
//!
//! - [`coord`] - Web Mercator lat/lon to tile math
//! - [`plan`] - scope, zoom range and the deterministic tile plan
//! - [`worker`] - worker program templates and the output line protocol
//! - [`supervisor`] - child-process execution and progress events
//! - [`reconcile`] - on-disk validation and gap detection
//! - [`pipeline`] - Plan → Generate → Validate → Retry* → Report
//! - [`config`] - project files and engine settings
//! - [`logging`] - subscriber setup for binaries

pub mod config;
pub mod context;
pub mod coord;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod reconcile;
pub mod supervisor;
pub mod worker;

pub use context::{ContextError, RunContext};
pub use coord::TileCoord;

/// Crate version, for banners and log headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
