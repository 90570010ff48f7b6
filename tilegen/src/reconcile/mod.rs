//! Gap detection: which planned tiles are not on disk yet.
//!
//! The filesystem is the source of truth for completion. A tile counts as
//! present when a file at `{output_root}/{project}/{z}/{x}/{y}.png` passes the
//! configured [`TileCheck`]; worker reports are never trusted on their own.

mod check;
mod report;

pub use check::{TileCheck, PNG_SIGNATURE};
pub use report::{reconcile, ValidationReport, ZoomValidation};
