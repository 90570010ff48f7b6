//! Terminal output for tilegen runs.

mod progress;

pub use progress::ProgressDisplay;
