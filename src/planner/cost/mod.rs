//! Cost estimation - advisory row and scan-size estimates.
//!
//! Estimates come from catalog statistics and never block execution:
//! statistics may be stale or missing, so callers only use them to warn.

mod estimator;

pub use estimator::{CostEstimate, CostEstimator, DEFAULT_AVG_ROW_BYTES, DEFAULT_ROW_COUNT};
