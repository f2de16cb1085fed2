//! Render risk classification.
//!
//! [`scanner`] turns a project's source tree into a [`scanner::ProjectRiskScan`];
//! [`classifier`] combines that scan with job parameters into a decision.

/// Deterministic single-pass vs. precomp classifier.
pub mod classifier;
/// Effect type to backend table.
pub mod effects;
/// Classifier input and output types.
pub mod model;
/// Project source scanning.
pub mod scanner;
