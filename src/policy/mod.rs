//! Route a render job to single pass or precomp.

/// Scan, classify and route.
pub mod orchestrator;
