//! Two-pass pre-composition pipeline and its content-addressed cache.

/// Cache keys and metadata files.
pub mod cache_key;
/// On-disk layout of one cache entry.
pub mod layout;
/// Advisory lock on a cache entry.
pub mod lock;
/// Pass 1 / pass 2 orchestration.
pub mod pipeline;
/// Retention sweep of the pass-1 tree.
pub mod sweep;
