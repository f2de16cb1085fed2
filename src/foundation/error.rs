/// Convenience result type used across the crate.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Top-level error taxonomy for scanning, caching and routing.
#[derive(thiserror::Error, Debug)]
pub enum PolicyError {
    /// Invalid caller configuration (missing entry point, unknown composition id, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Failures reported by (or while reaching) the external rendering engine.
    #[error("render engine error: {0}")]
    Engine(String),

    /// Filesystem failures under the cache root.
    #[error("cache error: {0}")]
    Cache(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PolicyError {
    /// Build a [`PolicyError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PolicyError::Engine`] value.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Build a [`PolicyError::Cache`] value.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Build a [`PolicyError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
