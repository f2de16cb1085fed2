use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::PolicyResult;

/// Ensure the parent directory of `path` exists.
pub(crate) fn ensure_parent_dir(path: &Path) -> PolicyResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// `path` rendered for JSON payloads and engine arguments.
pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/fs.rs"]
mod tests;
