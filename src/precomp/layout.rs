use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::foundation::error::{PolicyError, PolicyResult};
use crate::precomp::cache_key::OutputFormat;

/// Directory holding pass-1 artifacts under the cache root.
pub const PASS1_DIR: &str = "pass1";
/// Directory holding final artifacts under the cache root.
pub const FINAL_DIR: &str = "final";
/// Metadata file name inside every cache directory.
pub const METADATA_FILE: &str = "metadata.json";

const REFERENCE_FRAME: &str = "frame-000000.png";

/// Where one `(compositionId, cacheKey)` lives on disk. Pure function of its inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecompLayout {
    /// `<root>/pass1/<compositionId>/<cacheKey>`
    pub pass1_dir: PathBuf,
    /// `<pass1Dir>/metadata.json`
    pub pass1_metadata_path: PathBuf,
    /// `<pass1Dir>/frames/frame-000000.png`
    pub pass1_reference_frame_path: PathBuf,
    /// `<pass1Dir>/source.mp4` for media, the reference frame for stills.
    pub pass1_output_path: PathBuf,
    /// `<root>/final/<compositionId>/<cacheKey>`
    pub final_dir: PathBuf,
    /// `<finalDir>/metadata.json`
    pub final_metadata_path: PathBuf,
    /// `<finalDir>/output.mp4` or `<finalDir>/output.png`
    pub final_output_path: PathBuf,
}

impl PrecompLayout {
    /// Derive the layout for one cache entry.
    pub fn new(
        cache_root: &Path,
        composition_id: &str,
        cache_key: &str,
        format: OutputFormat,
    ) -> Self {
        let pass1_dir = cache_root.join(PASS1_DIR).join(composition_id).join(cache_key);
        let final_dir = cache_root.join(FINAL_DIR).join(composition_id).join(cache_key);
        let pass1_reference_frame_path = pass1_dir.join("frames").join(REFERENCE_FRAME);
        let (pass1_output_path, final_output_path) = match format {
            OutputFormat::Media => (pass1_dir.join("source.mp4"), final_dir.join("output.mp4")),
            OutputFormat::Still => (
                pass1_reference_frame_path.clone(),
                final_dir.join("output.png"),
            ),
        };

        Self {
            pass1_metadata_path: pass1_dir.join(METADATA_FILE),
            final_metadata_path: final_dir.join(METADATA_FILE),
            pass1_reference_frame_path,
            pass1_output_path,
            final_output_path,
            pass1_dir,
            final_dir,
        }
    }
}

/// Reject composition ids that would not land as exactly one directory under `pass1/` or `final/`.
pub fn validate_composition_id(id: &str) -> PolicyResult<()> {
    let problem = if id.trim().is_empty() {
        Some("must not be blank")
    } else if id == "." || id == ".." {
        Some("must not be a relative path component")
    } else if id.contains(['/', '\\', '\0']) {
        Some("must not contain path separators")
    } else {
        None
    };
    match problem {
        Some(why) => Err(PolicyError::validation(format!(
            "invalid composition id '{id}': {why}"
        ))),
        None => Ok(()),
    }
}
