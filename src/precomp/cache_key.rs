use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::error::PolicyResult;
use crate::foundation::fs::ensure_parent_dir;
use crate::foundation::stable::{prefixed_hash, stable_serialize, stable_serialize_of};
use crate::risk::model::ChromeMode;

/// Renderer the two-pass pipeline actually runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedRenderer {
    /// WebGL.
    Webgl,
    /// WebGPU.
    Webgpu,
}

/// Artifact kind produced by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Video (`.mp4`).
    Media,
    /// Single frame (`.png`).
    Still,
}

/// Every parameter that influences the bytes of two-pass output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecompCacheInput {
    /// Source composition id; also names the cache directory.
    pub composition_id: String,
    /// Frames per second.
    pub fps: f64,
    /// Composition length.
    pub duration_in_frames: u64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Whether an alpha channel is rendered.
    pub include_alpha: bool,
    /// Output color space.
    pub color_space: String,
    /// Encoder pixel format.
    pub pixel_format: String,
    /// Chrome build.
    pub chrome_mode: ChromeMode,
    /// Chromium GL backend.
    pub gl_backend: String,
    /// Renderer used for both passes.
    pub renderer: ResolvedRenderer,
    /// `ip_` hash of the input props.
    pub input_props_hash: String,
    /// `eg_` hash from the project scan.
    pub effect_graph_hash: String,
    /// Versions of the rendering dependencies (package name -> version).
    pub package_versions: BTreeMap<String, String>,
}

/// On-disk proof of what produced a cache directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecompMetadata {
    /// Parameters the artifacts were rendered with.
    #[serde(flatten)]
    pub input: PrecompCacheInput,
    /// Key derived from `input`.
    pub cache_key: String,
    /// Composition rendered in pass 2.
    pub effects_composition_id: String,
    /// Project entry point.
    pub entry_point: String,
    /// Artifact kind.
    pub output_format: OutputFormat,
    /// Composition rendered in pass 1.
    pub source_composition_id: String,
}

/// Trim every string field, including package names and versions.
pub fn normalize_cache_input(input: &PrecompCacheInput) -> PrecompCacheInput {
    PrecompCacheInput {
        composition_id: input.composition_id.trim().to_string(),
        fps: input.fps,
        duration_in_frames: input.duration_in_frames,
        width: input.width,
        height: input.height,
        include_alpha: input.include_alpha,
        color_space: input.color_space.trim().to_string(),
        pixel_format: input.pixel_format.trim().to_string(),
        chrome_mode: input.chrome_mode.trimmed(),
        gl_backend: input.gl_backend.trim().to_string(),
        renderer: input.renderer,
        input_props_hash: input.input_props_hash.trim().to_string(),
        effect_graph_hash: input.effect_graph_hash.trim().to_string(),
        package_versions: input
            .package_versions
            .iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect(),
    }
}

/// `pc_` + hash of the normalized input. Pure: no clock, no filesystem.
pub fn create_cache_key(input: &PrecompCacheInput) -> String {
    prefixed_hash("pc_", &normalize_cache_input(input))
}

/// `ip_` + hash of arbitrary input props.
pub fn input_props_hash(props: &Value) -> String {
    prefixed_hash("ip_", props)
}

/// Full canonical equality between on-disk metadata and the expected record.
///
/// Missing metadata never matches; a matching `cacheKey` with any other field different does
/// not match either.
pub fn metadata_matches(on_disk: Option<&Value>, expected: &PrecompMetadata) -> bool {
    match on_disk {
        None => false,
        Some(v) => stable_serialize(v) == stable_serialize_of(expected),
    }
}

/// Read `metadata.json`. Missing, unreadable or corrupt files read as `None`.
pub fn read_metadata(path: &Path) -> Option<Value> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable precomp metadata");
            return None;
        }
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(v) if v.is_object() => Some(v),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "precomp metadata is not a JSON object");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt precomp metadata");
            None
        }
    }
}

/// Write `metadata.json` (pretty, trailing newline), creating parent directories.
pub fn write_metadata(path: &Path, metadata: &PrecompMetadata) -> PolicyResult<()> {
    ensure_parent_dir(path)?;
    let mut text = serde_json::to_string_pretty(metadata)?;
    text.push('\n');
    std::fs::write(path, text)
        .with_context(|| format!("write precomp metadata '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/precomp/cache_key.rs"]
mod tests;
