//! Boundary to the external rendering engine.
//!
//! The precomp pipeline never produces pixels itself; it drives an implementation of
//! [`RenderEngine`]. Production uses [`ProcessEngine`], tests plug in recording stubs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::error::PolicyResult;

mod process;

pub use process::{DEFAULT_ENGINE_COMMAND, ENGINE_COMMAND_ENV, ProcessEngine};

/// Handle to a bundled project, as returned by [`RenderEngine::bundle`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeHandle {
    /// URL or directory the engine serves the bundle from.
    pub serve_url: String,
}

/// Geometry of one composition registered in the bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionInfo {
    /// Composition id.
    pub id: String,
    /// Frames per second.
    pub fps: f64,
    /// Length in frames.
    pub duration_in_frames: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Browser options forwarded with every engine call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromiumOptions {
    /// GL backend (`angle`, `swiftshader`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gl: Option<String>,
    /// Chrome build (`headless-shell` or `default`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_mode: Option<String>,
}

/// Options shared by discovery and still rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineCallOpts {
    /// Browser options.
    pub chromium: ChromiumOptions,
    /// Props handed to the composition.
    pub input_props: Value,
}

/// Options for [`RenderEngine::render_media`].
#[derive(Clone, Debug, PartialEq)]
pub struct MediaRenderOpts {
    /// Codec name, e.g. `h264`.
    pub codec: String,
    /// Parallel browser tabs; engine default when `None`.
    pub concurrency: Option<u32>,
    /// Browser options and props.
    pub call: EngineCallOpts,
}

/// The four capabilities the pipeline consumes from a rendering engine.
///
/// Implementations must report failures as errors; returning fabricated output is never
/// acceptable.
pub trait RenderEngine: Send + Sync {
    /// Build and serve the project at `entry_point`.
    fn bundle(&self, entry_point: &Path) -> PolicyResult<ServeHandle>;

    /// List the compositions registered by the bundle.
    fn discover_compositions(
        &self,
        serve: &ServeHandle,
        opts: &EngineCallOpts,
    ) -> PolicyResult<Vec<CompositionInfo>>;

    /// Render frame `frame` of `composition` to a PNG at `output`.
    fn render_still(
        &self,
        serve: &ServeHandle,
        composition: &CompositionInfo,
        frame: u64,
        output: &Path,
        opts: &EngineCallOpts,
    ) -> PolicyResult<()>;

    /// Render the whole of `composition` to a video at `output`.
    fn render_media(
        &self,
        serve: &ServeHandle,
        composition: &CompositionInfo,
        output: &Path,
        opts: &MediaRenderOpts,
    ) -> PolicyResult<()>;
}

/// Find `id` among `compositions`, or fail listing what is available.
pub fn select_composition<'a>(
    compositions: &'a [CompositionInfo],
    id: &str,
) -> PolicyResult<&'a CompositionInfo> {
    compositions.iter().find(|c| c.id == id).ok_or_else(|| {
        let available = compositions
            .iter()
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>();
        crate::PolicyError::validation(format!(
            "composition '{id}' not found; available compositions: [{}]",
            available.join(", ")
        ))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/engine/mod.rs"]
mod tests;
