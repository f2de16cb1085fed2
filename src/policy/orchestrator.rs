use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::engine::RenderEngine;
use crate::foundation::error::PolicyResult;
use crate::precomp::cache_key::{
    OutputFormat, PrecompCacheInput, ResolvedRenderer, input_props_hash,
};
use crate::precomp::lock::LockOptions;
use crate::precomp::pipeline::{DEFAULT_CACHE_DIR, RunPrecompOptions, RunPrecompResult, run_precomp};
use crate::risk::classifier::classify;
use crate::risk::model::{
    ChromeMode, ClassifierInput, ClassifierReason, Decision, ExecutionEnvironment, RenderMode,
    RequestedRenderer,
};
use crate::risk::scanner::{DEFAULT_SOURCE_DIR, ProjectRiskScan, scan_source_tree};

/// Process exit code for a successful (or safely routed) job.
pub const EXIT_OK: i32 = 0;
/// Process exit code for a generic failure.
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code when the unsafe single-pass override fails fast.
pub const EXIT_UNSAFE_FAILED: i32 = 2;

/// Default `maxDelayRenderMs` timeout guard.
pub const DEFAULT_MAX_DELAY_RENDER_MS: u64 = 120_000;

/// Parameters forwarded to the two-pass pipeline when a job is routed there.
#[derive(Clone, Debug)]
pub struct PrecompPassThrough {
    /// Composition rendered in pass 2; defaults to the job's composition.
    pub effects_composition_id: Option<String>,
    /// Project entry point; `<project>/src/index.ts` when `None`.
    pub entry_point: Option<PathBuf>,
    /// Render for real (otherwise dry run).
    pub execute_render: bool,
    /// Video or still output.
    pub output_format: OutputFormat,
    /// Cache root; `<project>/.cache/precomp` when `None`.
    pub cache_root: Option<PathBuf>,
    /// Ignore cached artifacts.
    pub no_cache: bool,
    /// Resolve true geometry during dry runs.
    pub resolve_composition_metadata: bool,
    /// Write a placeholder reference frame during dry runs.
    pub write_placeholder_frame: bool,
    /// Frames per second assumed until the engine reports the real value.
    pub fps: f64,
    /// Length in frames assumed until the engine reports the real value.
    pub duration_in_frames: u64,
    /// Width assumed until the engine reports the real value.
    pub width: u32,
    /// Height assumed until the engine reports the real value.
    pub height: u32,
    /// Render with an alpha channel.
    pub include_alpha: bool,
    /// Encoder pixel format.
    pub pixel_format: String,
    /// Codec for media renders.
    pub codec: String,
    /// Props for both compositions.
    pub input_props: Value,
    /// Rendering dependency versions folded into the cache key.
    pub package_versions: BTreeMap<String, String>,
    /// Advisory cache-entry lock.
    pub lock: Option<LockOptions>,
}

impl Default for PrecompPassThrough {
    fn default() -> Self {
        Self {
            effects_composition_id: None,
            entry_point: None,
            execute_render: false,
            output_format: OutputFormat::Media,
            cache_root: None,
            no_cache: false,
            resolve_composition_metadata: false,
            write_placeholder_frame: true,
            fps: 30.0,
            duration_in_frames: 1,
            width: 1920,
            height: 1080,
            include_alpha: false,
            pixel_format: "yuv420p".to_string(),
            codec: "h264".to_string(),
            input_props: Value::Object(Default::default()),
            package_versions: BTreeMap::from([(
                env!("CARGO_PKG_NAME").to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            )]),
            lock: None,
        }
    }
}

/// Options for [`decide`].
#[derive(Clone, Debug)]
pub struct RenderPolicyOptions {
    /// Project root (scanned under `src/` unless `source_root` is set).
    pub project_root: PathBuf,
    /// Directory to scan instead of `<project>/src`.
    pub source_root: Option<PathBuf>,
    /// Composition being rendered.
    pub composition_id: String,
    /// Studio or batch render.
    pub render_mode: RenderMode,
    /// Chrome build.
    pub chrome_mode: ChromeMode,
    /// Renderer asked for.
    pub requested_renderer: RequestedRenderer,
    /// Host environment; detected from the process environment when `None`.
    pub environment: Option<ExecutionEnvironment>,
    /// Chromium GL backend.
    pub gl_backend: Option<String>,
    /// Render concurrency hint.
    pub concurrency: Option<u32>,
    /// Output color space.
    pub color_space: Option<String>,
    /// Try the single-pass path even when the job is risky.
    pub allow_unsafe_single_pass: bool,
    /// When the unsafe attempt times out, fall back to the two-pass path.
    pub fallback_on_timeout: bool,
    /// Timeout guard for the unsafe attempt.
    pub max_delay_render_ms: u64,
    /// Two-pass pipeline parameters.
    pub precomp: PrecompPassThrough,
}

impl RenderPolicyOptions {
    /// Options with documented defaults for `composition_id` in `project_root`.
    pub fn new(project_root: impl Into<PathBuf>, composition_id: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            source_root: None,
            composition_id: composition_id.into(),
            render_mode: RenderMode::Render,
            chrome_mode: ChromeMode::HeadlessShell,
            requested_renderer: RequestedRenderer::Auto,
            environment: None,
            gl_backend: None,
            concurrency: None,
            color_space: None,
            allow_unsafe_single_pass: false,
            fallback_on_timeout: true,
            max_delay_render_ms: DEFAULT_MAX_DELAY_RENDER_MS,
            precomp: PrecompPassThrough::default(),
        }
    }

    /// Directory scanned for risk factors.
    pub fn source_dir(&self) -> PathBuf {
        self.source_root
            .clone()
            .unwrap_or_else(|| self.project_root.join(DEFAULT_SOURCE_DIR))
    }

    fn cache_input(&self, scan: &ProjectRiskScan) -> PrecompCacheInput {
        let p = &self.precomp;
        PrecompCacheInput {
            composition_id: self.composition_id.clone(),
            fps: p.fps,
            duration_in_frames: p.duration_in_frames,
            width: p.width,
            height: p.height,
            include_alpha: p.include_alpha,
            color_space: self
                .color_space
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            pixel_format: p.pixel_format.clone(),
            chrome_mode: self.chrome_mode.clone(),
            gl_backend: self
                .gl_backend
                .clone()
                .unwrap_or_else(|| "angle".to_string()),
            renderer: match self.requested_renderer {
                RequestedRenderer::Webgpu => ResolvedRenderer::Webgpu,
                _ => ResolvedRenderer::Webgl,
            },
            input_props_hash: input_props_hash(&p.input_props),
            effect_graph_hash: scan.effect_graph_hash.clone(),
            package_versions: p.package_versions.clone(),
        }
    }

    /// Classifier input for this job given the project's scan.
    pub fn classifier_input(&self, scan: &ProjectRiskScan) -> ClassifierInput {
        ClassifierInput {
            composition_id: self.composition_id.clone(),
            render_mode: self.render_mode.clone(),
            chrome_mode: self.chrome_mode.clone(),
            requested_renderer: self.requested_renderer.clone(),
            contains_three_canvas: scan.contains_three_canvas,
            effect_types: scan.effect_types.clone(),
            effect_backends: scan.effect_backends.clone(),
            environment: self
                .environment
                .clone()
                .unwrap_or_else(ExecutionEnvironment::detect),
            gl_backend: self.gl_backend.clone(),
            concurrency: self.concurrency.map(f64::from),
            color_space: self.color_space.clone(),
        }
    }

    /// Pipeline options for this job given the project's scan.
    pub fn run_precomp_options(&self, scan: &ProjectRiskScan) -> RunPrecompOptions {
        let p = &self.precomp;
        let entry_point = p
            .entry_point
            .clone()
            .unwrap_or_else(|| self.project_root.join(DEFAULT_SOURCE_DIR).join("index.ts"));
        let cache_root = p
            .cache_root
            .clone()
            .unwrap_or_else(|| self.project_root.join(DEFAULT_CACHE_DIR));
        RunPrecompOptions {
            effects_composition_id: p.effects_composition_id.clone(),
            execute_render: p.execute_render,
            output_format: p.output_format,
            no_cache: p.no_cache,
            resolve_composition_metadata: p.resolve_composition_metadata,
            write_placeholder_frame: p.write_placeholder_frame,
            input_props: p.input_props.clone(),
            codec: p.codec.clone(),
            concurrency: self.concurrency,
            lock: p.lock,
            ..RunPrecompOptions::new(
                self.composition_id.clone(),
                entry_point,
                cache_root,
                self.cache_input(scan),
            )
        }
    }
}

/// Which path a job was routed down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutedPath {
    /// Render directly.
    SinglePass,
    /// Render through the two-pass pipeline.
    Precomp,
    /// Unsafe override requested without fallback.
    UnsafeSinglePassFailed,
}

/// Outcome of [`decide`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPolicyResult {
    /// Process exit code for this outcome.
    pub exit_code: i32,
    /// Classifier decision.
    pub decision: Decision,
    /// Classifier fingerprint.
    pub fingerprint: String,
    /// Path the job was routed down.
    pub routed_path: RoutedPath,
    /// Classifier reasons.
    pub reasons: Vec<ClassifierReason>,
    /// Project scan the classification was based on.
    pub scan: ProjectRiskScan,
    /// Pipeline result when routed to the two-pass path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precomp: Option<RunPrecompResult>,
}

/// Scan, classify and route one render job.
#[tracing::instrument(skip_all, fields(composition = %opts.composition_id))]
pub fn decide(
    engine: &dyn RenderEngine,
    opts: &RenderPolicyOptions,
) -> PolicyResult<RenderPolicyResult> {
    let scan = scan_source_tree(&opts.source_dir())?;

    let classification = classify(&opts.classifier_input(&scan));

    let routed = |exit_code, routed_path, precomp| RenderPolicyResult {
        exit_code,
        decision: classification.decision,
        fingerprint: classification.fingerprint.clone(),
        routed_path,
        reasons: classification.reasons.clone(),
        scan: scan.clone(),
        precomp,
    };

    if classification.decision == Decision::SinglePassSafe {
        tracing::info!(fingerprint = %classification.fingerprint, "routing to single pass");
        return Ok(routed(EXIT_OK, RoutedPath::SinglePass, None));
    }

    if opts.allow_unsafe_single_pass {
        // The unsafe attempt is a policy decision, not a live race: no single-pass render is
        // started and no timer is armed. `fallback_on_timeout` decides the outcome as if the
        // `max_delay_render_ms` guard had fired.
        tracing::warn!(
            max_delay_render_ms = opts.max_delay_render_ms,
            fallback = opts.fallback_on_timeout,
            "unsafe single pass requested for a risky job; treating as timed out"
        );
        if !opts.fallback_on_timeout {
            return Ok(routed(
                EXIT_UNSAFE_FAILED,
                RoutedPath::UnsafeSinglePassFailed,
                None,
            ));
        }
    }

    tracing::info!(fingerprint = %classification.fingerprint, "routing to precomp");
    let precomp = run_precomp(engine, &opts.run_precomp_options(&scan))?;
    Ok(routed(EXIT_OK, RoutedPath::Precomp, Some(precomp)))
}

#[cfg(test)]
#[path = "../../tests/unit/policy/orchestrator.rs"]
mod tests;
