use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;
use serde_json::Value;

use crate::engine::{
    ChromiumOptions, CompositionInfo, EngineCallOpts, MediaRenderOpts, RenderEngine, ServeHandle,
    select_composition,
};
use crate::foundation::error::{PolicyError, PolicyResult};
use crate::foundation::fs::{ensure_parent_dir, path_string};
use crate::precomp::cache_key::{
    OutputFormat, PrecompCacheInput, PrecompMetadata, create_cache_key, metadata_matches,
    normalize_cache_input, read_metadata, write_metadata,
};
use crate::precomp::layout::{PrecompLayout, validate_composition_id};
use crate::precomp::lock::{CacheLock, LockOptions};

/// Cache root used when the caller does not pick one, relative to the project root.
pub const DEFAULT_CACHE_DIR: &str = ".cache/precomp";

/// Options for [`run_precomp`].
#[derive(Clone, Debug)]
pub struct RunPrecompOptions {
    /// Composition rendered in pass 1.
    pub source_composition_id: String,
    /// Composition rendered in pass 2; defaults to the source composition.
    pub effects_composition_id: Option<String>,
    /// Project entry point handed to [`RenderEngine::bundle`].
    pub entry_point: PathBuf,
    /// `false` is a dry run: metadata and placeholders only, no pixels.
    pub execute_render: bool,
    /// Video or single-frame output.
    pub output_format: OutputFormat,
    /// Render parameters; geometry is replaced by the engine's in real-render mode.
    pub cache_input: PrecompCacheInput,
    /// Root of the `pass1/` and `final/` trees.
    pub cache_root: PathBuf,
    /// Ignore existing artifacts and metadata.
    pub no_cache: bool,
    /// In dry runs, ask the engine for true composition geometry.
    pub resolve_composition_metadata: bool,
    /// In dry runs, make sure a placeholder reference frame exists.
    pub write_placeholder_frame: bool,
    /// Props for both compositions.
    pub input_props: Value,
    /// Codec for media renders.
    pub codec: String,
    /// Render concurrency hint for media renders.
    pub concurrency: Option<u32>,
    /// Hold an advisory lock on the cache entry while producing artifacts.
    pub lock: Option<LockOptions>,
}

impl RunPrecompOptions {
    /// Dry-run options with documented defaults for everything but the required fields.
    pub fn new(
        source_composition_id: impl Into<String>,
        entry_point: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
        cache_input: PrecompCacheInput,
    ) -> Self {
        Self {
            source_composition_id: source_composition_id.into(),
            effects_composition_id: None,
            entry_point: entry_point.into(),
            execute_render: false,
            output_format: OutputFormat::Media,
            cache_input,
            cache_root: cache_root.into(),
            no_cache: false,
            resolve_composition_metadata: false,
            write_placeholder_frame: true,
            input_props: Value::Object(Default::default()),
            codec: "h264".to_string(),
            concurrency: None,
            lock: None,
        }
    }

    fn effects_id(&self) -> &str {
        self.effects_composition_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.source_composition_id.as_str())
    }
}

/// Outcome of [`run_precomp`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPrecompResult {
    /// Pass-1 metadata matched before this run.
    pub cache_hit: bool,
    /// Key addressing both cache directories.
    pub cache_key: String,
    /// Composition rendered in pass 2.
    pub effects_composition_id: String,
    /// Final artifact.
    pub final_output_path: PathBuf,
    /// Pass-1 directory.
    pub pass1_dir: PathBuf,
    /// Pass-1 metadata file.
    pub pass1_metadata_path: PathBuf,
    /// Pass-1 artifact handed to pass 2.
    pub pass1_output_path: PathBuf,
    /// Pass-1 reference frame.
    pub pass1_reference_frame_path: PathBuf,
    /// Final directory.
    pub final_dir: PathBuf,
    /// Final metadata file.
    pub final_metadata_path: PathBuf,
    /// Metadata written for this run.
    pub metadata: PrecompMetadata,
    /// Artifact kind.
    pub output_format: OutputFormat,
    /// Composition rendered in pass 1.
    pub source_composition_id: String,
}

/// Decision on which passes need rendering for one cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStatus {
    /// Pass-1 metadata matches the expected metadata exactly.
    pub cache_hit: bool,
    /// Pass 1 must be (re)rendered.
    pub render_pass1: bool,
    /// The final output must be (re)rendered.
    pub render_final: bool,
}

impl CacheStatus {
    /// Inspect the cache entry at `layout` against `expected`.
    ///
    /// Final output freshness is existence-only. Unlike pass 1 it is not gated on a metadata
    /// match, so a stale `output.*` next to changed pass-1 metadata is reused.
    pub fn inspect(
        layout: &PrecompLayout,
        expected: &PrecompMetadata,
        format: OutputFormat,
        no_cache: bool,
    ) -> Self {
        let on_disk = read_metadata(&layout.pass1_metadata_path);
        let cache_hit = !no_cache && metadata_matches(on_disk.as_ref(), expected);
        let render_pass1 = !cache_hit
            || !layout.pass1_output_path.exists()
            || (format == OutputFormat::Media && !layout.pass1_reference_frame_path.exists());
        let render_final = no_cache || !layout.final_output_path.exists();
        Self {
            cache_hit,
            render_pass1,
            render_final,
        }
    }
}

/// Run the two-pass pre-composition pipeline for one job.
///
/// Pass 1 renders the source composition (or confirms it cached); pass 2 renders the effects
/// composition with pass-1 artifact paths merged into its input props. Dry runs
/// (`execute_render == false`) only write metadata and, optionally, a placeholder frame.
#[tracing::instrument(
    skip_all,
    fields(source = %opts.source_composition_id, execute = opts.execute_render)
)]
pub fn run_precomp(
    engine: &dyn RenderEngine,
    opts: &RunPrecompOptions,
) -> PolicyResult<RunPrecompResult> {
    // The id becomes a directory name under both cache trees.
    validate_composition_id(opts.cache_input.composition_id.trim())?;
    if opts.execute_render {
        run_render(engine, opts)
    } else {
        run_dry(engine, opts)
    }
}

fn run_dry(
    engine: &dyn RenderEngine,
    opts: &RunPrecompOptions,
) -> PolicyResult<RunPrecompResult> {
    let cache_input = if opts.resolve_composition_metadata {
        let (serve, call) = bundle(engine, opts)?;
        let comps = engine
            .discover_compositions(&serve, &call)
            .map_err(|e| engine_context("composition discovery", e))?;
        let source = select_composition(&comps, &opts.source_composition_id)?;
        with_geometry(&opts.cache_input, source)
    } else {
        normalize_cache_input(&opts.cache_input)
    };

    let (layout, metadata) = plan(opts, cache_input);
    let _lock = lock_entry(&layout, opts)?;
    let status = CacheStatus::inspect(&layout, &metadata, opts.output_format, opts.no_cache);
    tracing::info!(key = %metadata.cache_key, hit = status.cache_hit, "precomp dry run");

    write_metadata(&layout.pass1_metadata_path, &metadata)?;
    write_metadata(&layout.final_metadata_path, &metadata)?;
    if opts.write_placeholder_frame {
        ensure_placeholder_frame(&layout.pass1_reference_frame_path)?;
    }

    Ok(result(opts, layout, metadata, status.cache_hit))
}

fn run_render(
    engine: &dyn RenderEngine,
    opts: &RunPrecompOptions,
) -> PolicyResult<RunPrecompResult> {
    let (serve, call) = bundle(engine, opts)?;

    let (source_comps, effects_comps) = rayon::join(
        || engine.discover_compositions(&serve, &call),
        || engine.discover_compositions(&serve, &call),
    );
    let source_comps = source_comps.map_err(|e| engine_context("composition discovery", e))?;
    let effects_comps = effects_comps.map_err(|e| engine_context("composition discovery", e))?;
    let source = select_composition(&source_comps, &opts.source_composition_id)?;
    let effects = select_composition(&effects_comps, opts.effects_id())?;

    let cache_input = with_geometry(&opts.cache_input, source);
    let (layout, metadata) = plan(opts, cache_input);
    let _lock = lock_entry(&layout, opts)?;
    let status = CacheStatus::inspect(&layout, &metadata, opts.output_format, opts.no_cache);
    tracing::info!(
        key = %metadata.cache_key,
        hit = status.cache_hit,
        pass1 = status.render_pass1,
        final_ = status.render_final,
        "precomp render plan"
    );

    if status.render_pass1 {
        if opts.output_format == OutputFormat::Media {
            let media = media_opts(opts, &call);
            engine
                .render_media(&serve, source, &layout.pass1_output_path, &media)
                .map_err(|e| engine_context("pass 1 media render", e))?;
        }
        render_reference_frame(engine, &serve, source, &layout, &call)?;
    } else {
        tracing::debug!("pass 1 served from cache");
    }

    let effects_call = EngineCallOpts {
        chromium: call.chromium.clone(),
        input_props: effects_props(&opts.input_props, &layout, &metadata.cache_key),
    };
    if status.render_final {
        let rendered = match opts.output_format {
            OutputFormat::Media => engine.render_media(
                &serve,
                effects,
                &layout.final_output_path,
                &media_opts(opts, &effects_call),
            ),
            OutputFormat::Still => engine.render_still(
                &serve,
                effects,
                0,
                &layout.final_output_path,
                &effects_call,
            ),
        };
        rendered.map_err(|e| engine_context("final render", e))?;
    } else {
        tracing::debug!("final output served from cache");
    }

    write_metadata(&layout.pass1_metadata_path, &metadata)?;
    write_metadata(&layout.final_metadata_path, &metadata)?;

    Ok(result(opts, layout, metadata, status.cache_hit))
}

fn bundle(
    engine: &dyn RenderEngine,
    opts: &RunPrecompOptions,
) -> PolicyResult<(ServeHandle, EngineCallOpts)> {
    if !opts.entry_point.exists() {
        return Err(PolicyError::validation(format!(
            "entry point not found: expected a project entry file at '{}'",
            opts.entry_point.display()
        )));
    }
    let serve = engine
        .bundle(&opts.entry_point)
        .map_err(|e| engine_context("bundle", e))?;
    let call = EngineCallOpts {
        chromium: ChromiumOptions {
            gl: Some(opts.cache_input.gl_backend.trim().to_string()).filter(|s| !s.is_empty()),
            chrome_mode: Some(opts.cache_input.chrome_mode.trimmed().to_string()),
        },
        input_props: opts.input_props.clone(),
    };
    Ok((serve, call))
}

fn with_geometry(input: &PrecompCacheInput, comp: &CompositionInfo) -> PrecompCacheInput {
    let mut resolved = normalize_cache_input(input);
    resolved.fps = comp.fps;
    resolved.duration_in_frames = comp.duration_in_frames;
    resolved.width = comp.width;
    resolved.height = comp.height;
    resolved
}

fn plan(
    opts: &RunPrecompOptions,
    cache_input: PrecompCacheInput,
) -> (PrecompLayout, PrecompMetadata) {
    let cache_key = create_cache_key(&cache_input);
    let layout = PrecompLayout::new(
        &opts.cache_root,
        &cache_input.composition_id,
        &cache_key,
        opts.output_format,
    );
    let metadata = PrecompMetadata {
        input: cache_input,
        cache_key,
        effects_composition_id: opts.effects_id().to_string(),
        entry_point: path_string(&opts.entry_point),
        output_format: opts.output_format,
        source_composition_id: opts.source_composition_id.clone(),
    };
    (layout, metadata)
}

fn lock_entry(
    layout: &PrecompLayout,
    opts: &RunPrecompOptions,
) -> PolicyResult<Option<CacheLock>> {
    opts.lock
        .as_ref()
        .map(|lock_opts| CacheLock::acquire(&layout.pass1_dir, lock_opts))
        .transpose()
}

fn render_reference_frame(
    engine: &dyn RenderEngine,
    serve: &ServeHandle,
    source: &CompositionInfo,
    layout: &PrecompLayout,
    call: &EngineCallOpts,
) -> PolicyResult<()> {
    engine
        .render_still(serve, source, 0, &layout.pass1_reference_frame_path, call)
        .map_err(|e| engine_context("pass 1 reference frame", e))
}

fn media_opts(opts: &RunPrecompOptions, call: &EngineCallOpts) -> MediaRenderOpts {
    MediaRenderOpts {
        codec: opts.codec.clone(),
        concurrency: opts.concurrency,
        call: call.clone(),
    }
}

/// Caller props plus the pass-1 artifact locations the effects composition reads.
pub fn effects_props(props: &Value, layout: &PrecompLayout, cache_key: &str) -> Value {
    let mut map = match props {
        Value::Object(m) => m.clone(),
        Value::Null => serde_json::Map::new(),
        other => {
            let mut m = serde_json::Map::new();
            m.insert("props".to_string(), other.clone());
            m
        }
    };
    map.insert(
        "precompPass1Dir".to_string(),
        Value::String(path_string(&layout.pass1_dir)),
    );
    map.insert(
        "precompPass1OutputPath".to_string(),
        Value::String(path_string(&layout.pass1_output_path)),
    );
    map.insert(
        "precompPass1ReferenceFramePath".to_string(),
        Value::String(path_string(&layout.pass1_reference_frame_path)),
    );
    map.insert(
        "precompCacheKey".to_string(),
        Value::String(cache_key.to_string()),
    );
    Value::Object(map)
}

/// Write a 1x1 transparent PNG at `path` unless a file already exists there.
pub fn ensure_placeholder_frame(path: &Path) -> PolicyResult<()> {
    if path.exists() {
        return Ok(());
    }
    ensure_parent_dir(path)?;
    image::save_buffer_with_format(
        path,
        &[0u8, 0, 0, 0],
        1,
        1,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write placeholder frame '{}'", path.display()))?;
    Ok(())
}

fn engine_context(stage: &str, err: PolicyError) -> PolicyError {
    match err {
        PolicyError::Engine(msg) => PolicyError::engine(format!("{stage}: {msg}")),
        other => other,
    }
}

fn result(
    opts: &RunPrecompOptions,
    layout: PrecompLayout,
    metadata: PrecompMetadata,
    cache_hit: bool,
) -> RunPrecompResult {
    RunPrecompResult {
        cache_hit,
        cache_key: metadata.cache_key.clone(),
        effects_composition_id: metadata.effects_composition_id.clone(),
        final_output_path: layout.final_output_path,
        pass1_dir: layout.pass1_dir,
        pass1_metadata_path: layout.pass1_metadata_path,
        pass1_output_path: layout.pass1_output_path,
        pass1_reference_frame_path: layout.pass1_reference_frame_path,
        final_dir: layout.final_dir,
        final_metadata_path: layout.final_metadata_path,
        output_format: opts.output_format,
        source_composition_id: opts.source_composition_id.clone(),
        metadata,
    }
}
