use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use render_policy::engine::{DEFAULT_ENGINE_COMMAND, ENGINE_COMMAND_ENV};
use render_policy::policy::orchestrator::DEFAULT_MAX_DELAY_RENDER_MS;
use render_policy::precomp::pipeline::DEFAULT_CACHE_DIR;
use render_policy::risk::scanner::DEFAULT_SOURCE_DIR;
use render_policy::{
    ChromeMode, CleanOptions, EXIT_FAILURE, EXIT_OK, ExecutionEnvironment, LockOptions,
    OutputFormat, ProcessEngine, RenderMode, RenderPolicyOptions, RequestedRenderer,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const CACHE_ROOT_ENV: &str = "RENDER_POLICY_CACHE_ROOT";

#[derive(Parser, Debug)]
#[command(name = "render-policy", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a project's sources for risk factors.
    Scan(ScanArgs),
    /// Classify one render job as single-pass safe or requiring precomp.
    Classify(ClassifyArgs),
    /// Run the two-pass pipeline (dry run unless --render).
    Precomp(PrecompArgs),
    /// Scan, classify and route one render job.
    Decide(DecideArgs),
    /// Delete expired pass-1 cache entries.
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Project root.
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Directory to scan instead of `<project>/src`.
    #[arg(long)]
    source_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct JobArgs {
    #[command(flatten)]
    scan: ScanArgs,

    /// `studio` or `render`.
    #[arg(long, default_value = "render")]
    render_mode: RenderMode,

    /// `headless-shell` or `default`.
    #[arg(long, default_value = "headless-shell")]
    chrome_mode: ChromeMode,

    /// `auto`, `webgl` or `webgpu`.
    #[arg(long, default_value = "auto")]
    renderer: RequestedRenderer,

    /// Host environment; detected when omitted.
    #[arg(long)]
    environment: Option<ExecutionEnvironment>,

    /// Chromium GL backend.
    #[arg(long)]
    gl: Option<String>,

    /// Render concurrency.
    #[arg(long)]
    concurrency: Option<u32>,

    /// Output color space.
    #[arg(long)]
    color_space: Option<String>,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Composition being rendered.
    #[arg(long, default_value = "")]
    composition: String,
}

#[derive(Args, Debug)]
struct PrecompArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Composition being rendered; names its cache directory.
    #[arg(long)]
    composition: String,

    /// Composition rendered in pass 2 (defaults to --composition).
    #[arg(long)]
    effects_composition: Option<String>,

    /// Project entry point (defaults to `<project>/src/index.ts`).
    #[arg(long)]
    entry: Option<PathBuf>,

    /// Artifact kind.
    #[arg(long, value_enum, default_value_t = FormatChoice::Media)]
    format: FormatChoice,

    /// Render through the engine instead of a dry run.
    #[arg(long)]
    render: bool,

    /// In dry runs, ask the engine for real composition geometry.
    #[arg(long)]
    resolve_metadata: bool,

    /// Ignore cached artifacts.
    #[arg(long)]
    no_cache: bool,

    /// Do not write a placeholder reference frame in dry runs.
    #[arg(long)]
    no_placeholder: bool,

    /// Cache root (defaults to `<project>/.cache/precomp`).
    #[arg(long, env = CACHE_ROOT_ENV)]
    cache_root: Option<PathBuf>,

    /// Hold an advisory lock on the cache entry while producing artifacts.
    #[arg(long)]
    lock: bool,

    /// Frames per second until the engine reports the real value.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Length in frames until the engine reports the real value.
    #[arg(long, default_value_t = 1)]
    duration: u64,

    /// Width until the engine reports the real value.
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Height until the engine reports the real value.
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Render with an alpha channel.
    #[arg(long)]
    alpha: bool,

    /// Encoder pixel format.
    #[arg(long, default_value = "yuv420p")]
    pixel_format: String,

    /// Codec for media renders.
    #[arg(long, default_value = "h264")]
    codec: String,

    /// Input props as a JSON object.
    #[arg(long, value_parser = parse_json)]
    props: Option<serde_json::Value>,

    /// Engine bridge command line.
    #[arg(long, env = ENGINE_COMMAND_ENV, default_value = DEFAULT_ENGINE_COMMAND)]
    engine_cmd: String,
}

#[derive(Args, Debug)]
struct DecideArgs {
    #[command(flatten)]
    precomp: PrecompArgs,

    /// Try single pass even when the job is risky.
    #[arg(long)]
    allow_unsafe_single_pass: bool,

    /// Fail instead of falling back to precomp when the unsafe attempt times out.
    #[arg(long)]
    no_fallback_on_timeout: bool,

    /// Timeout guard for the unsafe attempt.
    #[arg(long, default_value_t = DEFAULT_MAX_DELAY_RENDER_MS)]
    max_delay_render_ms: u64,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Project root; its default cache root is swept unless --cache-root is given.
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Cache root.
    #[arg(long, env = CACHE_ROOT_ENV)]
    cache_root: Option<PathBuf>,

    /// Keep entries modified within this many days.
    #[arg(long)]
    retention_days: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Media,
    Still,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.cmd) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE as u8)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cmd: Command) -> anyhow::Result<i32> {
    match cmd {
        Command::Scan(args) => cmd_scan(args),
        Command::Classify(args) => cmd_classify(args),
        Command::Precomp(args) => cmd_precomp(args),
        Command::Decide(args) => cmd_decide(args),
        Command::Clean(args) => cmd_clean(args),
    }
}

fn cmd_scan(args: ScanArgs) -> anyhow::Result<i32> {
    let dir = source_dir(&args);
    let scan = render_policy::scan_source_tree(&dir)?;
    print_json(&scan)?;
    Ok(EXIT_OK)
}

fn cmd_classify(args: ClassifyArgs) -> anyhow::Result<i32> {
    let opts = policy_options(&args.job, &args.composition);
    let scan = render_policy::scan_source_tree(&opts.source_dir())?;
    let result = render_policy::classify(&opts.classifier_input(&scan));
    print_json(&result)?;
    Ok(EXIT_OK)
}

fn cmd_precomp(args: PrecompArgs) -> anyhow::Result<i32> {
    let opts = precomp_policy_options(&args);
    let engine = ProcessEngine::from_command_line(&args.engine_cmd)?;
    let scan = render_policy::scan_source_tree(&opts.source_dir())?;
    let result = render_policy::run_precomp(&engine, &opts.run_precomp_options(&scan))?;
    print_json(&result)?;
    Ok(EXIT_OK)
}

fn cmd_decide(args: DecideArgs) -> anyhow::Result<i32> {
    let opts = RenderPolicyOptions {
        allow_unsafe_single_pass: args.allow_unsafe_single_pass,
        fallback_on_timeout: !args.no_fallback_on_timeout,
        max_delay_render_ms: args.max_delay_render_ms,
        ..precomp_policy_options(&args.precomp)
    };
    let engine = ProcessEngine::from_command_line(&args.precomp.engine_cmd)?;
    let result = render_policy::decide(&engine, &opts)?;
    print_json(&result)?;
    Ok(result.exit_code)
}

fn cmd_clean(args: CleanArgs) -> anyhow::Result<i32> {
    let cache_root = args
        .cache_root
        .unwrap_or_else(|| args.project.join(DEFAULT_CACHE_DIR));
    let opts = CleanOptions {
        retention_days: args.retention_days,
        ..CleanOptions::new(cache_root)
    };
    let result = render_policy::clean_precomp_cache(&opts)?;
    print_json(&result)?;
    Ok(EXIT_OK)
}

fn source_dir(args: &ScanArgs) -> PathBuf {
    args.source_dir
        .clone()
        .unwrap_or_else(|| args.project.join(DEFAULT_SOURCE_DIR))
}

fn policy_options(args: &JobArgs, composition: &str) -> RenderPolicyOptions {
    RenderPolicyOptions {
        source_root: args.scan.source_dir.clone(),
        render_mode: args.render_mode.clone(),
        chrome_mode: args.chrome_mode.clone(),
        requested_renderer: args.renderer.clone(),
        environment: args.environment.clone(),
        gl_backend: args.gl.clone(),
        concurrency: args.concurrency,
        color_space: args.color_space.clone(),
        ..RenderPolicyOptions::new(&args.scan.project, composition)
    }
}

fn precomp_policy_options(args: &PrecompArgs) -> RenderPolicyOptions {
    let mut opts = policy_options(&args.job, &args.composition);
    let p = &mut opts.precomp;
    p.effects_composition_id = args.effects_composition.clone();
    p.entry_point = args.entry.clone();
    p.execute_render = args.render;
    p.output_format = match args.format {
        FormatChoice::Media => OutputFormat::Media,
        FormatChoice::Still => OutputFormat::Still,
    };
    p.cache_root = args.cache_root.clone();
    p.no_cache = args.no_cache;
    p.resolve_composition_metadata = args.resolve_metadata;
    p.write_placeholder_frame = !args.no_placeholder;
    p.fps = args.fps;
    p.duration_in_frames = args.duration;
    p.width = args.width;
    p.height = args.height;
    p.include_alpha = args.alpha;
    p.pixel_format = args.pixel_format.clone();
    p.codec = args.codec.clone();
    if let Some(props) = &args.props {
        p.input_props = props.clone();
    }
    p.lock = args.lock.then(LockOptions::default);
    opts
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize result")?;
    println!("{text}");
    Ok(())
}
