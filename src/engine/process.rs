use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::engine::{CompositionInfo, EngineCallOpts, MediaRenderOpts, RenderEngine, ServeHandle};
use crate::foundation::error::{PolicyError, PolicyResult};
use crate::foundation::fs::{ensure_parent_dir, path_string};

/// Environment variable naming the engine bridge command.
pub const ENGINE_COMMAND_ENV: &str = "RENDER_POLICY_ENGINE";

/// Default engine bridge command.
pub const DEFAULT_ENGINE_COMMAND: &str = "render-engine-bridge";

/// [`RenderEngine`] backed by an external bridge executable.
///
/// The bridge is invoked once per capability:
///
/// - `bundle --entry <path>` prints `{"serveUrl": "..."}`
/// - `compositions --serve-url <url> --chromium <json> --props <json>` prints a JSON array of
///   `{id, fps, durationInFrames, width, height}`
/// - `still --serve-url <url> --composition <id> --frame <n> --output <path> ...`
/// - `media --serve-url <url> --composition <id> --output <path> --codec <c> ...`
///
/// A non-zero exit status is an error carrying the bridge's stderr.
#[derive(Clone, Debug)]
pub struct ProcessEngine {
    program: OsString,
    leading_args: Vec<OsString>,
}

impl ProcessEngine {
    /// Engine that runs `program` with `leading_args` before each subcommand.
    pub fn new(program: impl Into<OsString>, leading_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// Parse a whitespace-separated command line such as `npx my-bridge`.
    pub fn from_command_line(command: &str) -> PolicyResult<Self> {
        let mut parts = command.split_whitespace().map(OsString::from);
        let program = parts.next().ok_or_else(|| {
            PolicyError::validation(format!(
                "render engine command is empty; pass --engine-cmd or set {ENGINE_COMMAND_ENV}"
            ))
        })?;
        Ok(Self::new(program, parts.collect()))
    }

    fn display_command(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.leading_args)
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(&self, subcommand: &str, args: &[OsString]) -> PolicyResult<Vec<u8>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg(subcommand)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(command = %self.display_command(), subcommand, "invoking render engine");
        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PolicyError::engine(format!(
                    "render engine command '{}' was not found; install it or point \
                     --engine-cmd / {ENGINE_COMMAND_ENV} at a bridge executable",
                    self.display_command()
                ))
            } else {
                PolicyError::engine(format!(
                    "failed to spawn render engine '{}': {e}",
                    self.display_command()
                ))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PolicyError::engine(format!(
                "'{subcommand}' exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    fn call_args(serve: &ServeHandle, opts: &EngineCallOpts) -> PolicyResult<Vec<OsString>> {
        Ok(vec![
            "--serve-url".into(),
            serve.serve_url.clone().into(),
            "--chromium".into(),
            serde_json::to_string(&opts.chromium)?.into(),
            "--props".into(),
            serde_json::to_string(&opts.input_props)?.into(),
        ])
    }

    fn parse_stdout<T: serde::de::DeserializeOwned>(
        subcommand: &str,
        stdout: &[u8],
    ) -> PolicyResult<T> {
        serde_json::from_slice(stdout).map_err(|e| {
            PolicyError::engine(format!("'{subcommand}' printed unexpected output: {e}"))
        })
    }
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_COMMAND, Vec::new())
    }
}

impl RenderEngine for ProcessEngine {
    fn bundle(&self, entry_point: &Path) -> PolicyResult<ServeHandle> {
        let stdout = self.run("bundle", &["--entry".into(), entry_point.into()])?;
        Self::parse_stdout("bundle", &stdout)
    }

    fn discover_compositions(
        &self,
        serve: &ServeHandle,
        opts: &EngineCallOpts,
    ) -> PolicyResult<Vec<CompositionInfo>> {
        let stdout = self.run("compositions", &Self::call_args(serve, opts)?)?;
        Self::parse_stdout("compositions", &stdout)
    }

    fn render_still(
        &self,
        serve: &ServeHandle,
        composition: &CompositionInfo,
        frame: u64,
        output: &Path,
        opts: &EngineCallOpts,
    ) -> PolicyResult<()> {
        ensure_parent_dir(output)?;
        let mut args = Self::call_args(serve, opts)?;
        args.extend([
            "--composition".into(),
            composition.id.clone().into(),
            "--frame".into(),
            frame.to_string().into(),
            "--output".into(),
            path_string(output).into(),
        ]);
        self.run("still", &args)?;
        Ok(())
    }

    fn render_media(
        &self,
        serve: &ServeHandle,
        composition: &CompositionInfo,
        output: &Path,
        opts: &MediaRenderOpts,
    ) -> PolicyResult<()> {
        ensure_parent_dir(output)?;
        let mut args = Self::call_args(serve, &opts.call)?;
        args.extend([
            "--composition".into(),
            composition.id.clone().into(),
            "--output".into(),
            path_string(output).into(),
            "--codec".into(),
            opts.codec.clone().into(),
        ]);
        if let Some(n) = opts.concurrency {
            args.extend(["--concurrency".into(), n.to_string().into()]);
        }
        self.run("media", &args)?;
        Ok(())
    }
}
