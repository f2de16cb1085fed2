use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::foundation::error::PolicyResult;
use crate::foundation::stable::prefixed_hash;
use crate::risk::effects::backend_for_effect_name;
use crate::risk::model::EffectBackend;

/// Source directory scanned under a project root when the caller does not pick one.
pub const DEFAULT_SOURCE_DIR: &str = "src";

const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];
const DEPENDENCY_DIRS: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

static THREE_CANVAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<ThreeCanvas\b").expect("static regex"));

// Attributes before `type=` may hold `{...}` expressions, so `=>` and `>` inside braces do not
// end the tag.
static EFFECT_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<Effect\b(?:[^>{]|\{[^}]*\})*?\btype\s*=\s*(?:\{\s*)?["'`]([^"'`]+)["'`]"#,
    )
    .expect("static regex")
});

/// Coarse visual-risk summary of a project's sources. Recomputed on every call, never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRiskScan {
    /// Some source file mounts a 3D canvas.
    pub contains_three_canvas: bool,
    /// Lower-cased, unique, sorted effect type names.
    pub effect_types: Vec<String>,
    /// Unique, sorted backends of `effect_types`.
    pub effect_backends: Vec<EffectBackend>,
    /// `eg_` + hash of the three fields above.
    pub effect_graph_hash: String,
    /// Source files read.
    pub source_files_scanned: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EffectGraph<'a> {
    contains_three_canvas: bool,
    effect_types: &'a [String],
    effect_backends: &'a [EffectBackend],
}

impl ProjectRiskScan {
    fn from_parts(
        contains_three_canvas: bool,
        raw_effect_types: Vec<String>,
        source_files_scanned: u64,
    ) -> Self {
        let mut effect_types = raw_effect_types
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect::<Vec<_>>();
        effect_types.sort();
        effect_types.dedup();

        let mut effect_backends = effect_types
            .iter()
            .map(|t| backend_for_effect_name(t))
            .collect::<Vec<_>>();
        effect_backends.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        effect_backends.dedup();

        let effect_graph_hash = prefixed_hash(
            "eg_",
            &EffectGraph {
                contains_three_canvas,
                effect_types: &effect_types,
                effect_backends: &effect_backends,
            },
        );

        Self {
            contains_three_canvas,
            effect_types,
            effect_backends,
            effect_graph_hash,
            source_files_scanned,
        }
    }

    /// Scan result for a project with no sources.
    pub fn empty() -> Self {
        Self::from_parts(false, Vec::new(), 0)
    }
}

/// Scan `<project_root>/src`.
pub fn scan_project(project_root: &Path) -> PolicyResult<ProjectRiskScan> {
    scan_source_tree(&project_root.join(DEFAULT_SOURCE_DIR))
}

/// Walk `source_root` and extract 3D-canvas usage and declared effect types.
///
/// A missing directory is not an error; it scans as [`ProjectRiskScan::empty`].
#[tracing::instrument]
pub fn scan_source_tree(source_root: &Path) -> PolicyResult<ProjectRiskScan> {
    if !source_root.is_dir() {
        tracing::debug!("source directory missing; using empty scan");
        return Ok(ProjectRiskScan::empty());
    }

    let mut contains_three_canvas = false;
    let mut effect_types = Vec::new();
    let mut scanned = 0u64;

    for path in source_files(source_root)? {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("read source file '{}'", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        scanned += 1;

        if !contains_three_canvas && THREE_CANVAS_RE.is_match(&text) {
            tracing::debug!(file = %path.display(), "found 3D canvas");
            contains_three_canvas = true;
        }
        effect_types.extend(
            EFFECT_TYPE_RE
                .captures_iter(&text)
                .map(|c| c[1].trim().to_string())
                .filter(|t| !t.is_empty()),
        );
    }

    let scan = ProjectRiskScan::from_parts(contains_three_canvas, effect_types, scanned);
    tracing::info!(
        files = scan.source_files_scanned,
        three = scan.contains_three_canvas,
        effects = scan.effect_types.len(),
        hash = %scan.effect_graph_hash,
        "scanned project sources"
    );
    Ok(scan)
}

fn source_files(root: &Path) -> PolicyResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
    for entry in walker {
        let entry = entry.with_context(|| format!("walk '{}'", root.display()))?;
        if entry.file_type().is_file() && has_source_extension(entry.path()) {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || DEPENDENCY_DIRS.contains(&&*name)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

#[cfg(test)]
#[path = "../../tests/unit/risk/scanner.rs"]
mod tests;
