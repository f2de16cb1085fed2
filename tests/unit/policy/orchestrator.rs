use std::path::Path;

use super::*;
use crate::PolicyError;
use crate::engine::{CompositionInfo, EngineCallOpts, MediaRenderOpts, ServeHandle};

/// Engine that must never be reached.
struct Unreachable;

impl RenderEngine for Unreachable {
    fn bundle(&self, _: &Path) -> PolicyResult<ServeHandle> {
        panic!("bundle called")
    }

    fn discover_compositions(
        &self,
        _: &ServeHandle,
        _: &EngineCallOpts,
    ) -> PolicyResult<Vec<CompositionInfo>> {
        panic!("discover_compositions called")
    }

    fn render_still(
        &self,
        _: &ServeHandle,
        _: &CompositionInfo,
        _: u64,
        _: &Path,
        _: &EngineCallOpts,
    ) -> PolicyResult<()> {
        panic!("render_still called")
    }

    fn render_media(
        &self,
        _: &ServeHandle,
        _: &CompositionInfo,
        _: &Path,
        _: &MediaRenderOpts,
    ) -> PolicyResult<()> {
        panic!("render_media called")
    }
}

fn project(scene: &str) -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("Scene.tsx"), scene).unwrap();
    tmp
}

const RISKY_SCENE: &str = r#"
export const Scene = () => (
  <ThreeCanvas>
    <Effect type="glitch" />
  </ThreeCanvas>
);
"#;

const SAFE_SCENE: &str = r#"export const Scene = () => <Effect type="blur" />;"#;

fn opts(root: &Path) -> RenderPolicyOptions {
    RenderPolicyOptions {
        environment: Some(ExecutionEnvironment::Local),
        ..RenderPolicyOptions::new(root, "Main")
    }
}

#[test]
fn safe_job_routes_to_single_pass() {
    let tmp = project(SAFE_SCENE);
    let out = decide(&Unreachable, &opts(tmp.path())).unwrap();

    assert_eq!(out.exit_code, EXIT_OK);
    assert_eq!(out.decision, Decision::SinglePassSafe);
    assert_eq!(out.routed_path, RoutedPath::SinglePass);
    assert!(out.precomp.is_none());
    assert!(!out.scan.contains_three_canvas);
    assert!(out.fingerprint.starts_with("rrc_"));
}

#[test]
fn risky_job_routes_to_precomp_dry_run() {
    let tmp = project(RISKY_SCENE);
    let out = decide(&Unreachable, &opts(tmp.path())).unwrap();

    assert_eq!(out.exit_code, EXIT_OK);
    assert_eq!(out.decision, Decision::RequiresPrecomp);
    assert_eq!(out.routed_path, RoutedPath::Precomp);

    let precomp = out.precomp.expect("precomp result");
    assert!(!precomp.cache_hit);
    assert!(precomp.cache_key.starts_with("pc_"));
    assert!(precomp.pass1_dir.starts_with(tmp.path().join(".cache/precomp/pass1/Main")));
    assert!(precomp.pass1_metadata_path.exists());
    assert!(precomp.final_metadata_path.exists());
    assert!(precomp.pass1_reference_frame_path.exists());
    assert_eq!(precomp.metadata.input.effect_graph_hash, out.scan.effect_graph_hash);
    assert_eq!(precomp.effects_composition_id, "Main");
}

#[test]
fn second_decision_hits_the_cache() {
    let tmp = project(RISKY_SCENE);
    let first = decide(&Unreachable, &opts(tmp.path())).unwrap();
    let second = decide(&Unreachable, &opts(tmp.path())).unwrap();

    let (first, second) = (first.precomp.unwrap(), second.precomp.unwrap());
    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.cache_key, second.cache_key);
}

#[test]
fn unsafe_override_without_fallback_fails_fast() {
    let tmp = project(RISKY_SCENE);
    let opts = RenderPolicyOptions {
        allow_unsafe_single_pass: true,
        fallback_on_timeout: false,
        ..opts(tmp.path())
    };
    let out = decide(&Unreachable, &opts).unwrap();

    assert_eq!(out.exit_code, EXIT_UNSAFE_FAILED);
    assert_eq!(out.routed_path, RoutedPath::UnsafeSinglePassFailed);
    assert!(out.precomp.is_none());
    assert!(!tmp.path().join(DEFAULT_CACHE_DIR).exists());
}

#[test]
fn unsafe_override_with_fallback_runs_precomp() {
    let tmp = project(RISKY_SCENE);
    let opts = RenderPolicyOptions {
        allow_unsafe_single_pass: true,
        ..opts(tmp.path())
    };
    let out = decide(&Unreachable, &opts).unwrap();

    assert_eq!(out.exit_code, EXIT_OK);
    assert_eq!(out.routed_path, RoutedPath::Precomp);
    assert!(out.precomp.is_some());
}

#[test]
fn unsafe_override_is_ignored_for_safe_jobs() {
    let tmp = project(SAFE_SCENE);
    let opts = RenderPolicyOptions {
        allow_unsafe_single_pass: true,
        fallback_on_timeout: false,
        ..opts(tmp.path())
    };
    let out = decide(&Unreachable, &opts).unwrap();
    assert_eq!(out.routed_path, RoutedPath::SinglePass);
}

#[test]
fn props_and_renderer_reach_the_cache_key() {
    let tmp = project(RISKY_SCENE);
    let base = decide(&Unreachable, &opts(tmp.path())).unwrap();

    let mut with_props = opts(tmp.path());
    with_props.precomp.input_props = serde_json::json!({ "title": "hello" });
    let props = decide(&Unreachable, &with_props).unwrap();

    let webgpu = RenderPolicyOptions {
        requested_renderer: RequestedRenderer::Webgpu,
        ..opts(tmp.path())
    };
    let webgpu = decide(&Unreachable, &webgpu).unwrap();

    let key = |r: &RenderPolicyResult| r.precomp.as_ref().unwrap().cache_key.clone();
    assert_ne!(key(&base), key(&props));
    assert_ne!(key(&base), key(&webgpu));
    assert_eq!(
        webgpu.precomp.unwrap().metadata.input.renderer,
        ResolvedRenderer::Webgpu
    );
}

#[test]
fn explicit_cache_root_is_honored() {
    let tmp = project(RISKY_SCENE);
    let cache = tempfile::tempdir().unwrap();
    let mut opts = opts(tmp.path());
    opts.precomp.cache_root = Some(cache.path().to_path_buf());

    let out = decide(&Unreachable, &opts).unwrap();
    assert!(out.precomp.unwrap().pass1_dir.starts_with(cache.path()));
    assert!(!tmp.path().join(DEFAULT_CACHE_DIR).exists());
}

#[test]
fn risky_job_without_composition_id_is_a_validation_error() {
    let tmp = project(RISKY_SCENE);
    let opts = RenderPolicyOptions {
        environment: Some(ExecutionEnvironment::Local),
        ..RenderPolicyOptions::new(tmp.path(), "")
    };
    let err = decide(&Unreachable, &opts).unwrap_err();

    assert!(matches!(err, PolicyError::Validation(_)), "{err}");
    assert!(!tmp.path().join(DEFAULT_CACHE_DIR).exists());
}

#[test]
fn result_serializes_kebab_route_and_omits_missing_precomp() {
    let tmp = project(SAFE_SCENE);
    let out = decide(&Unreachable, &opts(tmp.path())).unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["routedPath"], "single-pass");
    assert_eq!(json["exitCode"], 0);
    assert!(json.get("precomp").is_none());
}
