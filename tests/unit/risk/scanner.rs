use super::*;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

#[test]
fn nested_effects_and_three_canvas_are_extracted() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "Scene.tsx",
        r#"
export const Scene = () => (
  <ThreeCanvas width={1920} height={1080}>
    <Effect type="Glitch" intensity={0.4}>
      <Effect type='glow'>
        <mesh />
      </Effect>
    </Effect>
  </ThreeCanvas>
);
"#,
    );

    let scan = scan_source_tree(tmp.path()).unwrap();
    assert!(scan.contains_three_canvas);
    assert_eq!(scan.effect_types, vec!["glitch", "glow"]);
    assert_eq!(
        scan.effect_backends,
        vec![EffectBackend::Css, EffectBackend::Webgl]
    );
    assert_eq!(scan.source_files_scanned, 1);
    assert!(scan.effect_graph_hash.starts_with("eg_"));
}

#[test]
fn arrow_and_comparison_expressions_before_type_do_not_hide_effects() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "Hero.tsx",
        r#"
<Effect onDone={() => setDone(true)} type="glitch" />
<Effect style={{ opacity: frame > 10 ? 1 : 0 }} type='bloom' />
<Effect intensity={1} />
<Overlay type="crt" />
"#,
    );
    let scan = scan_source_tree(tmp.path()).unwrap();
    assert_eq!(scan.effect_types, vec!["bloom", "glitch"]);
}

#[test]
fn missing_directory_scans_as_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let scan = scan_source_tree(&tmp.path().join("nope")).unwrap();
    assert_eq!(scan, ProjectRiskScan::empty());
    assert_eq!(scan.source_files_scanned, 0);
    assert!(scan.effect_types.is_empty());
}

#[test]
fn hidden_and_dependency_dirs_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "node_modules/lib/index.js", "<ThreeCanvas />");
    write(tmp.path(), ".cache/x.tsx", r#"<Effect type="bloom" />"#);
    write(tmp.path(), "notes.md", r#"<Effect type="bloom" />"#);
    write(tmp.path(), "ui/Title.jsx", r#"<Effect type={"blur"} />"#);

    let scan = scan_source_tree(tmp.path()).unwrap();
    assert!(!scan.contains_three_canvas);
    assert_eq!(scan.effect_types, vec!["blur"]);
    assert_eq!(scan.effect_backends, vec![EffectBackend::Css]);
    assert_eq!(scan.source_files_scanned, 1);
}

#[test]
fn unknown_effect_types_map_to_unknown_backend() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "a.ts",
        r#"<Effect type="sparkle" /> <Effect type="vignette" />"#,
    );
    let scan = scan_source_tree(tmp.path()).unwrap();
    assert_eq!(
        scan.effect_backends,
        vec![EffectBackend::Svg, EffectBackend::Unknown]
    );
}

#[test]
fn effect_graph_hash_ignores_file_layout() {
    let a = tempfile::tempdir().unwrap();
    write(a.path(), "one.tsx", r#"<Effect type="glow"/><Effect type="crt"/>"#);
    let b = tempfile::tempdir().unwrap();
    write(b.path(), "x/two.tsx", r#"<Effect type="CRT"/>"#);
    write(b.path(), "y/three.tsx", r#"<Effect type="Glow"/>"#);

    let sa = scan_source_tree(a.path()).unwrap();
    let sb = scan_source_tree(b.path()).unwrap();
    assert_eq!(sa.effect_graph_hash, sb.effect_graph_hash);
    assert_ne!(sa.source_files_scanned, sb.source_files_scanned);
}

#[test]
fn every_known_effect_name_round_trips() {
    for t in crate::risk::effects::EffectType::ALL {
        assert_eq!(crate::risk::effects::EffectType::from_name(t.name()), Some(*t));
        assert_ne!(t.backend(), EffectBackend::Unknown);
    }
}
