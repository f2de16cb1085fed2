use super::*;

fn risky_input() -> ClassifierInput {
    ClassifierInput {
        composition_id: "Main".to_string(),
        render_mode: RenderMode::Render,
        chrome_mode: ChromeMode::HeadlessShell,
        requested_renderer: RequestedRenderer::Auto,
        contains_three_canvas: true,
        effect_types: vec!["glitch".to_string()],
        effect_backends: vec![EffectBackend::Webgl],
        environment: ExecutionEnvironment::Local,
        gl_backend: None,
        concurrency: None,
        color_space: None,
    }
}

fn codes(result: &ClassifierResult) -> Vec<ReasonCode> {
    result.reasons.iter().map(|r| r.code).collect()
}

#[test]
fn render_mode_and_headless_shell_both_fire() {
    let result = classify(&risky_input());
    assert_eq!(result.decision, Decision::RequiresPrecomp);
    assert_eq!(
        codes(&result),
        vec![
            ReasonCode::RiskThreeWebglEffectRenderMode,
            ReasonCode::RiskThreeWebglEffectHeadlessShell,
        ]
    );
    assert!(result.reasons.iter().all(|r| r.severity == Severity::Warn));
}

#[test]
fn all_four_rules_can_fire_together() {
    let mut input = risky_input();
    input.requested_renderer = RequestedRenderer::Webgl;
    input.environment = ExecutionEnvironment::Lambda;
    let result = classify(&input);
    assert_eq!(result.reasons.len(), RISK_RULES.len());
    assert!(
        !codes(&result).contains(&ReasonCode::SafeNoRiskyCombination),
        "safe reason must not accompany warnings"
    );
}

#[test]
fn no_three_canvas_is_safe() {
    let mut input = risky_input();
    input.contains_three_canvas = false;
    input.effect_backends = vec![EffectBackend::Css];
    let result = classify(&input);
    assert_eq!(result.decision, Decision::SinglePassSafe);
    assert_eq!(codes(&result), vec![ReasonCode::SafeNoRiskyCombination]);
    assert_eq!(result.reasons[0].severity, Severity::Info);
}

#[test]
fn three_canvas_without_webgl_effect_is_safe() {
    let mut input = risky_input();
    input.effect_backends = vec![EffectBackend::Css, EffectBackend::Svg];
    assert_eq!(classify(&input).decision, Decision::SinglePassSafe);
}

#[test]
fn combo_in_studio_default_chrome_auto_local_is_safe() {
    let mut input = risky_input();
    input.render_mode = RenderMode::Studio;
    input.chrome_mode = ChromeMode::Default;
    assert_eq!(classify(&input).decision, Decision::SinglePassSafe);
}

#[test]
fn normalization_sorts_dedupes_and_lowercases_sets() {
    let mut input = risky_input();
    input.composition_id = "  ".to_string();
    input.effect_types = vec![" Glow".into(), "glitch".into(), "GLOW".into(), "".into()];
    input.effect_backends = vec![
        EffectBackend::from("WEBGL"),
        EffectBackend::Css,
        EffectBackend::from(" webgl "),
    ];
    input.gl_backend = Some("   ".to_string());
    input.color_space = Some(" srgb ".to_string());
    input.concurrency = Some(f64::NAN);

    let n = normalize_classifier_input(&input);
    assert_eq!(n.composition_id, UNSPECIFIED_COMPOSITION_ID);
    assert_eq!(n.effect_types, vec!["glitch", "glow"]);
    assert_eq!(n.effect_backends, vec![EffectBackend::Css, EffectBackend::Webgl]);
    assert_eq!(n.gl_backend, None);
    assert_eq!(n.color_space.as_deref(), Some("srgb"));
    assert_eq!(n.concurrency, None);
}

#[test]
fn normalization_is_idempotent() {
    let mut input = risky_input();
    input.effect_types = vec!["B".into(), "a".into(), "b".into()];
    input.effect_backends = vec![EffectBackend::from("Custom"), EffectBackend::Webgl];
    input.concurrency = Some(4.0);
    let once = normalize_classifier_input(&input);
    let twice = normalize_classifier_input(&once.clone().into_inner());
    assert_eq!(once, twice);
}

#[test]
fn permutations_and_case_variants_classify_identically() {
    let mut a = risky_input();
    a.effect_types = vec!["glow".into(), "Glitch".into()];
    a.effect_backends = vec![EffectBackend::Webgl, EffectBackend::Css];

    let mut b = risky_input();
    b.effect_types = vec!["GLITCH".into(), "glow".into(), "glow".into()];
    b.effect_backends = vec![
        EffectBackend::Css,
        EffectBackend::from("WebGL"),
        EffectBackend::Webgl,
    ];

    let ra = classify(&a);
    let rb = classify(&b);
    assert_eq!(ra.fingerprint, rb.fingerprint);
    assert_eq!(ra.decision, rb.decision);
    assert_eq!(ra.reasons, rb.reasons);
}

#[test]
fn fingerprint_changes_with_any_normalized_field() {
    let base = classify(&risky_input()).fingerprint;
    assert!(base.starts_with("rrc_"));

    let variants: Vec<Box<dyn Fn(&mut ClassifierInput)>> = vec![
        Box::new(|i: &mut ClassifierInput| i.composition_id = "Other".into()),
        Box::new(|i: &mut ClassifierInput| i.render_mode = RenderMode::Studio),
        Box::new(|i: &mut ClassifierInput| i.chrome_mode = ChromeMode::Default),
        Box::new(|i: &mut ClassifierInput| i.requested_renderer = RequestedRenderer::Webgpu),
        Box::new(|i: &mut ClassifierInput| i.contains_three_canvas = false),
        Box::new(|i: &mut ClassifierInput| i.effect_types.push("bloom".into())),
        Box::new(|i: &mut ClassifierInput| i.effect_backends.push(EffectBackend::Svg)),
        Box::new(|i: &mut ClassifierInput| i.environment = ExecutionEnvironment::CloudRun),
        Box::new(|i: &mut ClassifierInput| i.gl_backend = Some("swiftshader".into())),
        Box::new(|i: &mut ClassifierInput| i.concurrency = Some(2.0)),
        Box::new(|i: &mut ClassifierInput| i.color_space = Some("bt709".into())),
    ];
    for mutate in variants {
        let mut input = risky_input();
        mutate(&mut input);
        assert_ne!(classify(&input).fingerprint, base);
    }
}

#[test]
fn unknown_enum_values_pass_through() {
    let mut input = risky_input();
    input.render_mode = RenderMode::from("preview");
    input.chrome_mode = ChromeMode::from("chrome-for-testing");
    let result = classify(&input);
    assert_eq!(
        result.normalized_input.render_mode,
        RenderMode::Other("preview".into())
    );
    assert_eq!(result.decision, Decision::SinglePassSafe);
}

#[test]
fn result_serializes_with_wire_spellings() {
    let result = classify(&risky_input());
    let v = serde_json::to_value(&result).unwrap();
    assert_eq!(v["decision"], "requires-precomp");
    assert_eq!(v["reasons"][0]["code"], "RISK_THREE_WEBGL_EFFECT_RENDER_MODE");
    assert_eq!(v["reasons"][0]["severity"], "warn");
    assert_eq!(v["normalizedInput"]["chromeMode"], "headless-shell");
    assert!(v["normalizedInput"]["concurrency"].is_null());
    assert!(v["normalizedInput"].get("glBackend").is_none());
}

#[test]
fn environment_detection_reads_well_known_variables() {
    let env = |pairs: &'static [(&'static str, &'static str)]| {
        move |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.to_string())
        }
    };
    assert_eq!(
        ExecutionEnvironment::detect_with(env(&[("AWS_LAMBDA_FUNCTION_NAME", "fn")])),
        ExecutionEnvironment::Lambda
    );
    assert_eq!(
        ExecutionEnvironment::detect_with(env(&[("K_SERVICE", "svc")])),
        ExecutionEnvironment::CloudRun
    );
    assert_eq!(
        ExecutionEnvironment::detect_with(env(&[
            ("K_SERVICE", "svc"),
            ("NVIDIA_VISIBLE_DEVICES", "all")
        ])),
        ExecutionEnvironment::CloudRunGpu
    );
    assert_eq!(
        ExecutionEnvironment::detect_with(env(&[])),
        ExecutionEnvironment::Local
    );
}
