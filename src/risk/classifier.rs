use crate::foundation::stable::prefixed_hash;
use crate::risk::model::{
    ChromeMode, ClassifierInput, ClassifierReason, ClassifierResult, Decision, EffectBackend,
    ExecutionEnvironment, NormalizedClassifierInput, ReasonCode, RenderMode, RequestedRenderer,
    Severity,
};

/// Composition id used when the caller leaves it blank.
pub const UNSPECIFIED_COMPOSITION_ID: &str = "unspecified";

/// One row of the rule table: fires when the job has a 3D canvas with a WebGL effect *and*
/// `applies` holds.
pub struct RiskRule {
    /// Reason code emitted when the rule fires.
    pub code: ReasonCode,
    /// Message emitted when the rule fires.
    pub message: &'static str,
    /// Extra condition on top of the three + webgl combination.
    pub applies: fn(&ClassifierInput) -> bool,
}

/// Rules in evaluation (and reporting) order.
pub const RISK_RULES: &[RiskRule] = &[
    RiskRule {
        code: ReasonCode::RiskThreeWebglEffectRenderMode,
        message: "3D canvas combined with a WebGL effect is unstable in render mode",
        applies: |i| i.render_mode == RenderMode::Render,
    },
    RiskRule {
        code: ReasonCode::RiskThreeWebglEffectHeadlessShell,
        message: "3D canvas combined with a WebGL effect is unstable under chrome-headless-shell",
        applies: |i| i.chrome_mode == ChromeMode::HeadlessShell,
    },
    RiskRule {
        code: ReasonCode::RiskThreeWebglEffectWebglRenderer,
        message: "3D canvas combined with a WebGL effect shares one WebGL renderer",
        applies: |i| i.requested_renderer == RequestedRenderer::Webgl,
    },
    RiskRule {
        code: ReasonCode::RiskThreeWebglEffectLambda,
        message: "3D canvas combined with a WebGL effect has no GPU on Lambda",
        applies: |i| i.environment == ExecutionEnvironment::Lambda,
    },
];

const SAFE_MESSAGE: &str = "no risky 3D canvas + WebGL effect combination detected";

/// Canonicalize a classifier input.
///
/// Idempotent: normalizing the inner value of a [`NormalizedClassifierInput`] returns an equal
/// value.
pub fn normalize_classifier_input(input: &ClassifierInput) -> NormalizedClassifierInput {
    let composition_id = match input.composition_id.trim() {
        "" => UNSPECIFIED_COMPOSITION_ID.to_string(),
        id => id.to_string(),
    };

    let mut effect_types = input
        .effect_types
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>();
    effect_types.sort();
    effect_types.dedup();

    let mut effect_backends = input
        .effect_backends
        .iter()
        .map(|b| EffectBackend::from(b.as_str().trim().to_lowercase()))
        .filter(|b| !b.as_str().is_empty())
        .collect::<Vec<_>>();
    effect_backends.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    effect_backends.dedup();

    NormalizedClassifierInput(ClassifierInput {
        composition_id,
        render_mode: input.render_mode.trimmed(),
        chrome_mode: input.chrome_mode.trimmed(),
        requested_renderer: input.requested_renderer.trimmed(),
        contains_three_canvas: input.contains_three_canvas,
        effect_types,
        effect_backends,
        environment: input.environment.trimmed(),
        gl_backend: trim_to_none(input.gl_backend.as_deref()),
        concurrency: input.concurrency.filter(|c| c.is_finite()),
        color_space: trim_to_none(input.color_space.as_deref()),
    })
}

/// Classify one render job.
///
/// Inputs that normalize to the same value always yield the same decision, reasons and
/// fingerprint.
#[tracing::instrument(skip(input), fields(composition = %input.composition_id))]
pub fn classify(input: &ClassifierInput) -> ClassifierResult {
    let normalized = normalize_classifier_input(input);
    let n = normalized.get();

    let webgl_risky = n.effect_backends.contains(&EffectBackend::Webgl);
    let risky_three_combo = n.contains_three_canvas && webgl_risky;

    let mut reasons = RISK_RULES
        .iter()
        .filter(|rule| risky_three_combo && (rule.applies)(n))
        .map(|rule| ClassifierReason {
            code: rule.code,
            message: rule.message.to_string(),
            severity: Severity::Warn,
        })
        .collect::<Vec<_>>();

    if reasons.is_empty() {
        reasons.push(ClassifierReason {
            code: ReasonCode::SafeNoRiskyCombination,
            message: SAFE_MESSAGE.to_string(),
            severity: Severity::Info,
        });
    }

    let decision = if reasons.iter().any(|r| r.severity == Severity::Warn) {
        Decision::RequiresPrecomp
    } else {
        Decision::SinglePassSafe
    };
    let fingerprint = prefixed_hash("rrc_", &normalized);

    tracing::debug!(?decision, %fingerprint, reasons = reasons.len(), "classified render job");

    ClassifierResult {
        decision,
        reasons,
        fingerprint,
        normalized_input: normalized,
    }
}

fn trim_to_none(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "../../tests/unit/risk/classifier.rs"]
mod tests;
