use serde::{Deserialize, Serialize};

use crate::foundation::labels::label_enum;

label_enum! {
    /// Where the render job was started from.
    pub enum RenderMode {
        /// Interactive preview.
        Studio => "studio",
        /// Batch render.
        Render => "render",
    }
}

label_enum! {
    /// Which Chrome build drives the headless browser.
    pub enum ChromeMode {
        /// Stripped-down `chrome-headless-shell`.
        HeadlessShell => "headless-shell",
        /// Regular Chrome build.
        Default => "default",
    }
}

label_enum! {
    /// Renderer the caller asked for.
    pub enum RequestedRenderer {
        /// Let the engine choose.
        Auto => "auto",
        /// Force WebGL.
        Webgl => "webgl",
        /// Force WebGPU.
        Webgpu => "webgpu",
    }
}

label_enum! {
    /// Rendering technology a visual effect is implemented with.
    pub enum EffectBackend {
        /// Layered composition of other effects.
        Composite => "composite",
        /// CSS filters.
        Css => "css",
        /// SVG filter primitives.
        Svg => "svg",
        /// Post-processing inside a 3D scene.
        ThreePostNative => "three-post-native",
        /// Effect type not present in the backend table.
        Unknown => "unknown",
        /// WebGL shader pass.
        Webgl => "webgl",
    }
}

label_enum! {
    /// Host the render runs on.
    pub enum ExecutionEnvironment {
        /// Developer machine or plain server.
        Local => "local",
        /// AWS Lambda.
        Lambda => "lambda",
        /// Google Cloud Run (CPU).
        CloudRun => "cloud-run",
        /// Google Cloud Run with an attached GPU.
        CloudRunGpu => "cloud-run-gpu",
        /// Explicitly unknown.
        Unknown => "unknown",
    }
}

impl ExecutionEnvironment {
    /// Detect the environment from the current process environment variables.
    pub fn detect() -> Self {
        Self::detect_with(|key| std::env::var(key).ok())
    }

    /// Detection over an arbitrary variable lookup.
    pub fn detect_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| lookup(key).is_some_and(|v| !v.trim().is_empty());
        if set("AWS_LAMBDA_FUNCTION_NAME") {
            return Self::Lambda;
        }
        if set("K_SERVICE") {
            let gpu = lookup("NVIDIA_VISIBLE_DEVICES")
                .map(|v| v.trim().to_ascii_lowercase())
                .is_some_and(|v| !v.is_empty() && v != "none" && v != "void");
            return if gpu { Self::CloudRunGpu } else { Self::CloudRun };
        }
        Self::Local
    }
}

/// Risk-relevant attributes of one render job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierInput {
    /// Composition being rendered.
    pub composition_id: String,
    /// Studio preview or batch render.
    pub render_mode: RenderMode,
    /// Chrome build in use.
    pub chrome_mode: ChromeMode,
    /// Renderer requested by the caller.
    pub requested_renderer: RequestedRenderer,
    /// Whether the project mounts a 3D canvas.
    pub contains_three_canvas: bool,
    /// Effect type names found in the project (set semantics).
    #[serde(default)]
    pub effect_types: Vec<String>,
    /// Effect backends found in the project (set semantics).
    #[serde(default)]
    pub effect_backends: Vec<EffectBackend>,
    /// Host environment.
    pub environment: ExecutionEnvironment,
    /// Chromium GL backend override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gl_backend: Option<String>,
    /// Render concurrency hint; non-finite values normalize to `null`.
    #[serde(default)]
    pub concurrency: Option<f64>,
    /// Output color space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
}

/// A [`ClassifierInput`] that went through [`crate::normalize_classifier_input`].
///
/// Only constructible through normalization, so holding one proves the invariants (sorted,
/// deduplicated, lower-cased sets; trimmed strings) hold.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedClassifierInput(pub(crate) ClassifierInput);

impl NormalizedClassifierInput {
    /// Borrow the normalized fields.
    pub fn get(&self) -> &ClassifierInput {
        &self.0
    }

    /// Unwrap into a plain input (e.g. to normalize again).
    pub fn into_inner(self) -> ClassifierInput {
        self.0
    }
}

impl std::ops::Deref for NormalizedClassifierInput {
    type Target = ClassifierInput;

    fn deref(&self) -> &ClassifierInput {
        &self.0
    }
}

/// Reason severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Forces the two-pass path.
    Warn,
}

/// Stable reason codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// 3D canvas + WebGL effect during a batch render.
    RiskThreeWebglEffectRenderMode,
    /// 3D canvas + WebGL effect under `chrome-headless-shell`.
    RiskThreeWebglEffectHeadlessShell,
    /// 3D canvas + WebGL effect with the WebGL renderer forced.
    RiskThreeWebglEffectWebglRenderer,
    /// 3D canvas + WebGL effect on AWS Lambda.
    RiskThreeWebglEffectLambda,
    /// Nothing risky detected.
    SafeNoRiskyCombination,
}

impl ReasonCode {
    /// Wire spelling of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RiskThreeWebglEffectRenderMode => "RISK_THREE_WEBGL_EFFECT_RENDER_MODE",
            Self::RiskThreeWebglEffectHeadlessShell => "RISK_THREE_WEBGL_EFFECT_HEADLESS_SHELL",
            Self::RiskThreeWebglEffectWebglRenderer => "RISK_THREE_WEBGL_EFFECT_WEBGL_RENDERER",
            Self::RiskThreeWebglEffectLambda => "RISK_THREE_WEBGL_EFFECT_LAMBDA",
            Self::SafeNoRiskyCombination => "SAFE_NO_RISKY_COMBINATION",
        }
    }
}

/// One coded explanation attached to a classification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierReason {
    /// Stable code.
    pub code: ReasonCode,
    /// Human-readable explanation.
    pub message: String,
    /// Whether this reason forces the two-pass path.
    pub severity: Severity,
}

/// Routing decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    /// Render directly in one pass.
    SinglePassSafe,
    /// Render through the cached two-pass pipeline.
    RequiresPrecomp,
}

/// Output of [`crate::classify`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierResult {
    /// Routing decision; `RequiresPrecomp` iff any reason is `Warn`.
    pub decision: Decision,
    /// Every rule that fired, or the single safe reason.
    pub reasons: Vec<ClassifierReason>,
    /// `rrc_` + hash of the normalized input.
    pub fingerprint: String,
    /// Input after normalization.
    pub normalized_input: NormalizedClassifierInput,
}
