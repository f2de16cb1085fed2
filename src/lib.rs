//! Render routing policy and pre-composition cache.
//!
//! Decides, per render job, whether content can be rendered in one pass or has to go through
//! a cached two-pass ("precomp") pipeline, and manages the content-addressed cache that the
//! two-pass path reads and writes.
//!
//! # Pipeline overview
//!
//! 1. **Scan**: project source tree -> [`ProjectRiskScan`] (3D canvas, effect types/backends)
//! 2. **Classify**: scan + job parameters -> [`ClassifierResult`] (decision, reasons, fingerprint)
//! 3. **Route**: [`decide`] sends risky jobs through [`run_precomp`]
//! 4. **Sweep** (out of band): [`clean_precomp_cache`] drops expired pass-1 entries
//!
//! Pixels are never produced here; real rendering goes through a [`RenderEngine`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Boundary to the external rendering engine.
pub mod engine;
/// Job routing.
pub mod policy;
/// Two-pass pipeline and its cache.
pub mod precomp;
/// Risk scanning and classification.
pub mod risk;

pub use crate::foundation::error::{PolicyError, PolicyResult};
pub use crate::foundation::stable::{hash, prefixed_hash, stable_serialize, stable_serialize_of};

pub use crate::engine::{
    ChromiumOptions, CompositionInfo, EngineCallOpts, MediaRenderOpts, ProcessEngine,
    RenderEngine, ServeHandle, select_composition,
};
pub use crate::policy::orchestrator::{
    EXIT_FAILURE, EXIT_OK, EXIT_UNSAFE_FAILED, PrecompPassThrough, RenderPolicyOptions,
    RenderPolicyResult, RoutedPath, decide,
};
pub use crate::precomp::cache_key::{
    OutputFormat, PrecompCacheInput, PrecompMetadata, ResolvedRenderer, create_cache_key,
    input_props_hash, normalize_cache_input,
};
pub use crate::precomp::layout::PrecompLayout;
pub use crate::precomp::lock::{CacheLock, LockOptions};
pub use crate::precomp::pipeline::{RunPrecompOptions, RunPrecompResult, run_precomp};
pub use crate::precomp::sweep::{CleanOptions, CleanResult, clean_precomp_cache};
pub use crate::risk::classifier::{classify, normalize_classifier_input};
pub use crate::risk::effects::{EffectType, backend_for_effect_name};
pub use crate::risk::model::{
    ChromeMode, ClassifierInput, ClassifierReason, ClassifierResult, Decision, EffectBackend,
    ExecutionEnvironment, NormalizedClassifierInput, ReasonCode, RenderMode, RequestedRenderer,
    Severity,
};
pub use crate::risk::scanner::{ProjectRiskScan, scan_project, scan_source_tree};
