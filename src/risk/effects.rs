use crate::risk::model::EffectBackend;

/// Effect types shipped by the effects library.
///
/// [`EffectType::backend`] matches exhaustively, so a new variant does not compile until it is
/// given a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectType {
    /// Gaussian blur.
    Blur,
    /// Brightness adjustment.
    Brightness,
    /// Contrast adjustment.
    Contrast,
    /// Saturation adjustment.
    Saturate,
    /// Hue rotation.
    HueRotate,
    /// Grayscale filter.
    Grayscale,
    /// Sepia filter.
    Sepia,
    /// Color inversion.
    Invert,
    /// Drop shadow.
    DropShadow,
    /// Soft glow built from stacked shadows.
    Glow,
    /// Radial vignette.
    Vignette,
    /// Static noise overlay.
    Noise,
    /// Turbulence distortion.
    Turbulence,
    /// Displacement map.
    Displacement,
    /// RGB-split glitch shader.
    Glitch,
    /// Chromatic aberration shader.
    ChromaticAberration,
    /// Pixelation shader.
    Pixelate,
    /// Bloom shader.
    Bloom,
    /// CRT scanline shader.
    Crt,
    /// Film grain shader.
    FilmGrain,
    /// Two-tone color map.
    Duotone,
    /// Nested effect stack.
    Stack,
}

impl EffectType {
    /// Every known effect type.
    pub const ALL: &'static [EffectType] = &[
        Self::Blur,
        Self::Brightness,
        Self::Contrast,
        Self::Saturate,
        Self::HueRotate,
        Self::Grayscale,
        Self::Sepia,
        Self::Invert,
        Self::DropShadow,
        Self::Glow,
        Self::Vignette,
        Self::Noise,
        Self::Turbulence,
        Self::Displacement,
        Self::Glitch,
        Self::ChromaticAberration,
        Self::Pixelate,
        Self::Bloom,
        Self::Crt,
        Self::FilmGrain,
        Self::Duotone,
        Self::Stack,
    ];

    /// Lower-case name used in `<Effect type="...">`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Blur => "blur",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturate => "saturate",
            Self::HueRotate => "hue-rotate",
            Self::Grayscale => "grayscale",
            Self::Sepia => "sepia",
            Self::Invert => "invert",
            Self::DropShadow => "drop-shadow",
            Self::Glow => "glow",
            Self::Vignette => "vignette",
            Self::Noise => "noise",
            Self::Turbulence => "turbulence",
            Self::Displacement => "displacement",
            Self::Glitch => "glitch",
            Self::ChromaticAberration => "chromatic-aberration",
            Self::Pixelate => "pixelate",
            Self::Bloom => "bloom",
            Self::Crt => "crt",
            Self::FilmGrain => "film-grain",
            Self::Duotone => "duotone",
            Self::Stack => "stack",
        }
    }

    /// Look up a lower-cased effect name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Rendering technology the effect is implemented with.
    pub fn backend(self) -> EffectBackend {
        match self {
            Self::Blur
            | Self::Brightness
            | Self::Contrast
            | Self::Saturate
            | Self::HueRotate
            | Self::Grayscale
            | Self::Sepia
            | Self::Invert
            | Self::DropShadow
            | Self::Glow => EffectBackend::Css,
            Self::Vignette | Self::Noise | Self::Turbulence | Self::Displacement => {
                EffectBackend::Svg
            }
            Self::Glitch
            | Self::ChromaticAberration
            | Self::Pixelate
            | Self::Bloom
            | Self::Crt
            | Self::FilmGrain => EffectBackend::Webgl,
            Self::Duotone | Self::Stack => EffectBackend::Composite,
        }
    }
}

/// Backend for a (lower-cased) effect name; names outside the library map to `unknown`.
pub fn backend_for_effect_name(name: &str) -> EffectBackend {
    match EffectType::from_name(name) {
        Some(t) => t.backend(),
        None => {
            tracing::debug!(effect = name, "effect type has no backend entry");
            EffectBackend::Unknown
        }
    }
}
