//! Brush presets and user-facing brush settings.

use super::lazy::LazyBrushConfig;
use super::outline::{Easing, StrokeOptions, Taper, TaperOptions};
use crate::color::SerializableColor;
use serde::{Deserialize, Serialize};

/// Lag radius at full smoothing.
pub const MAX_LAZY_RADIUS: f64 = 40.0;

/// Named outline parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushPreset {
    /// Constant width, round ends.
    Hard,
    /// Pressure-sensitive with short tapers.
    #[default]
    Soft,
    /// Heavily smoothed, tapered across the whole stroke.
    Watercolor,
    /// Thin and responsive.
    Pencil,
    /// Constant width, flat ends.
    Marker,
}

impl BrushPreset {
    pub const ALL: [BrushPreset; 5] = [
        BrushPreset::Hard,
        BrushPreset::Soft,
        BrushPreset::Watercolor,
        BrushPreset::Pencil,
        BrushPreset::Marker,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BrushPreset::Hard => "Hard",
            BrushPreset::Soft => "Soft",
            BrushPreset::Watercolor => "Watercolor",
            BrushPreset::Pencil => "Pencil",
            BrushPreset::Marker => "Marker",
        }
    }

    /// Outline options for a brush of diameter `size`.
    pub fn options(&self, size: f64) -> StrokeOptions {
        let base = StrokeOptions { size, ..StrokeOptions::default() };
        match self {
            BrushPreset::Hard => StrokeOptions {
                thinning: 0.0,
                smoothing: 0.5,
                streamline: 0.5,
                simulate_pressure: false,
                ..base
            },
            BrushPreset::Soft => StrokeOptions {
                thinning: 0.5,
                smoothing: 0.75,
                streamline: 0.6,
                easing: Easing::EaseOutSine,
                simulate_pressure: true,
                start: TaperOptions::start_default().tapered(Taper::Length(size * 2.0)),
                end: TaperOptions::end_default().tapered(Taper::Length(size * 2.0)),
                ..base
            },
            BrushPreset::Watercolor => StrokeOptions {
                thinning: 0.7,
                smoothing: 0.9,
                streamline: 0.7,
                easing: Easing::EaseInOutSine,
                simulate_pressure: true,
                start: TaperOptions::start_default().tapered(Taper::Full),
                end: TaperOptions::end_default().tapered(Taper::Full),
                ..base
            },
            BrushPreset::Pencil => StrokeOptions {
                thinning: 0.3,
                smoothing: 0.3,
                streamline: 0.25,
                simulate_pressure: false,
                ..base
            },
            BrushPreset::Marker => StrokeOptions {
                thinning: 0.0,
                smoothing: 0.6,
                streamline: 0.55,
                simulate_pressure: false,
                start: TaperOptions::start_default().flat(),
                end: TaperOptions::end_default().flat(),
                ..base
            },
        }
    }
}

/// Brush parameters chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrushSettings {
    /// Diameter in canvas units.
    pub size: f64,
    pub color: SerializableColor,
    pub opacity: f64,
    pub preset: BrushPreset,
    /// Lag smoothing amount in [0, 1]; scales the lag radius.
    pub smoothing: f64,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: 8.0,
            color: SerializableColor::black(),
            opacity: 1.0,
            preset: BrushPreset::default(),
            smoothing: 0.0,
        }
    }
}

impl BrushSettings {
    pub fn with_preset(preset: BrushPreset) -> Self {
        Self { preset, ..Self::default() }
    }

    /// Outline options for the current preset and size.
    pub fn stroke_options(&self) -> StrokeOptions {
        self.preset.options(self.size)
    }

    pub fn lazy_radius(&self) -> f64 {
        self.smoothing.clamp(0.0, 1.0) * MAX_LAZY_RADIUS
    }

    /// Lag configuration derived from `smoothing`, keeping the other fields of `base`.
    pub fn lazy_config(&self, base: LazyBrushConfig) -> LazyBrushConfig {
        LazyBrushConfig { radius: self.lazy_radius(), ..base }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_use_size() {
        for preset in BrushPreset::ALL {
            let options = preset.options(12.0);
            assert!((options.size - 12.0).abs() < f64::EPSILON, "{}", preset.name());
            assert!(!options.last);
        }
    }

    #[test]
    fn test_hard_and_marker_are_constant_width() {
        assert_eq!(BrushPreset::Hard.options(4.0).thinning, 0.0);
        assert_eq!(BrushPreset::Marker.options(4.0).thinning, 0.0);
        assert!(!BrushPreset::Marker.options(4.0).end.cap);
        assert_eq!(BrushPreset::Watercolor.options(4.0).start.taper, Taper::Full);
    }

    #[test]
    fn test_smoothing_maps_to_radius() {
        let settings = BrushSettings { smoothing: 0.5, ..Default::default() };
        assert!((settings.lazy_radius() - MAX_LAZY_RADIUS / 2.0).abs() < f64::EPSILON);

        let over = BrushSettings { smoothing: 3.0, ..Default::default() };
        assert!((over.lazy_radius() - MAX_LAZY_RADIUS).abs() < f64::EPSILON);

        let config = settings.lazy_config(LazyBrushConfig { friction: 0.3, ..Default::default() });
        assert!((config.radius - 20.0).abs() < f64::EPSILON);
        assert!((config.friction - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_settings_json() {
        let settings: BrushSettings = serde_json::from_str(r#"{"size": 3.0, "preset": "pencil"}"#).unwrap();
        assert_eq!(settings.preset, BrushPreset::Pencil);
        assert!((settings.opacity - 1.0).abs() < f64::EPSILON);
        assert!(serde_json::from_str::<BrushSettings>(r#"{"bogus": 1}"#).is_err());
    }
}
