//! Editor configuration: every tunable of the interaction engines in one document.

use crate::persist::PersistConfig;
use crate::snap::SnapConfig;
use crate::stroke::{BrushSettings, LazyBrushConfig};
use crate::viewport::ViewportLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

/// Aggregate of all engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    pub snap: SnapConfig,
    pub brush: BrushSettings,
    pub lazy_brush: LazyBrushConfig,
    pub viewport: ViewportLimits,
    pub persist: PersistConfig,
}

impl EditorConfig {
    /// Parse and validate. Missing keys take their defaults; unknown keys are errors.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let snap = &self.snap;
        if !(snap.grid_size > 0.0 && snap.grid_size.is_finite()) {
            return Err(invalid("snap.grid_size", format!("must be positive, got {}", snap.grid_size)));
        }
        if !(snap.snap_threshold >= 0.0 && snap.snap_threshold.is_finite()) {
            return Err(invalid("snap.snap_threshold", format!("must be non-negative, got {}", snap.snap_threshold)));
        }

        let brush = &self.brush;
        if !(brush.size > 0.0 && brush.size.is_finite()) {
            return Err(invalid("brush.size", format!("must be positive, got {}", brush.size)));
        }
        if !(0.0..=1.0).contains(&brush.opacity) {
            return Err(invalid("brush.opacity", format!("must be within [0, 1], got {}", brush.opacity)));
        }
        if !(0.0..=1.0).contains(&brush.smoothing) {
            return Err(invalid("brush.smoothing", format!("must be within [0, 1], got {}", brush.smoothing)));
        }

        let lazy = &self.lazy_brush;
        if !(lazy.radius >= 0.0 && lazy.radius.is_finite()) {
            return Err(invalid("lazy_brush.radius", format!("must be non-negative, got {}", lazy.radius)));
        }
        if !(0.0..1.0).contains(&lazy.friction) {
            return Err(invalid("lazy_brush.friction", format!("must be within [0, 1), got {}", lazy.friction)));
        }
        if !(0.0..=1.0).contains(&lazy.smoothing) {
            return Err(invalid("lazy_brush.smoothing", format!("must be within [0, 1], got {}", lazy.smoothing)));
        }
        if let Some(threshold) = lazy.angle_threshold {
            if !(0.0..=45.0).contains(&threshold) {
                return Err(invalid("lazy_brush.angle_threshold", format!("must be within [0, 45] degrees, got {}", threshold)));
            }
        }

        let viewport = &self.viewport;
        if !(viewport.min_scale > 0.0 && viewport.min_scale.is_finite() && viewport.max_scale.is_finite()) {
            return Err(invalid("viewport.min_scale", format!("must be positive, got {}", viewport.min_scale)));
        }
        if viewport.min_scale > viewport.max_scale {
            return Err(invalid(
                "viewport.max_scale",
                format!("must not be below min_scale ({} < {})", viewport.max_scale, viewport.min_scale),
            ));
        }

        Ok(())
    }
}
