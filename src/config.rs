//! Editor configuration supplied by the host page.
//!
//! The host passes a JSON object when the editor is mounted. Every key is
//! optional; absent keys fall back to [`EditorConfig::default`]. Limits that
//! the editor treats as invariants (zoom range, autofit floor, minimum sizes)
//! are constants in [`crate::consts`] and are not configurable.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::Deserialize;

use crate::error::EditorError;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const DEFAULT_HISTORY_DEBOUNCE_MS: f64 = 300.0;
pub const DEFAULT_HANDLE_RADIUS_PX: f64 = 8.0;
pub const DEFAULT_ROTATE_HANDLE_OFFSET_PX: f64 = 30.0;
pub const DEFAULT_ROTATION_SNAP_DEG: f64 = 15.0;
pub const DEFAULT_FONT_FAMILY: &str = "Impact";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of snapshots kept by the history stack.
    pub history_limit: usize,
    /// Quiet period before a debounced snapshot is recorded.
    pub history_debounce_ms: f64,
    /// Screen-space hit radius of resize and rotate handles.
    pub handle_radius_px: f64,
    /// Screen-space distance from the top edge to the rotate handle.
    pub rotate_handle_offset_px: f64,
    /// Angle step used when rotating with Shift held.
    pub rotation_snap_deg: f64,
    /// Arrow-key nudge distance in scene units.
    pub nudge_step: f64,
    /// Arrow-key nudge distance with Shift held.
    pub nudge_step_large: f64,
    /// Keep dragged and resized entities inside the scene rectangle.
    pub clamp_to_scene: bool,
    /// Font family for newly added text.
    pub default_font_family: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_debounce_ms: DEFAULT_HISTORY_DEBOUNCE_MS,
            handle_radius_px: DEFAULT_HANDLE_RADIUS_PX,
            rotate_handle_offset_px: DEFAULT_ROTATE_HANDLE_OFFSET_PX,
            rotation_snap_deg: DEFAULT_ROTATION_SNAP_DEG,
            nudge_step: 1.0,
            nudge_step_large: 10.0,
            clamp_to_scene: true,
            default_font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

impl EditorConfig {
    /// Parse and validate a config object sent by the host.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] for malformed JSON and
    /// [`EditorError::InvalidConfig`] for out-of-range values.
    pub fn from_json(raw: &str) -> Result<Self, EditorError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidConfig`] naming the first bad key.
    pub fn validate(&self) -> Result<(), EditorError> {
        if self.history_limit == 0 {
            return Err(EditorError::InvalidConfig("history_limit must be at least 1".into()));
        }
        let non_negative = [
            ("history_debounce_ms", self.history_debounce_ms),
            ("rotation_snap_deg", self.rotation_snap_deg),
            ("nudge_step", self.nudge_step),
            ("nudge_step_large", self.nudge_step_large),
        ];
        for (key, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(EditorError::InvalidConfig(format!("{key} must be a non-negative number")));
            }
        }
        let positive = [
            ("handle_radius_px", self.handle_radius_px),
            ("rotate_handle_offset_px", self.rotate_handle_offset_px),
        ];
        for (key, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EditorError::InvalidConfig(format!("{key} must be positive")));
            }
        }
        if self.default_font_family.trim().is_empty() {
            return Err(EditorError::InvalidConfig("default_font_family must not be empty".into()));
        }
        Ok(())
    }
}
