//! Shared numeric constants for the editor crate.

// ── Entities ────────────────────────────────────────────────────

/// Reserved role tag for the scene background entity.
pub const BACKGROUND_ROLE: &str = "background";

/// Minimum scaled edge length for shapes and images during resize, in scene units.
pub const MIN_SHAPE_SIZE: f64 = 5.0;

/// Minimum text box width during resize, in scene units.
pub const MIN_TEXT_WIDTH: f64 = 50.0;

/// Minimum text box height during resize, in scene units.
pub const MIN_TEXT_HEIGHT: f64 = 20.0;

// ── Text layout ─────────────────────────────────────────────────

/// Autofit never shrinks text below this size, in pixels.
pub const MIN_FONT_SIZE: f64 = 8.0;

/// Upper bound on shrink steps per layout.
pub const AUTOFIT_MAX_STEPS: usize = 100;

/// Largest accepted stroke intensity for text outlines.
pub const MAX_STROKE_INTENSITY: f64 = 10.0;

// ── Viewport ────────────────────────────────────────────────────

/// Lowest zoom factor.
pub const MIN_ZOOM: f64 = 0.1;

/// Highest zoom factor.
pub const MAX_ZOOM: f64 = 8.0;

/// Smallest overscroll allowance past the content edge, in CSS pixels.
pub const OVERSCROLL_MIN_PX: f64 = 96.0;

/// Overscroll allowance as a fraction of the viewport dimension.
pub const OVERSCROLL_RATIO: f64 = 0.18;

/// Wheel-to-zoom sensitivity; applied as `zoom * exp(-dy * k)`.
pub const WHEEL_ZOOM_SENSITIVITY: f64 = 0.002;

// ── Backing store ───────────────────────────────────────────────

/// Hard ceiling on the render scale.
pub const MAX_RENDER_SCALE: f64 = 4.0;

/// Longest backing-store edge, in device pixels.
pub const MAX_BACKING_EDGE_PX: f64 = 8192.0;

/// Largest backing-store area, in device pixels.
pub const MAX_BACKING_AREA_PX: f64 = 16_777_216.0;

// ── Selection chrome ────────────────────────────────────────────

/// Selection outline dash length in screen pixels.
pub const SELECTION_DASH_PX: f64 = 4.0;

/// Accent colour for the selection outline and handles.
pub const SELECTION_COLOR: &str = "#1E90FF";

// ── Editor actions ──────────────────────────────────────────────

/// Scene size used before a document or background image sets one.
pub const DEFAULT_SCENE_WIDTH: f64 = 800.0;

/// Scene size used before a document or background image sets one.
pub const DEFAULT_SCENE_HEIGHT: f64 = 600.0;

/// Added images are shrunk to fit this fraction of the scene.
pub const IMAGE_FIT_RATIO: f64 = 0.8;

/// Offset applied to duplicated entities so the copy is visible.
pub const DUPLICATE_OFFSET: f64 = 20.0;

/// Padding around the scene for `fit_scene`, in CSS pixels.
pub const FIT_PADDING_PX: f64 = 24.0;
