//! Rendering: draws the scene to a 2D context and exports it as a bitmap.
//!
//! This module is the only place that touches [`web_sys::CanvasRenderingContext2d`].
//! It receives read-only views of the scene and viewport and produces pixels;
//! it does not mutate any editor state.
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::f64::consts::PI;

use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::consts::{MAX_BACKING_AREA_PX, MAX_BACKING_EDGE_PX, SELECTION_COLOR, SELECTION_DASH_PX};
use crate::entity::{Entity, EntityKind, TextProps};
use crate::error::EditorError;
use crate::hit::{self, HandleMetrics};
use crate::image::ImageCache;
use crate::layout::{self, LayoutRequest, TextMeasure};
use crate::scene::Scene;
use crate::viewport::{Rect, Viewport};

/// Draw the full scene: entities and selection UI.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails (e.g. invalid context state).
pub fn draw(
    ctx: &CanvasRenderingContext2d,
    scene: &Scene,
    viewport: &Viewport,
    images: &ImageCache,
    metrics: HandleMetrics,
) -> Result<(), JsValue> {
    let scale = viewport.render_scale();
    let (backing_w, backing_h) = viewport.backing_store_size();

    // Layer 1: clear the whole backing store, then set up transforms.
    ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
    ctx.clear_rect(0.0, 0.0, f64::from(backing_w), f64::from(backing_h));
    ctx.set_transform(scale, 0.0, 0.0, scale, 0.0, 0.0)?;
    ctx.translate(viewport.pan_x, viewport.pan_y)?;
    ctx.scale(viewport.zoom, viewport.zoom)?;

    // Layer 2: entities in z-order (bottom first).
    for entity in scene.iter() {
        draw_entity(ctx, entity, images)?;
    }

    // Layer 3: selection UI.
    if let Some(selected) = scene.selected_entity() {
        if selected.visible && selected.is_paintable() {
            draw_selection(ctx, selected, viewport.zoom, metrics)?;
        }
    }

    Ok(())
}

// =============================================================
// Entity dispatch
// =============================================================

fn draw_entity(ctx: &CanvasRenderingContext2d, entity: &Entity, images: &ImageCache) -> Result<(), JsValue> {
    if !entity.visible || !entity.is_paintable() || entity.is_pending_image() {
        return Ok(());
    }

    ctx.save();
    translate_and_rotate(ctx, entity)?;
    ctx.scale(entity.scale_x, entity.scale_y)?;
    ctx.set_global_alpha(entity.opacity);

    let result = match &entity.kind {
        EntityKind::Rect { rx, ry } => draw_rect(ctx, entity, *rx, *ry),
        EntityKind::Circle { .. } => draw_ellipse(ctx, entity),
        EntityKind::Text(props) => draw_text(ctx, entity, props),
        EntityKind::Image { src, .. } => draw_image(ctx, entity, images, src),
    };

    ctx.restore();
    result
}

// =============================================================
// Shape renderers
// =============================================================

fn draw_rect(ctx: &CanvasRenderingContext2d, entity: &Entity, rx: f64, ry: f64) -> Result<(), JsValue> {
    let (w, h) = (entity.width, entity.height);
    let (rx, ry) = corner_radii(w, h, rx, ry);

    if rx == 0.0 && ry == 0.0 {
        ctx.set_fill_style_str(&entity.fill);
        ctx.fill_rect(-w / 2.0, -h / 2.0, w, h);
        if apply_stroke_style(ctx, entity) {
            ctx.stroke_rect(-w / 2.0, -h / 2.0, w, h);
        }
        return Ok(());
    }

    rounded_rect_path(ctx, w, h, rx, ry);
    ctx.set_fill_style_str(&entity.fill);
    ctx.fill();
    if apply_stroke_style(ctx, entity) {
        ctx.stroke();
    }
    Ok(())
}

/// Corner radii clamped to half the box on each axis.
#[must_use]
pub fn corner_radii(width: f64, height: f64, rx: f64, ry: f64) -> (f64, f64) {
    let clamp = |r: f64, extent: f64| if r.is_finite() { r.clamp(0.0, (extent.abs() / 2.0).max(0.0)) } else { 0.0 };
    (clamp(rx, width), clamp(ry, height))
}

/// Rounded rectangle centered on the origin, traced with quadratic corners.
fn rounded_rect_path(ctx: &CanvasRenderingContext2d, w: f64, h: f64, rx: f64, ry: f64) {
    let (x0, y0) = (-w / 2.0, -h / 2.0);
    let (x1, y1) = (w / 2.0, h / 2.0);
    ctx.begin_path();
    ctx.move_to(x0 + rx, y0);
    ctx.line_to(x1 - rx, y0);
    ctx.quadratic_curve_to(x1, y0, x1, y0 + ry);
    ctx.line_to(x1, y1 - ry);
    ctx.quadratic_curve_to(x1, y1, x1 - rx, y1);
    ctx.line_to(x0 + rx, y1);
    ctx.quadratic_curve_to(x0, y1, x0, y1 - ry);
    ctx.line_to(x0, y0 + ry);
    ctx.quadratic_curve_to(x0, y0, x0 + rx, y0);
    ctx.close_path();
}

fn draw_ellipse(ctx: &CanvasRenderingContext2d, entity: &Entity) -> Result<(), JsValue> {
    let rx = entity.width.abs() / 2.0;
    let ry = entity.height.abs() / 2.0;

    ctx.begin_path();
    ctx.ellipse(0.0, 0.0, rx, ry, 0.0, 0.0, 2.0 * PI)?;
    ctx.set_fill_style_str(&entity.fill);
    ctx.fill();
    if apply_stroke_style(ctx, entity) {
        ctx.stroke();
    }
    Ok(())
}

fn draw_image(ctx: &CanvasRenderingContext2d, entity: &Entity, images: &ImageCache, src: &str) -> Result<(), JsValue> {
    let Some(img) = images.get(src) else {
        return Ok(());
    };
    let (w, h) = (entity.width, entity.height);
    ctx.draw_image_with_html_image_element_and_dw_and_dh(img, -w / 2.0, -h / 2.0, w, h)
}

// =============================================================
// Text
// =============================================================

/// [`TextMeasure`] backed by the canvas context's `measureText`.
pub struct CanvasMeasure<'a> {
    ctx: &'a CanvasRenderingContext2d,
}

impl<'a> CanvasMeasure<'a> {
    #[must_use]
    pub fn new(ctx: &'a CanvasRenderingContext2d) -> Self {
        Self { ctx }
    }
}

impl TextMeasure for CanvasMeasure<'_> {
    fn text_width(&self, text: &str, font: &str) -> f64 {
        self.ctx.set_font(font);
        match self.ctx.measure_text(text) {
            Ok(metrics) => metrics.width(),
            Err(_) => f64::INFINITY,
        }
    }
}

fn draw_text(ctx: &CanvasRenderingContext2d, entity: &Entity, props: &TextProps) -> Result<(), JsValue> {
    let req = LayoutRequest::from_props(props, entity.width, entity.height);
    let text_layout = layout::autofit_layout(&req, &CanvasMeasure::new(ctx));
    let (x, align) = layout::line_anchor(props.text_align, entity.width);

    ctx.set_font(&text_layout.font);
    ctx.set_text_align(align);
    ctx.set_text_baseline("middle");
    ctx.set_fill_style_str(&entity.fill);

    // `strokeWidth` on text is an outline intensity, not a pixel width.
    let stroke_px = layout::text_stroke_px(entity.stroke_width, text_layout.font_size);
    let stroke = entity.stroke.as_deref().filter(|_| stroke_px > 0.0);
    if let Some(color) = stroke {
        ctx.set_stroke_style_str(color);
        ctx.set_line_width(stroke_px);
        ctx.set_line_join("round");
    }

    for (i, line) in text_layout.lines.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let y = text_layout.start_y + (i as f64 + 0.5) * text_layout.line_height_px;
        // Outline first so the fill sits on top of it.
        if stroke.is_some() {
            ctx.stroke_text(line, x, y)?;
        }
        ctx.fill_text(line, x, y)?;
    }
    Ok(())
}

// =============================================================
// Selection UI
// =============================================================

fn draw_selection(
    ctx: &CanvasRenderingContext2d,
    entity: &Entity,
    zoom: f64,
    metrics: HandleMetrics,
) -> Result<(), JsValue> {
    ctx.save();

    // Dashed bounding box (rotated with the entity, scale applied to the size).
    translate_and_rotate(ctx, entity)?;

    let (w, h) = entity.scaled_size();
    let dash_world = SELECTION_DASH_PX / zoom;

    ctx.set_stroke_style_str(SELECTION_COLOR);
    ctx.set_line_width(1.0 / zoom);
    let dash_array = js_sys::Array::new();
    dash_array.push(&dash_world.into());
    dash_array.push(&dash_world.into());
    ctx.set_line_dash(&dash_array)?;

    ctx.stroke_rect(-w / 2.0, -h / 2.0, w, h);
    ctx.set_line_dash(&js_sys::Array::new())?;

    ctx.restore();

    // Resize handles (drawn in scene coordinates, not rotated context).
    let handle_size_world = metrics.radius_px / zoom;
    let handles = hit::resize_handle_positions(entity);

    ctx.save();
    ctx.set_fill_style_str("#fff");
    ctx.set_stroke_style_str(SELECTION_COLOR);
    ctx.set_line_width(1.0 / zoom);

    for pos in &handles {
        ctx.fill_rect(
            pos.x - handle_size_world,
            pos.y - handle_size_world,
            handle_size_world * 2.0,
            handle_size_world * 2.0,
        );
        ctx.stroke_rect(
            pos.x - handle_size_world,
            pos.y - handle_size_world,
            handle_size_world * 2.0,
            handle_size_world * 2.0,
        );
    }

    // Rotate handle.
    let rh = hit::rotate_handle_position(entity, zoom, metrics.rotate_offset_px);
    let n_handle = handles[0]; // N handle

    // Stem from the N handle to the rotate handle.
    ctx.begin_path();
    ctx.move_to(n_handle.x, n_handle.y);
    ctx.line_to(rh.x, rh.y);
    ctx.stroke();

    ctx.begin_path();
    ctx.arc(rh.x, rh.y, handle_size_world, 0.0, 2.0 * PI)?;
    ctx.fill();
    ctx.stroke();

    ctx.restore();
    Ok(())
}

// =============================================================
// Export
// =============================================================

/// Bitmap encoding for [`export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ExportFormat {
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Encoder quality in `[0, 1]` for lossy formats.
    pub quality: f64,
    /// Scene-space region to export; the whole scene when absent.
    pub crop: Option<Rect>,
    /// Output pixels per scene unit.
    pub multiplier: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { format: ExportFormat::Png, quality: 0.92, crop: None, multiplier: 1.0 }
    }
}

/// Resolved export geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportFrame {
    /// Scene-space region being exported.
    pub crop: Rect,
    /// Output pixels per scene unit.
    pub scale: f64,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Resolve crop and multiplier into an output bitmap size.
///
/// # Errors
///
/// Returns [`EditorError::Export`] for an empty or non-finite crop, a
/// non-positive multiplier, or an output larger than the canvas limits.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn export_frame(options: &ExportOptions, scene_width: f64, scene_height: f64) -> Result<ExportFrame, EditorError> {
    let crop = options.crop.unwrap_or(Rect::new(0.0, 0.0, scene_width, scene_height));
    let finite = [crop.x, crop.y, crop.width, crop.height].iter().all(|v| v.is_finite());
    if !finite || crop.width <= 0.0 || crop.height <= 0.0 {
        return Err(EditorError::Export(format!("empty crop {}x{}", crop.width, crop.height)));
    }
    let scale = options.multiplier;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(EditorError::Export(format!("multiplier must be positive, got {scale}")));
    }

    let w = (crop.width * scale).round().max(1.0);
    let h = (crop.height * scale).round().max(1.0);
    if w > MAX_BACKING_EDGE_PX || h > MAX_BACKING_EDGE_PX || w * h > MAX_BACKING_AREA_PX {
        return Err(EditorError::Export(format!("output {w}x{h} exceeds canvas limits")));
    }
    Ok(ExportFrame { crop, scale, pixel_width: w as u32, pixel_height: h as u32 })
}

/// Rasterize the scene onto an offscreen canvas and return a data URL.
///
/// Viewport zoom and pan are ignored and selection chrome is never drawn.
///
/// # Errors
///
/// Returns [`EditorError::Export`] for bad options or when the browser
/// refuses to encode (e.g. a canvas tainted by a cross-origin image).
pub fn export(scene: &Scene, images: &ImageCache, options: &ExportOptions) -> Result<String, EditorError> {
    let frame = export_frame(options, scene.width(), scene.height())?;

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| EditorError::Export("no document".into()))?;
    let canvas = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| EditorError::Export("created element is not a canvas".into()))?;
    canvas.set_width(frame.pixel_width);
    canvas.set_height(frame.pixel_height);
    let ctx = canvas
        .get_context("2d")?
        .ok_or(EditorError::NoContext)?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| EditorError::NoContext)?;

    // JPEG has no alpha channel; paint transparent areas white instead of black.
    if options.format == ExportFormat::Jpeg {
        ctx.set_fill_style_str("#FFFFFF");
        ctx.fill_rect(0.0, 0.0, f64::from(frame.pixel_width), f64::from(frame.pixel_height));
    }

    let s = frame.scale;
    ctx.set_transform(s, 0.0, 0.0, s, -frame.crop.x * s, -frame.crop.y * s)?;
    for entity in scene.iter() {
        draw_entity(&ctx, entity, images)?;
    }

    let quality = JsValue::from_f64(options.quality.clamp(0.0, 1.0));
    let url = canvas
        .to_data_url_with_type_and_encoder_options(options.format.mime(), &quality)
        .map_err(|err| EditorError::Export(format!("{err:?}")))?;
    log::info!("render: exported {}x{} {}", frame.pixel_width, frame.pixel_height, options.format.mime());
    Ok(url)
}

// =============================================================
// Helpers
// =============================================================

fn translate_and_rotate(ctx: &CanvasRenderingContext2d, entity: &Entity) -> Result<(), JsValue> {
    ctx.translate(entity.left, entity.top)?;
    ctx.rotate(entity.angle_rad())?;
    Ok(())
}

/// Apply stroke style and line width. Returns `false` when there is nothing to stroke.
fn apply_stroke_style(ctx: &CanvasRenderingContext2d, entity: &Entity) -> bool {
    match entity.stroke.as_deref() {
        Some(color) if entity.stroke_width > 0.0 => {
            ctx.set_stroke_style_str(color);
            ctx.set_line_width(entity.stroke_width);
            true
        }
        _ => false,
    }
}
