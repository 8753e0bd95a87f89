//! Gesture math: drag, rotate, rotation-aware resize and the scene boundary clamp.
//!
//! All functions are pure over an [`Entity`] and scene-space points, so the
//! interaction controller stays a thin state machine on top of them.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use crate::consts::{MIN_SHAPE_SIZE, MIN_TEXT_HEIGHT, MIN_TEXT_WIDTH};
use crate::entity::Entity;
use crate::hit::{ResizeAnchor, local_handle_position};
use crate::viewport::Point;

/// Drag target: the original center moved by the pointer travel since the
/// gesture started.
#[must_use]
pub fn drag_position(orig: Point, start: Point, pointer: Point) -> Point {
    orig + (pointer - start)
}

/// Angle in degrees, normalized to `[0, 360)`, for a rotate gesture around
/// `center` that started at `start` and is now at `pointer`.
///
/// A positive `snap_deg` rounds the result to a multiple of it.
#[must_use]
pub fn rotation_angle(orig_angle: f64, center: Point, start: Point, pointer: Point, snap_deg: Option<f64>) -> f64 {
    let a0 = (start.y - center.y).atan2(start.x - center.x);
    let a1 = (pointer.y - center.y).atan2(pointer.x - center.x);
    let mut angle = orig_angle + (a1 - a0).to_degrees();
    if let Some(step) = snap_deg.filter(|s| s.is_finite() && *s > 0.0) {
        angle = (angle / step).round() * step;
    }
    let angle = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if angle >= 360.0 { 0.0 } else { angle }
}

/// Fixed data for one resize gesture, captured at pointer-down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeGesture {
    /// The handle being dragged.
    pub handle: ResizeAnchor,
    /// Scene-space point that must not move: the handle's opposite corner or edge midpoint.
    pub anchor: Point,
    /// Entity rotation in radians, constant for the gesture.
    pub angle_rad: f64,
    /// Scaled width at gesture start.
    pub start_width: f64,
    /// Scaled height at gesture start.
    pub start_height: f64,
    /// Text boxes commit size into width/height; other variants use scale.
    pub commits_size: bool,
}

/// Capture the anchor for dragging `handle` of `entity`.
#[must_use]
pub fn begin_resize(entity: &Entity, handle: ResizeAnchor) -> ResizeGesture {
    let angle_rad = entity.angle_rad();
    let anchor_local = local_handle_position(entity, handle.opposite());
    let (w, h) = entity.scaled_size();
    ResizeGesture {
        handle,
        anchor: entity.center() + anchor_local.rotated(angle_rad),
        angle_rad,
        start_width: w.abs(),
        start_height: h.abs(),
        commits_size: entity.is_text(),
    }
}

/// Minimum scaled size for `entity` during resize.
#[must_use]
pub fn min_size(entity: &Entity) -> (f64, f64) {
    if entity.is_text() { (MIN_TEXT_WIDTH, MIN_TEXT_HEIGHT) } else { (MIN_SHAPE_SIZE, MIN_SHAPE_SIZE) }
}

/// Resize `entity` so the dragged handle follows `pointer` while the anchor
/// stays put. Only the axes the handle controls change.
pub fn apply_resize(entity: &mut Entity, gesture: &ResizeGesture, pointer: Point) {
    if !pointer.x.is_finite() || !pointer.y.is_finite() {
        return;
    }
    let (ux, uy) = gesture.handle.unit();
    let (min_w, min_h) = min_size(entity);
    let local = (pointer - gesture.anchor).rotated(-gesture.angle_rad);

    let new_w = if ux == 0.0 { gesture.start_width } else { (local.x * ux).max(min_w) };
    let new_h = if uy == 0.0 { gesture.start_height } else { (local.y * uy).max(min_h) };

    let center = gesture.anchor + Point::new(ux * new_w / 2.0, uy * new_h / 2.0).rotated(gesture.angle_rad);
    entity.left = center.x;
    entity.top = center.y;

    if gesture.commits_size {
        entity.width = new_w;
        entity.height = new_h;
        entity.scale_x = 1.0;
        entity.scale_y = 1.0;
    } else {
        set_scaled_extent(&mut entity.width, &mut entity.scale_x, new_w);
        set_scaled_extent(&mut entity.height, &mut entity.scale_y, new_h);
    }
}

fn set_scaled_extent(base: &mut f64, scale: &mut f64, target: f64) {
    if *base > 0.0 && base.is_finite() {
        *scale = target / *base;
    } else {
        *base = target;
        *scale = 1.0;
    }
}

/// Shift `entity` so its rotated bounding box lies inside the scene. On an
/// axis where the box is larger than the scene it is centered instead.
/// Returns `true` if the entity moved.
pub fn clamp_to_scene(entity: &mut Entity, scene_width: f64, scene_height: f64) -> bool {
    if !entity.is_paintable() {
        return false;
    }
    let bounds = entity.aabb();
    let dx = axis_shift(bounds.x, bounds.right(), scene_width);
    let dy = axis_shift(bounds.y, bounds.bottom(), scene_height);
    if dx == 0.0 && dy == 0.0 {
        return false;
    }
    entity.left += dx;
    entity.top += dy;
    true
}

fn axis_shift(start: f64, end: f64, limit: f64) -> f64 {
    if end - start > limit {
        limit / 2.0 - (start + end) / 2.0
    } else if start < 0.0 {
        -start
    } else if end > limit {
        limit - end
    } else {
        0.0
    }
}
