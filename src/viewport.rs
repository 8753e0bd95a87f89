//! Viewport transform: zoom/pan over the fixed-size scene and backing-store sizing.
//!
//! Screen coordinates are CSS pixels relative to the viewport element. Scene
//! coordinates are the logical units persisted in documents. The mapping is
//! `screen = scene * zoom + pan`.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use std::ops::{Add, Sub};

use serde::Deserialize;

use crate::consts::{
    MAX_BACKING_AREA_PX, MAX_BACKING_EDGE_PX, MAX_RENDER_SCALE, MAX_ZOOM, MIN_ZOOM, OVERSCROLL_MIN_PX, OVERSCROLL_RATIO,
};

/// A point in either screen or scene space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate about the origin by `radians` (clockwise on a y-down canvas).
    #[must_use]
    pub fn rotated(self, radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self { x: self.x * cos - self.y * sin, y: self.x * sin + self.y * cos }
    }

    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y }
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Allowed pan range for one zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl PanBounds {
    #[must_use]
    pub fn contains(&self, pan_x: f64, pan_y: f64) -> bool {
        pan_x >= self.min_x && pan_x <= self.max_x && pan_y >= self.min_y && pan_y <= self.max_y
    }
}

/// Zoom/pan state for one editor session.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    /// Viewport element width in CSS pixels.
    pub width: f64,
    /// Viewport element height in CSS pixels.
    pub height: f64,
    /// Device pixel ratio reported by the host.
    pub dpr: f64,
    scene_width: f64,
    scene_height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { zoom: 1.0, pan_x: 0.0, pan_y: 0.0, width: 0.0, height: 0.0, dpr: 1.0, scene_width: 0.0, scene_height: 0.0 }
    }
}

impl Viewport {
    #[must_use]
    pub fn new(scene_width: f64, scene_height: f64) -> Self {
        Self { scene_width, scene_height, ..Self::default() }
    }

    /// Update the viewport element size and device pixel ratio, then re-clamp pan.
    pub fn set_size(&mut self, width: f64, height: f64, dpr: f64) {
        self.width = if width.is_finite() { width.max(0.0) } else { 0.0 };
        self.height = if height.is_finite() { height.max(0.0) } else { 0.0 };
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        self.clamp_pan();
    }

    /// Track a scene resize so pan bounds follow the new content size.
    pub fn set_scene_size(&mut self, scene_width: f64, scene_height: f64) {
        self.scene_width = scene_width;
        self.scene_height = scene_height;
        self.clamp_pan();
    }

    /// Convert a screen-space point (CSS pixels) to scene coordinates.
    ///
    /// Returns the origin when the viewport has no area or the zoom is unusable.
    #[must_use]
    pub fn screen_to_scene(&self, screen: Point) -> Point {
        if self.width <= 0.0 || self.height <= 0.0 || !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Point::new(0.0, 0.0);
        }
        Point { x: (screen.x - self.pan_x) / self.zoom, y: (screen.y - self.pan_y) / self.zoom }
    }

    /// Convert a scene-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn scene_to_screen(&self, scene: Point) -> Point {
        Point { x: scene.x * self.zoom + self.pan_x, y: scene.y * self.zoom + self.pan_y }
    }

    /// Convert a screen-space distance (pixels) to a scene-space distance.
    #[must_use]
    pub fn screen_dist_to_scene(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// Pan range for `zoom`, per axis.
    #[must_use]
    pub fn pan_bounds(&self, zoom: f64) -> PanBounds {
        let (min_x, max_x) = axis_bounds(self.scene_width * zoom, self.width);
        let (min_y, max_y) = axis_bounds(self.scene_height * zoom, self.height);
        PanBounds { min_x, max_x, min_y, max_y }
    }

    /// Clamp the current pan into the bounds for the current zoom.
    pub fn clamp_pan(&mut self) {
        let bounds = self.pan_bounds(self.zoom);
        self.pan_x = clamp_or(self.pan_x, bounds.min_x, bounds.max_x);
        self.pan_y = clamp_or(self.pan_y, bounds.min_y, bounds.max_y);
    }

    /// Set the zoom level, keeping the viewport center fixed.
    pub fn set_zoom(&mut self, zoom: f64) {
        let center = Point::new(self.width * 0.5, self.height * 0.5);
        self.zoom_at(zoom, center);
    }

    /// Zoom to `zoom` keeping the scene point under `anchor` (screen space) in place.
    pub fn zoom_at(&mut self, zoom: f64, anchor: Point) {
        let world = Point { x: (anchor.x - self.pan_x) / self.zoom, y: (anchor.y - self.pan_y) / self.zoom };
        self.zoom = clamp_zoom(zoom, self.zoom);
        self.pan_x = anchor.x - world.x * self.zoom;
        self.pan_y = anchor.y - world.y * self.zoom;
        self.clamp_pan();
    }

    /// Shift the pan by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        if dx.is_finite() {
            self.pan_x += dx;
        }
        if dy.is_finite() {
            self.pan_y += dy;
        }
        self.clamp_pan();
    }

    /// Set pan directly, then clamp.
    pub fn set_pan(&mut self, pan_x: f64, pan_y: f64) {
        if pan_x.is_finite() {
            self.pan_x = pan_x;
        }
        if pan_y.is_finite() {
            self.pan_y = pan_y;
        }
        self.clamp_pan();
    }

    /// Largest zoom that shows the whole scene with `padding` CSS pixels on each side, centered.
    pub fn fit_scene(&mut self, padding: f64) {
        if self.scene_width <= 0.0 || self.scene_height <= 0.0 || self.width <= 0.0 || self.height <= 0.0 {
            return;
        }
        let avail_w = (self.width - padding * 2.0).max(1.0);
        let avail_h = (self.height - padding * 2.0).max(1.0);
        let zoom = (avail_w / self.scene_width).min(avail_h / self.scene_height);
        self.zoom = clamp_zoom(zoom, 1.0);
        self.center_scene();
    }

    /// Zoom 1, scene centered.
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.center_scene();
    }

    fn center_scene(&mut self) {
        self.pan_x = (self.width - self.scene_width * self.zoom) * 0.5;
        self.pan_y = (self.height - self.scene_height * self.zoom) * 0.5;
        self.clamp_pan();
    }

    /// Backing-store scale: device pixels per CSS pixel, bounded by memory caps.
    #[must_use]
    pub fn render_scale(&self) -> f64 {
        let wanted = (self.dpr * self.zoom.max(1.0)).min(MAX_RENDER_SCALE);
        if self.width <= 0.0 || self.height <= 0.0 {
            return wanted;
        }
        let edge_cap = MAX_BACKING_EDGE_PX / self.width.max(self.height);
        let area_cap = (MAX_BACKING_AREA_PX / (self.width * self.height)).sqrt();
        wanted.min(edge_cap).min(area_cap)
    }

    /// Backing-store size in device pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn backing_store_size(&self) -> (u32, u32) {
        let scale = self.render_scale();
        let w = (self.width * scale).round().max(1.0) as u32;
        let h = (self.height * scale).round().max(1.0) as u32;
        (w, h)
    }
}

/// Clamp a requested zoom into range; non-finite requests keep `fallback`.
#[must_use]
pub fn clamp_zoom(zoom: f64, fallback: f64) -> f64 {
    if zoom.is_finite() { zoom.clamp(MIN_ZOOM, MAX_ZOOM) } else { fallback.clamp(MIN_ZOOM, MAX_ZOOM) }
}

fn axis_bounds(content: f64, view: f64) -> (f64, f64) {
    let over = OVERSCROLL_MIN_PX.max(view * OVERSCROLL_RATIO);
    if content <= view {
        let center = (view - content) * 0.5;
        (center - over, center + over)
    } else {
        (view - content - over, over)
    }
}

fn clamp_or(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() { value.clamp(min, max) } else { (min + max) * 0.5 }
}
