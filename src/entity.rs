//! Drawable entities: the shared attribute set, the four variants, and sparse patches.
//!
//! Positions are the geometric **center** of the entity. Every geometric
//! computation (paint, hit-test, resize anchor) starts from the center, works
//! in the unrotated local frame, and rotates back by `angle` degrees.
//!
//! The persisted JSON shape is one flat object per entity with a `type`
//! discriminant (`rect`, `circle`, `text`, `image`) and camelCase keys.

#[cfg(test)]
#[path = "entity_test.rs"]
mod entity_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::BACKGROUND_ROLE;
use crate::viewport::{Point, Rect};

/// Unique identifier for an entity.
pub type EntityId = Uuid;

/// Horizontal alignment of text lines inside the text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical placement of the laid-out block inside the text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Load state of an image entity's bitmap. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitmapState {
    /// Not yet decoded; the entity is skipped when painting.
    #[default]
    Pending,
    /// Decoded, with the bitmap's natural size.
    Ready { width: u32, height: u32 },
}

/// Typography for a text entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_weight")]
    pub font_weight: String,
    #[serde(default = "default_font_style")]
    pub font_style: String,
    #[serde(default)]
    pub text_align: TextAlign,
    #[serde(default)]
    pub vertical_align: VerticalAlign,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
}

impl TextProps {
    #[must_use]
    pub fn new(text: impl Into<String>, font_family: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: default_font_size(),
            font_family: font_family.into(),
            font_weight: default_font_weight(),
            font_style: default_font_style(),
            text_align: TextAlign::default(),
            vertical_align: VerticalAlign::default(),
            line_height: default_line_height(),
        }
    }
}

/// Variant-specific data, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityKind {
    /// Rectangle with optional rounded corners.
    Rect {
        #[serde(default)]
        rx: f64,
        #[serde(default)]
        ry: f64,
    },
    /// Ellipse; `width == height == 2 * radius` before scaling.
    Circle { radius: f64 },
    /// Autofit multi-line text box.
    Text(TextProps),
    /// Bitmap drawn to fill the entity box.
    Image {
        src: String,
        #[serde(skip)]
        bitmap: BitmapState,
    },
}

/// A drawable entity as stored in the scene and in documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default = "Uuid::new_v4")]
    pub id: EntityId,
    #[serde(flatten)]
    pub kind: EntityKind,
    /// Free-form role tag; `"background"` is reserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Center x in scene coordinates.
    pub left: f64,
    /// Center y in scene coordinates.
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    /// Clockwise rotation in degrees about the center.
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_fill")]
    pub fill: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    /// Pixel stroke width for shapes; outline intensity (0–10) for text.
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "yes")]
    pub selectable: bool,
    #[serde(default = "yes")]
    pub evented: bool,
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

fn default_fill() -> String {
    "#000000".to_string()
}

fn default_font_size() -> f64 {
    40.0
}

fn default_font_family() -> String {
    crate::config::DEFAULT_FONT_FAMILY.to_string()
}

fn default_font_weight() -> String {
    "bold".to_string()
}

fn default_font_style() -> String {
    "normal".to_string()
}

fn default_line_height() -> f64 {
    1.16
}

impl Entity {
    /// A new entity of `kind` centered at `(left, top)` with the given local size.
    #[must_use]
    pub fn new(kind: EntityKind, left: f64, top: f64, width: f64, height: f64) -> Self {
        let mut entity = Self {
            id: Uuid::new_v4(),
            kind,
            role: None,
            left,
            top,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            fill: default_fill(),
            stroke: None,
            stroke_width: 0.0,
            opacity: 1.0,
            visible: true,
            selectable: true,
            evented: true,
        };
        entity.normalize();
        entity
    }

    #[must_use]
    pub fn rect(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(EntityKind::Rect { rx: 0.0, ry: 0.0 }, left, top, width, height)
    }

    #[must_use]
    pub fn circle(left: f64, top: f64, radius: f64) -> Self {
        Self::new(EntityKind::Circle { radius }, left, top, radius * 2.0, radius * 2.0)
    }

    #[must_use]
    pub fn text(props: TextProps, left: f64, top: f64, width: f64, height: f64) -> Self {
        let mut entity = Self::new(EntityKind::Text(props), left, top, width, height);
        entity.fill = "#FFFFFF".to_string();
        entity.stroke = Some("#000000".to_string());
        entity.stroke_width = 2.0;
        entity
    }

    #[must_use]
    pub fn image(src: impl Into<String>, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(EntityKind::Image { src: src.into(), bitmap: BitmapState::Pending }, left, top, width, height)
    }

    /// Re-derive fields that depend on variant data. Idempotent.
    pub fn normalize(&mut self) {
        if let EntityKind::Circle { radius } = self.kind {
            let radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
            self.kind = EntityKind::Circle { radius };
            self.width = radius * 2.0;
            self.height = radius * 2.0;
        }
        if self.is_background() {
            self.selectable = false;
            self.evented = false;
        }
    }

    /// Clone with a fresh id.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self { id: Uuid::new_v4(), ..self.clone() }
    }

    #[must_use]
    pub fn is_background(&self) -> bool {
        self.role.as_deref() == Some(BACKGROUND_ROLE)
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, EntityKind::Text(_))
    }

    /// Wire discriminant for this variant.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EntityKind::Rect { .. } => "rect",
            EntityKind::Circle { .. } => "circle",
            EntityKind::Text(_) => "text",
            EntityKind::Image { .. } => "image",
        }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Width and height after applying scale.
    #[must_use]
    pub fn scaled_size(&self) -> (f64, f64) {
        (self.width * self.scale_x, self.height * self.scale_y)
    }

    #[must_use]
    pub fn angle_rad(&self) -> f64 {
        self.angle.to_radians()
    }

    /// False when any transform component is NaN or infinite.
    #[must_use]
    pub fn is_paintable(&self) -> bool {
        [self.left, self.top, self.scale_x, self.scale_y, self.angle].iter().all(|v| v.is_finite())
    }

    /// Image entities wait for their bitmap before they can be drawn.
    #[must_use]
    pub fn is_pending_image(&self) -> bool {
        matches!(self.kind, EntityKind::Image { bitmap: BitmapState::Pending, .. })
    }

    #[must_use]
    pub fn image_src(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Image { src, .. } => Some(src),
            _ => None,
        }
    }

    /// Does the scene point `(x, y)` fall on this entity?
    ///
    /// Box variants test the scaled box around the center and ignore `angle`.
    /// Circles test the scaled radius.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let dx = x - self.left;
        let dy = y - self.top;
        match self.kind {
            EntityKind::Circle { radius } => {
                let r = radius * self.scale_x.max(self.scale_y);
                dx * dx + dy * dy <= r * r
            }
            EntityKind::Rect { .. } | EntityKind::Text(_) | EntityKind::Image { .. } => {
                let (w, h) = self.scaled_size();
                dx.abs() <= w.abs() / 2.0 && dy.abs() <= h.abs() / 2.0
            }
        }
    }

    /// Scene-space corners of the rotated, scaled box: nw, ne, se, sw.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let (w, h) = self.scaled_size();
        let (hw, hh) = (w / 2.0, h / 2.0);
        let rad = self.angle_rad();
        let c = self.center();
        [Point::new(-hw, -hh), Point::new(hw, -hh), Point::new(hw, hh), Point::new(-hw, hh)]
            .map(|p| c + p.rotated(rad))
    }

    /// Axis-aligned bounding box of the rotated, scaled entity.
    #[must_use]
    pub fn aabb(&self) -> Rect {
        let corners = self.corners();
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Apply a sparse update. Returns `true` if any field changed.
    pub fn apply_patch(&mut self, patch: &EntityPatch) -> bool {
        let before = self.clone();
        if let Some(ref fill) = patch.fill {
            self.fill.clone_from(fill);
        }
        if let Some(ref stroke) = patch.stroke {
            self.stroke = if stroke.is_empty() { None } else { Some(stroke.clone()) };
        }
        if let Some(w) = patch.stroke_width.filter(|v| v.is_finite()) {
            self.stroke_width = w.max(0.0);
        }
        if let Some(o) = patch.opacity.filter(|v| v.is_finite()) {
            self.opacity = o.clamp(0.0, 1.0);
        }
        if let Some(v) = patch.visible {
            self.visible = v;
        }
        match &mut self.kind {
            EntityKind::Rect { rx, ry } => {
                if let Some(v) = patch.rx.filter(|v| v.is_finite()) {
                    *rx = v.max(0.0);
                }
                if let Some(v) = patch.ry.filter(|v| v.is_finite()) {
                    *ry = v.max(0.0);
                }
            }
            EntityKind::Text(props) => apply_text_patch(props, patch),
            EntityKind::Circle { .. } | EntityKind::Image { .. } => {}
        }
        *self != before
    }
}

fn apply_text_patch(props: &mut TextProps, patch: &EntityPatch) {
    if let Some(ref text) = patch.text {
        props.text.clone_from(text);
    }
    if let Some(size) = patch.font_size.filter(|v| v.is_finite() && *v > 0.0) {
        props.font_size = size;
    }
    if let Some(ref family) = patch.font_family {
        props.font_family.clone_from(family);
    }
    if let Some(ref weight) = patch.font_weight {
        props.font_weight.clone_from(weight);
    }
    if let Some(ref style) = patch.font_style {
        props.font_style.clone_from(style);
    }
    if let Some(align) = patch.text_align {
        props.text_align = align;
    }
    if let Some(align) = patch.vertical_align {
        props.vertical_align = align;
    }
    if let Some(lh) = patch.line_height.filter(|v| v.is_finite() && *v > 0.0) {
        props.line_height = lh;
    }
}

/// Sparse update for an entity. Only present fields are applied; fields that
/// do not belong to the entity's variant are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    /// Empty string removes the stroke.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<VerticalAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ry: Option<f64>,
}
