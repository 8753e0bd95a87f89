//! Hit-testing: selection handles first, then entity bodies top to bottom.
//!
//! Handle tests work in the selected entity's rotated local frame so the
//! handles track the entity visually at any angle. Body tests delegate to
//! [`Entity::contains_point`].

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::entity::{Entity, EntityId};
use crate::scene::Scene;
use crate::viewport::Point;

/// Which part of an entity was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    ResizeHandle(ResizeAnchor),
    RotateHandle,
}

/// Resize handle position on the entity box, named by compass direction in
/// the entity's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAnchor {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeAnchor {
    pub const ALL: [Self; 8] = [Self::N, Self::Ne, Self::E, Self::Se, Self::S, Self::Sw, Self::W, Self::Nw];

    /// Local direction from the center: each component is -1, 0 or 1.
    #[must_use]
    pub fn unit(self) -> (f64, f64) {
        match self {
            Self::N => (0.0, -1.0),
            Self::Ne => (1.0, -1.0),
            Self::E => (1.0, 0.0),
            Self::Se => (1.0, 1.0),
            Self::S => (0.0, 1.0),
            Self::Sw => (-1.0, 1.0),
            Self::W => (-1.0, 0.0),
            Self::Nw => (-1.0, -1.0),
        }
    }

    /// The handle on the other side of the center.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::N => Self::S,
            Self::Ne => Self::Sw,
            Self::E => Self::W,
            Self::Se => Self::Nw,
            Self::S => Self::N,
            Self::Sw => Self::Ne,
            Self::W => Self::E,
            Self::Nw => Self::Se,
        }
    }
}

/// Result of a hit test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub entity_id: EntityId,
    pub part: HitPart,
}

/// Screen-space sizes of the selection handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleMetrics {
    pub radius_px: f64,
    pub rotate_offset_px: f64,
}

fn half_extents(entity: &Entity) -> (f64, f64) {
    let (w, h) = entity.scaled_size();
    (w.abs() / 2.0, h.abs() / 2.0)
}

/// Local-frame position of a resize handle (center at origin, unrotated).
#[must_use]
pub fn local_handle_position(entity: &Entity, anchor: ResizeAnchor) -> Point {
    let (hw, hh) = half_extents(entity);
    let (ux, uy) = anchor.unit();
    Point::new(ux * hw, uy * hh)
}

/// Scene-space positions of the eight resize handles, in [`ResizeAnchor::ALL`] order.
#[must_use]
pub fn resize_handle_positions(entity: &Entity) -> [Point; 8] {
    let c = entity.center();
    let rad = entity.angle_rad();
    ResizeAnchor::ALL.map(|anchor| c + local_handle_position(entity, anchor).rotated(rad))
}

/// Scene-space position of the rotate handle, a fixed screen distance above
/// the top edge along the entity's local up axis.
#[must_use]
pub fn rotate_handle_position(entity: &Entity, zoom: f64, offset_px: f64) -> Point {
    let (_, hh) = half_extents(entity);
    let local = Point::new(0.0, -hh - offset_px / zoom);
    entity.center() + local.rotated(entity.angle_rad())
}

/// Test the selection handles of `entity` at scene point `pt`.
///
/// The nearest resize handle within the hit radius wins; the rotate handle
/// is tested only when no resize handle matches.
#[must_use]
pub fn hit_handle(entity: &Entity, pt: Point, zoom: f64, metrics: HandleMetrics) -> Option<HitPart> {
    if !entity.is_paintable() || !zoom.is_finite() || zoom <= 0.0 {
        return None;
    }
    let radius = metrics.radius_px / zoom;
    let local = (pt - entity.center()).rotated(-entity.angle_rad());
    let dist = |p: Point| (local.x - p.x).hypot(local.y - p.y);

    let nearest = ResizeAnchor::ALL
        .into_iter()
        .map(|anchor| (anchor, dist(local_handle_position(entity, anchor))))
        .filter(|(_, d)| *d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((anchor, _)) = nearest {
        return Some(HitPart::ResizeHandle(anchor));
    }

    let (_, hh) = half_extents(entity);
    let rotate = Point::new(0.0, -hh - metrics.rotate_offset_px / zoom);
    (dist(rotate) <= radius).then_some(HitPart::RotateHandle)
}

/// Resolve what is under scene point `pt`: the selected entity's handles,
/// then the topmost visible, evented entity containing the point. Images
/// still waiting for a bitmap are not drawn, so they are not hit either.
#[must_use]
pub fn hit_test(pt: Point, scene: &Scene, zoom: f64, metrics: HandleMetrics) -> Option<Hit> {
    if let Some(selected) = scene.selected_entity() {
        if let Some(part) = hit_handle(selected, pt, zoom, metrics) {
            return Some(Hit { entity_id: selected.id, part });
        }
    }
    scene
        .iter()
        .rev()
        .find(|e| e.visible && e.evented && e.is_paintable() && !e.is_pending_image() && e.contains_point(pt.x, pt.y))
        .map(|e| Hit { entity_id: e.id, part: HitPart::Body })
}

/// CSS cursor for hovering `part` on an entity rotated by `angle_deg`.
#[must_use]
pub fn cursor_for(part: HitPart, angle_deg: f64) -> &'static str {
    match part {
        HitPart::Body => "move",
        HitPart::RotateHandle => "grab",
        HitPart::ResizeHandle(anchor) => {
            let (ux, uy) = anchor.unit();
            let dir = (uy.atan2(ux).to_degrees() + angle_deg).rem_euclid(180.0);
            match dir {
                d if (22.5..67.5).contains(&d) => "nwse-resize",
                d if (67.5..112.5).contains(&d) => "ns-resize",
                d if (112.5..157.5).contains(&d) => "nesw-resize",
                _ => "ew-resize",
            }
        }
    }
}
