#![allow(clippy::float_cmp)]

use super::*;
use crate::entity::TextProps;

const EPSILON: f64 = 1e-6;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn assert_point_eq(a: Point, b: Point) {
    assert!(approx_eq(a.x, b.x) && approx_eq(a.y, b.y), "{a:?} != {b:?}");
}

/// Scene-space position of `anchor` on the entity as it is now.
fn handle_point(entity: &Entity, anchor: ResizeAnchor) -> Point {
    entity.center() + local_handle_position(entity, anchor).rotated(entity.angle_rad())
}

// =============================================================
// Drag and rotate
// =============================================================

#[test]
fn drag_moves_by_pointer_travel() {
    let p = drag_position(Point::new(100.0, 100.0), Point::new(10.0, 10.0), Point::new(25.0, 3.0));
    assert_eq!(p, Point::new(115.0, 93.0));
}

#[test]
fn rotation_follows_pointer_angle() {
    let c = Point::new(0.0, 0.0);
    let a = rotation_angle(0.0, c, Point::new(10.0, 0.0), Point::new(0.0, 10.0), None);
    assert!(approx_eq(a, 90.0));
    let b = rotation_angle(0.0, c, Point::new(10.0, 0.0), Point::new(0.0, -10.0), None);
    assert!(approx_eq(b, 270.0));
}

#[test]
fn rotation_adds_to_original_angle_and_wraps() {
    let c = Point::new(50.0, 50.0);
    let a = rotation_angle(350.0, c, Point::new(60.0, 50.0), Point::new(50.0, 60.0), None);
    assert!(approx_eq(a, 80.0));
}

#[test]
fn rotation_snaps_to_step() {
    let c = Point::new(0.0, 0.0);
    let pointer = Point::new(50f64.to_radians().cos(), 50f64.to_radians().sin());
    let a = rotation_angle(0.0, c, Point::new(1.0, 0.0), pointer, Some(15.0));
    assert!(approx_eq(a, 45.0));
}

#[test]
fn zero_snap_is_ignored() {
    let c = Point::new(0.0, 0.0);
    let pointer = Point::new(50f64.to_radians().cos(), 50f64.to_radians().sin());
    let a = rotation_angle(0.0, c, Point::new(1.0, 0.0), pointer, Some(0.0));
    assert!(approx_eq(a, 50.0));
}

// =============================================================
// Resize
// =============================================================

#[test]
fn bottom_right_drag_keeps_top_left_fixed() {
    let mut rect = Entity::rect(150.0, 150.0, 100.0, 100.0);
    let gesture = begin_resize(&rect, ResizeAnchor::Se);
    assert_point_eq(gesture.anchor, Point::new(100.0, 100.0));

    apply_resize(&mut rect, &gesture, Point::new(250.0, 260.0));
    let (w, h) = rect.scaled_size();
    assert!(approx_eq(w, 150.0));
    assert!(approx_eq(h, 160.0));
    assert!(approx_eq(rect.left - w / 2.0, 100.0));
    assert!(approx_eq(rect.top - h / 2.0, 100.0));
    assert!(approx_eq(rect.scale_x, 1.5));
    assert_eq!(rect.width, 100.0);
}

#[test]
fn rotated_quarter_turn_middle_right_changes_height() {
    let mut rect = Entity::rect(200.0, 200.0, 100.0, 40.0);
    rect.angle = 90.0;
    // The local north handle sits at screen middle-right after a clockwise quarter turn.
    assert_point_eq(handle_point(&rect, ResizeAnchor::N), Point::new(220.0, 200.0));

    let gesture = begin_resize(&rect, ResizeAnchor::N);
    apply_resize(&mut rect, &gesture, Point::new(240.0, 200.0));
    let (w, h) = rect.scaled_size();
    assert!(approx_eq(w, 100.0));
    assert!(approx_eq(h, 60.0));
    assert_point_eq(handle_point(&rect, ResizeAnchor::S), Point::new(180.0, 200.0));
}

#[test]
fn anchor_stays_fixed_for_every_handle_and_angle() {
    for angle in [0.0, 45.0, 90.0, 180.0] {
        for handle in ResizeAnchor::ALL {
            let mut rect = Entity::rect(300.0, 250.0, 120.0, 80.0);
            rect.angle = angle;
            let gesture = begin_resize(&rect, handle);
            let fixed = handle_point(&rect, handle.opposite());

            // Drag the handle outward along its own direction plus some off-axis noise.
            let (ux, uy) = handle.unit();
            let outward = Point::new(ux * 35.0 + 7.0, uy * 22.0 - 4.0).rotated(rect.angle_rad());
            let pointer = handle_point(&rect, handle) + outward;
            apply_resize(&mut rect, &gesture, pointer);

            assert_point_eq(handle_point(&rect, handle.opposite()), fixed);
        }
    }
}

#[test]
fn edge_handle_changes_only_its_axis() {
    let mut rect = Entity::rect(100.0, 100.0, 60.0, 40.0);
    let gesture = begin_resize(&rect, ResizeAnchor::E);
    apply_resize(&mut rect, &gesture, Point::new(160.0, 400.0));
    let (w, h) = rect.scaled_size();
    assert!(approx_eq(w, 90.0));
    assert!(approx_eq(h, 40.0));
    assert!(approx_eq(rect.top, 100.0));
}

#[test]
fn shape_resize_is_clamped_to_minimum() {
    let mut rect = Entity::rect(100.0, 100.0, 60.0, 40.0);
    let gesture = begin_resize(&rect, ResizeAnchor::Se);
    apply_resize(&mut rect, &gesture, Point::new(0.0, 0.0));
    let (w, h) = rect.scaled_size();
    assert!(approx_eq(w, MIN_SHAPE_SIZE));
    assert!(approx_eq(h, MIN_SHAPE_SIZE));
    // Top-left corner stays at (70, 80).
    assert!(approx_eq(rect.left, 72.5));
    assert!(approx_eq(rect.top, 82.5));
}

#[test]
fn text_resize_commits_size_with_unit_scale() {
    let mut text = Entity::text(TextProps::new("hello", "Impact"), 200.0, 200.0, 200.0, 80.0);
    let gesture = begin_resize(&text, ResizeAnchor::Se);
    assert!(gesture.commits_size);
    apply_resize(&mut text, &gesture, Point::new(350.0, 260.0));
    assert!(approx_eq(text.width, 250.0));
    assert!(approx_eq(text.height, 100.0));
    assert_eq!(text.scale_x, 1.0);
    assert_eq!(text.scale_y, 1.0);
}

#[test]
fn text_resize_has_larger_minimum() {
    let mut text = Entity::text(TextProps::new("hello", "Impact"), 200.0, 200.0, 200.0, 80.0);
    let gesture = begin_resize(&text, ResizeAnchor::Nw);
    apply_resize(&mut text, &gesture, Point::new(1000.0, 1000.0));
    assert!(approx_eq(text.width, MIN_TEXT_WIDTH));
    assert!(approx_eq(text.height, MIN_TEXT_HEIGHT));
}

#[test]
fn circle_resize_scales_axes_independently() {
    let mut circle = Entity::circle(100.0, 100.0, 20.0);
    let gesture = begin_resize(&circle, ResizeAnchor::S);
    apply_resize(&mut circle, &gesture, Point::new(100.0, 180.0));
    assert!(approx_eq(circle.scale_y, 2.5));
    assert_eq!(circle.scale_x, 1.0);
}

#[test]
fn zero_width_base_takes_target_size() {
    let mut image = Entity::image("x.png", 50.0, 50.0, 0.0, 20.0);
    let gesture = begin_resize(&image, ResizeAnchor::E);
    apply_resize(&mut image, &gesture, Point::new(80.0, 50.0));
    assert!(approx_eq(image.width, 30.0));
    assert_eq!(image.scale_x, 1.0);
}

#[test]
fn non_finite_pointer_is_ignored() {
    let mut rect = Entity::rect(100.0, 100.0, 60.0, 40.0);
    let before = rect.clone();
    let gesture = begin_resize(&rect, ResizeAnchor::Se);
    apply_resize(&mut rect, &gesture, Point::new(f64::NAN, 3.0));
    assert_eq!(rect, before);
}

// =============================================================
// Boundary clamp
// =============================================================

#[test]
fn clamp_pulls_entity_back_inside() {
    let mut rect = Entity::rect(-10.0, 95.0, 40.0, 40.0);
    assert!(clamp_to_scene(&mut rect, 100.0, 100.0));
    assert!(approx_eq(rect.left, 20.0));
    assert!(approx_eq(rect.top, 80.0));
}

#[test]
fn clamp_uses_rotated_bounds() {
    let mut rect = Entity::rect(60.0, 250.0, 100.0, 100.0);
    rect.angle = 45.0;
    assert!(clamp_to_scene(&mut rect, 500.0, 500.0));
    assert!(approx_eq(rect.left, 50.0 * std::f64::consts::SQRT_2));
}

#[test]
fn clamp_centers_oversized_entity() {
    let mut rect = Entity::rect(30.0, 50.0, 200.0, 20.0);
    assert!(clamp_to_scene(&mut rect, 100.0, 100.0));
    assert!(approx_eq(rect.left, 50.0));
    assert!(approx_eq(rect.top, 50.0));
}

#[test]
fn clamp_inside_is_noop() {
    let mut rect = Entity::rect(50.0, 50.0, 20.0, 20.0);
    assert!(!clamp_to_scene(&mut rect, 100.0, 100.0));
}
