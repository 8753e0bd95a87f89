#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn sized(scene_w: f64, scene_h: f64, view_w: f64, view_h: f64) -> Viewport {
    let mut vp = Viewport::new(scene_w, scene_h);
    vp.set_size(view_w, view_h, 1.0);
    vp
}

fn assert_in_bounds(vp: &Viewport) {
    assert!(vp.zoom >= MIN_ZOOM && vp.zoom <= MAX_ZOOM, "zoom {} out of range", vp.zoom);
    let bounds = vp.pan_bounds(vp.zoom);
    assert!(
        bounds.contains(vp.pan_x, vp.pan_y),
        "pan ({}, {}) outside {bounds:?} at zoom {}",
        vp.pan_x,
        vp.pan_y,
        vp.zoom
    );
}

// --- Point ---

#[test]
fn point_rotated_quarter_turn() {
    let p = Point::new(1.0, 0.0).rotated(std::f64::consts::FRAC_PI_2);
    assert!(approx_eq(p.x, 0.0));
    assert!(approx_eq(p.y, 1.0));
}

#[test]
fn point_add_sub_roundtrip() {
    let a = Point::new(3.0, 4.0);
    let b = Point::new(1.5, -2.0);
    assert_eq!(a + b - b, a);
}

// --- Conversions ---

#[test]
fn screen_to_scene_identity_when_unpanned() {
    let mut vp = sized(100.0, 100.0, 100.0, 100.0);
    vp.pan_x = 0.0;
    vp.pan_y = 0.0;
    let p = vp.screen_to_scene(Point::new(40.0, 60.0));
    assert!(approx_eq(p.x, 40.0));
    assert!(approx_eq(p.y, 60.0));
}

#[test]
fn screen_to_scene_inverts_scene_to_screen() {
    let mut vp = sized(1000.0, 800.0, 600.0, 400.0);
    vp.zoom = 2.5;
    vp.pan_x = -120.0;
    vp.pan_y = 35.0;
    let scene = Point::new(321.0, 123.0);
    let back = vp.screen_to_scene(vp.scene_to_screen(scene));
    assert!(approx_eq(back.x, scene.x));
    assert!(approx_eq(back.y, scene.y));
}

#[test]
fn screen_to_scene_zero_viewport_returns_origin() {
    let vp = Viewport::new(500.0, 500.0);
    let p = vp.screen_to_scene(Point::new(42.0, 17.0));
    assert_eq!(p, Point::new(0.0, 0.0));
}

#[test]
fn screen_dist_to_scene_divides_by_zoom() {
    let mut vp = sized(100.0, 100.0, 100.0, 100.0);
    vp.zoom = 4.0;
    assert!(approx_eq(vp.screen_dist_to_scene(8.0), 2.0));
}

// --- Bounds ---

#[test]
fn small_content_bounds_center_with_overscroll() {
    let vp = sized(200.0, 100.0, 1000.0, 500.0);
    let b = vp.pan_bounds(1.0);
    // center x = (1000 - 200) / 2 = 400; overscroll = max(96, 180) = 180
    assert!(approx_eq(b.min_x, 220.0));
    assert!(approx_eq(b.max_x, 580.0));
    // center y = 200; overscroll = max(96, 90) = 96
    assert!(approx_eq(b.min_y, 104.0));
    assert!(approx_eq(b.max_y, 296.0));
}

#[test]
fn large_content_bounds_edge_to_edge_plus_overscroll() {
    let vp = sized(1000.0, 1000.0, 500.0, 500.0);
    let b = vp.pan_bounds(2.0);
    // content 2000 > view 500; overscroll = max(96, 90) = 96
    assert!(approx_eq(b.min_x, 500.0 - 2000.0 - 96.0));
    assert!(approx_eq(b.max_x, 96.0));
}

#[test]
fn set_size_clamps_existing_pan() {
    let mut vp = Viewport::new(100.0, 100.0);
    vp.pan_x = 10_000.0;
    vp.pan_y = -10_000.0;
    vp.set_size(400.0, 300.0, 2.0);
    assert_in_bounds(&vp);
}

#[test]
fn pan_by_is_clamped() {
    let mut vp = sized(500.0, 500.0, 400.0, 400.0);
    vp.pan_by(1e6, -1e6);
    assert_in_bounds(&vp);
    let b = vp.pan_bounds(vp.zoom);
    assert!(approx_eq(vp.pan_x, b.max_x));
    assert!(approx_eq(vp.pan_y, b.min_y));
}

#[test]
fn pan_by_ignores_non_finite_delta() {
    let mut vp = sized(500.0, 500.0, 400.0, 400.0);
    let before = (vp.pan_x, vp.pan_y);
    vp.pan_by(f64::NAN, f64::INFINITY);
    assert_eq!((vp.pan_x, vp.pan_y), before);
}

// --- Zoom ---

#[test]
fn zoom_is_clamped_to_range() {
    let mut vp = sized(500.0, 500.0, 400.0, 400.0);
    vp.set_zoom(100.0);
    assert_eq!(vp.zoom, MAX_ZOOM);
    vp.set_zoom(0.0001);
    assert_eq!(vp.zoom, MIN_ZOOM);
}

#[test]
fn zoom_nan_keeps_current() {
    let mut vp = sized(500.0, 500.0, 400.0, 400.0);
    vp.set_zoom(2.0);
    vp.set_zoom(f64::NAN);
    assert_eq!(vp.zoom, 2.0);
}

#[test]
fn zoom_at_preserves_point_under_anchor() {
    let mut vp = sized(2000.0, 2000.0, 800.0, 600.0);
    vp.set_zoom(1.0);
    vp.set_pan(-300.0, -200.0);
    let anchor = Point::new(250.0, 180.0);
    let before = vp.screen_to_scene(anchor);
    vp.zoom_at(1.5, anchor);
    let after = vp.screen_to_scene(anchor);
    assert!(approx_eq(before.x, after.x));
    assert!(approx_eq(before.y, after.y));
    assert_eq!(vp.zoom, 1.5);
}

#[test]
fn arbitrary_pan_zoom_sequence_stays_in_bounds() {
    let mut vp = sized(1200.0, 900.0, 700.0, 500.0);
    let steps: [(f64, f64, f64, f64, f64); 8] = [
        (3.0, 10.0, 10.0, 500.0, -400.0),
        (0.05, 700.0, 0.0, -9000.0, 30.0),
        (8.5, 350.0, 250.0, 1.0, 1.0),
        (1.2, 0.0, 500.0, 250.0, 250.0),
        (0.4, 690.0, 490.0, -2.0, 4000.0),
        (6.0, -50.0, 900.0, 0.0, 0.0),
        (1.0, 350.0, 250.0, -300.0, -300.0),
        (2.2, 100.0, 100.0, 77.0, -33.0),
    ];
    for (zoom, ax, ay, dx, dy) in steps {
        vp.zoom_at(zoom, Point::new(ax, ay));
        assert_in_bounds(&vp);
        vp.pan_by(dx, dy);
        assert_in_bounds(&vp);
    }
}

#[test]
fn fit_scene_shows_whole_scene_centered() {
    let mut vp = sized(1000.0, 500.0, 520.0, 520.0);
    vp.fit_scene(10.0);
    assert!(approx_eq(vp.zoom, 0.5));
    assert!(approx_eq(vp.pan_x, 10.0));
    assert!(approx_eq(vp.pan_y, (520.0 - 250.0) / 2.0));
    assert_in_bounds(&vp);
}

#[test]
fn reset_centers_at_unit_zoom() {
    let mut vp = sized(400.0, 300.0, 800.0, 600.0);
    vp.set_zoom(3.0);
    vp.reset();
    assert_eq!(vp.zoom, 1.0);
    assert!(approx_eq(vp.pan_x, 200.0));
    assert!(approx_eq(vp.pan_y, 150.0));
}

// --- Backing store ---

#[test]
fn render_scale_uses_dpr_at_unit_zoom() {
    let mut vp = Viewport::new(500.0, 500.0);
    vp.set_size(800.0, 600.0, 2.0);
    assert!(approx_eq(vp.render_scale(), 2.0));
    assert_eq!(vp.backing_store_size(), (1600, 1200));
}

#[test]
fn render_scale_grows_with_zoom_up_to_four() {
    let mut vp = Viewport::new(5000.0, 5000.0);
    vp.set_size(400.0, 300.0, 1.0);
    vp.zoom = 3.0;
    assert!(approx_eq(vp.render_scale(), 3.0));
    vp.zoom = 8.0;
    assert!(approx_eq(vp.render_scale(), MAX_RENDER_SCALE));
}

#[test]
fn render_scale_respects_edge_cap() {
    let mut vp = Viewport::new(5000.0, 5000.0);
    vp.set_size(4096.0, 100.0, 3.0);
    assert!(approx_eq(vp.render_scale(), 2.0));
}

#[test]
fn render_scale_respects_area_cap() {
    let mut vp = Viewport::new(5000.0, 5000.0);
    vp.set_size(2048.0, 2048.0, 4.0);
    // sqrt(16_777_216 / 2048^2) = 2
    assert!(approx_eq(vp.render_scale(), 2.0));
}

#[test]
fn render_scale_zoom_below_one_does_not_shrink() {
    let mut vp = Viewport::new(500.0, 500.0);
    vp.set_size(300.0, 300.0, 1.5);
    vp.zoom = 0.2;
    assert!(approx_eq(vp.render_scale(), 1.5));
}

#[test]
fn set_size_rejects_bad_dpr() {
    let mut vp = Viewport::new(500.0, 500.0);
    vp.set_size(300.0, 300.0, 0.0);
    assert_eq!(vp.dpr, 1.0);
    vp.set_size(300.0, 300.0, f64::NAN);
    assert_eq!(vp.dpr, 1.0);
}
