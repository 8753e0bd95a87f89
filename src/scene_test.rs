use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::consts::BACKGROUND_ROLE;
use crate::entity::{Entity, TextProps};
use crate::events::EventKind;

fn background_rect(width: f64, height: f64) -> Entity {
    let mut bg = Entity::rect(width / 2.0, height / 2.0, width, height);
    bg.role = Some(BACKGROUND_ROLE.to_string());
    bg.fill = "#ffffff".into();
    bg
}

fn record_kinds(scene: &mut Scene) -> Rc<RefCell<Vec<EventKind>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    scene.subscribe(EventFilter::All, move |event: &SceneEvent| sink.borrow_mut().push(event.kind()));
    seen
}

// =============================================================
// Add / remove
// =============================================================

#[test]
fn add_appends_in_paint_order() {
    let mut scene = Scene::new(500.0, 500.0);
    let a = scene.add(Entity::rect(10.0, 10.0, 5.0, 5.0));
    let b = scene.add(Entity::circle(20.0, 20.0, 5.0));
    assert_eq!(scene.ids(), &[a, b]);
    assert_eq!(scene.len(), 2);
}

#[test]
fn background_goes_to_index_zero() {
    let mut scene = Scene::new(500.0, 500.0);
    let a = scene.add(Entity::rect(10.0, 10.0, 5.0, 5.0));
    let bg = scene.add(background_rect(500.0, 500.0));
    assert_eq!(scene.ids(), &[bg, a]);
    let stored = scene.background().unwrap();
    assert!(!stored.selectable);
    assert!(!stored.evented);
}

#[test]
fn second_background_replaces_first() {
    let mut scene = Scene::new(500.0, 500.0);
    let first = scene.add(background_rect(500.0, 500.0));
    let shape = scene.add(Entity::rect(10.0, 10.0, 5.0, 5.0));
    let second = scene.add(background_rect(500.0, 500.0));
    assert!(!scene.contains(&first));
    assert_eq!(scene.ids(), &[second, shape]);
}

#[test]
fn readding_same_id_replaces_in_place() {
    let mut scene = Scene::new(500.0, 500.0);
    let mut rect = Entity::rect(10.0, 10.0, 5.0, 5.0);
    let id = scene.add(rect.clone());
    scene.add(Entity::rect(1.0, 1.0, 1.0, 1.0));
    rect.fill = "#123456".into();
    scene.add(rect);
    assert_eq!(scene.index_of(&id), Some(0));
    assert_eq!(scene.get(&id).unwrap().fill, "#123456");
    assert_eq!(scene.len(), 2);
}

#[test]
fn readding_id_as_background_moves_it_to_floor() {
    let mut scene = Scene::new(500.0, 500.0);
    let old_bg = scene.add(background_rect(500.0, 500.0));
    let below = scene.add(Entity::rect(10.0, 10.0, 5.0, 5.0));
    let mut promoted = Entity::rect(20.0, 20.0, 5.0, 5.0);
    let id = scene.add(promoted.clone());
    scene.select(id);

    promoted.role = Some(BACKGROUND_ROLE.to_string());
    scene.add(promoted);
    assert!(!scene.contains(&old_bg));
    assert_eq!(scene.ids(), &[id, below]);
    assert_eq!(scene.background().map(|bg| bg.id), Some(id));
    assert_eq!(scene.selected(), None);
}

#[test]
fn readding_background_id_as_shape_leaves_floor() {
    let mut scene = Scene::new(500.0, 500.0);
    let mut bg = background_rect(500.0, 500.0);
    let id = scene.add(bg.clone());
    let shape = scene.add(Entity::rect(10.0, 10.0, 5.0, 5.0));

    bg.role = None;
    scene.add(bg);
    assert_eq!(scene.ids(), &[shape, id]);
    assert!(scene.background().is_none());
}

#[test]
fn removing_selected_entity_clears_selection() {
    let mut scene = Scene::new(500.0, 500.0);
    let id = scene.add(Entity::rect(10.0, 10.0, 5.0, 5.0));
    assert!(scene.select(id));
    let kinds = record_kinds(&mut scene);
    assert!(scene.remove(&id).is_some());
    assert_eq!(scene.selected(), None);
    assert_eq!(*kinds.borrow(), vec![EventKind::SelectionCleared, EventKind::ObjectRemoved]);
}

#[test]
fn clear_removes_everything() {
    let mut scene = Scene::new(500.0, 500.0);
    scene.add(background_rect(500.0, 500.0));
    scene.add(Entity::rect(10.0, 10.0, 5.0, 5.0));
    scene.clear();
    assert!(scene.is_empty());
    assert!(scene.background().is_none());
}

// =============================================================
// Selection
// =============================================================

#[test]
fn selection_events_created_updated_cleared() {
    let mut scene = Scene::new(500.0, 500.0);
    let a = scene.add(Entity::rect(10.0, 10.0, 5.0, 5.0));
    let b = scene.add(Entity::rect(30.0, 30.0, 5.0, 5.0));
    let kinds = record_kinds(&mut scene);
    scene.select(a);
    scene.select(a);
    scene.select(b);
    scene.clear_selection();
    scene.clear_selection();
    assert_eq!(
        *kinds.borrow(),
        vec![EventKind::SelectionCreated, EventKind::SelectionUpdated, EventKind::SelectionCleared]
    );
}

#[test]
fn background_cannot_be_selected() {
    let mut scene = Scene::new(500.0, 500.0);
    let bg = scene.add(background_rect(500.0, 500.0));
    assert!(!scene.select(bg));
    assert_eq!(scene.selected(), None);
}

// =============================================================
// Z-order
// =============================================================

#[test]
fn z_order_operations_respect_background_floor() {
    let mut scene = Scene::new(500.0, 500.0);
    let bg = scene.add(background_rect(500.0, 500.0));
    let a = scene.add(Entity::rect(1.0, 1.0, 5.0, 5.0));
    let b = scene.add(Entity::rect(2.0, 2.0, 5.0, 5.0));
    let c = scene.add(Entity::rect(3.0, 3.0, 5.0, 5.0));

    assert!(scene.send_to_back(&c));
    assert_eq!(scene.ids(), &[bg, c, a, b]);
    assert!(!scene.send_backward(&c));
    assert!(scene.bring_forward(&c));
    assert_eq!(scene.ids(), &[bg, a, c, b]);
    assert!(scene.bring_to_front(&a));
    assert_eq!(scene.ids(), &[bg, c, b, a]);
    assert!(!scene.bring_forward(&a));
    assert!(!scene.bring_to_front(&bg));
    assert!(!scene.send_to_back(&bg));
}

#[test]
fn z_order_without_background_reaches_index_zero() {
    let mut scene = Scene::new(500.0, 500.0);
    let a = scene.add(Entity::rect(1.0, 1.0, 5.0, 5.0));
    let b = scene.add(Entity::rect(2.0, 2.0, 5.0, 5.0));
    assert!(scene.send_backward(&b));
    assert_eq!(scene.ids(), &[b, a]);
}

// =============================================================
// Dirty flag and bitmaps
// =============================================================

#[test]
fn take_dirty_clears_flag() {
    let mut scene = Scene::new(500.0, 500.0);
    assert!(scene.take_dirty());
    assert!(!scene.take_dirty());
    scene.add(Entity::rect(1.0, 1.0, 5.0, 5.0));
    assert!(scene.take_dirty());
}

#[test]
fn get_mut_marks_dirty() {
    let mut scene = Scene::new(500.0, 500.0);
    let id = scene.add(Entity::rect(1.0, 1.0, 5.0, 5.0));
    scene.take_dirty();
    scene.get_mut(&id).unwrap().left = 9.0;
    assert!(scene.is_dirty());
}

#[test]
fn bitmap_ready_updates_all_images_with_src() {
    let mut scene = Scene::new(500.0, 500.0);
    let a = scene.add(Entity::image("cat.png", 1.0, 1.0, 5.0, 5.0));
    let b = scene.add(Entity::image("cat.png", 2.0, 2.0, 5.0, 5.0));
    let c = scene.add(Entity::image("dog.png", 3.0, 3.0, 5.0, 5.0));
    assert_eq!(scene.pending_image_sources(), vec!["cat.png".to_string(), "dog.png".to_string()]);
    scene.take_dirty();

    assert_eq!(scene.mark_bitmap_ready("cat.png", 64, 32), 2);
    assert!(scene.take_dirty());
    assert!(!scene.get(&a).unwrap().is_pending_image());
    assert!(!scene.get(&b).unwrap().is_pending_image());
    assert!(scene.get(&c).unwrap().is_pending_image());
    assert_eq!(scene.pending_image_sources(), vec!["dog.png".to_string()]);
}

#[test]
fn image_with_known_src_is_ready_on_add() {
    let mut scene = Scene::new(500.0, 500.0);
    scene.mark_bitmap_ready("cat.png", 64, 32);
    let id = scene.add(Entity::image("cat.png", 1.0, 1.0, 5.0, 5.0));
    assert!(!scene.get(&id).unwrap().is_pending_image());
    assert_eq!(scene.bitmaps.get("cat.png"), Some(&(64, 32)));
}

#[test]
fn drop_images_with_src_removes_only_matches() {
    let mut scene = Scene::new(500.0, 500.0);
    scene.add(Entity::image("bad.png", 1.0, 1.0, 5.0, 5.0));
    let keep = scene.add(Entity::rect(1.0, 1.0, 5.0, 5.0));
    assert_eq!(scene.drop_images_with_src("bad.png"), 1);
    assert_eq!(scene.ids(), &[keep]);
}

// =============================================================
// Serialization
// =============================================================

#[test]
fn to_json_excluding_background_omits_it() {
    let mut scene = Scene::new(640.0, 480.0);
    scene.add(background_rect(640.0, 480.0));
    scene.add(Entity::rect(1.0, 1.0, 5.0, 5.0));
    let with: serde_json::Value = serde_json::from_str(&scene.to_json(true).unwrap()).unwrap();
    let without: serde_json::Value = serde_json::from_str(&scene.to_json(false).unwrap()).unwrap();
    assert_eq!(with["objects"].as_array().unwrap().len(), 2);
    assert_eq!(without["objects"].as_array().unwrap().len(), 1);
    assert_eq!(with["width"], 640.0);
}

#[test]
fn to_json_matches_to_document() {
    let mut scene = Scene::new(640.0, 480.0);
    scene.add(Entity::text(TextProps::new("hi", "Impact"), 100.0, 100.0, 200.0, 80.0));
    let owned = scene.to_document(true).to_json().unwrap();
    assert_eq!(owned, scene.to_json(true).unwrap());
    assert_eq!(scene.document_view(true).objects.len(), 1);
}

#[test]
fn parse_document_drops_bad_objects_and_keeps_rest() {
    let raw = r#"{
        "width": 800, "height": 600,
        "objects": [
            { "type": "rect", "left": 1, "top": 2, "width": 3, "height": 4 },
            { "type": "hexagon", "left": 1, "top": 2 },
            { "type": "circle", "radius": "big", "left": 0, "top": 0 },
            { "type": "circle", "radius": 10, "left": 0, "top": 0 }
        ]
    }"#;
    let doc = parse_document(raw).unwrap();
    assert_eq!(doc.width, 800.0);
    assert_eq!(doc.objects.len(), 2);
    assert_eq!(doc.objects[1].width, 20.0);
}

#[test]
fn parse_document_reassigns_repeated_ids() {
    let id = Uuid::new_v4();
    let raw = format!(
        r#"{{"objects": [{{"id": "{id}", "type": "rect", "left": 0, "top": 0}}, {{"id": "{id}", "type": "rect", "left": 5, "top": 5}}]}}"#
    );
    let doc = parse_document(&raw).unwrap();
    assert_eq!(doc.objects.len(), 2);
    assert_eq!(doc.objects[0].id, id);
    assert_ne!(doc.objects[1].id, id);
}

#[test]
fn parse_document_rejects_malformed_outer_json() {
    assert!(matches!(parse_document("[1, 2"), Err(EditorError::Json(_))));
}

#[test]
fn load_then_serialize_is_stable() {
    let mut scene = Scene::new(100.0, 100.0);
    scene.add(background_rect(100.0, 100.0));
    scene.add(Entity::circle(30.0, 40.0, 12.5));
    scene.add(Entity::text(TextProps::new("TOP TEXT", "Impact"), 50.0, 20.0, 90.0, 30.0));
    let first = scene.to_json(true).unwrap();

    let mut other = Scene::new(1.0, 1.0);
    other.load_document(parse_document(&first).unwrap());
    assert_eq!(other.to_json(true).unwrap(), first);
    assert_eq!(other.width(), 100.0);
}

#[test]
fn replace_foreground_keeps_background_and_surviving_selection() {
    let mut scene = Scene::new(100.0, 100.0);
    let bg = scene.add(background_rect(100.0, 100.0));
    let a = Entity::rect(1.0, 1.0, 5.0, 5.0);
    let a_id = scene.add(a.clone());
    scene.add(Entity::rect(2.0, 2.0, 5.0, 5.0));
    scene.select(a_id);

    let c = Entity::circle(9.0, 9.0, 3.0);
    let c_id = c.id;
    scene.replace_foreground(vec![a, c]);
    assert_eq!(scene.ids(), &[bg, a_id, c_id]);
    assert_eq!(scene.selected(), Some(a_id));

    scene.replace_foreground(Vec::new());
    assert_eq!(scene.ids(), &[bg]);
    assert_eq!(scene.selected(), None);
}
