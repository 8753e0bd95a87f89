//! Editor engine: input handling, editor actions, and the browser shell.
//!
//! [`EngineCore`] owns the scene, viewport, gesture state and history and has
//! no browser dependencies, so every interaction path is unit-testable.
//! [`Engine`] wraps it with the canvas element, the decoded image cache and
//! the frame loop.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use futures::future::join_all;
use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::config::EditorConfig;
use crate::consts::{
    BACKGROUND_ROLE, DEFAULT_SCENE_HEIGHT, DEFAULT_SCENE_WIDTH, DUPLICATE_OFFSET, FIT_PADDING_PX, IMAGE_FIT_RATIO,
    MIN_TEXT_HEIGHT, MIN_TEXT_WIDTH, WHEEL_ZOOM_SENSITIVITY,
};
use crate::entity::{Entity, EntityId, EntityKind, EntityPatch, TextProps};
use crate::error::EditorError;
use crate::events::{EventFilter, EventKind, SceneEvent, SubscriptionId};
use crate::hit::{self, HandleMetrics, Hit, HitPart};
use crate::history::History;
use crate::image::{self, ImageCache};
use crate::input::{Button, InputState, Key, Modifiers, WheelDelta};
use crate::render::{self, ExportOptions};
use crate::scene::{Document, Scene, parse_document};
use crate::transform;
use crate::viewport::{Point, Viewport};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The scene changed and the next frame should repaint.
    RenderNeeded,
    SetCursor(String),
    /// Show a text editor over a text entity, seeded with its current text.
    EditTextRequested { id: EntityId, text: String },
    /// An image entity needs its bitmap decoded.
    LoadImage { src: String },
}

/// Core engine state: all logic that doesn't depend on the canvas element.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct EngineCore {
    pub scene: Scene,
    pub viewport: Viewport,
    pub input: InputState,
    pub history: History,
    pub config: EditorConfig,
    /// Last timestamp seen from the host, in milliseconds.
    clock_ms: f64,
    cursor: String,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::new(EditorConfig::default(), DEFAULT_SCENE_WIDTH, DEFAULT_SCENE_HEIGHT)
    }
}

impl EngineCore {
    #[must_use]
    pub fn new(config: EditorConfig, scene_width: f64, scene_height: f64) -> Self {
        let scene = Scene::new(scene_width, scene_height);
        let mut history = History::new(config.history_limit);
        if let Err(err) = history.reset(&scene) {
            log::warn!("engine: history baseline failed: {err}");
        }
        Self {
            viewport: Viewport::new(scene.width(), scene.height()),
            scene,
            input: InputState::default(),
            history,
            config,
            clock_ms: 0.0,
            cursor: "default".to_string(),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> HandleMetrics {
        HandleMetrics {
            radius_px: self.config.handle_radius_px,
            rotate_offset_px: self.config.rotate_handle_offset_px,
        }
    }

    /// Record the host clock used for debounced history.
    pub fn set_clock(&mut self, now_ms: f64) {
        if now_ms.is_finite() {
            self.clock_ms = now_ms;
        }
    }

    /// Per-frame housekeeping. Fires due history records and returns whether
    /// the scene needs a repaint, clearing the dirty flag.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.poll_history(now_ms);
        self.scene.take_dirty()
    }

    /// Fire the debounced history record if it is due at `now_ms`.
    pub fn poll_history(&mut self, now_ms: f64) {
        self.set_clock(now_ms);
        if let Err(err) = self.history.poll(&self.scene, self.clock_ms) {
            log::warn!("engine: debounced history record failed: {err}");
        }
    }

    // --- Queries ---

    /// The currently selected entity, if any.
    #[must_use]
    pub fn selection(&self) -> Option<EntityId> {
        self.scene.selected()
    }

    /// Look up an entity by ID.
    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.scene.get(id)
    }

    /// Current hover/gesture cursor.
    #[must_use]
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// Serialize the scene document.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] if serialization fails.
    pub fn serialize(&self, include_background: bool) -> Result<String, EditorError> {
        self.scene.to_json(include_background)
    }

    pub fn subscribe<F>(&mut self, filter: impl Into<EventFilter>, listener: F) -> SubscriptionId
    where
        F: FnMut(&SceneEvent) + 'static,
    {
        self.scene.subscribe(filter, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.scene.unsubscribe(id)
    }

    // --- Document ---

    /// Replace the scene with `doc` and make it the history baseline.
    ///
    /// Returns a [`Action::LoadImage`] for every image still without a bitmap.
    pub fn load_document(&mut self, doc: Document) -> Vec<Action> {
        self.input = InputState::Idle;
        self.scene.load_document(doc);
        self.viewport.set_scene_size(self.scene.width(), self.scene.height());
        self.viewport_changed();
        self.rebaseline();
        let mut actions: Vec<Action> =
            self.scene.pending_image_sources().into_iter().map(|src| Action::LoadImage { src }).collect();
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Parse a serialized document and load it.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] when the outer document is malformed.
    /// Individual bad objects are dropped, not reported.
    pub fn hydrate(&mut self, json: &str) -> Result<Vec<Action>, EditorError> {
        let doc = parse_document(json)?;
        Ok(self.load_document(doc))
    }

    /// A bitmap finished decoding.
    pub fn image_loaded(&mut self, src: &str, width: u32, height: u32) -> Vec<Action> {
        let count = self.scene.mark_bitmap_ready(src, width, height);
        log::debug!("engine: bitmap ready for {count} entities ({width}x{height})");
        vec![Action::RenderNeeded]
    }

    /// A bitmap failed to decode; its entities are dropped from the scene and
    /// from every history entry, so neither undo nor redo can bring them back.
    pub fn image_failed(&mut self, src: &str) -> Vec<Action> {
        let dropped = self.scene.drop_images_with_src(src);
        log::warn!("engine: dropped {dropped} image(s) that failed to load: {src}");
        if let Err(err) = self.history.drop_image_src(src) {
            log::warn!("engine: history rewrite failed, starting a new baseline: {err}");
            self.rebaseline();
        }
        if dropped == 0 {
            return Vec::new();
        }
        vec![Action::RenderNeeded]
    }

    // --- Viewport ---

    /// Update viewport dimensions and device pixel ratio.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) -> Vec<Action> {
        self.viewport.set_size(width_css, height_css, dpr);
        self.viewport_changed();
        vec![Action::RenderNeeded]
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Vec<Action> {
        self.viewport.set_zoom(zoom);
        self.viewport_changed();
        vec![Action::RenderNeeded]
    }

    /// Zoom so the whole scene is visible, centered.
    pub fn fit_scene(&mut self) -> Vec<Action> {
        self.viewport.fit_scene(FIT_PADDING_PX);
        self.viewport_changed();
        vec![Action::RenderNeeded]
    }

    /// Zoom 1 with the scene centered.
    pub fn reset_view(&mut self) -> Vec<Action> {
        self.viewport.reset();
        self.viewport_changed();
        vec![Action::RenderNeeded]
    }

    fn viewport_changed(&mut self) {
        self.scene.mark_dirty();
        let Viewport { zoom, pan_x, pan_y, .. } = self.viewport;
        self.scene.emit(&SceneEvent::ViewportChanged { zoom, pan_x, pan_y });
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        let mut actions = Vec::new();
        match button {
            Button::Middle => {
                self.input = InputState::Panning { last_screen: screen_pt };
                self.set_cursor("grabbing", &mut actions);
                return actions;
            }
            Button::Secondary => return actions,
            Button::Primary => {}
        }
        if matches!(self.input, InputState::EditingText { .. }) {
            self.input = InputState::Idle;
        }

        let pt = self.viewport.screen_to_scene(screen_pt);
        let hit = hit::hit_test(pt, &self.scene, self.viewport.zoom, self.metrics());
        self.scene.emit(&SceneEvent::MouseDown { x: pt.x, y: pt.y, target: hit.map(|h| h.entity_id) });

        match hit {
            Some(Hit { entity_id, part: part @ HitPart::ResizeHandle(handle) }) => {
                if let Some(entity) = self.scene.get(&entity_id) {
                    let gesture = transform::begin_resize(entity, handle);
                    let cursor = hit::cursor_for(part, entity.angle);
                    self.input = InputState::Resizing { id: entity_id, gesture, moved: false };
                    self.set_cursor(cursor, &mut actions);
                }
            }
            Some(Hit { entity_id, part: HitPart::RotateHandle }) => {
                if let Some(entity) = self.scene.get(&entity_id) {
                    self.input = InputState::Rotating {
                        id: entity_id,
                        center: entity.center(),
                        start: pt,
                        orig_angle: entity.angle,
                        moved: false,
                    };
                    self.set_cursor("grabbing", &mut actions);
                }
            }
            Some(Hit { entity_id, part: HitPart::Body }) => {
                if self.scene.select(entity_id) {
                    let orig = self.scene.get(&entity_id).map_or(pt, Entity::center);
                    self.input = InputState::Dragging { id: entity_id, start: pt, orig, moved: false };
                    self.set_cursor("move", &mut actions);
                } else {
                    self.scene.clear_selection();
                }
            }
            None => self.scene.clear_selection(),
        }

        log::debug!("engine: pointer down -> {}", self.input.name());
        self.push_render(&mut actions);
        actions
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        let pt = self.viewport.screen_to_scene(screen_pt);
        let mut actions = Vec::new();

        match self.input.clone() {
            InputState::Idle => self.update_hover(pt, &mut actions),
            InputState::Panning { last_screen } => {
                self.viewport.pan_by(screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                self.input = InputState::Panning { last_screen: screen_pt };
                self.viewport_changed();
            }
            InputState::Dragging { id, start, orig, .. } => {
                let target = transform::drag_position(orig, start, pt);
                if self.move_entity(&id, target) {
                    self.input = InputState::Dragging { id, start, orig, moved: true };
                    self.scene.emit(&SceneEvent::ObjectMoving { id });
                } else {
                    self.input = InputState::Idle;
                }
            }
            InputState::Rotating { id, center, start, orig_angle, .. } => {
                let snap = modifiers.shift.then_some(self.config.rotation_snap_deg);
                let angle = transform::rotation_angle(orig_angle, center, start, pt, snap);
                if let Some(entity) = self.scene.get_mut(&id) {
                    entity.angle = angle;
                    self.input = InputState::Rotating { id, center, start, orig_angle, moved: true };
                    self.scene.emit(&SceneEvent::ObjectRotating { id });
                } else {
                    self.input = InputState::Idle;
                }
            }
            InputState::Resizing { id, gesture, .. } => {
                if let Some(entity) = self.scene.get_mut(&id) {
                    transform::apply_resize(entity, &gesture, pt);
                    self.input = InputState::Resizing { id, gesture, moved: true };
                    self.scene.emit(&SceneEvent::ObjectScaling { id });
                } else {
                    self.input = InputState::Idle;
                }
            }
            InputState::EditingText { .. } => {}
        }

        self.push_render(&mut actions);
        actions
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point, _button: Button, _modifiers: Modifiers) -> Vec<Action> {
        let pt = self.viewport.screen_to_scene(screen_pt);
        let mut actions = Vec::new();

        match std::mem::take(&mut self.input) {
            InputState::Dragging { id, moved: true, .. } | InputState::Rotating { id, moved: true, .. } => {
                self.finish_gesture(id);
            }
            InputState::Resizing { id, moved: true, .. } => {
                if self.clamp_enabled() {
                    let (w, h) = (self.scene.width(), self.scene.height());
                    if let Some(entity) = self.scene.get_mut(&id) {
                        transform::clamp_to_scene(entity, w, h);
                    }
                }
                self.finish_gesture(id);
            }
            editing @ InputState::EditingText { .. } => self.input = editing,
            _ => {}
        }

        self.update_hover(pt, &mut actions);
        self.push_render(&mut actions);
        actions
    }

    /// Double-click on a text entity starts text editing.
    pub fn on_double_click(&mut self, screen_pt: Point) -> Vec<Action> {
        let pt = self.viewport.screen_to_scene(screen_pt);
        let target = hit::hit_test(pt, &self.scene, self.viewport.zoom, self.metrics()).map(|h| h.entity_id);
        self.scene.emit(&SceneEvent::MouseDblClick { x: pt.x, y: pt.y, target });

        let mut actions = Vec::new();
        let Some(id) = target else {
            return actions;
        };
        let text = match self.scene.get(&id).map(|e| &e.kind) {
            Some(EntityKind::Text(props)) => props.text.clone(),
            _ => return actions,
        };
        self.scene.select(id);
        self.input = InputState::EditingText { id };
        actions.push(Action::EditTextRequested { id, text });
        self.push_render(&mut actions);
        actions
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        if !delta.dx.is_finite() || !delta.dy.is_finite() {
            return Vec::new();
        }
        if modifiers.command() {
            let zoom = self.viewport.zoom * (-delta.dy * WHEEL_ZOOM_SENSITIVITY).exp();
            self.viewport.zoom_at(zoom, screen_pt);
        } else {
            self.viewport.pan_by(-delta.dx, -delta.dy);
        }
        self.viewport_changed();
        vec![Action::RenderNeeded]
    }

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        let mut actions = Vec::new();
        if matches!(self.input, InputState::EditingText { .. }) {
            if key.0 == "Escape" {
                self.input = InputState::Idle;
            }
            return actions;
        }

        match key.0.as_str() {
            "Delete" | "Backspace" => {
                self.remove_selected();
            }
            "Escape" => self.scene.clear_selection(),
            _ if modifiers.command() && key.is_char('z') => {
                if modifiers.shift {
                    self.redo();
                } else {
                    self.undo();
                }
            }
            _ if modifiers.command() && key.is_char('y') => {
                self.redo();
            }
            _ if modifiers.command() && key.is_char('d') => {
                self.duplicate_selected();
            }
            _ => {
                if let Some((dx, dy)) = key.arrow() {
                    let step = if modifiers.shift { self.config.nudge_step_large } else { self.config.nudge_step };
                    self.nudge_selected(dx * step, dy * step);
                }
            }
        }

        self.push_render(&mut actions);
        actions
    }

    // --- Text ---

    /// Commit text from the host editor back into a text entity.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::UnknownEntity`] if `id` is not in the scene.
    pub fn set_text(&mut self, id: &EntityId, text: String) -> Result<bool, EditorError> {
        let patch = EntityPatch { text: Some(text), ..EntityPatch::default() };
        let changed = self.apply_patch(id, &patch)?;
        if matches!(self.input, InputState::EditingText { id: editing } if editing == *id) {
            self.input = InputState::Idle;
        }
        Ok(changed)
    }

    /// Close the host text editor without committing.
    pub fn cancel_text_edit(&mut self) {
        if matches!(self.input, InputState::EditingText { .. }) {
            self.input = InputState::Idle;
        }
    }

    // --- Editor actions ---

    /// Add a text box centered in the scene and select it.
    pub fn add_text(&mut self, text: &str) -> EntityId {
        let (w, h) = (self.scene.width(), self.scene.height());
        let props = TextProps::new(text, self.config.default_font_family.clone());
        let entity =
            Entity::text(props, w / 2.0, h / 2.0, (w * 0.8).max(MIN_TEXT_WIDTH), (h * 0.2).max(MIN_TEXT_HEIGHT));
        self.insert_and_select(entity)
    }

    /// Add a square centered in the scene and select it.
    pub fn add_rect(&mut self) -> EntityId {
        let (w, h) = (self.scene.width(), self.scene.height());
        let side = w.min(h) * 0.25;
        self.insert_and_select(Entity::rect(w / 2.0, h / 2.0, side, side))
    }

    /// Add a circle centered in the scene and select it.
    pub fn add_circle(&mut self) -> EntityId {
        let (w, h) = (self.scene.width(), self.scene.height());
        self.insert_and_select(Entity::circle(w / 2.0, h / 2.0, w.min(h) * 0.125))
    }

    /// Add an image whose bitmap is already decoded. The image is centered
    /// and shrunk to fit [`IMAGE_FIT_RATIO`] of the scene.
    pub fn add_image(&mut self, src: &str, natural_width: u32, natural_height: u32) -> EntityId {
        self.scene.mark_bitmap_ready(src, natural_width, natural_height);
        let (sw, sh) = (self.scene.width(), self.scene.height());
        let (w, h) = (f64::from(natural_width), f64::from(natural_height));
        let mut entity = Entity::image(src, sw / 2.0, sh / 2.0, w, h);
        let scale = image_fit_scale(w, h, sw, sh);
        entity.scale_x = scale;
        entity.scale_y = scale;
        self.insert_and_select(entity)
    }

    /// Replace the background with a solid rectangle covering the scene.
    pub fn set_background_color(&mut self, color: &str) -> EntityId {
        let (w, h) = (self.scene.width(), self.scene.height());
        let mut bg = Entity::rect(w / 2.0, h / 2.0, w, h);
        bg.fill = color.to_string();
        bg.role = Some(BACKGROUND_ROLE.to_string());
        self.scene.add(bg)
    }

    /// Replace the background with an image and resize the scene to the
    /// image's natural size.
    pub fn set_background_image(&mut self, src: &str, natural_width: u32, natural_height: u32) -> EntityId {
        let (w, h) = (f64::from(natural_width), f64::from(natural_height));
        self.scene.set_size(w, h);
        self.viewport.set_scene_size(self.scene.width(), self.scene.height());
        self.scene.mark_bitmap_ready(src, natural_width, natural_height);
        let mut bg = Entity::image(src, w / 2.0, h / 2.0, w, h);
        bg.role = Some(BACKGROUND_ROLE.to_string());
        let id = self.scene.add(bg);
        self.viewport_changed();
        id
    }

    /// Remove the selected entity. Returns `false` when nothing is selected.
    pub fn remove_selected(&mut self) -> bool {
        let Some(id) = self.scene.selected() else {
            return false;
        };
        if self.scene.remove(&id).is_none() {
            return false;
        }
        self.record();
        true
    }

    /// Copy the selected entity, offset so the copy is visible, and select it.
    pub fn duplicate_selected(&mut self) -> Option<EntityId> {
        let mut copy = self.scene.selected_entity()?.duplicate();
        copy.left += DUPLICATE_OFFSET;
        copy.top += DUPLICATE_OFFSET;
        Some(self.insert_and_select(copy))
    }

    pub fn bring_to_front(&mut self) -> bool {
        self.reorder_selected(Scene::bring_to_front)
    }

    pub fn send_to_back(&mut self) -> bool {
        self.reorder_selected(Scene::send_to_back)
    }

    pub fn bring_forward(&mut self) -> bool {
        self.reorder_selected(Scene::bring_forward)
    }

    pub fn send_backward(&mut self) -> bool {
        self.reorder_selected(Scene::send_backward)
    }

    /// Apply a property patch. Returns `true` if anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::UnknownEntity`] if `id` is not in the scene.
    pub fn apply_patch(&mut self, id: &EntityId, patch: &EntityPatch) -> Result<bool, EditorError> {
        let entity = self.scene.get_mut(id).ok_or(EditorError::UnknownEntity(*id))?;
        let changed = entity.apply_patch(patch);
        if changed {
            self.scene.emit(&SceneEvent::ObjectModified { id: *id });
            self.record();
        }
        Ok(changed)
    }

    /// Apply a property patch sent by the host as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] for a malformed patch and
    /// [`EditorError::UnknownEntity`] if `id` is not in the scene.
    pub fn apply_patch_json(&mut self, id: &EntityId, json: &str) -> Result<bool, EditorError> {
        let patch: EntityPatch = serde_json::from_str(json)?;
        self.apply_patch(id, &patch)
    }

    // --- History ---

    /// Step back one history entry. Any gesture in progress is abandoned.
    pub fn undo(&mut self) -> bool {
        self.abandon_gesture();
        match self.history.undo(&mut self.scene) {
            Ok(changed) => changed,
            Err(err) => {
                log::warn!("engine: undo failed: {err}");
                false
            }
        }
    }

    /// Step forward one history entry. Any gesture in progress is abandoned.
    pub fn redo(&mut self) -> bool {
        self.abandon_gesture();
        match self.history.redo(&mut self.scene) {
            Ok(changed) => changed,
            Err(err) => {
                log::warn!("engine: redo failed: {err}");
                false
            }
        }
    }

    // --- Internals ---

    fn abandon_gesture(&mut self) {
        if let Some(id) = self.input.target() {
            log::debug!("engine: abandoning {} on {id}", self.input.name());
        }
        self.input = InputState::Idle;
    }

    fn insert_and_select(&mut self, entity: Entity) -> EntityId {
        let id = self.scene.add(entity);
        self.scene.select(id);
        self.record();
        id
    }

    fn reorder_selected(&mut self, op: fn(&mut Scene, &EntityId) -> bool) -> bool {
        let Some(id) = self.scene.selected() else {
            return false;
        };
        let moved = op(&mut self.scene, &id);
        if moved {
            self.record();
        }
        moved
    }

    fn nudge_selected(&mut self, dx: f64, dy: f64) -> bool {
        let Some(id) = self.scene.selected() else {
            return false;
        };
        let Some(center) = self.scene.get(&id).map(Entity::center) else {
            return false;
        };
        if !self.move_entity(&id, center.offset(dx, dy)) {
            return false;
        }
        self.scene.emit(&SceneEvent::ObjectMoving { id });
        self.scene.emit(&SceneEvent::ObjectModified { id });
        self.history.record_debounced(self.clock_ms, self.config.history_debounce_ms);
        true
    }

    /// Move an entity's center to `target`, clamped to the scene if enabled.
    fn move_entity(&mut self, id: &EntityId, target: Point) -> bool {
        let clamp = self.clamp_enabled();
        let (w, h) = (self.scene.width(), self.scene.height());
        let Some(entity) = self.scene.get_mut(id) else {
            return false;
        };
        entity.left = target.x;
        entity.top = target.y;
        if clamp {
            transform::clamp_to_scene(entity, w, h);
        }
        true
    }

    fn clamp_enabled(&self) -> bool {
        self.config.clamp_to_scene && !self.history.is_suppressed()
    }

    fn finish_gesture(&mut self, id: EntityId) {
        self.scene.emit(&SceneEvent::ObjectModified { id });
        self.record();
    }

    fn record(&mut self) {
        if let Err(err) = self.history.record_now(&self.scene) {
            log::warn!("engine: history record failed: {err}");
        }
    }

    fn rebaseline(&mut self) {
        if let Err(err) = self.history.reset(&self.scene) {
            log::warn!("engine: history baseline failed: {err}");
        }
    }

    fn update_hover(&mut self, pt: Point, actions: &mut Vec<Action>) {
        let cursor = match hit::hit_test(pt, &self.scene, self.viewport.zoom, self.metrics()) {
            Some(hit) => {
                let angle = self.scene.get(&hit.entity_id).map_or(0.0, |e| e.angle);
                hit::cursor_for(hit.part, angle)
            }
            None => "default",
        };
        self.set_cursor(cursor, actions);
    }

    fn set_cursor(&mut self, cursor: &str, actions: &mut Vec<Action>) {
        if self.cursor != cursor {
            self.cursor = cursor.to_string();
            actions.push(Action::SetCursor(cursor.to_string()));
        }
    }

    fn push_render(&self, actions: &mut Vec<Action>) {
        if self.scene.is_dirty() {
            actions.push(Action::RenderNeeded);
        }
    }
}

/// Uniform scale that shrinks a `w`x`h` image to fit the scene's fit box.
/// Images already inside the box keep scale 1.
#[must_use]
pub fn image_fit_scale(w: f64, h: f64, scene_w: f64, scene_h: f64) -> f64 {
    if w <= 0.0 || h <= 0.0 {
        return 1.0;
    }
    (IMAGE_FIT_RATIO * scene_w / w).min(IMAGE_FIT_RATIO * scene_h / h).min(1.0)
}

/// An engine shared between the host's event handlers, async image loads and
/// the frame loop.
pub type SharedEngine = Rc<RefCell<Engine>>;

/// The full editor engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    images: ImageCache,
    /// Browser timer for the pending debounced history record, keyed by the
    /// deadline it was armed for.
    history_timer: Option<(f64, Timeout)>,
    pub core: EngineCore,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NoContext`] if the canvas has no 2D context.
    pub fn new(canvas: HtmlCanvasElement, config: EditorConfig) -> Result<Self, EditorError> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or(EditorError::NoContext)?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| EditorError::NoContext)?;
        log::info!("engine: mounted (history limit {})", config.history_limit);
        Ok(Self {
            canvas,
            ctx,
            images: ImageCache::new(),
            history_timer: None,
            core: EngineCore::new(config, DEFAULT_SCENE_WIDTH, DEFAULT_SCENE_HEIGHT),
        })
    }

    #[must_use]
    pub fn into_shared(self) -> SharedEngine {
        Rc::new(RefCell::new(self))
    }

    // --- Viewport ---

    /// Update viewport dimensions and device pixel ratio, resizing the
    /// backing store to match.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) -> Vec<Action> {
        let actions = self.core.set_viewport(width_css, height_css, dpr);
        self.sync_backing_store();
        actions
    }

    fn sync_backing_store(&self) {
        let (w, h) = self.core.viewport.backing_store_size();
        if self.canvas.width() != w {
            self.canvas.set_width(w);
        }
        if self.canvas.height() != h {
            self.canvas.set_height(h);
        }
    }

    // --- Delegated input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.set_clock(js_sys::Date::now());
        let actions = self.core.on_pointer_down(screen_pt, button, modifiers);
        self.apply_cursor(actions)
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        self.core.set_clock(js_sys::Date::now());
        let actions = self.core.on_pointer_move(screen_pt, modifiers);
        self.apply_cursor(actions)
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.set_clock(js_sys::Date::now());
        let actions = self.core.on_pointer_up(screen_pt, button, modifiers);
        self.apply_cursor(actions)
    }

    pub fn on_double_click(&mut self, screen_pt: Point) -> Vec<Action> {
        self.core.set_clock(js_sys::Date::now());
        self.core.on_double_click(screen_pt)
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.core.on_wheel(screen_pt, delta, modifiers);
        self.sync_backing_store();
        actions
    }

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        self.core.set_clock(js_sys::Date::now());
        self.core.on_key_down(key, modifiers)
    }

    /// Apply `SetCursor` actions to the canvas style and pass the rest through.
    fn apply_cursor(&self, actions: Vec<Action>) -> Vec<Action> {
        for action in &actions {
            if let Action::SetCursor(cursor) = action {
                if let Err(err) = self.canvas.style().set_property("cursor", cursor) {
                    log::warn!("engine: setting cursor failed: {err:?}");
                }
            }
        }
        actions
    }

    // --- Events ---

    /// Subscribe a JS callback to one event name. The callback receives the
    /// event serialized as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::UnknownEvent`] for an unrecognized name.
    pub fn subscribe_js(&mut self, name: &str, callback: js_sys::Function) -> Result<SubscriptionId, EditorError> {
        let kind: EventKind = name.parse()?;
        Ok(self.core.subscribe(kind, move |event: &SceneEvent| match serde_json::to_string(event) {
            Ok(json) => {
                if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                    log::warn!("events: listener threw: {err:?}");
                }
            }
            Err(err) => log::warn!("events: serialize failed: {err}"),
        }))
    }

    // --- Render / export ---

    /// Draw the current state to the canvas.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any `Canvas2D` call fails.
    pub fn render(&self) -> Result<(), JsValue> {
        self.sync_backing_store();
        render::draw(&self.ctx, &self.core.scene, &self.core.viewport, &self.images, self.core.metrics())
    }

    /// Rasterize the scene without selection chrome and return a data URL.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Export`] when an offscreen canvas cannot be
    /// created or encoded.
    pub fn export(&self, options: &ExportOptions) -> Result<String, EditorError> {
        render::export(&self.core.scene, &self.images, options)
    }

    /// Cache a decoded image and return its natural size.
    fn cache_image(&mut self, src: &str, img: web_sys::HtmlImageElement) -> (u32, u32) {
        let size = (img.natural_width(), img.natural_height());
        self.images.insert(src.to_string(), img);
        size
    }
}

// =============================================================
// Async image paths
// =============================================================

/// Load an image and add it to the scene, selected.
///
/// # Errors
///
/// Returns [`EditorError::ImageLoad`] if the bitmap cannot be decoded.
pub async fn add_image(engine: &SharedEngine, src: &str) -> Result<EntityId, EditorError> {
    let img = image::load_image(src).await?;
    let mut engine = engine.borrow_mut();
    let (w, h) = engine.cache_image(src, img);
    Ok(engine.core.add_image(src, w, h))
}

/// Load an image and make it the scene background.
///
/// # Errors
///
/// Returns [`EditorError::ImageLoad`] if the bitmap cannot be decoded.
pub async fn set_background_image(engine: &SharedEngine, src: &str) -> Result<EntityId, EditorError> {
    let img = image::load_image(src).await?;
    let mut engine = engine.borrow_mut();
    let (w, h) = engine.cache_image(src, img);
    let id = engine.core.set_background_image(src, w, h);
    engine.core.fit_scene();
    Ok(id)
}

/// Load a serialized document, decoding every image first.
///
/// All loads are awaited together; images that fail are dropped from the
/// document before it replaces the scene, so the history baseline never
/// references a broken bitmap.
///
/// # Errors
///
/// Returns [`EditorError::Json`] when the outer document is malformed.
pub async fn hydrate(engine: &SharedEngine, json: &str) -> Result<(), EditorError> {
    let mut doc = parse_document(json)?;
    let sources: Vec<String> = {
        let current = engine.borrow();
        let mut seen = HashSet::new();
        doc.objects
            .iter()
            .filter_map(Entity::image_src)
            .filter(|src| !current.images.contains_key(*src) && seen.insert(*src))
            .map(str::to_string)
            .collect()
    };

    let results = join_all(sources.iter().map(|src| image::load_image(src))).await;

    let mut engine = engine.borrow_mut();
    let mut failed = HashSet::new();
    for (src, result) in sources.iter().zip(results) {
        match result {
            Ok(img) => {
                let (w, h) = engine.cache_image(src, img);
                engine.core.scene.mark_bitmap_ready(src, w, h);
            }
            Err(err) => {
                log::warn!("engine: hydrate dropping image: {err}");
                failed.insert(src.as_str());
            }
        }
    }
    doc.objects.retain(|e| e.image_src().is_none_or(|src| !failed.contains(src)));

    engine.core.load_document(doc);
    engine.core.fit_scene();
    log::info!("engine: hydrated {} objects ({} images failed)", engine.core.scene.len(), failed.len());
    Ok(())
}

/// Carry out the browser side of `actions`: cursor changes and image loads.
/// The engine must not be borrowed by the caller.
pub fn process_actions(engine: &SharedEngine, actions: Vec<Action>) {
    for action in actions {
        match action {
            Action::SetCursor(cursor) => {
                let engine = engine.borrow();
                if let Err(err) = engine.canvas.style().set_property("cursor", &cursor) {
                    log::warn!("engine: setting cursor failed: {err:?}");
                }
            }
            Action::LoadImage { src } => {
                let engine = Rc::clone(engine);
                wasm_bindgen_futures::spawn_local(async move {
                    match image::load_image(&src).await {
                        Ok(img) => {
                            let mut engine = engine.borrow_mut();
                            let (w, h) = engine.cache_image(&src, img);
                            engine.core.image_loaded(&src, w, h);
                        }
                        Err(err) => {
                            log::warn!("engine: {err}");
                            engine.borrow_mut().core.image_failed(&src);
                        }
                    }
                });
            }
            Action::RenderNeeded | Action::EditTextRequested { .. } => {}
        }
    }
    arm_history_timer(engine);
}

/// Match the browser timer to the core's pending debounced record. A new
/// deadline replaces the timer, which cancels the old one; no deadline
/// clears it. The frame loop also polls, so whichever runs first records.
/// The engine must not be borrowed by the caller.
pub fn arm_history_timer(engine: &SharedEngine) {
    let Ok(mut current) = engine.try_borrow_mut() else {
        return;
    };
    let Some(deadline) = current.core.history.pending_deadline() else {
        current.history_timer = None;
        return;
    };
    if current.history_timer.as_ref().is_some_and(|(armed, _)| armed.total_cmp(&deadline).is_eq()) {
        return;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let delay_ms = (deadline - js_sys::Date::now()).clamp(0.0, f64::from(u32::MAX)).ceil() as u32;
    let weak = Rc::downgrade(engine);
    let timer = Timeout::new(delay_ms, move || {
        let Some(engine) = weak.upgrade() else {
            return;
        };
        // Busy with an async task; the frame loop picks the record up.
        if let Ok(mut engine) = engine.try_borrow_mut() {
            engine.core.poll_history(js_sys::Date::now());
        }
    });
    current.history_timer = Some((deadline, timer));
}

// =============================================================
// Frame loop
// =============================================================

/// Handle to a running frame loop.
pub struct RenderLoop {
    running: Rc<Cell<bool>>,
}

impl RenderLoop {
    /// Stop after the current frame.
    pub fn stop(&self) {
        self.running.set(false);
    }
}

/// Start a `requestAnimationFrame` loop that ticks history and repaints only
/// when the scene is dirty.
///
/// # Errors
///
/// Returns [`EditorError::Js`] if there is no window or the first frame
/// cannot be requested.
pub fn start_render_loop(engine: &SharedEngine) -> Result<RenderLoop, EditorError> {
    let window = web_sys::window().ok_or_else(|| EditorError::Js("no window".into()))?;
    let running = Rc::new(Cell::new(true));

    let holder: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
    let holder_for_cb = Rc::clone(&holder);
    let running_for_cb = Rc::clone(&running);
    let window_for_cb = window.clone();
    let engine = Rc::clone(engine);

    *holder.borrow_mut() = Some(Closure::wrap(Box::new(move |_ts: f64| {
        if !running_for_cb.get() {
            holder_for_cb.borrow_mut().take();
            return;
        }
        run_frame(&engine);
        if let Some(cb) = holder_for_cb.borrow().as_ref() {
            if let Err(err) = window_for_cb.request_animation_frame(cb.as_ref().unchecked_ref()) {
                log::warn!("engine: frame request failed: {err:?}");
            }
        }
    }) as Box<dyn FnMut(f64)>));

    if let Some(cb) = holder.borrow().as_ref() {
        window.request_animation_frame(cb.as_ref().unchecked_ref())?;
    }
    log::debug!("engine: frame loop started");
    Ok(RenderLoop { running })
}

fn run_frame(engine: &SharedEngine) {
    // An async task holds the engine; try again next frame.
    let Ok(mut engine) = engine.try_borrow_mut() else {
        return;
    };
    if engine.core.tick(js_sys::Date::now()) {
        if let Err(err) = engine.render() {
            log::warn!("engine: render failed: {err:?}");
        }
    }
}
