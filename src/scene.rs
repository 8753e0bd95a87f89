//! Scene: the z-ordered entity collection, the active selection, and the
//! redraw flag.
//!
//! Entities live in an id-keyed map; paint order is a separate list of ids
//! (index 0 paints first). The background entity, when present, is always at
//! index 0. Every mutation that changes what would be painted sets the dirty
//! flag, which the frame loop consumes with [`Scene::take_dirty`].
//!
//! The scene also tracks which image sources already have a decoded bitmap,
//! so newly added image entities with a known source are ready immediately.

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{BitmapState, Entity, EntityId, EntityKind};
use crate::error::EditorError;
use crate::events::{EventBus, EventFilter, SceneEvent, SubscriptionId};

/// Persistence document: scene size plus entities in paint order.
///
/// Owned when loading; [`Scene::to_json`] serializes the borrowed form
/// `Document<&Entity>`, which has the same wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document<E = Entity> {
    pub width: f64,
    pub height: f64,
    pub objects: Vec<E>,
}

impl<E: Serialize> Document<E> {
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, EditorError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default)]
    objects: Vec<serde_json::Value>,
}

/// Parse a persistence document, dropping objects that fail to deserialize.
///
/// Missing ids are generated. A repeated id is replaced with a fresh one.
/// A missing scene size is reported as zero.
///
/// # Errors
///
/// Returns [`EditorError::Json`] only when the outer document is malformed.
pub fn parse_document(raw: &str) -> Result<Document, EditorError> {
    let doc: RawDocument = serde_json::from_str(raw)?;
    let mut seen = HashSet::new();
    let mut objects = Vec::with_capacity(doc.objects.len());
    for (index, value) in doc.objects.into_iter().enumerate() {
        match serde_json::from_value::<Entity>(value) {
            Ok(mut entity) => {
                if !seen.insert(entity.id) {
                    log::warn!("scene: object {index} repeats id {}; assigning a new one", entity.id);
                    entity.id = Uuid::new_v4();
                    seen.insert(entity.id);
                }
                entity.normalize();
                objects.push(entity);
            }
            Err(e) => log::warn!("scene: dropping object {index}: {e}"),
        }
    }
    Ok(Document { width: doc.width.unwrap_or(0.0), height: doc.height.unwrap_or(0.0), objects })
}

#[derive(Debug)]
pub struct Scene {
    entities: HashMap<EntityId, Entity>,
    order: Vec<EntityId>,
    selected: Option<EntityId>,
    width: f64,
    height: f64,
    dirty: bool,
    bitmaps: HashMap<String, (u32, u32)>,
    bus: EventBus,
}

impl Scene {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            entities: HashMap::new(),
            order: Vec::new(),
            selected: None,
            width,
            height,
            dirty: true,
            bitmaps: HashMap::new(),
            bus: EventBus::new(),
        }
    }

    // =============================================================
    // Size and dirty flag
    // =============================================================

    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        if width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0 {
            self.width = width;
            self.height = height;
            self.dirty = true;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and clear the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // =============================================================
    // Lookup
    // =============================================================

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable access. Marks the scene dirty when the entity exists.
    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        let entity = self.entities.get_mut(id)?;
        self.dirty = true;
        Some(entity)
    }

    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Entities in paint order, bottom first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// Ids in paint order, bottom first.
    #[must_use]
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    #[must_use]
    pub fn index_of(&self, id: &EntityId) -> Option<usize> {
        self.order.iter().position(|other| other == id)
    }

    #[must_use]
    pub fn background(&self) -> Option<&Entity> {
        self.order.first().and_then(|id| self.entities.get(id)).filter(|e| e.is_background())
    }

    fn floor_index(&self) -> usize {
        usize::from(self.background().is_some())
    }

    // =============================================================
    // Add / remove
    // =============================================================

    /// Insert an entity and emit `object:added`.
    ///
    /// A background entity goes to index 0 and replaces any existing
    /// background, even when its id is already in the scene. Re-adding any
    /// other existing id replaces it in place.
    pub fn add(&mut self, mut entity: Entity) -> EntityId {
        entity.normalize();
        self.attach_bitmap(&mut entity);
        let id = entity.id;

        if entity.is_background() {
            if let Some(old) = self.background().map(|bg| bg.id) {
                self.remove(&old);
            }
            if self.entities.remove(&id).is_some() {
                self.order.retain(|other| *other != id);
            }
            self.entities.insert(id, entity);
            self.order.insert(0, id);
        } else if let Some(index) = self.index_of(&id) {
            if index == 0 && self.background().is_some() {
                // A former background moves to the top.
                self.order.remove(index);
                self.order.push(id);
            }
            self.entities.insert(id, entity);
        } else {
            self.entities.insert(id, entity);
            self.order.push(id);
        }
        if self.selected == Some(id) && !self.entities.get(&id).is_some_and(|e| e.selectable) {
            self.clear_selection();
        }

        self.dirty = true;
        self.bus.emit(&SceneEvent::ObjectAdded { id });
        id
    }

    /// Remove an entity, clearing the selection if it was selected.
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        self.order.retain(|other| other != id);
        if self.selected == Some(*id) {
            self.clear_selection();
        }
        self.dirty = true;
        self.bus.emit(&SceneEvent::ObjectRemoved { id: *id });
        Some(entity)
    }

    /// Remove every entity, the background included.
    pub fn clear(&mut self) {
        let ids = self.order.clone();
        for id in ids.iter().rev() {
            self.remove(id);
        }
    }

    /// Replace all non-background entities with `entities`, keeping the
    /// background. The selection survives if its id is still present.
    pub fn replace_foreground(&mut self, entities: Vec<Entity>) {
        let keep = self.selected.filter(|id| entities.iter().any(|e| e.id == *id));
        if keep.is_none() {
            self.clear_selection();
        }
        let stale: Vec<EntityId> = self.iter().filter(|e| !e.is_background()).map(|e| e.id).collect();
        for id in &stale {
            if self.entities.remove(id).is_some() {
                self.order.retain(|other| other != id);
                self.bus.emit(&SceneEvent::ObjectRemoved { id: *id });
            }
        }
        for entity in entities.into_iter().filter(|e| !e.is_background()) {
            self.add(entity);
        }
        self.dirty = true;
    }

    /// Replace the whole scene with `doc`. A non-positive document size keeps
    /// the current scene size.
    pub fn load_document(&mut self, doc: Document) {
        self.clear();
        self.set_size(doc.width, doc.height);
        for entity in doc.objects {
            self.add(entity);
        }
        log::info!("scene: loaded {} objects ({}x{})", self.len(), self.width, self.height);
    }

    // =============================================================
    // Selection
    // =============================================================

    #[must_use]
    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    #[must_use]
    pub fn selected_entity(&self) -> Option<&Entity> {
        self.selected.and_then(|id| self.entities.get(&id))
    }

    /// Select a selectable entity. Returns `false` when the id is unknown or
    /// the entity is not selectable.
    pub fn select(&mut self, id: EntityId) -> bool {
        if !self.entities.get(&id).is_some_and(|e| e.selectable) {
            return false;
        }
        match self.selected.replace(id) {
            Some(previous) if previous == id => {}
            Some(previous) => {
                self.dirty = true;
                self.bus.emit(&SceneEvent::SelectionUpdated { previous, id });
            }
            None => {
                self.dirty = true;
                self.bus.emit(&SceneEvent::SelectionCreated { id });
            }
        }
        true
    }

    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.selected.take() {
            self.dirty = true;
            self.bus.emit(&SceneEvent::SelectionCleared { previous });
        }
    }

    // =============================================================
    // Z-order
    // =============================================================

    pub fn bring_to_front(&mut self, id: &EntityId) -> bool {
        let last = self.order.len().saturating_sub(1);
        self.move_to(id, last)
    }

    pub fn send_to_back(&mut self, id: &EntityId) -> bool {
        let floor = self.floor_index();
        self.move_to(id, floor)
    }

    pub fn bring_forward(&mut self, id: &EntityId) -> bool {
        match self.index_of(id) {
            Some(index) => self.move_to(id, index + 1),
            None => false,
        }
    }

    pub fn send_backward(&mut self, id: &EntityId) -> bool {
        match self.index_of(id) {
            Some(index) => self.move_to(id, index.saturating_sub(1)),
            None => false,
        }
    }

    /// Move `id` to `target`, clamped to the foreground range. The background
    /// never moves. Returns `true` if the order changed.
    fn move_to(&mut self, id: &EntityId, target: usize) -> bool {
        if self.entities.get(id).is_none_or(Entity::is_background) {
            return false;
        }
        let Some(from) = self.index_of(id) else {
            return false;
        };
        let last = self.order.len().saturating_sub(1);
        let target = target.clamp(self.floor_index(), last);
        if from == target {
            return false;
        }
        let moved = self.order.remove(from);
        self.order.insert(target, moved);
        self.dirty = true;
        true
    }

    // =============================================================
    // Bitmaps
    // =============================================================

    /// Record that `src` has a decoded bitmap and flip every image entity
    /// using it to ready. Marks the scene dirty once.
    pub fn mark_bitmap_ready(&mut self, src: &str, width: u32, height: u32) -> usize {
        self.bitmaps.insert(src.to_string(), (width, height));
        let mut updated = 0;
        for entity in self.entities.values_mut() {
            if let EntityKind::Image { src: ref s, ref mut bitmap } = entity.kind {
                if s == src && *bitmap == BitmapState::Pending {
                    *bitmap = BitmapState::Ready { width, height };
                    updated += 1;
                }
            }
        }
        self.dirty = true;
        updated
    }

    /// Distinct image sources still waiting for a bitmap, in paint order.
    #[must_use]
    pub fn pending_image_sources(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.iter()
            .filter(|e| e.is_pending_image())
            .filter_map(Entity::image_src)
            .filter(|src| seen.insert(*src))
            .map(str::to_string)
            .collect()
    }

    /// Remove every image entity whose source is `src`. Returns the count.
    pub fn drop_images_with_src(&mut self, src: &str) -> usize {
        let doomed: Vec<EntityId> = self.iter().filter(|e| e.image_src() == Some(src)).map(|e| e.id).collect();
        for id in &doomed {
            self.remove(id);
        }
        doomed.len()
    }

    fn attach_bitmap(&self, entity: &mut Entity) {
        if let EntityKind::Image { ref src, ref mut bitmap } = entity.kind {
            if let Some(&(width, height)) = self.bitmaps.get(src) {
                *bitmap = BitmapState::Ready { width, height };
            }
        }
    }

    // =============================================================
    // Events
    // =============================================================

    pub fn subscribe<F>(&mut self, filter: impl Into<EventFilter>, listener: F) -> SubscriptionId
    where
        F: FnMut(&SceneEvent) + 'static,
    {
        self.bus.subscribe(filter, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn emit(&mut self, event: &SceneEvent) {
        self.bus.emit(event);
    }

    // =============================================================
    // Serialization
    // =============================================================

    /// The scene as a document borrowing its entities.
    #[must_use]
    pub fn document_view(&self, include_background: bool) -> Document<&Entity> {
        Document {
            width: self.width,
            height: self.height,
            objects: self.iter().filter(|e| include_background || !e.is_background()).collect(),
        }
    }

    /// Owned copy of the scene as a document.
    #[must_use]
    pub fn to_document(&self, include_background: bool) -> Document {
        let view = self.document_view(include_background);
        Document { width: view.width, height: view.height, objects: view.objects.into_iter().cloned().collect() }
    }

    /// Serialize the scene as a persistence document.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] if serialization fails.
    pub fn to_json(&self, include_background: bool) -> Result<String, EditorError> {
        self.document_view(include_background).to_json()
    }
}
