//! Linear undo/redo over scene snapshots.
//!
//! A snapshot is the scene serialized without its background plus the
//! selected id. Recording either happens immediately ([`History::record_now`])
//! or after a quiet period ([`History::record_debounced`]), which keeps one
//! pending deadline that the frame loop polls with [`History::poll`].
//!
//! Restoring a snapshot mutates the scene, which would normally record new
//! history. A [`SuppressGuard`] blocks recording for as long as it is alive.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::entity::EntityId;
use crate::error::EditorError;
use crate::scene::{Scene, parse_document};

/// One undo step.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Scene document JSON, background excluded.
    pub json: String,
    pub selected: Option<EntityId>,
}

impl Snapshot {
    /// Capture the current scene.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] if the scene cannot be serialized.
    pub fn capture(scene: &Scene) -> Result<Self, EditorError> {
        Ok(Self { json: scene.to_json(false)?, selected: scene.selected() })
    }
}

/// Blocks history recording while alive. Guards nest.
#[derive(Debug)]
pub struct SuppressGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[derive(Debug)]
pub struct History {
    entries: VecDeque<Snapshot>,
    /// Position of the snapshot matching the scene; meaningless while empty.
    index: usize,
    limit: usize,
    suppress_depth: Rc<Cell<usize>>,
    pending_deadline: Option<f64>,
}

impl History {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            index: 0,
            limit: limit.max(1),
            suppress_depth: Rc::new(Cell::new(0)),
            pending_deadline: None,
        }
    }

    /// Drop all entries and record `scene` as the new baseline.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] if the scene cannot be serialized.
    pub fn reset(&mut self, scene: &Scene) -> Result<(), EditorError> {
        self.entries.clear();
        self.index = 0;
        self.pending_deadline = None;
        self.entries.push_back(Snapshot::capture(scene)?);
        Ok(())
    }

    // =============================================================
    // Suppression
    // =============================================================

    #[must_use]
    pub fn suppress(&self) -> SuppressGuard {
        self.suppress_depth.set(self.suppress_depth.get() + 1);
        SuppressGuard { depth: Rc::clone(&self.suppress_depth) }
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppress_depth.get() > 0
    }

    // =============================================================
    // Recording
    // =============================================================

    /// Record the scene now. Returns `true` if an entry was appended.
    ///
    /// Skipped while suppressed or when the scene matches the current entry.
    /// Any pending debounced record is superseded.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] if the scene cannot be serialized.
    pub fn record_now(&mut self, scene: &Scene) -> Result<bool, EditorError> {
        if self.is_suppressed() {
            return Ok(false);
        }
        self.pending_deadline = None;
        let snapshot = Snapshot::capture(scene)?;
        if self.entries.get(self.index) == Some(&snapshot) {
            return Ok(false);
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(snapshot);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
        log::debug!("history: recorded entry {} of {}", self.index + 1, self.entries.len());
        Ok(true)
    }

    /// Schedule a record `delay_ms` after `now_ms`, replacing any pending one.
    pub fn record_debounced(&mut self, now_ms: f64, delay_ms: f64) {
        if self.is_suppressed() {
            return;
        }
        self.pending_deadline = Some(now_ms + delay_ms.max(0.0));
    }

    /// When the pending debounced record falls due, if one is scheduled.
    #[must_use]
    pub fn pending_deadline(&self) -> Option<f64> {
        self.pending_deadline
    }

    /// Fire the pending record if its deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] if the scene cannot be serialized.
    pub fn poll(&mut self, scene: &Scene, now_ms: f64) -> Result<bool, EditorError> {
        match self.pending_deadline {
            Some(deadline) if now_ms >= deadline => self.record_now(scene),
            _ => Ok(false),
        }
    }

    /// Fire the pending record immediately, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Json`] if the scene cannot be serialized.
    pub fn flush(&mut self, scene: &Scene) -> Result<bool, EditorError> {
        if self.pending_deadline.is_some() { self.record_now(scene) } else { Ok(false) }
    }

    // =============================================================
    // Undo / redo
    // =============================================================

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index > 0 && !self.entries.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Step back one entry. Returns `true` if the scene changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot cannot be serialized or parsed. The
    /// current position is kept in that case.
    pub fn undo(&mut self, scene: &mut Scene) -> Result<bool, EditorError> {
        if self.is_suppressed() {
            return Ok(false);
        }
        self.flush(scene)?;
        if !self.can_undo() {
            return Ok(false);
        }
        self.step_to(scene, self.index - 1)?;
        Ok(true)
    }

    /// Step forward one entry. Returns `true` if the scene changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot cannot be serialized or parsed. The
    /// current position is kept in that case.
    pub fn redo(&mut self, scene: &mut Scene) -> Result<bool, EditorError> {
        if self.is_suppressed() {
            return Ok(false);
        }
        self.flush(scene)?;
        if !self.can_redo() {
            return Ok(false);
        }
        self.step_to(scene, self.index + 1)?;
        Ok(true)
    }

    fn step_to(&mut self, scene: &mut Scene, target: usize) -> Result<(), EditorError> {
        let Some(snapshot) = self.entries.get(target) else {
            return Ok(());
        };
        let doc = parse_document(&snapshot.json)?;
        let selected = snapshot.selected;

        let _guard = self.suppress();
        scene.replace_foreground(doc.objects);
        match selected {
            Some(id) if scene.select(id) => {}
            _ => scene.clear_selection(),
        }
        self.index = target;
        log::debug!("history: at entry {} of {}", self.index + 1, self.entries.len());
        Ok(())
    }

    // =============================================================
    // Rewriting
    // =============================================================

    /// Remove every image entity loaded from `src` from all entries, so no
    /// undo or redo can restore it. Entries that become identical to their
    /// predecessor are merged. Returns the number of entries changed.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry cannot be parsed or serialized. No entry
    /// is changed in that case.
    pub fn drop_image_src(&mut self, src: &str) -> Result<usize, EditorError> {
        let mut rewritten = Vec::with_capacity(self.entries.len());
        let mut changed = 0;
        for snapshot in &self.entries {
            let mut doc = parse_document(&snapshot.json)?;
            let before = doc.objects.len();
            doc.objects.retain(|e| e.image_src() != Some(src));
            if doc.objects.len() == before {
                rewritten.push(snapshot.clone());
                continue;
            }
            let selected = snapshot.selected.filter(|id| doc.objects.iter().any(|e| e.id == *id));
            rewritten.push(Snapshot { json: doc.to_json()?, selected });
            changed += 1;
        }

        let mut merged: VecDeque<Snapshot> = VecDeque::with_capacity(rewritten.len());
        let mut index = self.index;
        for (position, snapshot) in rewritten.into_iter().enumerate() {
            if merged.back() == Some(&snapshot) {
                if position <= self.index {
                    index = index.saturating_sub(1);
                }
                continue;
            }
            merged.push_back(snapshot);
        }
        self.index = index.min(merged.len().saturating_sub(1));
        self.entries = merged;
        if changed > 0 {
            log::debug!("history: removed {src} from {changed} entries, {} remain", self.entries.len());
        }
        Ok(changed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the current entry.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}
