//! Typed publish/subscribe table for scene events.
//!
//! The [`EventBus`] is owned by the scene and dispatches synchronously: every
//! matching listener has run by the time [`EventBus::emit`] returns. Listeners
//! are invoked in subscription order.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::entity::EntityId;

/// Something that happened to the scene, the selection, or the viewport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum SceneEvent {
    #[serde(rename = "object:added")]
    ObjectAdded { id: EntityId },
    #[serde(rename = "object:removed")]
    ObjectRemoved { id: EntityId },
    /// A gesture or property edit finished.
    #[serde(rename = "object:modified")]
    ObjectModified { id: EntityId },
    #[serde(rename = "object:moving")]
    ObjectMoving { id: EntityId },
    #[serde(rename = "object:scaling")]
    ObjectScaling { id: EntityId },
    #[serde(rename = "object:rotating")]
    ObjectRotating { id: EntityId },
    #[serde(rename = "selection:created")]
    SelectionCreated { id: EntityId },
    #[serde(rename = "selection:updated")]
    SelectionUpdated { previous: EntityId, id: EntityId },
    #[serde(rename = "selection:cleared")]
    SelectionCleared { previous: EntityId },
    /// Pointer went down; `x`/`y` are scene coordinates.
    #[serde(rename = "mouse:down")]
    MouseDown { x: f64, y: f64, target: Option<EntityId> },
    #[serde(rename = "mouse:dblclick")]
    MouseDblClick { x: f64, y: f64, target: Option<EntityId> },
    #[serde(rename = "viewport:changed")]
    ViewportChanged { zoom: f64, pan_x: f64, pan_y: f64 },
}

impl SceneEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ObjectAdded { .. } => EventKind::ObjectAdded,
            Self::ObjectRemoved { .. } => EventKind::ObjectRemoved,
            Self::ObjectModified { .. } => EventKind::ObjectModified,
            Self::ObjectMoving { .. } => EventKind::ObjectMoving,
            Self::ObjectScaling { .. } => EventKind::ObjectScaling,
            Self::ObjectRotating { .. } => EventKind::ObjectRotating,
            Self::SelectionCreated { .. } => EventKind::SelectionCreated,
            Self::SelectionUpdated { .. } => EventKind::SelectionUpdated,
            Self::SelectionCleared { .. } => EventKind::SelectionCleared,
            Self::MouseDown { .. } => EventKind::MouseDown,
            Self::MouseDblClick { .. } => EventKind::MouseDblClick,
            Self::ViewportChanged { .. } => EventKind::ViewportChanged,
        }
    }
}

/// Event discriminant used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ObjectAdded,
    ObjectRemoved,
    ObjectModified,
    ObjectMoving,
    ObjectScaling,
    ObjectRotating,
    SelectionCreated,
    SelectionUpdated,
    SelectionCleared,
    MouseDown,
    MouseDblClick,
    ViewportChanged,
}

impl EventKind {
    pub const ALL: [Self; 12] = [
        Self::ObjectAdded,
        Self::ObjectRemoved,
        Self::ObjectModified,
        Self::ObjectMoving,
        Self::ObjectScaling,
        Self::ObjectRotating,
        Self::SelectionCreated,
        Self::SelectionUpdated,
        Self::SelectionCleared,
        Self::MouseDown,
        Self::MouseDblClick,
        Self::ViewportChanged,
    ];

    /// Wire name, e.g. `object:added`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObjectAdded => "object:added",
            Self::ObjectRemoved => "object:removed",
            Self::ObjectModified => "object:modified",
            Self::ObjectMoving => "object:moving",
            Self::ObjectScaling => "object:scaling",
            Self::ObjectRotating => "object:rotating",
            Self::SelectionCreated => "selection:created",
            Self::SelectionUpdated => "selection:updated",
            Self::SelectionCleared => "selection:cleared",
            Self::MouseDown => "mouse:down",
            Self::MouseDblClick => "mouse:dblclick",
            Self::ViewportChanged => "viewport:changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a host subscribes to a name that is not an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0}")]
pub struct UnknownEventName(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s).ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

/// Which events a listener receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventFilter {
    #[default]
    All,
    Kinds(Vec<EventKind>),
}

impl EventFilter {
    #[must_use]
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            Self::All => true,
            Self::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

impl From<EventKind> for EventFilter {
    fn from(kind: EventKind) -> Self {
        Self::Kinds(vec![kind])
    }
}

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type Listener = Box<dyn FnMut(&SceneEvent)>;

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, EventFilter, Listener)>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.listeners.len()).finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events passing `filter`.
    pub fn subscribe<F>(&mut self, filter: impl Into<EventFilter>, listener: F) -> SubscriptionId
    where
        F: FnMut(&SceneEvent) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, filter.into(), Box::new(listener)));
        log::debug!("events: {id} added");
        id
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _, _)| *sub != id);
        let removed = self.listeners.len() != before;
        if removed {
            log::debug!("events: {id} removed");
        }
        removed
    }

    /// Deliver `event` to every matching listener.
    pub fn emit(&mut self, event: &SceneEvent) {
        let kind = event.kind();
        for (_, filter, listener) in &mut self.listeners {
            if filter.matches(kind) {
                listener(event);
            }
        }
    }
}
