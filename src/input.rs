//! Input model: modifier keys, mouse buttons, and the gesture state machine.
//!
//! `Modifiers`, `Button`, `Key` and `WheelDelta` describe one raw browser
//! event. `InputState` is the gesture being tracked between pointer-down and
//! pointer-up, carrying the context needed to compute each move from the
//! gesture start rather than from the previous event.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::entity::EntityId;
use crate::transform::ResizeGesture;
use crate::viewport::Point;

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Command on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger touch).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

impl Button {
    /// Map a DOM `MouseEvent.button` code.
    #[must_use]
    pub fn from_dom(code: i16) -> Self {
        match code {
            1 => Self::Middle,
            2 => Self::Secondary,
            _ => Self::Primary,
        }
    }
}

/// A keyboard key.
///
/// The inner string holds the key name as reported by the browser (e.g. `"Delete"`, `"ArrowLeft"`, `"z"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    /// Case-insensitive match for single-character keys.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        let mut chars = self.0.chars();
        matches!((chars.next(), chars.next()), (Some(k), None) if k.eq_ignore_ascii_case(&c))
    }

    /// Unit direction for arrow keys.
    #[must_use]
    pub fn arrow(&self) -> Option<(f64, f64)> {
        match self.0.as_str() {
            "ArrowLeft" => Some((-1.0, 0.0)),
            "ArrowRight" => Some((1.0, 0.0)),
            "ArrowUp" => Some((0.0, -1.0)),
            "ArrowDown" => Some((0.0, 1.0)),
            _ => None,
        }
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Internal state for the input state machine.
///
/// Each active variant carries gesture context needed to compute the entity
/// state on every move and to emit final events on pointer-up.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// The user is panning the viewport with the middle button.
    Panning {
        /// Screen-space position of the previous pointer event.
        last_screen: Point,
    },
    /// The user is moving the selected entity.
    Dragging {
        /// Id of the entity being dragged.
        id: EntityId,
        /// Scene-space pointer position at pointer-down.
        start: Point,
        /// Entity center at pointer-down.
        orig: Point,
        /// Whether any move changed the entity.
        moved: bool,
    },
    /// The user is rotating the selected entity with the rotate handle.
    Rotating {
        /// Id of the entity being rotated.
        id: EntityId,
        /// Entity center; the rotation pivot.
        center: Point,
        /// Scene-space pointer position at pointer-down.
        start: Point,
        /// Rotation in degrees at pointer-down.
        orig_angle: f64,
        /// Whether any move changed the entity.
        moved: bool,
    },
    /// The user is resizing the selected entity with one of its eight handles.
    Resizing {
        /// Id of the entity being resized.
        id: EntityId,
        /// Handle and fixed anchor for the gesture.
        gesture: ResizeGesture,
        /// Whether any move changed the entity.
        moved: bool,
    },
    /// The host is showing a text editor for a text entity.
    EditingText {
        /// Id of the text entity being edited.
        id: EntityId,
    },
}

impl InputState {
    /// Id of the entity the gesture acts on, if any.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        match self {
            Self::Idle | Self::Panning { .. } => None,
            Self::Dragging { id, .. } | Self::Rotating { id, .. } | Self::Resizing { id, .. } | Self::EditingText { id } => {
                Some(*id)
            }
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Panning { .. } => "panning",
            Self::Dragging { .. } => "dragging",
            Self::Rotating { .. } => "rotating",
            Self::Resizing { .. } => "resizing",
            Self::EditingText { .. } => "editing-text",
        }
    }
}
