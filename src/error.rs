//! Crate-wide error type.

use wasm_bindgen::JsValue;

use crate::entity::EntityId;
use crate::events::UnknownEventName;

/// Errors surfaced by the editor engine.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The canvas element could not hand out a 2D rendering context.
    #[error("2d drawing context unavailable")]
    NoContext,

    /// A browser API call failed.
    #[error("browser call failed: {0}")]
    Js(String),

    /// A persisted document or patch could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The editor configuration is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// An image bitmap failed to load, including the retry.
    #[error("image failed to load: {src}")]
    ImageLoad { src: String },

    /// An operation referenced an entity that is not in the scene.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Export could not produce a bitmap.
    #[error("export failed: {0}")]
    Export(String),

    /// A host subscribed to an event name that does not exist.
    #[error(transparent)]
    UnknownEvent(#[from] UnknownEventName),
}

impl From<JsValue> for EditorError {
    fn from(value: JsValue) -> Self {
        Self::Js(value.as_string().unwrap_or_else(|| format!("{value:?}")))
    }
}
