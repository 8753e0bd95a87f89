//! Canvas scene engine for the meme editor.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It owns a
//! fixed-size 2D scene of rectangles, circles, autofit text and images, and
//! the full interaction lifecycle around it: translating raw DOM input into
//! move/resize/rotate gestures, zoom/pan of the viewport, undo/redo history,
//! serialization and bitmap export. The host page is responsible only for
//! wiring DOM events to the engine and reacting to the returned
//! [`engine::Action`]s and scene events.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine, testable [`engine::EngineCore`], frame loop |
//! | [`scene`] | Entity store, z-order, selection and documents |
//! | [`entity`] | Entity model and property patches |
//! | [`layout`] | Shrink-to-fit text layout |
//! | [`viewport`] | Zoom/pan transform and backing-store sizing |
//! | [`input`] | Input event types and the gesture state machine |
//! | [`hit`] | Hit-testing against entities and selection handles |
//! | [`transform`] | Drag, rotate, resize and boundary math |
//! | [`history`] | Snapshot undo/redo with debounce and suppression |
//! | [`events`] | Typed scene event bus |
//! | [`render`] | Scene rendering and export |
//! | [`image`] | Async bitmap loading |
//! | [`config`] | Host-supplied editor configuration |
//! | [`consts`] | Shared numeric constants (zoom limits, minimum sizes, etc.) |

pub mod config;
pub mod consts;
pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod history;
pub mod hit;
pub mod image;
pub mod input;
pub mod layout;
pub mod render;
pub mod scene;
pub mod transform;
pub mod viewport;

/// Route `log` records to the browser console. Safe to call more than once.
pub fn init_logging(level: log::Level) {
    if let Err(err) = console_log::init_with_level(level) {
        log::debug!("logging already initialized: {err}");
    }
}
