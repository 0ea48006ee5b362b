//! Headless object graph of a Climact schematic.
//!
//! The canvas owns every vertex, terminal, handle and connector in
//! generational arenas. Anything outside the canvas (actions, the session)
//! refers to objects through keys only, so a destroyed object is detected by
//! a failed lookup instead of a destruction callback.

pub mod canvas;
pub mod entity;

pub use canvas::{Canvas, CanvasId, SceneEvent};
pub use entity::{
    ConnectorId, EntityClass, EntityState, HandleId, HandleOwner, ItemRef, TerminalId, VertexId,
};
