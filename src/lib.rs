//! Undo/redo action engine for the Climact process-flow schematic editor.
//!
//! # Main Types
//!
//! - [`schematic::Canvas`] - Object graph of vertices, stream terminals,
//!   handles and connectors
//! - [`actions::ActionsManager`] - Bounded undo/redo history of
//!   [`actions::Action`]s
//! - [`session::Session`] - One canvas and one history driven by script lines

pub mod actions;
pub mod config;
pub mod error;
pub mod schematic;
pub mod session;
