//! Undo/redo action engine.
//!
//! Every user gesture that mutates the schematic is recorded as an [`Action`]
//! and handed to the [`ActionsManager`]. Undo only hides objects; the actual
//! deletion is deferred to [`Action::cleanup`], which runs when an action is
//! evicted from history and is gated on the canvas databases.

pub mod action;
pub mod connect;
pub mod handle;
pub mod manager;
pub mod stream;
pub mod vertex;

pub use action::{Action, BatchActions};
pub use connect::{ConnectAction, DisconnectAction};
pub use handle::{CreateHandleAction, RemoveHandleAction};
pub use manager::{ActionsManager, MAX_UNDO};
pub use stream::{CreateStreamAction, RemoveStreamAction};
pub use vertex::{CreateEntityAction, RemoveEntityAction};

#[cfg(test)]
mod test;
