use std::collections::VecDeque;

use tracing::{debug, info};

use crate::error::SchematicError;
use crate::schematic::Canvas;
use super::action::Action;

/// Default bound on the undo stack
pub const MAX_UNDO: usize = 3;

/// Bounded undo/redo history for one open canvas.
///
/// Both stacks keep their oldest entry at the front so eviction pops from
/// the front and undo/redo pop from the back.
#[derive(Debug)]
pub struct ActionsManager {
    undo_stack: VecDeque<Action>,
    redo_stack: VecDeque<Action>,
    max_undo: usize,
}

impl Default for ActionsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionsManager {
    pub fn new() -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_undo: MAX_UNDO,
        }
    }

    pub fn with_limit(max_undo: usize) -> Result<Self, SchematicError> {
        if max_undo == 0 {
            return Err(SchematicError::InvalidLimit(max_undo));
        }
        Ok(Self {
            max_undo,
            ..Self::new()
        })
    }

    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Record a new action: make room, invalidate redo history, then execute.
    /// Eviction runs before `execute` so cleanup never sees the graph in the
    /// state the new action leaves it in.
    pub fn do_action(&mut self, canvas: &mut Canvas, mut action: Action) {
        self.prune_undo_to(canvas, self.max_undo - 1);
        self.prune_redo(canvas);
        action.execute(canvas);
        debug!(action = action.label(), "action recorded");
        self.undo_stack.push_back(action);
    }

    /// Undo the most recent action. Returns false when there is nothing left.
    pub fn undo(&mut self, canvas: &mut Canvas) -> bool {
        let Some(mut action) = self.undo_stack.pop_back() else {
            info!("Undo-stack limit reached");
            return false;
        };
        action.undo(canvas);
        debug!(action = action.label(), "undone");
        self.redo_stack.push_back(action);
        true
    }

    /// Redo the most recently undone action. Returns false when there is
    /// nothing left.
    pub fn redo(&mut self, canvas: &mut Canvas) -> bool {
        let Some(mut action) = self.redo_stack.pop_back() else {
            info!("Redo-stack limit reached");
            return false;
        };
        action.redo(canvas);
        debug!(action = action.label(), "redone");
        self.undo_stack.push_back(action);
        true
    }

    /// Evict oldest entries until the undo stack is within its bound
    pub fn prune_undo(&mut self, canvas: &mut Canvas) {
        self.prune_undo_to(canvas, self.max_undo);
    }

    fn prune_undo_to(&mut self, canvas: &mut Canvas, limit: usize) {
        while self.undo_stack.len() > limit {
            if let Some(mut action) = self.undo_stack.pop_front() {
                debug!(action = action.label(), "evicting from undo stack");
                action.cleanup(canvas);
            }
        }
    }

    /// Drain the redo stack, oldest first
    pub fn prune_redo(&mut self, canvas: &mut Canvas) {
        while let Some(mut action) = self.redo_stack.pop_front() {
            debug!(action = action.label(), "evicting from redo stack");
            action.cleanup(canvas);
        }
    }

    /// Drop all history. Used when the document closes.
    pub fn wipe_stack(&mut self, canvas: &mut Canvas) {
        self.prune_undo_to(canvas, 0);
        self.prune_redo(canvas);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Peek at the next undo action without removing it
    pub fn peek_undo(&self) -> Option<&Action> {
        self.undo_stack.back()
    }

    /// Peek at the next redo action without removing it
    pub fn peek_redo(&self) -> Option<&Action> {
        self.redo_stack.back()
    }
}
