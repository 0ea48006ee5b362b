use tracing::{debug, info};

use crate::error::SchematicError;
use crate::schematic::{Canvas, EntityState, TerminalId};
use super::action::{Link, WeakRefs};

fn require_terminal(canvas: &Canvas, terminal: TerminalId) -> Result<(), SchematicError> {
    match canvas.terminal(terminal) {
        Some(_) => Ok(()),
        None => Err(SchematicError::DeadTerminal),
    }
}

fn link(canvas: &Canvas, terminal: TerminalId) -> Option<Link> {
    let handle = canvas.terminal(terminal)?.handle;
    Link::of(canvas, handle)
}

fn hide(canvas: &mut Canvas, terminal: TerminalId) {
    let live = canvas.terminal(terminal).and_then(|t| Link::live(canvas, t.handle));
    if let Some(link) = live {
        link.sever(canvas);
    }
    canvas.set_terminal_state(terminal, EntityState::Hidden);
    canvas.set_visible(terminal.into(), false);
    canvas.block_signals(terminal.into(), true);
}

fn show(canvas: &mut Canvas, terminal: TerminalId) {
    if let Some(link) = link(canvas, terminal) {
        link.restore(canvas);
    }
    canvas.set_terminal_state(terminal, EntityState::Active);
    canvas.block_signals(terminal.into(), false);
    canvas.set_visible(terminal.into(), true);
}

fn purge(canvas: &mut Canvas, terminal: TerminalId) {
    if canvas.terminal_state(terminal) != Some(EntityState::Hidden) {
        debug!("terminal is active or already removed, keeping it");
        return;
    }
    if let Some(link) = link(canvas, terminal) {
        canvas.destroy(link.connector.into());
    }

    let uid = canvas.terminal(terminal).map(|t| t.uid.clone()).unwrap_or_default();
    canvas.remove_terminal_state(terminal);
    canvas.destroy(terminal.into());
    info!(uid = %uid, "terminal deleted");
}

/// Recorded when the user adds a stream terminal
#[derive(Debug, Clone)]
pub struct CreateStreamAction {
    refs: WeakRefs,
    terminal: TerminalId,
}

impl CreateStreamAction {
    pub fn new(canvas: &Canvas, terminal: TerminalId) -> Result<Self, SchematicError> {
        require_terminal(canvas, terminal)?;
        Ok(Self {
            refs: WeakRefs::capture(canvas, &[terminal.into()]),
            terminal,
        })
    }

    pub fn terminal(&self) -> TerminalId {
        self.terminal
    }

    pub fn is_obsolete(&self, canvas: &Canvas) -> bool {
        self.refs.is_obsolete(canvas)
    }

    pub fn set_obsolete(&mut self) {
        self.refs.set_obsolete();
    }

    pub fn set_relevant(&mut self) {
        self.refs.set_relevant();
    }

    pub fn execute(&mut self, canvas: &mut Canvas) {
        self.refs.stale(canvas, "execute");
    }

    pub fn undo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "undo") {
            return;
        }
        hide(canvas, self.terminal);
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "redo") {
            return;
        }
        show(canvas, self.terminal);
    }

    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "cleanup") {
            return;
        }
        purge(canvas, self.terminal);
    }
}

/// Recorded when the user deletes a stream terminal
#[derive(Debug, Clone)]
pub struct RemoveStreamAction {
    refs: WeakRefs,
    terminal: TerminalId,
}

impl RemoveStreamAction {
    pub fn new(canvas: &Canvas, terminal: TerminalId) -> Result<Self, SchematicError> {
        require_terminal(canvas, terminal)?;
        Ok(Self {
            refs: WeakRefs::capture(canvas, &[terminal.into()]),
            terminal,
        })
    }

    pub fn terminal(&self) -> TerminalId {
        self.terminal
    }

    pub fn is_obsolete(&self, canvas: &Canvas) -> bool {
        self.refs.is_obsolete(canvas)
    }

    pub fn set_obsolete(&mut self) {
        self.refs.set_obsolete();
    }

    pub fn set_relevant(&mut self) {
        self.refs.set_relevant();
    }

    pub fn execute(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "execute") {
            return;
        }
        hide(canvas, self.terminal);
    }

    pub fn undo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "undo") {
            return;
        }
        show(canvas, self.terminal);
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        self.execute(canvas);
    }

    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "cleanup") {
            return;
        }
        purge(canvas, self.terminal);
    }
}
