use tracing::debug;

use crate::schematic::{Canvas, CanvasId, ConnectorId, EntityState, HandleId, ItemRef};
use super::connect::{ConnectAction, DisconnectAction};
use super::handle::{CreateHandleAction, RemoveHandleAction};
use super::stream::{CreateStreamAction, RemoveStreamAction};
use super::vertex::{CreateEntityAction, RemoveEntityAction};

/// Non-owning references captured when an action is built.
///
/// The action is obsolete once the flag is set, the canvas has been reset,
/// or any captured key stops resolving.
#[derive(Debug, Clone)]
pub(crate) struct WeakRefs {
    canvas: CanvasId,
    items: Vec<ItemRef>,
    obsolete: bool,
}

impl WeakRefs {
    pub(crate) fn capture(canvas: &Canvas, items: &[ItemRef]) -> Self {
        Self {
            canvas: canvas.id(),
            items: items.to_vec(),
            obsolete: false,
        }
    }

    pub(crate) fn is_obsolete(&self, canvas: &Canvas) -> bool {
        self.obsolete
            || canvas.id() != self.canvas
            || self.items.iter().any(|item| !canvas.contains(*item))
    }

    pub(crate) fn set_obsolete(&mut self) {
        self.obsolete = true;
    }

    pub(crate) fn set_relevant(&mut self) {
        self.obsolete = false;
    }

    /// Latch obsolescence and log the skipped call. Returns true when the
    /// caller must bail out.
    pub(crate) fn stale(&mut self, canvas: &Canvas, op: &'static str) -> bool {
        if self.is_obsolete(canvas) {
            self.obsolete = true;
            debug!(op, "reference(s) destroyed, skipping");
            return true;
        }
        false
    }
}

/// A handle's live pairing, read before the pairing is broken so it can be
/// restored later.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Link {
    pub handle: HandleId,
    pub conjugate: HandleId,
    pub connector: ConnectorId,
}

impl Link {
    pub(crate) fn of(canvas: &Canvas, handle: HandleId) -> Option<Self> {
        let h = canvas.handle(handle)?;
        if !h.connected {
            return None;
        }
        let connector = h.connector.filter(|c| canvas.connector(*c).is_some())?;
        Some(Self {
            handle,
            conjugate: h.conjugate?,
            connector,
        })
    }

    /// Like [`Link::of`], but only when the conjugate is still locked to the
    /// same connector. A hidden handle keeps its old pairing after its
    /// conjugate has been wired elsewhere.
    pub(crate) fn live(canvas: &Canvas, handle: HandleId) -> Option<Self> {
        let link = Self::of(canvas, handle)?;
        let far = canvas.handle(link.conjugate)?;
        (far.connected && far.connector == Some(link.connector)).then_some(link)
    }

    /// Free the far side and hide the connector. The near handle keeps its
    /// pairing so [`Link::restore`] can rebuild it.
    pub(crate) fn sever(self, canvas: &mut Canvas) {
        canvas.free(self.conjugate);
        canvas.set_visible(self.connector.into(), false);
        canvas.block_signals(self.connector.into(), true);
        canvas.set_connector_state(self.connector, EntityState::Hidden);
    }

    pub(crate) fn restore(self, canvas: &mut Canvas) {
        canvas.lock(self.conjugate, self.handle, self.connector);
        canvas.block_signals(self.connector.into(), false);
        canvas.set_visible(self.connector.into(), true);
        canvas.set_connector_state(self.connector, EntityState::Active);
    }
}

/// One undoable unit of work
#[derive(Debug, Clone)]
pub enum Action {
    CreateVertex(CreateEntityAction),
    RemoveVertex(RemoveEntityAction),
    CreateStream(CreateStreamAction),
    RemoveStream(RemoveStreamAction),
    CreateHandle(CreateHandleAction),
    RemoveHandle(RemoveHandleAction),
    Connect(ConnectAction),
    Disconnect(DisconnectAction),
    Batch(BatchActions),
}

macro_rules! dispatch {
    ($action:expr, $inner:ident => $call:expr) => {
        match $action {
            Action::CreateVertex($inner) => $call,
            Action::RemoveVertex($inner) => $call,
            Action::CreateStream($inner) => $call,
            Action::RemoveStream($inner) => $call,
            Action::CreateHandle($inner) => $call,
            Action::RemoveHandle($inner) => $call,
            Action::Connect($inner) => $call,
            Action::Disconnect($inner) => $call,
            Action::Batch($inner) => $call,
        }
    };
}

impl Action {
    pub fn execute(&mut self, canvas: &mut Canvas) {
        dispatch!(self, a => a.execute(canvas))
    }

    pub fn undo(&mut self, canvas: &mut Canvas) {
        dispatch!(self, a => a.undo(canvas))
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        dispatch!(self, a => a.redo(canvas))
    }

    /// Deferred deletion, run when the action leaves the history
    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        dispatch!(self, a => a.cleanup(canvas))
    }

    pub fn is_obsolete(&self, canvas: &Canvas) -> bool {
        dispatch!(self, a => a.is_obsolete(canvas))
    }

    pub fn set_obsolete(&mut self) {
        dispatch!(self, a => a.set_obsolete())
    }

    pub fn set_relevant(&mut self) {
        dispatch!(self, a => a.set_relevant())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::CreateVertex(_) => "create vertex",
            Action::RemoveVertex(_) => "remove vertex",
            Action::CreateStream(_) => "create stream",
            Action::RemoveStream(_) => "remove stream",
            Action::CreateHandle(_) => "create handle",
            Action::RemoveHandle(_) => "remove handle",
            Action::Connect(_) => "connect",
            Action::Disconnect(_) => "disconnect",
            Action::Batch(_) => "batch",
        }
    }
}

impl From<CreateEntityAction> for Action {
    fn from(a: CreateEntityAction) -> Self {
        Action::CreateVertex(a)
    }
}

impl From<RemoveEntityAction> for Action {
    fn from(a: RemoveEntityAction) -> Self {
        Action::RemoveVertex(a)
    }
}

impl From<CreateStreamAction> for Action {
    fn from(a: CreateStreamAction) -> Self {
        Action::CreateStream(a)
    }
}

impl From<RemoveStreamAction> for Action {
    fn from(a: RemoveStreamAction) -> Self {
        Action::RemoveStream(a)
    }
}

impl From<CreateHandleAction> for Action {
    fn from(a: CreateHandleAction) -> Self {
        Action::CreateHandle(a)
    }
}

impl From<RemoveHandleAction> for Action {
    fn from(a: RemoveHandleAction) -> Self {
        Action::RemoveHandle(a)
    }
}

impl From<ConnectAction> for Action {
    fn from(a: ConnectAction) -> Self {
        Action::Connect(a)
    }
}

impl From<DisconnectAction> for Action {
    fn from(a: DisconnectAction) -> Self {
        Action::Disconnect(a)
    }
}

impl From<BatchActions> for Action {
    fn from(a: BatchActions) -> Self {
        Action::Batch(a)
    }
}

/// Several actions recorded as one gesture.
///
/// `execute` runs forward; `undo` and `redo` run in reverse so that objects
/// created early in the batch are torn down last.
#[derive(Debug, Clone, Default)]
pub struct BatchActions {
    actions: Vec<Action>,
}

impl BatchActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn push(&mut self, action: impl Into<Action>) {
        self.actions.push(action.into());
    }

    /// Append a sequence of actions. A single action goes in as `[action]`.
    pub fn add_to_batch<I>(&mut self, actions: I)
    where
        I: IntoIterator<Item = Action>,
    {
        self.actions.extend(actions);
    }

    /// True only when every child is obsolete
    pub fn is_obsolete(&self, canvas: &Canvas) -> bool {
        !self.actions.is_empty() && self.actions.iter().all(|a| a.is_obsolete(canvas))
    }

    pub fn set_obsolete(&mut self) {
        for action in &mut self.actions {
            action.set_obsolete();
        }
    }

    pub fn set_relevant(&mut self) {
        for action in &mut self.actions {
            action.set_relevant();
        }
    }

    pub fn execute(&mut self, canvas: &mut Canvas) {
        for action in &mut self.actions {
            action.execute(canvas);
        }
    }

    pub fn undo(&mut self, canvas: &mut Canvas) {
        for action in self.actions.iter_mut().rev() {
            action.undo(canvas);
        }
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        for action in self.actions.iter_mut().rev() {
            action.redo(canvas);
        }
    }

    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        for action in &mut self.actions {
            action.cleanup(canvas);
        }
    }
}

impl FromIterator<Action> for BatchActions {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}
