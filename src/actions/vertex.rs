use tracing::{debug, info};

use crate::error::SchematicError;
use crate::schematic::{Canvas, EntityState, VertexId};
use super::action::{Link, WeakRefs};

fn require_vertex(canvas: &Canvas, vertex: VertexId) -> Result<(), SchematicError> {
    match canvas.vertex(vertex) {
        Some(_) => Ok(()),
        None => Err(SchematicError::DeadVertex),
    }
}

fn hide(canvas: &mut Canvas, vertex: VertexId) {
    canvas.set_node_state(vertex, EntityState::Hidden);
    canvas.set_visible(vertex.into(), false);
    canvas.block_signals(vertex.into(), true);
}

fn show(canvas: &mut Canvas, vertex: VertexId) {
    canvas.set_node_state(vertex, EntityState::Active);
    canvas.block_signals(vertex.into(), false);
    canvas.set_visible(vertex.into(), true);
}

/// Live links of every active handle of `vertex`, inputs first. Handles
/// hidden by a pending handle removal are skipped.
fn links(canvas: &Canvas, vertex: VertexId) -> Vec<Link> {
    canvas
        .vertex(vertex)
        .map(|v| v.all_handles())
        .unwrap_or_default()
        .into_iter()
        .filter(|handle| canvas.handle_state(vertex, *handle) != Some(EntityState::Hidden))
        .filter_map(|handle| Link::live(canvas, handle))
        .collect()
}

/// Delete `vertex` for good if the node database still lists it as hidden.
/// Connectors held by its handles go first.
fn purge(canvas: &mut Canvas, vertex: VertexId, with_connectors: bool) {
    if canvas.node_state(vertex) != Some(EntityState::Hidden) {
        debug!("vertex is active or already removed, keeping it");
        return;
    }

    if with_connectors {
        let handles = canvas.vertex(vertex).map(|v| v.all_handles()).unwrap_or_default();
        for handle in handles {
            let held = canvas
                .handle(handle)
                .filter(|h| h.connected)
                .and_then(|h| h.connector);
            if let Some(connector) = held {
                canvas.destroy(connector.into());
            }
        }
    }

    let uid = canvas.vertex(vertex).map(|v| v.uid.clone()).unwrap_or_default();
    canvas.remove_node_state(vertex);
    canvas.destroy(vertex.into());
    info!(uid = %uid, "vertex deleted");
}

/// Recorded when the user creates a vertex.
///
/// The vertex already exists when the action is built, so `execute` does
/// nothing; undo hides it and cleanup deletes it if it is still hidden.
#[derive(Debug, Clone)]
pub struct CreateEntityAction {
    refs: WeakRefs,
    vertex: VertexId,
}

impl CreateEntityAction {
    pub fn new(canvas: &Canvas, vertex: VertexId) -> Result<Self, SchematicError> {
        require_vertex(canvas, vertex)?;
        Ok(Self {
            refs: WeakRefs::capture(canvas, &[vertex.into()]),
            vertex,
        })
    }

    pub fn vertex(&self) -> VertexId {
        self.vertex
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
        hide(canvas, self.vertex);
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "redo") {
            return;
        }
        show(canvas, self.vertex);
    }

    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "cleanup") {
            return;
        }
        purge(canvas, self.vertex, false);
    }
}

/// Recorded when the user deletes a vertex.
///
/// Executing detaches every connected handle from its conjugate and hides
/// the connectors (taking their symbols out of the live namespace) before
/// hiding the vertex itself.
#[derive(Debug, Clone)]
pub struct RemoveEntityAction {
    refs: WeakRefs,
    vertex: VertexId,
    severed: Vec<Link>,
}

impl RemoveEntityAction {
    pub fn new(canvas: &Canvas, vertex: VertexId) -> Result<Self, SchematicError> {
        require_vertex(canvas, vertex)?;
        Ok(Self {
            refs: WeakRefs::capture(canvas, &[vertex.into()]),
            vertex,
            severed: Vec::new(),
        })
    }

    pub fn vertex(&self) -> VertexId {
        self.vertex
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
        self.severed = links(canvas, self.vertex);
        for link in &self.severed {
            link.sever(canvas);
        }
        hide(canvas, self.vertex);
    }

    /// Only the links this action severed are restored
    pub fn undo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "undo") {
            return;
        }
        for link in self.severed.drain(..) {
            link.restore(canvas);
        }
        show(canvas, self.vertex);
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        self.execute(canvas);
    }

    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "cleanup") {
            return;
        }
        purge(canvas, self.vertex, true);
    }
}
