use tracing::{debug, info};

use crate::error::SchematicError;
use crate::schematic::{Canvas, EntityState, HandleId, HandleOwner, VertexId};
use super::action::{Link, WeakRefs};

/// Both references must be live and `handle` must belong to `vertex`
fn require_pair(canvas: &Canvas, vertex: VertexId, handle: HandleId) -> Result<(), SchematicError> {
    if canvas.vertex(vertex).is_none() {
        return Err(SchematicError::DeadVertex);
    }
    let h = canvas.handle(handle).ok_or(SchematicError::DeadHandle)?;
    if h.owner != HandleOwner::Vertex(vertex) {
        return Err(SchematicError::NotVertexHandle(h.uid.clone()));
    }
    Ok(())
}

fn hide(canvas: &mut Canvas, vertex: VertexId, handle: HandleId) {
    canvas.set_visible(handle.into(), false);
    canvas.block_signals(handle.into(), true);
    canvas.set_handle_state(vertex, handle, EntityState::Hidden);
}

fn show(canvas: &mut Canvas, vertex: VertexId, handle: HandleId) {
    canvas.block_signals(handle.into(), false);
    canvas.set_visible(handle.into(), true);
    canvas.set_handle_state(vertex, handle, EntityState::Active);
}

fn handle_uid(canvas: &Canvas, handle: HandleId) -> String {
    canvas.handle(handle).map(|h| h.uid.clone()).unwrap_or_default()
}

/// Recorded when the user adds a handle to a vertex
#[derive(Debug, Clone)]
pub struct CreateHandleAction {
    refs: WeakRefs,
    vertex: VertexId,
    handle: HandleId,
}

impl CreateHandleAction {
    pub fn new(canvas: &Canvas, vertex: VertexId, handle: HandleId) -> Result<Self, SchematicError> {
        require_pair(canvas, vertex, handle)?;
        Ok(Self {
            refs: WeakRefs::capture(canvas, &[vertex.into(), handle.into()]),
            vertex,
            handle,
        })
    }

    pub fn handle(&self) -> HandleId {
        self.handle
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
        hide(canvas, self.vertex, self.handle);
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "redo") {
            return;
        }
        show(canvas, self.vertex, self.handle);
    }

    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "cleanup") {
            return;
        }
        if canvas.handle_state(self.vertex, self.handle) != Some(EntityState::Hidden) {
            debug!("handle is active or already removed, keeping it");
            return;
        }

        let uid = handle_uid(canvas, self.handle);
        canvas.remove_handle_state(self.vertex, self.handle);
        canvas.destroy(self.handle.into());
        info!(uid = %uid, "handle deleted");
    }
}

/// Recorded when the user deletes a handle.
///
/// A connected handle is detached from its conjugate and its connector is
/// hidden; cleanup deletes the connector together with the handle.
#[derive(Debug, Clone)]
pub struct RemoveHandleAction {
    refs: WeakRefs,
    vertex: VertexId,
    handle: HandleId,
}

impl RemoveHandleAction {
    pub fn new(canvas: &Canvas, vertex: VertexId, handle: HandleId) -> Result<Self, SchematicError> {
        require_pair(canvas, vertex, handle)?;
        Ok(Self {
            refs: WeakRefs::capture(canvas, &[vertex.into(), handle.into()]),
            vertex,
            handle,
        })
    }

    pub fn handle(&self) -> HandleId {
        self.handle
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
        if let Some(link) = Link::live(canvas, self.handle) {
            link.sever(canvas);
        }
        hide(canvas, self.vertex, self.handle);
    }

    pub fn undo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "undo") {
            return;
        }
        if let Some(link) = Link::of(canvas, self.handle) {
            link.restore(canvas);
        }
        show(canvas, self.vertex, self.handle);
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        self.execute(canvas);
    }

    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "cleanup") {
            return;
        }
        match canvas.handle_state(self.vertex, self.handle) {
            Some(EntityState::Hidden) => {}
            _ => {
                debug!("handle is active or already removed, keeping it");
                return;
            }
        }

        let uid = handle_uid(canvas, self.handle);
        canvas.remove_handle_state(self.vertex, self.handle);
        canvas.free_and_delete_connector(self.handle);
        canvas.destroy(self.handle.into());
        info!(uid = %uid, "handle deleted");
    }
}
