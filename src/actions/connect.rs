use tracing::{debug, info};

use crate::error::SchematicError;
use crate::schematic::{Canvas, ConnectorId, EntityState, HandleId};
use super::action::WeakRefs;

/// Only the connector is tracked; its endpoints may die first when a
/// vertex removal in the same batch is cleaned up.
fn capture(canvas: &Canvas, connector: ConnectorId) -> Result<(WeakRefs, HandleId, HandleId), SchematicError> {
    let c = canvas.connector(connector).ok_or(SchematicError::DeadConnector)?;
    let (origin, target) = (c.origin, c.target);
    Ok((WeakRefs::capture(canvas, &[connector.into()]), origin, target))
}

fn pair(canvas: &mut Canvas, connector: ConnectorId, origin: HandleId, target: HandleId) {
    canvas.lock(origin, target, connector);
    canvas.lock(target, origin, connector);
    canvas.block_signals(connector.into(), false);
    canvas.set_visible(connector.into(), true);
    canvas.set_connector_state(connector, EntityState::Active);
}

fn unpair(canvas: &mut Canvas, connector: ConnectorId, origin: HandleId, target: HandleId) {
    canvas.free(origin);
    canvas.free(target);
    canvas.set_visible(connector.into(), false);
    canvas.block_signals(connector.into(), true);
}

fn delete(canvas: &mut Canvas, connector: ConnectorId) {
    let uid = canvas.connector(connector).map(|c| c.uid.clone()).unwrap_or_default();
    canvas.remove_connector_state(connector);
    canvas.destroy(connector.into());
    info!(uid = %uid, "connector deleted");
}

/// Recorded for a newly drawn connection
#[derive(Debug, Clone)]
pub struct ConnectAction {
    refs: WeakRefs,
    connector: ConnectorId,
    origin: HandleId,
    target: HandleId,
}

impl ConnectAction {
    pub fn new(canvas: &Canvas, connector: ConnectorId) -> Result<Self, SchematicError> {
        let (refs, origin, target) = capture(canvas, connector)?;
        Ok(Self {
            refs,
            connector,
            origin,
            target,
        })
    }

    pub fn connector(&self) -> ConnectorId {
        self.connector
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
        unpair(canvas, self.connector, self.origin, self.target);
        canvas.set_connector_state(self.connector, EntityState::Hidden);
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "redo") {
            return;
        }
        pair(canvas, self.connector, self.origin, self.target);
    }

    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "cleanup") {
            return;
        }
        if canvas.connector_state(self.connector) != Some(EntityState::Hidden) {
            debug!("connector is active or already removed, keeping it");
            return;
        }
        delete(canvas, self.connector);
    }
}

/// Recorded for an explicit disconnect gesture.
///
/// Unlike a vertex removal, the connector leaves the connector database
/// right away instead of being marked hidden.
#[derive(Debug, Clone)]
pub struct DisconnectAction {
    refs: WeakRefs,
    connector: ConnectorId,
    origin: HandleId,
    target: HandleId,
}

impl DisconnectAction {
    pub fn new(canvas: &Canvas, connector: ConnectorId) -> Result<Self, SchematicError> {
        let (refs, origin, target) = capture(canvas, connector)?;
        Ok(Self {
            refs,
            connector,
            origin,
            target,
        })
    }

    pub fn connector(&self) -> ConnectorId {
        self.connector
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
        unpair(canvas, self.connector, self.origin, self.target);
        canvas.remove_connector_state(self.connector);
    }

    pub fn undo(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "undo") {
            return;
        }
        pair(canvas, self.connector, self.origin, self.target);
    }

    pub fn redo(&mut self, canvas: &mut Canvas) {
        self.execute(canvas);
    }

    /// Deletes the connector unless it is active again
    pub fn cleanup(&mut self, canvas: &mut Canvas) {
        if self.refs.stale(canvas, "cleanup") {
            return;
        }
        if canvas.connector_state(self.connector) == Some(EntityState::Active) {
            debug!("connector is active, keeping it");
            return;
        }
        delete(canvas, self.connector);
    }
}
