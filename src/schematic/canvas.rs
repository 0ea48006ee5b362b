use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use slotmap::SlotMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::SchematicError;
use super::entity::{
    Connector, ConnectorId, EntityClass, EntityState, Handle, HandleId, HandleOwner, ItemFlags,
    ItemRef, Terminal, TerminalId, Vertex, VertexId,
};

/// Identity of one canvas lifetime. Regenerated by [`Canvas::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasId(Uuid);

impl CanvasId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change notification emitted by the canvas for the view layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    Created(ItemRef),
    Destroyed(ItemRef),
    Visibility(ItemRef, bool),
    SignalsBlocked(ItemRef, bool),
    StateChanged(ItemRef, EntityState),
    StateRemoved(ItemRef),
    Locked {
        handle: HandleId,
        partner: HandleId,
        connector: ConnectorId,
    },
    Freed(HandleId),
}

#[derive(Debug, Default)]
struct Journal {
    revision: u64,
    events: Vec<SceneEvent>,
}

impl Journal {
    /// Every mutation bumps the revision; blocked items stay silent.
    fn record(&mut self, event: SceneEvent, blocked: bool) {
        self.revision += 1;
        if !blocked {
            self.events.push(event);
        }
    }
}

/// Container for every object of one schematic plus the ACTIVE/HIDDEN
/// databases the undo engine coordinates through.
#[derive(Debug)]
pub struct Canvas {
    id: CanvasId,
    vertices: SlotMap<VertexId, Vertex>,
    terminals: SlotMap<TerminalId, Terminal>,
    handles: SlotMap<HandleId, Handle>,
    connectors: SlotMap<ConnectorId, Connector>,
    node_db: IndexMap<VertexId, EntityState>,
    term_db: IndexMap<TerminalId, EntityState>,
    conn_db: IndexMap<ConnectorId, EntityState>,
    next_vertex: usize,
    next_terminal: usize,
    next_handle: usize,
    journal: Journal,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            id: CanvasId::generate(),
            vertices: SlotMap::with_key(),
            terminals: SlotMap::with_key(),
            handles: SlotMap::with_key(),
            connectors: SlotMap::with_key(),
            node_db: IndexMap::new(),
            term_db: IndexMap::new(),
            conn_db: IndexMap::new(),
            next_vertex: 0,
            next_terminal: 0,
            next_handle: 0,
            journal: Journal::default(),
        }
    }

    pub fn id(&self) -> CanvasId {
        self.id
    }

    /// Monotone mutation counter, bumped even for signal-blocked items
    pub fn revision(&self) -> u64 {
        self.journal.revision
    }

    pub fn events(&self) -> &[SceneEvent] {
        &self.journal.events
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.journal.events)
    }

    // === Creation ===

    pub fn create_vertex(&mut self, name: &str) -> VertexId {
        self.next_vertex += 1;
        let uid = format!("V{}", self.next_vertex);
        let id = self.vertices.insert(Vertex::new(uid.clone(), name.to_string()));
        self.node_db.insert(id, EntityState::Active);
        self.journal.record(SceneEvent::Created(id.into()), false);
        debug!(uid = %uid, name, "vertex created");
        id
    }

    /// Create a stream terminal together with its single handle
    pub fn create_terminal(&mut self, name: &str, class: EntityClass) -> TerminalId {
        self.next_terminal += 1;
        self.next_handle += 1;
        let uid = format!("T{}", self.next_terminal);
        let handle_uid = format!("H{}", self.next_handle);

        let handles = &mut self.handles;
        let id = self.terminals.insert_with_key(|tid| {
            let handle = handles.insert(Handle::new(handle_uid, class, HandleOwner::Terminal(tid)));
            Terminal {
                uid: uid.clone(),
                name: name.to_string(),
                class,
                handle,
                flags: ItemFlags::default(),
            }
        });
        self.term_db.insert(id, EntityState::Active);
        self.journal.record(SceneEvent::Created(id.into()), false);
        debug!(uid = %uid, name, class = %class, "terminal created");
        id
    }

    pub fn create_handle(&mut self, vertex: VertexId, class: EntityClass) -> Result<HandleId, SchematicError> {
        if !self.vertices.contains_key(vertex) {
            return Err(SchematicError::DeadVertex);
        }
        self.next_handle += 1;
        let uid = format!("H{}", self.next_handle);
        let id = self.handles.insert(Handle::new(uid.clone(), class, HandleOwner::Vertex(vertex)));
        if let Some(v) = self.vertices.get_mut(vertex) {
            v.handles_mut(class).insert(id, EntityState::Active);
        }
        self.journal.record(SceneEvent::Created(id.into()), false);
        debug!(uid = %uid, class = %class, "handle created");
        Ok(id)
    }

    /// Draw a connector between an output and an input handle.
    /// The output handle always becomes the origin.
    pub fn connect(&mut self, a: HandleId, b: HandleId) -> Result<ConnectorId, SchematicError> {
        let ha = self.handles.get(a).ok_or(SchematicError::DeadHandle)?;
        let hb = self.handles.get(b).ok_or(SchematicError::DeadHandle)?;

        if a == b {
            return Err(SchematicError::SelfConnection(ha.uid.clone()));
        }
        if ha.owner == hb.owner {
            return Err(SchematicError::SameOwner(ha.uid.clone(), hb.uid.clone()));
        }
        if ha.connected {
            return Err(SchematicError::HandleBusy(ha.uid.clone()));
        }
        if hb.connected {
            return Err(SchematicError::HandleBusy(hb.uid.clone()));
        }
        if ha.class == hb.class {
            return Err(SchematicError::ClassMismatch(ha.uid.clone(), hb.uid.clone()));
        }

        let (origin, target) = if ha.class == EntityClass::Out { (a, b) } else { (b, a) };
        let uid = self.next_symbol();
        let id = self.connectors.insert(Connector {
            uid: uid.clone(),
            origin,
            target,
            flags: ItemFlags::default(),
        });
        self.conn_db.insert(id, EntityState::Active);
        self.journal.record(SceneEvent::Created(id.into()), false);
        self.lock(origin, target, id);
        self.lock(target, origin, id);
        debug!(uid = %uid, "connector created");
        Ok(id)
    }

    /// Lowest `S<n>` not taken by an active connector
    fn next_symbol(&self) -> String {
        let taken: HashSet<&str> = self
            .conn_db
            .iter()
            .filter(|(_, state)| state.is_active())
            .filter_map(|(id, _)| self.connectors.get(*id))
            .map(|c| c.uid.as_str())
            .collect();

        (1..)
            .map(|n| format!("S{}", n))
            .find(|symbol| !taken.contains(symbol.as_str()))
            .unwrap_or_default()
    }

    // === Lookup ===

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn terminal(&self, id: TerminalId) -> Option<&Terminal> {
        self.terminals.get(id)
    }

    pub fn handle(&self, id: HandleId) -> Option<&Handle> {
        self.handles.get(id)
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.get(id)
    }

    pub fn contains(&self, item: ItemRef) -> bool {
        match item {
            ItemRef::Vertex(id) => self.vertices.contains_key(id),
            ItemRef::Terminal(id) => self.terminals.contains_key(id),
            ItemRef::Handle(id) => self.handles.contains_key(id),
            ItemRef::Connector(id) => self.connectors.contains_key(id),
        }
    }

    pub fn flags(&self, item: ItemRef) -> Option<ItemFlags> {
        match item {
            ItemRef::Vertex(id) => self.vertices.get(id).map(|v| v.flags),
            ItemRef::Terminal(id) => self.terminals.get(id).map(|t| t.flags),
            ItemRef::Handle(id) => self.handles.get(id).map(|h| h.flags),
            ItemRef::Connector(id) => self.connectors.get(id).map(|c| c.flags),
        }
    }

    fn flags_mut(&mut self, item: ItemRef) -> Option<&mut ItemFlags> {
        match item {
            ItemRef::Vertex(id) => self.vertices.get_mut(id).map(|v| &mut v.flags),
            ItemRef::Terminal(id) => self.terminals.get_mut(id).map(|t| &mut t.flags),
            ItemRef::Handle(id) => self.handles.get_mut(id).map(|h| &mut h.flags),
            ItemRef::Connector(id) => self.connectors.get_mut(id).map(|c| &mut c.flags),
        }
    }

    pub fn is_visible(&self, item: ItemRef) -> bool {
        self.flags(item).is_some_and(|f| f.visible)
    }

    pub fn is_blocked(&self, item: ItemRef) -> bool {
        self.flags(item).is_some_and(|f| f.signals_blocked)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.len()
    }

    /// Active vertex with the given display name
    pub fn find_vertex(&self, name: &str) -> Option<VertexId> {
        self.node_db
            .iter()
            .filter(|(_, state)| state.is_active())
            .map(|(id, _)| *id)
            .find(|id| self.vertices.get(*id).is_some_and(|v| v.name == name))
    }

    pub fn find_terminal(&self, name: &str) -> Option<TerminalId> {
        self.term_db
            .iter()
            .filter(|(_, state)| state.is_active())
            .map(|(id, _)| *id)
            .find(|id| self.terminals.get(*id).is_some_and(|t| t.name == name))
    }

    /// Active handle with the given uid
    pub fn find_handle(&self, uid: &str) -> Option<HandleId> {
        self.handles
            .iter()
            .find(|(_, h)| h.uid == uid)
            .map(|(id, _)| id)
            .filter(|id| self.is_handle_active(*id))
    }

    /// Active connector with the given stream symbol
    pub fn find_connector(&self, symbol: &str) -> Option<ConnectorId> {
        self.conn_db
            .iter()
            .filter(|(_, state)| state.is_active())
            .map(|(id, _)| *id)
            .find(|id| self.connectors.get(*id).is_some_and(|c| c.uid == symbol))
    }

    /// A handle is active when its owner is active and, for vertex handles,
    /// the owner's handle map says so.
    pub fn is_handle_active(&self, id: HandleId) -> bool {
        let Some(handle) = self.handles.get(id) else {
            return false;
        };
        match handle.owner {
            HandleOwner::Vertex(v) => {
                self.node_state(v).is_some_and(EntityState::is_active)
                    && self.handle_state(v, id).is_some_and(EntityState::is_active)
            }
            HandleOwner::Terminal(t) => self.terminal_state(t).is_some_and(EntityState::is_active),
        }
    }

    pub fn active_vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> + '_ {
        self.node_db
            .iter()
            .filter(|(_, state)| state.is_active())
            .filter_map(|(id, _)| self.vertices.get(*id).map(|v| (*id, v)))
    }

    pub fn active_terminals(&self) -> impl Iterator<Item = (TerminalId, &Terminal)> + '_ {
        self.term_db
            .iter()
            .filter(|(_, state)| state.is_active())
            .filter_map(|(id, _)| self.terminals.get(*id).map(|t| (*id, t)))
    }

    pub fn active_connectors(&self) -> impl Iterator<Item = (ConnectorId, &Connector)> + '_ {
        self.conn_db
            .iter()
            .filter(|(_, state)| state.is_active())
            .filter_map(|(id, _)| self.connectors.get(*id).map(|c| (*id, c)))
    }

    // === Scene primitives ===

    pub fn set_visible(&mut self, item: ItemRef, visible: bool) {
        let blocked = self.is_blocked(item);
        if let Some(flags) = self.flags_mut(item) {
            flags.visible = visible;
            self.journal.record(SceneEvent::Visibility(item, visible), blocked);
        }
    }

    pub fn block_signals(&mut self, item: ItemRef, blocked: bool) {
        if let Some(flags) = self.flags_mut(item) {
            flags.signals_blocked = blocked;
            self.journal.record(SceneEvent::SignalsBlocked(item, blocked), false);
        }
    }

    /// Pair `handle` with `partner` through `connector`
    pub fn lock(&mut self, handle: HandleId, partner: HandleId, connector: ConnectorId) {
        let blocked = self.is_blocked(handle.into());
        if let Some(h) = self.handles.get_mut(handle) {
            h.lock(partner, connector);
            self.journal.record(
                SceneEvent::Locked {
                    handle,
                    partner,
                    connector,
                },
                blocked,
            );
        }
    }

    pub fn free(&mut self, handle: HandleId) {
        let blocked = self.is_blocked(handle.into());
        if let Some(h) = self.handles.get_mut(handle) {
            h.free();
            self.journal.record(SceneEvent::Freed(handle), blocked);
        }
    }

    /// Free a handle and destroy the connector it was holding
    pub fn free_and_delete_connector(&mut self, handle: HandleId) {
        let connector = self.handles.get(handle).and_then(|h| h.connector);
        self.free(handle);
        if let Some(connector) = connector {
            self.destroy(connector.into());
        }
    }

    // === Databases ===

    pub fn node_state(&self, id: VertexId) -> Option<EntityState> {
        self.node_db.get(&id).copied()
    }

    pub fn set_node_state(&mut self, id: VertexId, state: EntityState) {
        if self.vertices.contains_key(id) {
            self.node_db.insert(id, state);
            self.journal.record(SceneEvent::StateChanged(id.into(), state), false);
        }
    }

    /// Pop with default: removing a non-member returns `None`
    pub fn remove_node_state(&mut self, id: VertexId) -> Option<EntityState> {
        let removed = self.node_db.shift_remove(&id);
        if removed.is_some() {
            self.journal.record(SceneEvent::StateRemoved(id.into()), false);
        }
        removed
    }

    pub fn terminal_state(&self, id: TerminalId) -> Option<EntityState> {
        self.term_db.get(&id).copied()
    }

    pub fn set_terminal_state(&mut self, id: TerminalId, state: EntityState) {
        if self.terminals.contains_key(id) {
            self.term_db.insert(id, state);
            self.journal.record(SceneEvent::StateChanged(id.into(), state), false);
        }
    }

    pub fn remove_terminal_state(&mut self, id: TerminalId) -> Option<EntityState> {
        let removed = self.term_db.shift_remove(&id);
        if removed.is_some() {
            self.journal.record(SceneEvent::StateRemoved(id.into()), false);
        }
        removed
    }

    pub fn connector_state(&self, id: ConnectorId) -> Option<EntityState> {
        self.conn_db.get(&id).copied()
    }

    pub fn set_connector_state(&mut self, id: ConnectorId, state: EntityState) {
        if self.connectors.contains_key(id) {
            self.conn_db.insert(id, state);
            self.journal.record(SceneEvent::StateChanged(id.into(), state), false);
        }
    }

    pub fn remove_connector_state(&mut self, id: ConnectorId) -> Option<EntityState> {
        let removed = self.conn_db.shift_remove(&id);
        if removed.is_some() {
            self.journal.record(SceneEvent::StateRemoved(id.into()), false);
        }
        removed
    }

    /// State of `handle` in `vertex`'s per-class handle map
    pub fn handle_state(&self, vertex: VertexId, handle: HandleId) -> Option<EntityState> {
        let class = self.handles.get(handle)?.class;
        self.vertices.get(vertex)?.handles(class).get(&handle).copied()
    }

    pub fn set_handle_state(&mut self, vertex: VertexId, handle: HandleId, state: EntityState) {
        let Some(class) = self.handles.get(handle).map(|h| h.class) else {
            return;
        };
        if let Some(v) = self.vertices.get_mut(vertex) {
            v.handles_mut(class).insert(handle, state);
            self.journal.record(SceneEvent::StateChanged(handle.into(), state), false);
        }
    }

    pub fn remove_handle_state(&mut self, vertex: VertexId, handle: HandleId) -> Option<EntityState> {
        let class = self.handles.get(handle)?.class;
        let removed = self.vertices.get_mut(vertex)?.handles_mut(class).shift_remove(&handle);
        if removed.is_some() {
            self.journal.record(SceneEvent::StateRemoved(handle.into()), false);
        }
        removed
    }

    // === Destruction ===

    /// Permanently delete an object. Destroying a dead key is a no-op.
    pub fn destroy(&mut self, item: ItemRef) {
        match item {
            ItemRef::Vertex(id) => self.destroy_vertex(id),
            ItemRef::Terminal(id) => self.destroy_terminal(id),
            ItemRef::Handle(id) => self.destroy_handle(id),
            ItemRef::Connector(id) => self.destroy_connector(id),
        }
    }

    fn destroy_vertex(&mut self, id: VertexId) {
        let Some(vertex) = self.vertices.get(id) else {
            return;
        };
        for handle in vertex.all_handles() {
            self.destroy_handle(handle);
        }
        self.remove_node_state(id);
        if let Some(vertex) = self.vertices.remove(id) {
            self.journal.record(SceneEvent::Destroyed(id.into()), false);
            debug!(uid = %vertex.uid, "vertex destroyed");
        }
    }

    fn destroy_terminal(&mut self, id: TerminalId) {
        let Some(handle) = self.terminals.get(id).map(|t| t.handle) else {
            return;
        };
        self.destroy_handle(handle);
        self.remove_terminal_state(id);
        if let Some(terminal) = self.terminals.remove(id) {
            self.journal.record(SceneEvent::Destroyed(id.into()), false);
            debug!(uid = %terminal.uid, "terminal destroyed");
        }
    }

    /// A handle takes the connector it still holds down with it
    fn destroy_handle(&mut self, id: HandleId) {
        let Some(handle) = self.handles.get(id) else {
            return;
        };
        let (owner, class, connector) = (handle.owner, handle.class, handle.connector);

        if let Some(connector) = connector {
            self.destroy_connector(connector);
        }
        if let HandleOwner::Vertex(v) = owner {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.handles_mut(class).shift_remove(&id);
            }
        }
        if let Some(handle) = self.handles.remove(id) {
            self.journal.record(SceneEvent::Destroyed(id.into()), false);
            debug!(uid = %handle.uid, "handle destroyed");
        }
    }

    /// Endpoints still locked to the connector are freed first
    fn destroy_connector(&mut self, id: ConnectorId) {
        let Some(connector) = self.connectors.get(id) else {
            return;
        };
        let ends = [connector.origin, connector.target];

        for end in ends {
            if self.handles.get(end).is_some_and(|h| h.connector == Some(id)) {
                self.free(end);
            }
        }
        self.remove_connector_state(id);
        if let Some(connector) = self.connectors.remove(id) {
            self.journal.record(SceneEvent::Destroyed(id.into()), false);
            debug!(uid = %connector.uid, "connector destroyed");
        }
    }

    /// Drop every object and start a new canvas lifetime. Keys handed out
    /// before the reset never resolve again.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.terminals.clear();
        self.handles.clear();
        self.connectors.clear();
        self.node_db.clear();
        self.term_db.clear();
        self.conn_db.clear();
        self.next_vertex = 0;
        self.next_terminal = 0;
        self.next_handle = 0;
        self.id = CanvasId::generate();
        self.journal.revision += 1;
        self.journal.events.clear();
        debug!(canvas = %self.id, "canvas reset");
    }
}
