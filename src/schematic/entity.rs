use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

slotmap::new_key_type! {
    /// Key of a processing-unit node.
    pub struct VertexId;
}

slotmap::new_key_type! {
    /// Key of a single-handle stream boundary node.
    pub struct TerminalId;
}

slotmap::new_key_type! {
    pub struct HandleId;
}

slotmap::new_key_type! {
    /// Key of a directed edge between two handles.
    pub struct ConnectorId;
}

/// Liveness flag stored in the canvas databases and in per-vertex handle maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    Hidden,
    Active,
}

impl EntityState {
    pub fn is_active(self) -> bool {
        matches!(self, EntityState::Active)
    }
}

/// Handle class: inputs receive streams, outputs emit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    Inp,
    Out,
}

impl EntityClass {
    pub fn name(self) -> &'static str {
        match self {
            EntityClass::Inp => "inp",
            EntityClass::Out => "out",
        }
    }
}

impl FromStr for EntityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inp" | "in" | "input" => Ok(EntityClass::Inp),
            "out" | "output" => Ok(EntityClass::Out),
            _ => Err(format!("Invalid handle class: '{}'. Use inp or out.", s)),
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Visibility and signal-suppression flags shared by every scene item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFlags {
    pub visible: bool,
    pub signals_blocked: bool,
}

impl Default for ItemFlags {
    fn default() -> Self {
        Self {
            visible: true,
            signals_blocked: false,
        }
    }
}

/// Any object that lives on a canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Vertex(VertexId),
    Terminal(TerminalId),
    Handle(HandleId),
    Connector(ConnectorId),
}

impl From<VertexId> for ItemRef {
    fn from(id: VertexId) -> Self {
        ItemRef::Vertex(id)
    }
}

impl From<TerminalId> for ItemRef {
    fn from(id: TerminalId) -> Self {
        ItemRef::Terminal(id)
    }
}

impl From<HandleId> for ItemRef {
    fn from(id: HandleId) -> Self {
        ItemRef::Handle(id)
    }
}

impl From<ConnectorId> for ItemRef {
    fn from(id: ConnectorId) -> Self {
        ItemRef::Connector(id)
    }
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub uid: String,
    pub name: String,
    pub flags: ItemFlags,
    inputs: IndexMap<HandleId, EntityState>,
    outputs: IndexMap<HandleId, EntityState>,
}

impl Vertex {
    pub(crate) fn new(uid: String, name: String) -> Self {
        Self {
            uid,
            name,
            flags: ItemFlags::default(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Per-class handle map (insertion ordered)
    pub fn handles(&self, class: EntityClass) -> &IndexMap<HandleId, EntityState> {
        match class {
            EntityClass::Inp => &self.inputs,
            EntityClass::Out => &self.outputs,
        }
    }

    pub(crate) fn handles_mut(&mut self, class: EntityClass) -> &mut IndexMap<HandleId, EntityState> {
        match class {
            EntityClass::Inp => &mut self.inputs,
            EntityClass::Out => &mut self.outputs,
        }
    }

    /// Every handle in the maps, inputs first, regardless of state
    pub fn all_handles(&self) -> Vec<HandleId> {
        self.inputs.keys().chain(self.outputs.keys()).copied().collect()
    }
}

/// Stream boundary node. Owns exactly one handle.
#[derive(Debug, Clone)]
pub struct Terminal {
    pub uid: String,
    pub name: String,
    pub class: EntityClass,
    pub handle: HandleId,
    pub flags: ItemFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOwner {
    Vertex(VertexId),
    Terminal(TerminalId),
}

#[derive(Debug, Clone)]
pub struct Handle {
    pub uid: String,
    pub class: EntityClass,
    pub owner: HandleOwner,
    pub flags: ItemFlags,
    pub connected: bool,
    pub conjugate: Option<HandleId>,
    pub connector: Option<ConnectorId>,
}

impl Handle {
    pub(crate) fn new(uid: String, class: EntityClass, owner: HandleOwner) -> Self {
        Self {
            uid,
            class,
            owner,
            flags: ItemFlags::default(),
            connected: false,
            conjugate: None,
            connector: None,
        }
    }

    /// Pair this handle with `partner` through `connector`
    pub(crate) fn lock(&mut self, partner: HandleId, connector: ConnectorId) {
        self.connected = true;
        self.conjugate = Some(partner);
        self.connector = Some(connector);
    }

    /// Break the pairing. No-op on a free handle.
    pub(crate) fn free(&mut self) {
        self.connected = false;
        self.conjugate = None;
        self.connector = None;
    }
}

#[derive(Debug, Clone)]
pub struct Connector {
    /// Stream symbol, e.g. `S1`
    pub uid: String,
    pub origin: HandleId,
    pub target: HandleId,
    pub flags: ItemFlags,
}
