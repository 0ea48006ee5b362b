//! Headless editing session: one canvas, one history, driven by script lines.

pub mod command;

use std::fmt::Write as _;

use tracing::{info, warn};

use crate::actions::{
    Action, ActionsManager, BatchActions, ConnectAction, CreateEntityAction, CreateHandleAction,
    CreateStreamAction, DisconnectAction, RemoveEntityAction, RemoveHandleAction,
    RemoveStreamAction,
};
use crate::config::HistoryConfig;
use crate::error::SchematicError;
use crate::schematic::{
    Canvas, ConnectorId, EntityClass, HandleId, HandleOwner, ItemRef, TerminalId, VertexId,
};

pub use command::Command;

/// A live object named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Connector(ConnectorId),
    Handle(HandleId),
    Vertex(VertexId),
    Terminal(TerminalId),
}

impl From<Target> for ItemRef {
    fn from(target: Target) -> Self {
        match target {
            Target::Connector(id) => id.into(),
            Target::Handle(id) => id.into(),
            Target::Vertex(id) => id.into(),
            Target::Terminal(id) => id.into(),
        }
    }
}

pub struct Session {
    canvas: Canvas,
    manager: ActionsManager,
    message: Option<String>,
    bell: bool,
}

impl Session {
    pub fn new(config: &HistoryConfig) -> Result<Self, SchematicError> {
        Ok(Self {
            canvas: Canvas::new(),
            manager: ActionsManager::with_limit(config.max_undo)?,
            message: None,
            bell: false,
        })
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn manager(&self) -> &ActionsManager {
        &self.manager
    }

    /// Message produced by the last command, if any
    pub fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }

    /// True once per exhausted undo/redo
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    pub fn run_line(&mut self, line: &str) {
        if let Some(cmd) = Command::parse(line) {
            self.execute_command(cmd);
        }
    }

    /// Drop all history, deleting whatever it kept hidden
    pub fn close(&mut self) {
        self.manager.wipe_stack(&mut self.canvas);
    }

    fn record(&mut self, action: impl Into<Action>) {
        self.manager.do_action(&mut self.canvas, action.into());
    }

    fn execute_command(&mut self, cmd: Command) {
        let result = match cmd {
            Command::Vertex(name) => self.add_vertex(&name),
            Command::Stream { name, class } => self.add_stream(&name, class),
            Command::Handle { vertex, class } => self.add_handle(&vertex, class),
            Command::Connect(a, b) => self.connect(&a, &b),
            Command::Disconnect(symbol) => self.disconnect(&symbol),
            Command::Delete(targets) => self.delete(&targets),
            Command::Purge(target) => self.purge(&target),
            Command::Undo => {
                if self.manager.undo(&mut self.canvas) {
                    Ok("Undo".to_string())
                } else {
                    self.bell = true;
                    Ok("Already at oldest change".to_string())
                }
            }
            Command::Redo => {
                if self.manager.redo(&mut self.canvas) {
                    Ok("Redo".to_string())
                } else {
                    self.bell = true;
                    Ok("Already at newest change".to_string())
                }
            }
            Command::Wipe => {
                self.manager.wipe_stack(&mut self.canvas);
                Ok("History wiped".to_string())
            }
            Command::Clear => {
                self.manager.wipe_stack(&mut self.canvas);
                self.canvas.reset();
                info!(canvas = %self.canvas.id(), "canvas cleared");
                Ok("Canvas cleared".to_string())
            }
            Command::List => Ok(self.listing()),
            Command::Status => Ok(format!(
                "undo {}/{}, redo {}",
                self.manager.undo_count(),
                self.manager.max_undo(),
                self.manager.redo_count()
            )),
            Command::Usage(usage) => Ok(format!("Usage: {}", usage)),
            Command::Unknown(s) => {
                warn!(line = %s, "unknown command");
                Ok(format!("Unknown command: {}", s))
            }
        };

        self.message = Some(match result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "command failed");
                format!("Error: {}", e)
            }
        });
    }

    fn ensure_unused(&self, name: &str) -> Result<(), SchematicError> {
        if self.canvas.find_vertex(name).is_some() || self.canvas.find_terminal(name).is_some() {
            return Err(SchematicError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn add_vertex(&mut self, name: &str) -> Result<String, SchematicError> {
        self.ensure_unused(name)?;
        let vertex = self.canvas.create_vertex(name);
        let action = CreateEntityAction::new(&self.canvas, vertex)?;
        self.record(action);
        Ok(format!("Vertex {} created", self.uid(vertex.into())))
    }

    fn add_stream(&mut self, name: &str, class: EntityClass) -> Result<String, SchematicError> {
        self.ensure_unused(name)?;
        let terminal = self.canvas.create_terminal(name, class);
        let action = CreateStreamAction::new(&self.canvas, terminal)?;
        self.record(action);
        Ok(format!("Stream {} created", self.uid(terminal.into())))
    }

    fn add_handle(&mut self, vertex: &str, class: EntityClass) -> Result<String, SchematicError> {
        let owner = self
            .canvas
            .find_vertex(vertex)
            .ok_or_else(|| SchematicError::UnknownTarget(vertex.to_string()))?;
        let handle = self.canvas.create_handle(owner, class)?;
        let action = CreateHandleAction::new(&self.canvas, owner, handle)?;
        self.record(action);
        Ok(format!("Handle {} created", self.uid(handle.into())))
    }

    fn connect(&mut self, a: &str, b: &str) -> Result<String, SchematicError> {
        let ha = self.find_handle(a)?;
        let hb = self.find_handle(b)?;
        let connector = self.canvas.connect(ha, hb)?;
        let action = ConnectAction::new(&self.canvas, connector)?;
        self.record(action);
        Ok(format!("Connected {}", self.uid(connector.into())))
    }

    fn disconnect(&mut self, symbol: &str) -> Result<String, SchematicError> {
        let connector = self
            .canvas
            .find_connector(symbol)
            .ok_or_else(|| SchematicError::UnknownTarget(symbol.to_string()))?;
        let action = DisconnectAction::new(&self.canvas, connector)?;
        self.record(action);
        Ok(format!("Disconnected {}", symbol))
    }

    /// Every target of one `delete` goes into a single batch
    fn delete(&mut self, names: &[String]) -> Result<String, SchematicError> {
        let mut targets: Vec<Target> = Vec::new();
        for name in names {
            let target = self.resolve(name)?;
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        let mut batch = BatchActions::new();
        for target in &targets {
            batch.push(self.removal(*target)?);
        }
        let count = batch.size();
        self.record(batch);
        Ok(format!("Deleted {} object(s)", count))
    }

    fn removal(&self, target: Target) -> Result<Action, SchematicError> {
        let action: Action = match target {
            Target::Vertex(id) => RemoveEntityAction::new(&self.canvas, id)?.into(),
            Target::Terminal(id) => RemoveStreamAction::new(&self.canvas, id)?.into(),
            Target::Connector(id) => DisconnectAction::new(&self.canvas, id)?.into(),
            Target::Handle(id) => {
                let handle = self.canvas.handle(id).ok_or(SchematicError::DeadHandle)?;
                match handle.owner {
                    HandleOwner::Vertex(v) => RemoveHandleAction::new(&self.canvas, v, id)?.into(),
                    HandleOwner::Terminal(_) => {
                        return Err(SchematicError::NotVertexHandle(handle.uid.clone()))
                    }
                }
            }
        };
        Ok(action)
    }

    /// Delete an object outside the history
    fn purge(&mut self, name: &str) -> Result<String, SchematicError> {
        let target = self.resolve(name)?;
        let uid = self.uid(target.into());
        self.canvas.destroy(target.into());
        info!(uid = %uid, "purged outside history");
        Ok(format!("Purged {}", uid))
    }

    fn find_handle(&self, uid: &str) -> Result<HandleId, SchematicError> {
        self.canvas
            .find_handle(uid)
            .ok_or_else(|| SchematicError::UnknownTarget(uid.to_string()))
    }

    /// Connector symbols first, then handle uids, vertex names, stream names
    pub fn resolve(&self, name: &str) -> Result<Target, SchematicError> {
        if let Some(id) = self.canvas.find_connector(name) {
            return Ok(Target::Connector(id));
        }
        if let Some(id) = self.canvas.find_handle(name) {
            return Ok(Target::Handle(id));
        }
        if let Some(id) = self.canvas.find_vertex(name) {
            return Ok(Target::Vertex(id));
        }
        if let Some(id) = self.canvas.find_terminal(name) {
            return Ok(Target::Terminal(id));
        }
        Err(SchematicError::UnknownTarget(name.to_string()))
    }

    fn uid(&self, item: ItemRef) -> String {
        let uid = match item {
            ItemRef::Vertex(id) => self.canvas.vertex(id).map(|v| &v.uid),
            ItemRef::Terminal(id) => self.canvas.terminal(id).map(|t| &t.uid),
            ItemRef::Handle(id) => self.canvas.handle(id).map(|h| &h.uid),
            ItemRef::Connector(id) => self.canvas.connector(id).map(|c| &c.uid),
        };
        uid.cloned().unwrap_or_default()
    }

    fn handle_label(&self, id: HandleId) -> String {
        let Some(handle) = self.canvas.handle(id) else {
            return String::new();
        };
        match handle.connector.filter(|_| handle.connected) {
            Some(c) => format!("{}:{}->{}", handle.uid, handle.class, self.uid(c.into())),
            None => format!("{}:{}", handle.uid, handle.class),
        }
    }

    /// Live objects, one per line
    fn listing(&self) -> String {
        let mut out = String::new();
        for (id, vertex) in self.canvas.active_vertices() {
            let handles: Vec<String> = vertex
                .all_handles()
                .into_iter()
                .filter(|h| self.canvas.handle_state(id, *h).is_some_and(|s| s.is_active()))
                .map(|h| self.handle_label(h))
                .collect();
            let _ = writeln!(out, "{} {} [{}]", vertex.uid, vertex.name, handles.join(" "));
        }
        for (_, terminal) in self.canvas.active_terminals() {
            let _ = writeln!(
                out,
                "{} {} ({}) [{}]",
                terminal.uid,
                terminal.name,
                terminal.class,
                self.handle_label(terminal.handle)
            );
        }
        for (_, connector) in self.canvas.active_connectors() {
            let _ = writeln!(
                out,
                "{} {} -> {}",
                connector.uid,
                self.uid(connector.origin.into()),
                self.uid(connector.target.into())
            );
        }
        if out.is_empty() {
            return "Canvas is empty".to_string();
        }
        out.trim_end().to_string()
    }
}
