use crate::schematic::EntityClass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Vertex(String),
    Stream { name: String, class: EntityClass },
    Handle { vertex: String, class: EntityClass },
    Connect(String, String),
    Disconnect(String),
    Delete(Vec<String>),
    Purge(String),
    Undo,
    Redo,
    Wipe,
    Clear,
    List,
    Status,
    /// Known command with bad arguments; carries the usage line
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    /// Parse one script line. Blank lines and `#` comments yield `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let mut words = trimmed.split_whitespace();
        let head = words.next()?;
        let args: Vec<&str> = words.collect();

        let cmd = match (head, args.as_slice()) {
            ("vertex" | "v", [name]) => Command::Vertex(name.to_string()),
            ("vertex" | "v", _) => Command::Usage("vertex <name>"),

            ("stream" | "s", [name, class]) => match class.parse() {
                Ok(class) => Command::Stream { name: name.to_string(), class },
                Err(_) => Command::Usage("stream <name> <inp|out>"),
            },
            ("stream" | "s", _) => Command::Usage("stream <name> <inp|out>"),

            ("handle" | "h", [vertex, class]) => match class.parse() {
                Ok(class) => Command::Handle { vertex: vertex.to_string(), class },
                Err(_) => Command::Usage("handle <vertex> <inp|out>"),
            },
            ("handle" | "h", _) => Command::Usage("handle <vertex> <inp|out>"),

            ("connect" | "c", [a, b]) => Command::Connect(a.to_string(), b.to_string()),
            ("connect" | "c", _) => Command::Usage("connect <handle> <handle>"),

            ("disconnect", [symbol]) => Command::Disconnect(symbol.to_string()),
            ("disconnect", _) => Command::Usage("disconnect <symbol>"),

            ("delete" | "del" | "rm", []) => Command::Usage("delete <target>..."),
            ("delete" | "del" | "rm", targets) => {
                Command::Delete(targets.iter().map(|t| t.to_string()).collect())
            }

            ("purge", [target]) => Command::Purge(target.to_string()),
            ("purge", _) => Command::Usage("purge <target>"),

            ("undo" | "u", []) => Command::Undo,
            ("redo" | "r", []) => Command::Redo,
            ("wipe", []) => Command::Wipe,
            ("clear", []) => Command::Clear,
            ("list" | "ls", []) => Command::List,
            ("status", []) => Command::Status,

            _ => Command::Unknown(trimmed.to_string()),
        };
        Some(cmd)
    }
}
