//! Slash command parsing (component S, §4.19/§6). Grounded on the
//! original's `client/core.py::_handle_command` for the exact command set
//! and the "optimistic local update" behavior of `/nick` and `/join`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    Clear,
    Send { filepath: String },
    Nick { name: String },
    Join { room: String },
    Unknown { command: String },
}

/// Parses a line already known to start with `/`. Panics if `line` does not
/// start with `/` — callers gate on that before calling.
pub fn parse(line: &str) -> Command {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").to_lowercase();
    let argument = parts.next().unwrap_or("").trim().to_string();

    match command.as_str() {
        "/quit" => Command::Quit,
        "/help" => Command::Help,
        "/clear" => Command::Clear,
        "/send" => Command::Send { filepath: argument },
        "/nick" => Command::Nick { name: argument },
        "/join" => Command::Join { room: argument },
        other => Command::Unknown { command: other.to_string() },
    }
}

pub const HELP_TEXT: &str = "Commands: /nick <name>, /join <room>, /send <filepath>, /clear, /help, /quit";
