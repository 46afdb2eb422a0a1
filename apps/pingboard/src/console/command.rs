use anyhow::{anyhow, bail, Context, Result};
use pingboard_model::{MachineId, Position};

/// One line read from stdin. Lines starting with `:` drive the simulator;
/// anything else is typed into the open machine terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Add,
    Remove(MachineId),
    Server(MachineId),
    Open(MachineId),
    Close,
    Move(MachineId, Position),
    Address(MachineId, String, u16),
    Pingable(MachineId, bool),
    Scan,
    Info,
    Reset,
    Board,
    State,
    Help,
    Quit,
    Line(String),
}

const COMMANDS: [(&str, &str, &str); 15] = [
    ("add", ":add", "add a machine to the network"),
    ("rm", ":rm <id>", "remove a machine"),
    ("server", ":server <id>", "start or stop the UDP server of a machine"),
    ("open", ":open <id>", "open the terminal of a machine"),
    ("close", ":close", "close the open terminal"),
    ("move", ":move <id> <x> <y>", "move a machine on the canvas"),
    ("addr", ":addr <id> <ip> <port>", "change the address of a machine"),
    ("pingable", ":pingable <id> on|off", "override whether a machine answers pings"),
    ("scan", ":scan", "replace the topology with a network scan"),
    ("info", ":info", "ask the backend for its local address"),
    ("reset", ":reset", "restore the default topology"),
    ("board", ":board", "draw the network"),
    ("state", ":state", "dump the topology as JSON"),
    ("help", ":help", "show this help"),
    ("quit", ":quit", "leave"),
];

pub fn console_help() -> Vec<String> {
    let mut lines = vec!["console commands:".to_string()];
    for (_, usage, about) in COMMANDS {
        lines.push(format!("  {usage:<24}{about}"));
    }
    lines.push("other input goes to the open terminal (try \"help\" there)".to_string());
    lines
}

pub fn parse_input(line: &str) -> Result<ConsoleInput> {
    let Some(rest) = line.trim().strip_prefix(':') else {
        return Ok(ConsoleInput::Line(line.to_string()));
    };
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    let input = match (name.as_str(), args.as_slice()) {
        ("add", []) => ConsoleInput::Add,
        ("rm", [id]) => ConsoleInput::Remove(parse_id(id)?),
        ("server", [id]) => ConsoleInput::Server(parse_id(id)?),
        ("open", [id]) => ConsoleInput::Open(parse_id(id)?),
        ("close", []) => ConsoleInput::Close,
        ("move", [id, x, y]) => {
            ConsoleInput::Move(parse_id(id)?, Position::new(parse_coord(x)?, parse_coord(y)?))
        }
        ("addr", [id, ip, port]) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("invalid port {port:?}"))?;
            ConsoleInput::Address(parse_id(id)?, ip.to_string(), port)
        }
        ("pingable", [id, flag]) => ConsoleInput::Pingable(parse_id(id)?, parse_flag(flag)?),
        ("scan", []) => ConsoleInput::Scan,
        ("info", []) => ConsoleInput::Info,
        ("reset", []) => ConsoleInput::Reset,
        ("board", []) => ConsoleInput::Board,
        ("state", []) => ConsoleInput::State,
        ("help", []) => ConsoleInput::Help,
        ("quit", []) | ("q", []) => ConsoleInput::Quit,
        (other, _) => match usage(other) {
            Some(usage) => bail!("usage: {usage}"),
            None => bail!("unknown console command :{other} (try :help)"),
        },
    };
    Ok(input)
}

fn usage(name: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .find(|(command, _, _)| *command == name)
        .map(|(_, usage, _)| *usage)
}

fn parse_id(raw: &str) -> Result<MachineId> {
    raw.parse::<u32>()
        .map(MachineId)
        .map_err(|_| anyhow!("invalid machine id {raw:?}"))
}

fn parse_coord(raw: &str) -> Result<f64> {
    let value = raw
        .parse::<f64>()
        .with_context(|| format!("invalid coordinate {raw:?}"))?;
    if !value.is_finite() {
        bail!("invalid coordinate {raw:?}");
    }
    Ok(value)
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" => Ok(true),
        "off" | "no" | "false" => Ok(false),
        _ => Err(anyhow!("expected on or off, got {raw:?}")),
    }
}
