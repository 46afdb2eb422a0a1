use crate::error::SimError;
use crate::sessions::SessionKey;
use crate::simulator::Simulator;
use crate::terminal::LineKind;
use crate::topology::TopologyStore;
use pingboard_link::Transport;
use pingboard_model::{Command, MachineId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    Ping(Option<String>),
    List,
    Clear,
    Help,
    Unknown(String),
}

const HELP: [&str; 7] = [
    "available commands:",
    "  ping <address>  send UDP pings to another machine",
    "  list            list every machine on the network",
    "  clear           clear this terminal",
    "  help            show this help",
    "the target machine must be running its UDP server",
    "",
];

/// `None` for blank input.
pub fn parse_line(line: &str) -> Option<TerminalCommand> {
    let mut tokens = line.split_whitespace();
    let head = tokens.next()?.to_ascii_lowercase();
    let command = match head.as_str() {
        "ping" => TerminalCommand::Ping(tokens.next().map(|token| token.to_string())),
        "list" => TerminalCommand::List,
        "clear" => TerminalCommand::Clear,
        "help" => TerminalCommand::Help,
        _ => TerminalCommand::Unknown(head),
    };
    Some(command)
}

/// Local checks that run before any `ping` request leaves the client.
pub fn check_ping(
    topology: &TopologyStore,
    channel_open: bool,
    from: MachineId,
    address: &str,
) -> Result<MachineId, SimError> {
    let source = topology.get(from).ok_or(SimError::NotFound(from))?;
    if !channel_open {
        return Err(SimError::NotConnected);
    }
    if source.address == address {
        return Err(SimError::SelfPing);
    }
    let target = match topology.find_by_address(address) {
        Some(target) => target,
        None => {
            let suggestions = topology
                .machines()
                .iter()
                .filter(|machine| machine.id != from && machine.pingable)
                .map(|machine| machine.address.clone())
                .collect();
            return Err(SimError::UnknownHost {
                address: address.to_string(),
                suggestions,
            });
        }
    };
    if !target.is_server {
        return Err(SimError::TargetOffline {
            name: target.name.clone(),
        });
    }
    if !target.pingable {
        return Err(SimError::TargetNotPingable {
            name: target.name.clone(),
        });
    }
    Ok(target.id)
}

pub fn list_lines(topology: &TopologyStore, from: MachineId) -> Vec<String> {
    let mut lines = vec!["machines on the network:".to_string()];
    for machine in topology.machines() {
        let status = if machine.is_server { "online" } else { "offline" };
        let pingable = if machine.pingable { "" } else { ", not pingable" };
        let current = if machine.id == from { " (this machine)" } else { "" };
        lines.push(format!(
            "  {}: {}:{} - {status}{pingable}{current}",
            machine.name, machine.address, machine.port
        ));
    }
    lines.push(String::new());
    lines
}

impl<T: Transport> Simulator<T> {
    /// Runs one line typed into the terminal of machine `id`. Failures are
    /// written to that terminal and also returned. Machines without a
    /// terminal are rejected before anything is written.
    pub fn submit_line(&mut self, id: MachineId, line: &str) -> Result<(), SimError> {
        let machine = self.topology.get(id).ok_or(SimError::NotFound(id))?;
        if !machine.has_terminal() {
            return Err(SimError::TerminalUnavailable {
                name: machine.name.clone(),
            });
        }
        let Some(command) = parse_line(line) else {
            return Ok(());
        };
        let echo = format!("{}@{}:~$ {}", machine.name, machine.address, line.trim());
        self.write(id, LineKind::Command, echo);

        let result = self.execute(id, command);
        if let Err(err) = &result {
            self.report(id, err);
        }
        result
    }

    fn execute(&mut self, id: MachineId, command: TerminalCommand) -> Result<(), SimError> {
        match command {
            TerminalCommand::Ping(None) => Err(SimError::Usage("ping <address>")),
            TerminalCommand::Ping(Some(address)) => self.start_ping(id, &address),
            TerminalCommand::List => {
                for line in list_lines(&self.topology, id) {
                    self.write(id, LineKind::Info, line);
                }
                Ok(())
            }
            TerminalCommand::Clear => {
                self.terminals.clear(id);
                Ok(())
            }
            TerminalCommand::Help => {
                for line in HELP {
                    self.write(id, LineKind::Info, line);
                }
                Ok(())
            }
            TerminalCommand::Unknown(name) => Err(SimError::UnknownCommand(name)),
        }
    }

    fn start_ping(&mut self, id: MachineId, address: &str) -> Result<(), SimError> {
        let target_id = check_ping(&self.topology, self.link.is_open(), id, address)?;
        let (source_ip, target_ip, target_port) = match (self.topology.get(id), self.topology.get(target_id)) {
            (Some(source), Some(target)) => (source.address.clone(), target.address.clone(), target.port),
            _ => return Err(SimError::NotFound(target_id)),
        };

        let session = self.sessions.begin(SessionKey::new(id, target_id))?;
        let command = Command::Ping {
            machine_id: id,
            source_ip,
            target_ip,
            target_port: Some(target_port),
            session_id: Some(session.0),
        };
        if let Err(err) = self.link.send(&command) {
            self.sessions.abort(session);
            return Err(err.into());
        }
        Ok(())
    }
}
