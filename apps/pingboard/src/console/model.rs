use pingboard_engine::{PacketView, Simulator, TerminalLine, TopologyMode};
use pingboard_link::Transport;
use pingboard_model::{Machine, MachineId};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct MachineRow {
    pub id: MachineId,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub kind: &'static str,
    pub online: bool,
    pub pingable: bool,
    pub x: f64,
    pub y: f64,
    pub focused: bool,
}

/// Snapshot of everything the board draws.
#[derive(Debug, Clone)]
pub struct BoardView {
    pub channel: String,
    pub mode: &'static str,
    pub machines: Vec<MachineRow>,
    pub sessions: Vec<String>,
    pub connections: Vec<String>,
    pub packets: Vec<PacketView>,
}

impl BoardView {
    pub fn capture<T: Transport>(sim: &Simulator<T>) -> Self {
        let focused = sim.active_terminal();
        let machines = sim
            .machines()
            .iter()
            .map(|machine| MachineRow {
                id: machine.id,
                name: machine.name.clone(),
                address: machine.address.clone(),
                port: machine.port,
                kind: machine.kind.label(),
                online: machine.is_server,
                pingable: machine.pingable,
                x: machine.position.x,
                y: machine.position.y,
                focused: focused == Some(machine.id),
            })
            .collect();
        Self {
            channel: sim.channel_state().to_string(),
            mode: mode_label(sim.mode()),
            machines,
            sessions: sim.active_sessions().iter().map(|key| key.to_string()).collect(),
            connections: sim
                .connections()
                .iter()
                .map(|conn| conn.key.to_string())
                .collect(),
            packets: sim.packets(),
        }
    }
}

fn mode_label(mode: TopologyMode) -> &'static str {
    match mode {
        TopologyMode::Manual => "manual",
        TopologyMode::Scanned => "scanned",
    }
}

/// Lines of the open terminal that have not been printed yet.
#[derive(Debug, Default)]
pub struct TerminalTail {
    machine: Option<MachineId>,
    printed: usize,
}

impl TerminalTail {
    pub fn fresh<T: Transport>(&mut self, sim: &Simulator<T>) -> Vec<TerminalLine> {
        let active = sim.active_terminal();
        if active != self.machine {
            self.machine = active;
            self.printed = 0;
        }
        let Some(id) = active else {
            return Vec::new();
        };
        let lines = sim.terminal(id);
        // shrank: the terminal was cleared
        if lines.len() < self.printed {
            self.printed = 0;
        }
        let fresh = lines[self.printed..].to_vec();
        self.printed = lines.len();
        fresh
    }
}

#[derive(Serialize)]
struct StateDump<'a> {
    channel: String,
    mode: &'static str,
    local_ip: Option<&'a str>,
    active_terminal: Option<MachineId>,
    machines: &'a [Machine],
    sessions: Vec<String>,
    connections: Vec<String>,
}

pub fn state_json<T: Transport>(sim: &Simulator<T>) -> serde_json::Result<String> {
    let dump = StateDump {
        channel: sim.channel_state().to_string(),
        mode: mode_label(sim.mode()),
        local_ip: sim.local_ip(),
        active_terminal: sim.active_terminal(),
        machines: sim.machines(),
        sessions: sim.active_sessions().iter().map(|key| key.to_string()).collect(),
        connections: sim
            .connections()
            .iter()
            .map(|conn| conn.key.to_string())
            .collect(),
    };
    serde_json::to_string_pretty(&dump)
}
