use crate::animator::{PacketAnimator, PacketId};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::sessions::{Connection, SessionKey, SessionTracker};
use crate::terminal::{LineKind, TerminalBook, TerminalLine};
use crate::topology::{MachineDraft, TopologyMode, TopologyStore};
use pingboard_link::{ChannelState, LinkEvent, ProtocolClient, Transport};
use pingboard_model::{Command, Machine, MachineId, Position};
use std::time::Instant;
use tracing::{debug, info};

/// Where a packet token currently sits on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketView {
    pub id: PacketId,
    pub key: SessionKey,
    pub sequence: u32,
    pub progress: f64,
    pub position: Position,
}

/// Client-side simulation state. Owns the topology, sessions, terminals,
/// packet animations and the backend channel; every input (user action,
/// link report, frame tick) is applied to completion on the caller's thread.
pub struct Simulator<T: Transport> {
    pub(crate) config: SimConfig,
    pub(crate) topology: TopologyStore,
    pub(crate) sessions: SessionTracker,
    pub(crate) terminals: TerminalBook,
    pub(crate) animator: PacketAnimator,
    pub(crate) link: ProtocolClient<T>,
    pub(crate) active_terminal: Option<MachineId>,
    pub(crate) local_ip: Option<String>,
}

impl<T: Transport> Simulator<T> {
    pub fn new(config: SimConfig, transport: T) -> Self {
        Self::with_topology(
            TopologyStore::with_defaults(config.canvas, config.max_machines),
            config,
            transport,
        )
    }

    pub fn with_topology(topology: TopologyStore, config: SimConfig, transport: T) -> Self {
        let link = ProtocolClient::new(transport, config.reconnect_delay);
        Self {
            config,
            topology,
            sessions: SessionTracker::default(),
            terminals: TerminalBook::default(),
            animator: PacketAnimator::default(),
            link,
            active_terminal: None,
            local_ip: None,
        }
    }

    pub fn start(&mut self) {
        self.link.connect();
    }

    pub fn handle_link(&mut self, event: LinkEvent, now: Instant) {
        let was_closed = self.link.state() == ChannelState::Closed;
        if let Some(event) = self.link.handle(event, now) {
            self.apply_event(event, now);
        }
        if !was_closed && self.link.state() == ChannelState::Closed {
            self.release_sessions();
        }
    }

    /// The backend drops its ping runs with the socket, so no completion
    /// will arrive for them.
    fn release_sessions(&mut self) {
        for key in self.sessions.release_all() {
            self.animator.cancel_session(key);
            let target = self
                .topology
                .get(key.to)
                .map(|machine| machine.name.clone())
                .unwrap_or_else(|| key.to.to_string());
            self.write(
                key.from,
                LineKind::System,
                format!("ping to {target} interrupted: connection lost"),
            );
            info!(session = %key, "session_released");
        }
    }

    /// Advances the reconnect timer and every packet animation.
    pub fn tick(&mut self, now: Instant) {
        self.link.poll(now);
        self.animator.tick(now);
    }

    pub fn shutdown(&mut self) {
        self.link.shutdown();
        self.animator.clear();
    }

    /// Sends through the channel. A closed channel is reported on the open
    /// terminal, if any.
    pub fn send(&mut self, command: &Command) -> Result<(), SimError> {
        match self.link.send(command) {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = SimError::from(err);
                if let Some(id) = self.active_terminal {
                    self.report(id, &err);
                }
                Err(err)
            }
        }
    }

    pub fn add_machine(&mut self, draft: MachineDraft) -> Result<MachineId, SimError> {
        let id = self.topology.add_machine(draft)?;
        info!(machine = %id, "machine_added");
        Ok(id)
    }

    pub fn remove_machine(&mut self, id: MachineId) -> Result<(), SimError> {
        let is_server = self
            .topology
            .get(id)
            .map(|machine| machine.is_server)
            .ok_or(SimError::NotFound(id))?;
        let removed = self.topology.remove_machine(id)?;
        self.forget_machines(&[removed.id]);
        if is_server {
            // failures are already on the open terminal
            if let Err(err) = self.send(&Command::StopServer { machine_id: id }) {
                debug!(machine = %id, %err, "could not stop server of removed machine");
            }
        }
        info!(machine = %id, "machine_removed");
        Ok(())
    }

    pub fn toggle_server(&mut self, id: MachineId) -> Result<(), SimError> {
        let machine = self.topology.get(id).ok_or(SimError::NotFound(id))?;
        let command = if machine.is_server {
            Command::StopServer { machine_id: id }
        } else {
            Command::StartServer {
                machine_id: id,
                ip: machine.address.clone(),
                port: machine.port,
            }
        };
        if !self.link.is_open() {
            let err = SimError::NotConnected;
            self.report(id, &err);
            return Err(err);
        }
        self.send(&command)
    }

    pub fn move_machine(&mut self, id: MachineId, position: Position) -> Result<(), SimError> {
        self.topology.update_position(id, position)
    }

    pub fn update_address(&mut self, id: MachineId, address: &str, port: u16) -> Result<(), SimError> {
        self.topology.update_address(id, address, port)
    }

    pub fn set_pingable(&mut self, id: MachineId, pingable: bool) -> Result<(), SimError> {
        self.topology.set_pingable(id, pingable)
    }

    pub fn open_terminal(&mut self, id: MachineId) -> Result<(), SimError> {
        let machine = self.topology.get(id).ok_or(SimError::NotFound(id))?;
        if !machine.has_terminal() {
            return Err(SimError::TerminalUnavailable {
                name: machine.name.clone(),
            });
        }
        self.active_terminal = Some(id);
        Ok(())
    }

    pub fn close_terminal(&mut self) {
        self.active_terminal = None;
    }

    pub fn scan_network(&mut self) -> Result<(), SimError> {
        self.send(&Command::ScanNetwork)
    }

    pub fn request_network_info(&mut self) -> Result<(), SimError> {
        self.send(&Command::GetNetworkInfo)
    }

    /// Back to the default manual topology.
    pub fn reset_topology(&mut self) {
        let removed = self.topology.reset_manual();
        self.forget_machines(&removed);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn topology(&self) -> &TopologyStore {
        &self.topology
    }

    pub fn machines(&self) -> &[Machine] {
        self.topology.machines()
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.topology.get(id)
    }

    pub fn mode(&self) -> TopologyMode {
        self.topology.mode()
    }

    pub fn connections(&self) -> &[Connection] {
        self.sessions.connections()
    }

    pub fn is_session_active(&self, key: SessionKey) -> bool {
        self.sessions.is_active(key)
    }

    pub fn active_sessions(&self) -> Vec<SessionKey> {
        self.sessions.active_keys()
    }

    pub fn packets(&self) -> Vec<PacketView> {
        self.animator
            .tokens()
            .filter_map(|token| {
                let from = self.topology.get(token.key.from)?;
                let to = self.topology.get(token.key.to)?;
                Some(PacketView {
                    id: token.id,
                    key: token.key,
                    sequence: token.sequence,
                    progress: token.progress,
                    position: from.position.lerp(to.position, token.progress),
                })
            })
            .collect()
    }

    pub fn terminal(&self, id: MachineId) -> &[TerminalLine] {
        self.terminals.lines(id)
    }

    pub fn active_terminal(&self) -> Option<MachineId> {
        self.active_terminal
    }

    pub fn channel_state(&self) -> ChannelState {
        self.link.state()
    }

    pub fn local_ip(&self) -> Option<&str> {
        self.local_ip.as_deref()
    }

    pub fn transport(&self) -> &T {
        self.link.transport()
    }

    pub(crate) fn forget_machines(&mut self, ids: &[MachineId]) {
        for &id in ids {
            self.terminals.remove(id);
            self.sessions.forget_machine(id);
            let cancelled = self.animator.cancel_machine(id);
            if cancelled > 0 {
                debug!(machine = %id, cancelled, "cancelled packets of removed machine");
            }
            if self.active_terminal == Some(id) {
                self.active_terminal = None;
            }
        }
    }

    pub(crate) fn report(&mut self, id: MachineId, err: &SimError) {
        let kind = err.line_kind();
        let label = if kind == LineKind::Warning { "warning" } else { "error" };
        self.terminals.push(id, kind, format!("{label}: {err}"));
        if let Some((kind, hint)) = err.hint() {
            self.terminals.push(id, kind, hint);
        }
    }

    pub(crate) fn write(&mut self, id: MachineId, kind: LineKind, text: impl Into<String>) {
        self.terminals.push(id, kind, text);
    }
}
