use crate::sessions::SessionId;
use crate::simulator::Simulator;
use crate::terminal::LineKind;
use pingboard_link::Transport;
use pingboard_model::{Event, MachineId, MachineRef, PacketReport, PingStats};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub fn format_summary(stats: &PingStats) -> Vec<String> {
    vec![
        "--- ping statistics ---".to_string(),
        format!(
            "    packets: sent = {}, received = {}, lost = {} ({}% loss)",
            stats.sent, stats.received, stats.lost, stats.loss_percentage
        ),
        format!(
            "    rtt (ms): min = {}, max = {}, avg = {}",
            stats.min_rtt, stats.max_rtt, stats.avg_rtt
        ),
        String::new(),
    ]
}

fn packet_line(report: &PacketReport) -> String {
    if !report.message.is_empty() {
        return report.message.clone();
    }
    match report.rtt {
        Some(rtt) => format!("packet {}: {} time={rtt}ms", report.packet, report.status),
        None => format!("packet {}: {}", report.packet, report.status),
    }
}

fn flight_time(report: &PacketReport) -> Option<Duration> {
    let rtt = report.rtt?;
    if !report.is_success() || !rtt.is_finite() || rtt <= 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(rtt / 1000.0))
}

impl<T: Transport> Simulator<T> {
    /// Folds one backend event into local state. Events are applied in
    /// arrival order; events for machines that no longer exist are dropped.
    pub(crate) fn apply_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::ServerStarted {
                machine_id,
                message,
            } => self.apply_server_state(&machine_id, true, message),
            Event::ServerStopped {
                machine_id,
                message,
            } => self.apply_server_state(&machine_id, false, message),
            Event::PingStart {
                machine_id,
                message,
                ..
            } => {
                if let Some(id) = self.resolve(&machine_id) {
                    self.write(id, LineKind::Info, message);
                }
            }
            Event::PingPacket {
                machine_id,
                data,
                session_id,
            } => {
                let Some(id) = self.resolve(&machine_id) else {
                    return;
                };
                let kind = if data.is_success() {
                    LineKind::Success
                } else {
                    LineKind::Error
                };
                self.write(id, kind, packet_line(&data));

                let Some(duration) = flight_time(&data) else {
                    return;
                };
                match self.sessions.resolve(id, session_id.map(SessionId)) {
                    Some(key) if self.topology.get(key.to).is_some() => {
                        self.animator.launch(key, data.packet, duration, now);
                    }
                    _ => debug!(machine = %id, packet = data.packet, "no active session for packet reply"),
                }
            }
            Event::PingComplete {
                machine_id,
                stats,
                session_id,
            } => {
                let Some(id) = self.resolve(&machine_id) else {
                    return;
                };
                for line in format_summary(&stats) {
                    self.write(id, LineKind::Info, line);
                }
                if self.sessions.complete(id, session_id.map(SessionId)).is_none() {
                    debug!(machine = %id, "ping run finished without an active session");
                }
            }
            Event::NetworkInfo { local_ip, message } => {
                info!(%local_ip, "backend_network_info");
                if let Some(id) = self.active_terminal {
                    let text = message.unwrap_or_else(|| format!("backend local address: {local_ip}"));
                    self.write(id, LineKind::System, text);
                }
                self.local_ip = Some(local_ip);
            }
            Event::NetworkScanComplete { devices } => {
                let removed = self.topology.replace_all(&devices);
                self.forget_machines(&removed);
                info!(
                    devices = devices.len(),
                    machines = self.topology.len(),
                    "network_scan_applied"
                );
            }
            Event::Error {
                machine_id,
                message,
            } => {
                let target = machine_id.as_ref().and_then(|machine| self.resolve(machine));
                match target {
                    Some(id) => self.write(id, LineKind::Error, format!("error: {message}")),
                    None => warn!(%message, "backend_error"),
                }
            }
            Event::Unknown => debug!("ignoring unknown backend event"),
        }
    }

    fn apply_server_state(&mut self, machine: &MachineRef, running: bool, message: String) {
        let Some(id) = self.resolve(machine) else {
            return;
        };
        if self.topology.set_server_state(id, running).is_ok() {
            self.write(id, LineKind::System, message);
        }
    }

    fn resolve(&self, machine: &MachineRef) -> Option<MachineId> {
        let resolved = self.topology.resolve(machine);
        if resolved.is_none() {
            debug!(?machine, "event for unknown machine");
        }
        resolved
    }
}
