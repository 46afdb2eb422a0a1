use crate::config::Canvas;
use crate::error::{CapacityReason, SimError};
use pingboard_model::{DeviceKind, Machine, MachineId, MachineRef, Position, ScannedDevice};
use std::collections::HashSet;
use std::f64::consts::TAU;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyMode {
    Manual,
    Scanned,
}

/// Optional overrides for a new machine. Missing fields are derived from the id.
#[derive(Debug, Clone, Default)]
pub struct MachineDraft {
    pub name: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub position: Option<Position>,
    pub color: Option<String>,
    pub kind: Option<DeviceKind>,
}

#[derive(Debug)]
pub struct TopologyStore {
    machines: Vec<Machine>,
    next_id: u32,
    mode: TopologyMode,
    canvas: Canvas,
    max_machines: usize,
}

const DEFAULT_MACHINES: [(&str, (f64, f64), &str); 3] = [
    ("#3b82f6", (150.0, 150.0), "PC1"),
    ("#10b981", (450.0, 150.0), "PC2"),
    ("#f59e0b", (300.0, 300.0), "PC3"),
];

impl TopologyStore {
    pub fn new(canvas: Canvas, max_machines: usize) -> Self {
        Self {
            machines: Vec::new(),
            next_id: 1,
            mode: TopologyMode::Manual,
            canvas,
            max_machines,
        }
    }

    /// Manual topology seeded with three idle PCs.
    pub fn with_defaults(canvas: Canvas, max_machines: usize) -> Self {
        let mut store = Self::new(canvas, max_machines);
        store.seed_defaults();
        store
    }

    fn seed_defaults(&mut self) {
        for (color, (x, y), name) in DEFAULT_MACHINES {
            if self.machines.len() >= self.max_machines {
                break;
            }
            let draft = MachineDraft {
                name: Some(name.to_string()),
                position: Some(Position::new(x, y)),
                color: Some(color.to_string()),
                ..MachineDraft::default()
            };
            self.insert(draft);
        }
    }

    pub fn mode(&self) -> TopologyMode {
        self.mode
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn get(&self, id: MachineId) -> Option<&Machine> {
        self.machines.iter().find(|machine| machine.id == id)
    }

    pub fn find_by_address(&self, address: &str) -> Option<&Machine> {
        self.machines.iter().find(|machine| machine.address == address)
    }

    /// Backend events name machines by id; scanned machines may also be named
    /// by address.
    pub fn resolve(&self, machine: &MachineRef) -> Option<MachineId> {
        match machine {
            MachineRef::Id(id) => self.get(*id).map(|m| m.id),
            MachineRef::Address(text) => {
                let by_id = text
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .and_then(|raw| self.get(MachineId(raw)));
                match by_id {
                    Some(found) => Some(found.id),
                    None if self.mode == TopologyMode::Scanned => {
                        self.find_by_address(text).map(|m| m.id)
                    }
                    None => None,
                }
            }
        }
    }

    pub fn add_machine(&mut self, draft: MachineDraft) -> Result<MachineId, SimError> {
        if self.mode == TopologyMode::Scanned {
            return Err(SimError::CapacityExceeded(CapacityReason::ScannedTopology));
        }
        if self.machines.len() >= self.max_machines {
            return Err(SimError::CapacityExceeded(CapacityReason::Limit(
                self.max_machines,
            )));
        }
        if let Some(address) = draft.address.as_deref() {
            if self.find_by_address(address).is_some() {
                return Err(SimError::AddressInUse(address.to_string()));
            }
        }
        Ok(self.insert(draft))
    }

    fn insert(&mut self, draft: MachineDraft) -> MachineId {
        let raw = self.next_id;
        self.next_id += 1;
        let id = MachineId(raw);
        let kind = draft.kind.unwrap_or(DeviceKind::Pc);
        let name = draft.name.unwrap_or_else(|| format!("PC{raw}"));
        let position = draft
            .position
            .unwrap_or_else(|| scatter_position(&name));
        let color = draft.color.unwrap_or_else(|| scatter_color(&name));

        self.machines.push(Machine {
            id,
            address: draft
                .address
                .unwrap_or_else(|| format!("192.168.1.{}", 100 + raw)),
            port: draft.port.unwrap_or_else(|| default_port(raw)),
            position: self.canvas.clamp(position),
            color,
            is_server: false,
            kind,
            pingable: kind.pingable(),
            name,
        });
        id
    }

    pub fn remove_machine(&mut self, id: MachineId) -> Result<Machine, SimError> {
        if self.mode == TopologyMode::Scanned {
            return Err(SimError::ScanModeLocked);
        }
        let index = self
            .machines
            .iter()
            .position(|machine| machine.id == id)
            .ok_or(SimError::NotFound(id))?;
        Ok(self.machines.remove(index))
    }

    pub fn set_server_state(&mut self, id: MachineId, running: bool) -> Result<(), SimError> {
        self.get_mut(id)?.is_server = running;
        Ok(())
    }

    pub fn update_position(&mut self, id: MachineId, position: Position) -> Result<(), SimError> {
        let clamped = self.canvas.clamp(position);
        self.get_mut(id)?.position = clamped;
        Ok(())
    }

    pub fn update_address(
        &mut self,
        id: MachineId,
        address: &str,
        port: u16,
    ) -> Result<(), SimError> {
        if self.mode == TopologyMode::Scanned {
            return Err(SimError::ScanModeLocked);
        }
        if self
            .machines
            .iter()
            .any(|machine| machine.id != id && machine.address == address)
        {
            return Err(SimError::AddressInUse(address.to_string()));
        }
        let machine = self.get_mut(id)?;
        machine.address = address.to_string();
        machine.port = port;
        Ok(())
    }

    pub fn set_pingable(&mut self, id: MachineId, pingable: bool) -> Result<(), SimError> {
        self.get_mut(id)?.pingable = pingable;
        Ok(())
    }

    /// Swaps in a scanned network. Returns every id that was dropped.
    pub fn replace_all(&mut self, devices: &[ScannedDevice]) -> Vec<MachineId> {
        let removed: Vec<MachineId> = self.machines.drain(..).map(|m| m.id).collect();
        self.mode = TopologyMode::Scanned;

        let mut seen = HashSet::new();
        let unique: Vec<&ScannedDevice> = devices
            .iter()
            .filter(|device| !device.ip.trim().is_empty() && seen.insert(device.ip.as_str()))
            .collect();
        if unique.len() > self.max_machines {
            warn!(
                found = unique.len(),
                kept = self.max_machines,
                "scan found more devices than the canvas holds"
            );
        }

        let kept: Vec<&ScannedDevice> = unique.into_iter().take(self.max_machines).collect();
        let count = kept.len();
        for (index, device) in kept.into_iter().enumerate() {
            let kind = device.device_kind();
            let draft = MachineDraft {
                name: Some(format!("{}-{}", kind.label(), host_suffix(&device.ip, index))),
                address: Some(device.ip.clone()),
                position: Some(ring_position(&self.canvas, index, count)),
                color: Some(kind_color(kind).to_string()),
                kind: Some(kind),
                ..MachineDraft::default()
            };
            self.insert(draft);
        }
        removed
    }

    /// Leaves scan mode and restores the default manual topology.
    pub fn reset_manual(&mut self) -> Vec<MachineId> {
        let removed: Vec<MachineId> = self.machines.drain(..).map(|m| m.id).collect();
        self.mode = TopologyMode::Manual;
        self.seed_defaults();
        removed
    }

    fn get_mut(&mut self, id: MachineId) -> Result<&mut Machine, SimError> {
        self.machines
            .iter_mut()
            .find(|machine| machine.id == id)
            .ok_or(SimError::NotFound(id))
    }
}

fn default_port(raw: u32) -> u16 {
    u16::try_from(9000 + raw).unwrap_or(u16::MAX)
}

fn host_suffix(ip: &str, index: usize) -> String {
    ip.rsplit(|c: char| c == '.' || c == ':')
        .next()
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .unwrap_or_else(|| (index + 1).to_string())
}

fn kind_color(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Pc => "#3b82f6",
        DeviceKind::Mobile => "#a855f7",
        DeviceKind::Router => "#f97316",
    }
}

fn ring_position(canvas: &Canvas, index: usize, count: usize) -> Position {
    let center = canvas.center();
    if count <= 1 {
        return center;
    }
    let radius = (canvas.width.min(canvas.height) / 2.0 - canvas.margin).max(0.0);
    let angle = TAU * index as f64 / count as f64;
    Position::new(
        center.x + radius * angle.cos(),
        center.y + radius * angle.sin(),
    )
}

fn scatter_position(name: &str) -> Position {
    Position::new(
        100.0 + unit_hash(1, name) * 400.0,
        100.0 + unit_hash(2, name) * 200.0,
    )
}

fn scatter_color(name: &str) -> String {
    let hue = (unit_hash(3, name) * 360.0).floor();
    format!("hsl({hue}, 70%, 60%)")
}

fn unit_hash(seed: u64, key: &str) -> f64 {
    let mut hash = 0xcbf29ce484222325u64 ^ seed;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash as f64 / u64::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scatter_stays_in_range() {
        for name in ["PC4", "PC5", "PC99"] {
            let pos = scatter_position(name);
            assert!((100.0..=500.0).contains(&pos.x));
            assert!((100.0..=300.0).contains(&pos.y));
        }
    }

    #[test]
    fn scatter_is_deterministic() {
        assert_eq!(scatter_position("PC4"), scatter_position("PC4"));
        assert_eq!(scatter_color("PC4"), scatter_color("PC4"));
    }

    #[test]
    fn host_suffix_uses_last_octet() {
        assert_eq!(host_suffix("10.0.0.42", 0), "42");
        assert_eq!(host_suffix("fe80::1", 0), "1");
        assert_eq!(host_suffix("10.0.0.", 3), "4");
    }

    #[test]
    fn ring_positions_fit_the_canvas() {
        let canvas = Canvas::default();
        for index in 0..5 {
            let pos = ring_position(&canvas, index, 5);
            assert_eq!(canvas.clamp(pos), pos);
        }
    }
}
