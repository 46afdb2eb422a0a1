//! Shared data structures for pingboard.

pub mod wire;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use wire::{Command, Event, MachineRef, PacketReport, PingStats, ScannedDevice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(pub u32);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Pc,
    Mobile,
    Router,
}

impl DeviceKind {
    /// Maps a scanner tag onto a kind. Anything unrecognised is treated as a PC.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mobile" => DeviceKind::Mobile,
            "router" => DeviceKind::Router,
            _ => DeviceKind::Pc,
        }
    }

    pub fn pingable(self) -> bool {
        matches!(self, DeviceKind::Pc)
    }

    pub fn label(self) -> &'static str {
        match self {
            DeviceKind::Pc => "PC",
            DeviceKind::Mobile => "MOBILE",
            DeviceKind::Router => "ROUTER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, to: Position, t: f64) -> Position {
        Position {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub position: Position,
    pub color: String,
    pub is_server: bool,
    pub kind: DeviceKind,
    pub pingable: bool,
}

impl Machine {
    pub fn has_terminal(&self) -> bool {
        self.pingable
    }
}
