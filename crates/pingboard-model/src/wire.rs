//! JSON messages exchanged with the ping backend.

use crate::{DeviceKind, MachineId};
use serde::{Deserialize, Serialize};

/// Client to backend. Serialized as a flat object with a `command` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    StartServer {
        machine_id: MachineId,
        ip: String,
        port: u16,
    },
    StopServer {
        machine_id: MachineId,
    },
    Ping {
        machine_id: MachineId,
        source_ip: String,
        target_ip: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_port: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<u64>,
    },
    ScanNetwork,
    GetNetworkInfo,
}

/// Backend to client, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ServerStarted {
        machine_id: MachineRef,
        #[serde(default)]
        message: String,
    },
    ServerStopped {
        machine_id: MachineRef,
        #[serde(default)]
        message: String,
    },
    PingStart {
        machine_id: MachineRef,
        #[serde(default)]
        message: String,
        #[serde(default)]
        session_id: Option<u64>,
    },
    PingPacket {
        machine_id: MachineRef,
        data: PacketReport,
        #[serde(default)]
        session_id: Option<u64>,
    },
    PingComplete {
        machine_id: MachineRef,
        stats: PingStats,
        #[serde(default)]
        session_id: Option<u64>,
    },
    NetworkInfo {
        local_ip: String,
        #[serde(default)]
        message: Option<String>,
    },
    NetworkScanComplete {
        devices: Vec<ScannedDevice>,
    },
    Error {
        #[serde(default)]
        machine_id: Option<MachineRef>,
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

/// The backend echoes whatever `machine_id` it was given. Scanned machines may
/// also be named by address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MachineRef {
    Id(MachineId),
    Address(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacketReport {
    pub packet: u32,
    pub status: String,
    #[serde(default)]
    pub rtt: Option<f64>,
    #[serde(default)]
    pub message: String,
}

impl PacketReport {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingStats {
    pub sent: u32,
    pub received: u32,
    pub lost: u32,
    pub loss_percentage: f64,
    pub avg_rtt: f64,
    pub min_rtt: f64,
    pub max_rtt: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannedDevice {
    pub ip: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ScannedDevice {
    pub fn device_kind(&self) -> DeviceKind {
        DeviceKind::from_tag(&self.kind)
    }
}
