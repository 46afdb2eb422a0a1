use crate::terminal::LineKind;
use pingboard_link::LinkError;
use pingboard_model::MachineId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("no connection to the backend")]
    NotConnected,
    #[error("host {address} not found on the network")]
    UnknownHost {
        address: String,
        suggestions: Vec<String>,
    },
    #[error("cannot ping your own address")]
    SelfPing,
    #[error("{name} is not running a UDP server")]
    TargetOffline { name: String },
    #[error("{name} does not answer pings")]
    TargetNotPingable { name: String },
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("cannot add another machine: {0}")]
    CapacityExceeded(CapacityReason),
    #[error("machine {from} is already pinging machine {to}")]
    AlreadyActive { from: MachineId, to: MachineId },
    #[error("malformed backend message: {0}")]
    DecodeError(String),
    #[error("failed to encode command: {0}")]
    EncodeError(String),
    #[error("channel closed: {0}")]
    ChannelClosed(String),
    #[error("machine {0} not found")]
    NotFound(MachineId),
    #[error("the topology is locked while showing a scanned network")]
    ScanModeLocked,
    #[error("address {0} is already in use")]
    AddressInUse(String),
    #[error("{name} has no terminal")]
    TerminalUnavailable { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityReason {
    Limit(usize),
    ScannedTopology,
}

impl std::fmt::Display for CapacityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityReason::Limit(limit) => write!(f, "the network is limited to {limit} machines"),
            CapacityReason::ScannedTopology => f.write_str("the topology comes from a network scan"),
        }
    }
}

impl SimError {
    pub fn line_kind(&self) -> LineKind {
        match self {
            SimError::TargetOffline { .. } => LineKind::Warning,
            _ => LineKind::Error,
        }
    }

    /// Follow-up line shown under the error in a terminal.
    pub fn hint(&self) -> Option<(LineKind, String)> {
        match self {
            SimError::NotConnected => Some((
                LineKind::Warning,
                "make sure the backend service is running".to_string(),
            )),
            SimError::UnknownHost { suggestions, .. } => {
                let listed = if suggestions.is_empty() {
                    "(none)".to_string()
                } else {
                    suggestions.join(", ")
                };
                Some((LineKind::Info, format!("available hosts: {listed}")))
            }
            SimError::TargetOffline { name } => Some((
                LineKind::Info,
                format!("start the server on {name} first"),
            )),
            SimError::UnknownCommand(_) => Some((
                LineKind::Info,
                "type \"help\" to list the available commands".to_string(),
            )),
            _ => None,
        }
    }
}

impl From<LinkError> for SimError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::NotConnected => SimError::NotConnected,
            LinkError::Decode(inner) => SimError::DecodeError(inner.to_string()),
            LinkError::Encode(inner) => SimError::EncodeError(inner.to_string()),
            LinkError::ChannelClosed(reason) => SimError::ChannelClosed(reason),
        }
    }
}
