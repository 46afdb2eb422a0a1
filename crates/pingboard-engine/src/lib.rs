//! Client-side simulation state: topology, ping sessions, terminals, packet
//! animation and reconciliation of backend events.

pub mod animator;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod reconciler;
pub mod sessions;
pub mod simulator;
pub mod terminal;
pub mod topology;

pub use animator::{PacketAnimator, PacketId, PacketToken, FRAME_INTERVAL};
pub use config::{Canvas, SimConfig, MAX_MACHINES};
pub use error::{CapacityReason, SimError};
pub use interpreter::{check_ping, parse_line, TerminalCommand};
pub use reconciler::format_summary;
pub use sessions::{Connection, SessionId, SessionKey, SessionTracker};
pub use simulator::{PacketView, Simulator};
pub use terminal::{LineKind, TerminalBook, TerminalLine};
pub use topology::{MachineDraft, TopologyMode, TopologyStore};
