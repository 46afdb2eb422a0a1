//! Backend channel: JSON codec, connection state machine and websocket driver.

pub mod client;
pub mod codec;
pub mod stream;

use thiserror::Error;

pub use client::{ChannelState, LinkEvent, ProtocolClient, Transport, RECONNECT_DELAY};
pub use codec::{decode_event, encode_command};
pub use stream::{spawn_channel, WsTransport, DEFAULT_ENDPOINT};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no connection to the backend")]
    NotConnected,
    #[error("malformed backend message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}
