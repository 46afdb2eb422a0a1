use crate::codec::{decode_event, encode_command};
use crate::LinkError;
use pingboard_model::{Command, Event};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "connected",
            ChannelState::Closed => "disconnected",
        };
        f.write_str(label)
    }
}

/// What the socket side reports back to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Opened,
    Message(String),
    Closed { reason: String },
}

/// The raw socket behind a [`ProtocolClient`].
pub trait Transport {
    /// Begin a connection attempt. The outcome arrives later as a [`LinkEvent`].
    fn open(&mut self);

    fn transmit(&mut self, payload: String) -> Result<(), LinkError>;

    fn shutdown(&mut self) {}
}

/// Sole owner of the backend channel. Tracks the connection state and the
/// reconnect timer; everything else only goes through [`ProtocolClient::send`].
pub struct ProtocolClient<T: Transport> {
    transport: T,
    state: ChannelState,
    reconnect_delay: Duration,
    retry_at: Option<Instant>,
    stopped: bool,
}

impl<T: Transport> ProtocolClient<T> {
    pub fn new(transport: T, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            state: ChannelState::Closed,
            reconnect_delay,
            retry_at: None,
            stopped: false,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn connect(&mut self) {
        if self.stopped {
            return;
        }
        info!("backend_connecting");
        self.retry_at = None;
        self.state = ChannelState::Connecting;
        self.transport.open();
    }

    /// Applies a socket report. Returns the decoded backend event, if any.
    pub fn handle(&mut self, event: LinkEvent, now: Instant) -> Option<Event> {
        match event {
            LinkEvent::Opened => {
                if self.state == ChannelState::Connecting {
                    info!("backend_connected");
                    self.state = ChannelState::Open;
                } else {
                    debug!(state = %self.state, "ignoring stale open report");
                }
                None
            }
            LinkEvent::Closed { reason } => {
                self.close(&reason, now);
                None
            }
            LinkEvent::Message(text) => match decode_event(&text) {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(%err, "dropping backend message");
                    None
                }
            },
        }
    }

    /// Fires the reconnect timer when it is due.
    pub fn poll(&mut self, now: Instant) {
        match self.retry_at {
            Some(at) if at <= now && self.state == ChannelState::Closed => self.connect(),
            _ => {}
        }
    }

    /// Never queues: a closed channel is reported to the caller right away.
    pub fn send(&mut self, command: &Command) -> Result<(), LinkError> {
        if self.state != ChannelState::Open {
            return Err(LinkError::NotConnected);
        }
        let payload = encode_command(command)?;
        self.transport.transmit(payload)
    }

    /// Cancels the reconnect timer and closes the socket for good.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.retry_at = None;
        self.state = ChannelState::Closed;
        self.transport.shutdown();
    }

    fn close(&mut self, reason: &str, now: Instant) {
        self.state = ChannelState::Closed;
        if self.stopped {
            return;
        }
        let at = now + self.reconnect_delay;
        warn!(reason, retry_in_ms = self.reconnect_delay.as_millis() as u64, "backend_disconnected");
        self.retry_at = Some(at);
    }
}

impl<T: Transport> Drop for ProtocolClient<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
