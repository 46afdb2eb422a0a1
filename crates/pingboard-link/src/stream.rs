use crate::client::{LinkEvent, Transport};
use crate::LinkError;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8765";

#[derive(Debug)]
enum DriverCommand {
    Connect,
    Send(String),
    Shutdown,
}

/// [`Transport`] backed by a websocket driver task. Must be created inside a
/// tokio runtime.
pub struct WsTransport {
    commands: UnboundedSender<DriverCommand>,
}

impl WsTransport {
    pub fn spawn(endpoint: &str, events: UnboundedSender<LinkEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(endpoint.to_string(), rx, events));
        Self { commands: tx }
    }
}

impl Transport for WsTransport {
    fn open(&mut self) {
        if self.commands.send(DriverCommand::Connect).is_err() {
            warn!("websocket driver is gone; connect request dropped");
        }
    }

    fn transmit(&mut self, payload: String) -> Result<(), LinkError> {
        self.commands
            .send(DriverCommand::Send(payload))
            .map_err(|_| LinkError::ChannelClosed("websocket driver stopped".to_string()))
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(DriverCommand::Shutdown);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let _ = self.commands.send(DriverCommand::Shutdown);
    }
}

pub fn spawn_channel(endpoint: &str) -> (WsTransport, UnboundedReceiver<LinkEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (WsTransport::spawn(endpoint, tx), rx)
}

async fn drive(
    endpoint: String,
    mut commands: UnboundedReceiver<DriverCommand>,
    events: UnboundedSender<LinkEvent>,
) {
    loop {
        match commands.recv().await {
            None | Some(DriverCommand::Shutdown) => return,
            Some(DriverCommand::Send(_)) => {
                warn!("dropping outbound message while disconnected");
                continue;
            }
            Some(DriverCommand::Connect) => {}
        }

        let mut ws = match connect_async(endpoint.as_str()).await {
            Ok((ws, _)) => ws,
            Err(err) => {
                warn!("backend_connect_error: {err}");
                if events
                    .send(LinkEvent::Closed {
                        reason: err.to_string(),
                    })
                    .is_err()
                {
                    return;
                }
                continue;
            }
        };

        if events.send(LinkEvent::Opened).is_err() {
            let _ = ws.close(None).await;
            return;
        }

        let reason = loop {
            tokio::select! {
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(LinkEvent::Message(text)).is_err() {
                            let _ = ws.close(None).await;
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break "closed by backend".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break err.to_string(),
                },
                cmd = commands.recv() => match cmd {
                    Some(DriverCommand::Send(text)) => {
                        if let Err(err) = ws.send(Message::Text(text)).await {
                            break err.to_string();
                        }
                    }
                    Some(DriverCommand::Connect) => {}
                    None | Some(DriverCommand::Shutdown) => {
                        let _ = ws.close(None).await;
                        return;
                    }
                },
            }
        };

        if events.send(LinkEvent::Closed { reason }).is_err() {
            return;
        }
    }
}
