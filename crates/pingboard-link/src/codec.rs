use crate::LinkError;
use pingboard_model::{Command, Event};

pub fn encode_command(command: &Command) -> Result<String, LinkError> {
    serde_json::to_string(command).map_err(LinkError::Encode)
}

/// Unknown `type` tags decode to [`Event::Unknown`]; only malformed payloads fail.
pub fn decode_event(text: &str) -> Result<Event, LinkError> {
    serde_json::from_str(text).map_err(LinkError::Decode)
}
