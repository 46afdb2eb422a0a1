use chrono::{DateTime, Local};
use pingboard_model::MachineId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Command,
    Output,
    Info,
    Success,
    Error,
    Warning,
    System,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalLine {
    pub text: String,
    pub kind: LineKind,
    pub timestamp: DateTime<Local>,
}

/// Append-only scrollback per machine.
#[derive(Debug, Default)]
pub struct TerminalBook {
    logs: HashMap<MachineId, Vec<TerminalLine>>,
}

impl TerminalBook {
    pub fn push(&mut self, id: MachineId, kind: LineKind, text: impl Into<String>) {
        self.logs.entry(id).or_default().push(TerminalLine {
            text: text.into(),
            kind,
            timestamp: Local::now(),
        });
    }

    pub fn lines(&self, id: MachineId) -> &[TerminalLine] {
        self.logs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear(&mut self, id: MachineId) {
        if let Some(log) = self.logs.get_mut(&id) {
            log.clear();
        }
    }

    pub fn remove(&mut self, id: MachineId) {
        self.logs.remove(&id);
    }

    pub fn clear_all(&mut self) {
        self.logs.clear();
    }
}
