use crate::sessions::SessionKey;
use pingboard_model::MachineId;
use std::time::{Duration, Instant};

/// Roughly one rendered frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct PacketToken {
    pub id: PacketId,
    pub key: SessionKey,
    pub sequence: u32,
    pub progress: f64,
}

#[derive(Debug)]
struct Flight {
    token: PacketToken,
    started: Instant,
    duration: Duration,
    landed: bool,
}

/// In-flight packet tokens. A token that reaches `progress == 1.0` stays
/// visible for that frame and is dropped on the next tick.
#[derive(Debug)]
pub struct PacketAnimator {
    flights: Vec<Flight>,
    next_id: u64,
}

impl Default for PacketAnimator {
    fn default() -> Self {
        Self {
            flights: Vec::new(),
            next_id: 1,
        }
    }
}

impl PacketAnimator {
    pub fn launch(
        &mut self,
        key: SessionKey,
        sequence: u32,
        duration: Duration,
        now: Instant,
    ) -> PacketId {
        let id = PacketId(self.next_id);
        self.next_id += 1;
        self.flights.push(Flight {
            token: PacketToken {
                id,
                key,
                sequence,
                progress: 0.0,
            },
            started: now,
            duration,
            landed: false,
        });
        id
    }

    pub fn tick(&mut self, now: Instant) {
        self.flights.retain(|flight| !flight.landed);
        for flight in &mut self.flights {
            let progress = if flight.duration.is_zero() {
                1.0
            } else {
                let elapsed = now.saturating_duration_since(flight.started);
                (elapsed.as_secs_f64() / flight.duration.as_secs_f64()).min(1.0)
            };
            flight.token.progress = flight.token.progress.max(progress);
            if flight.token.progress >= 1.0 {
                flight.landed = true;
            }
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &PacketToken> {
        self.flights.iter().map(|flight| &flight.token)
    }

    pub fn get(&self, id: PacketId) -> Option<&PacketToken> {
        self.tokens().find(|token| token.id == id)
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Drops every token travelling to or from `id`.
    pub fn cancel_machine(&mut self, id: MachineId) -> usize {
        let before = self.flights.len();
        self.flights.retain(|flight| !flight.token.key.touches(id));
        before - self.flights.len()
    }

    pub fn cancel_session(&mut self, key: SessionKey) -> usize {
        let before = self.flights.len();
        self.flights.retain(|flight| flight.token.key != key);
        before - self.flights.len()
    }

    pub fn clear(&mut self) {
        self.flights.clear();
    }
}
