use pingboard_link::{DEFAULT_ENDPOINT, RECONNECT_DELAY};
use pingboard_model::Position;
use std::time::Duration;

pub const MAX_MACHINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            margin: 60.0,
        }
    }
}

impl Canvas {
    pub fn clamp(&self, position: Position) -> Position {
        let max_x = (self.width - self.margin).max(self.margin);
        let max_y = (self.height - self.margin).max(self.margin);
        Position {
            x: position.x.clamp(self.margin, max_x),
            y: position.y.clamp(self.margin, max_y),
        }
    }

    pub fn center(&self) -> Position {
        Position::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub endpoint: String,
    pub reconnect_delay: Duration,
    pub max_machines: usize,
    pub canvas: Canvas,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect_delay: RECONNECT_DELAY,
            max_machines: MAX_MACHINES,
            canvas: Canvas::default(),
        }
    }
}
