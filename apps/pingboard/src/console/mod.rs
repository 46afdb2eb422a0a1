pub mod command;
pub mod draw;
pub mod model;

pub use command::{console_help, parse_input, ConsoleInput};
pub use draw::{render_board, style_line, UiOpts};
pub use model::{state_json, BoardView, TerminalTail};
