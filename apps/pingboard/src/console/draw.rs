use super::model::{BoardView, MachineRow};
use crossterm::style::Stylize;
use pingboard_engine::{LineKind, PacketView, TerminalLine};

#[derive(Debug, Clone, Copy)]
pub struct UiOpts {
    pub plain: bool,
}

const BAR_WIDTH: usize = 20;

pub fn render_board(view: &BoardView, opts: &UiOpts, term_w: u16) -> String {
    let mut lines = Vec::new();
    let width = term_w as usize;
    lines.push(center_line("PINGBOARD", width));
    lines.push(center_line(
        &format!("backend {}  |  {} topology", view.channel, view.mode),
        width,
    ));
    lines.push("".to_string());

    if view.machines.is_empty() {
        lines.push("  (no machines)".to_string());
    }
    for machine in &view.machines {
        lines.push(render_machine(machine, opts));
    }

    lines.push("".to_string());
    lines.push(format!("sessions: {}", joined(&view.sessions)));
    lines.push(format!("links:    {}", joined(&view.connections)));
    for packet in &view.packets {
        lines.push(render_packet(packet));
    }

    lines.join("\n")
}

fn render_machine(machine: &MachineRow, opts: &UiOpts) -> String {
    let marker = if machine.focused { ">" } else { " " };
    let endpoint = format!("{}:{}", machine.address, machine.port);
    let status = if machine.online { "online " } else { "offline" };
    let status = if opts.plain {
        status.to_string()
    } else if machine.online {
        status.green().to_string()
    } else {
        status.dark_grey().to_string()
    };
    let extra = if machine.pingable { "" } else { "  no-ping" };
    format!(
        "{marker} [{}] {:<12} {:<22} {:<6} {status} ({:.0}, {:.0}){extra}",
        machine.id, machine.name, endpoint, machine.kind, machine.x, machine.y
    )
}

fn render_packet(packet: &PacketView) -> String {
    format!(
        "  {} #{:<3} {} ({:.0}, {:.0})",
        packet.key,
        packet.sequence,
        progress_bar(packet.progress),
        packet.position.x,
        packet.position.y
    )
}

fn progress_bar(progress: f64) -> String {
    let progress = progress.clamp(0.0, 1.0);
    let filled = (progress * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "=".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress * 100.0
    )
}

/// One terminal line as printed to stdout.
pub fn style_line(line: &TerminalLine, opts: &UiOpts) -> String {
    let stamp = line.timestamp.format("%H:%M:%S");
    if opts.plain {
        return format!("[{stamp}] {}", line.text);
    }
    let text = line.text.as_str();
    let text = match line.kind {
        LineKind::Command => text.bold().to_string(),
        LineKind::Success => text.green().to_string(),
        LineKind::Error => text.red().to_string(),
        LineKind::Warning => text.yellow().to_string(),
        LineKind::System => text.cyan().to_string(),
        LineKind::Info | LineKind::Output => text.to_string(),
    };
    format!("{} {text}", format!("[{stamp}]").dark_grey())
}

fn joined(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn center_line(text: &str, width: usize) -> String {
    if text.len() >= width {
        return text.to_string();
    }
    let pad = (width - text.len()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}
