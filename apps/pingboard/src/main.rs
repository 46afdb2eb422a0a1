mod console;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use console::{
    console_help, parse_input, render_board, state_json, style_line, BoardView, ConsoleInput,
    TerminalTail, UiOpts,
};
use pingboard_engine::{Canvas, MachineDraft, SimConfig, Simulator, FRAME_INTERVAL};
use pingboard_link::{spawn_channel, Transport, DEFAULT_ENDPOINT};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pingboard",
    version,
    about = "Simulated network of machines pinging each other through a UDP backend"
)]
struct Cli {
    /// Websocket endpoint of the ping backend.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[arg(long, default_value_t = 3000)]
    reconnect_ms: u64,

    #[arg(long, default_value_t = 800.0)]
    width: f64,

    #[arg(long, default_value_t = 600.0)]
    height: f64,

    /// Disable ANSI colours.
    #[arg(long)]
    plain: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn sim_config(&self) -> Result<SimConfig> {
        ensure!(
            self.width > 0.0 && self.height > 0.0,
            "canvas size must be positive (got {}x{})",
            self.width,
            self.height
        );
        ensure!(self.reconnect_ms > 0, "--reconnect-ms must be at least 1");
        Ok(SimConfig {
            endpoint: self.endpoint.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_ms),
            canvas: Canvas {
                width: self.width,
                height: self.height,
                ..Canvas::default()
            },
            ..SimConfig::default()
        })
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    let config = cli.sim_config()?;
    let opts = UiOpts { plain: cli.plain };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(run_console(config, opts))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("log_init_error: a global subscriber is already installed");
    }
}

async fn run_console(config: SimConfig, opts: UiOpts) -> Result<()> {
    let (transport, mut link_events) = spawn_channel(&config.endpoint);
    info!(endpoint = %config.endpoint, "starting");
    let mut sim = Simulator::new(config, transport);
    let mut tail = TerminalTail::default();
    sim.start();

    println!("{}", render_board(&BoardView::capture(&sim), &opts, term_width()));
    println!("type :help for console commands, :open <id> to use a machine terminal");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut channel = sim.channel_state();

    loop {
        tokio::select! {
            event = link_events.recv() => match event {
                Some(event) => sim.handle_link(event, Instant::now()),
                None => {
                    warn!("websocket driver stopped");
                    break;
                }
            },
            line = stdin.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => {
                        if !handle_input(&mut sim, &line, &opts)? {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = frames.tick() => sim.tick(Instant::now()),
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }

        let state = sim.channel_state();
        if state != channel {
            println!("[backend {state}]");
            channel = state;
        }
        for line in tail.fresh(&sim) {
            println!("{}", style_line(&line, &opts));
        }
    }

    sim.shutdown();
    Ok(())
}

/// Applies one console line. Returns `false` when the user asked to quit.
fn handle_input<T: Transport>(sim: &mut Simulator<T>, line: &str, opts: &UiOpts) -> Result<bool> {
    let input = match parse_input(line) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("{err}");
            return Ok(true);
        }
    };

    let outcome = match input {
        ConsoleInput::Quit => return Ok(false),
        ConsoleInput::Line(text) => {
            match sim.active_terminal() {
                Some(id) => {
                    // already written to the terminal
                    if let Err(err) = sim.submit_line(id, &text) {
                        debug!(machine = %id, %err, "terminal command failed");
                    }
                }
                None if text.trim().is_empty() => {}
                None => eprintln!("no terminal open (use :open <id>)"),
            }
            Ok(())
        }
        ConsoleInput::Add => sim
            .add_machine(MachineDraft::default())
            .map(|id| println!("added machine {id}")),
        ConsoleInput::Remove(id) => sim.remove_machine(id),
        ConsoleInput::Server(id) => sim.toggle_server(id),
        ConsoleInput::Open(id) => sim.open_terminal(id),
        ConsoleInput::Close => {
            sim.close_terminal();
            Ok(())
        }
        ConsoleInput::Move(id, position) => sim.move_machine(id, position),
        ConsoleInput::Address(id, address, port) => sim.update_address(id, &address, port),
        ConsoleInput::Pingable(id, pingable) => sim.set_pingable(id, pingable),
        ConsoleInput::Scan => sim.scan_network(),
        ConsoleInput::Info => sim.request_network_info(),
        ConsoleInput::Reset => {
            sim.reset_topology();
            Ok(())
        }
        ConsoleInput::Board => {
            println!("{}", render_board(&BoardView::capture(sim), opts, term_width()));
            Ok(())
        }
        ConsoleInput::State => {
            let json = state_json(sim).context("failed to serialize state")?;
            println!("{json}");
            Ok(())
        }
        ConsoleInput::Help => {
            for line in console_help() {
                println!("{line}");
            }
            Ok(())
        }
    };

    if let Err(err) = outcome {
        eprintln!("error: {err}");
    }
    Ok(true)
}

fn term_width() -> u16 {
    crossterm::terminal::size().map(|(w, _)| w).unwrap_or(80)
}
