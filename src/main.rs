use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use neodk_lib::attribute::PlayCommand;
use neodk_lib::sink::TracingLogSink;
use neodk_lib::{DeviceState, NeoError, Session, SessionConfig, SessionEnd, SessionHandle};

mod error;
mod serial;

/// How long one-shot commands wait for the box to report back
const SETTLE: Duration = Duration::from_secs(2);

/// Text the box prints on its Debug service is logged under this target.
const BOX_DEBUG_DIRECTIVE: &str = "neodk::box=debug";

/// Host-side controller for NeoDK boxes on a serial port.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port of the box. Defaults to the first known USB-serial adapter.
    #[arg(short, long, global = true)]
    port: Option<String>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    /// Drop received frames whose CRC16 does not match.
    #[arg(long, global = true)]
    verify_crc16: bool,
    /// Show the box's own debug output at any verbosity.
    #[arg(long, global = true)]
    box_debug: bool,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports that look like a NeoDK box
    List,
    /// Print every report from the box until interrupted
    Monitor,
    /// Start the current pattern
    Play,
    /// Pause the current pattern
    Pause,
    /// Stop the current pattern
    Stop,
    /// Set the intensity in percent
    Intensity {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Select a pattern by name
    Pattern { name: String },
    /// Rename the box
    Name { name: String },
    /// Read battery and capacitor voltages
    Voltages,
}

/// Console gets plain messages; the log file also records targets, so box
/// debug text can be told apart from host events.
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let log_file = File::create(path)
                .with_context(|| format!("Failed to create log file at: {:?}", path))?;
            let (writer, guard) = tracing_appender::non_blocking(log_file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let env = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let filter = log_filter(cli.verbose.tracing_level_filter(), cli.box_debug, &env)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = &cli.log_file {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

/// INFO by default, DEBUG with -v, TRACE with -vv. `env` holds `RUST_LOG`
/// style directives on top of that.
fn log_filter(default: LevelFilter, box_debug: bool, env: &str) -> Result<EnvFilter> {
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .parse_lossy(env);
    if !box_debug {
        return Ok(filter);
    }
    Ok(filter.add_directive(BOX_DEBUG_DIRECTIVE.parse()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(&cli)?;

    if let Err(e) = run(cli).await {
        error!("{:?}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = SessionConfig::default().with_crc16_check(cli.verify_crc16);
    match cli.command {
        Command::List => list(),
        Command::Monitor => {
            let (session, state_rx) = connect(cli.port.as_deref(), config)?;
            monitor(session, state_rx).await
        }
        command => {
            let (session, state_rx) = connect(cli.port.as_deref(), config)?;
            let result = send_command(&session.handle(), command).await;
            if result.is_ok() {
                // Give the box time to report the result before printing the state.
                tokio::time::sleep(SETTLE).await;
                print_state(&state_rx.borrow());
            }
            session.shutdown();
            result
        }
    }
}

fn connect(
    port: Option<&str>,
    config: SessionConfig,
) -> Result<(Session, watch::Receiver<DeviceState>)> {
    let (reader, writer) = serial::open(port).context("Failed to open the box")?;
    let (state_tx, state_rx) = watch::channel(DeviceState::default());
    let session = Session::start(reader, writer, state_tx, TracingLogSink, config);
    Ok((session, state_rx))
}

async fn send_command(handle: &SessionHandle, command: Command) -> Result<()> {
    let transaction_id = match command {
        Command::Play => handle.set_play_state(PlayCommand::Play).await?,
        Command::Pause => handle.set_play_state(PlayCommand::Pause).await?,
        Command::Stop => handle.set_play_state(PlayCommand::Stop).await?,
        Command::Intensity { percent } => handle.set_intensity(percent).await?,
        Command::Pattern { name } => handle.select_pattern(&name).await?,
        Command::Name { name } => handle.set_box_name(&name).await?,
        Command::Voltages => handle.refresh_voltages().await?,
        Command::List | Command::Monitor => return Ok(()),
    };
    info!(transaction_id, "Request sent");
    Ok(())
}

fn list() -> Result<()> {
    let ports = serial::list_ports()?;
    if ports.is_empty() {
        info!("No NeoDK serial ports found.");
    }
    for port in ports {
        info!("{}: {:?}", port.port_name, port.port_type);
    }
    Ok(())
}

async fn monitor(session: Session, mut state_rx: watch::Receiver<DeviceState>) -> Result<()> {
    let closed = session.closed();
    tokio::pin!(closed);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    // The reader loop is gone; collect its result.
                    return report_end(closed.await);
                }
                print_state(&state_rx.borrow_and_update());
            }
            end = &mut closed => return report_end(end),
        }
    }
}

fn report_end(end: Result<SessionEnd, NeoError>) -> Result<()> {
    match end.context("Session failed")? {
        SessionEnd::EndOfStream => info!("Box disconnected"),
    }
    Ok(())
}

fn print_state(state: &DeviceState) {
    info!(
        "{} | {} | {}% | pattern {:?} of {:?} | {}",
        state.box_name,
        state.play_state,
        state.intensity,
        state.current_pattern,
        state.available_patterns,
        state.power
    );
}
