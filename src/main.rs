//! # Rover Link
//!
//! Host-side link to the rover chassis controller.
//!
//! Receives framed messages from the controller, runs the daemon soft-timer
//! scheduler for the status indicators and the remote-control watchdog, and
//! optionally listens to an SBUS receiver.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use rover_link::config::Config;
use rover_link::daemon::DaemonScheduler;
use rover_link::owners::beep::{self, Buzzer, TracingBuzzerDriver};
use rover_link::owners::breathing::{self, Breathing};
use rover_link::owners::led::{self, BlinkPattern, Color, LedBank, TracingLedDriver};
use rover_link::owners::rc_watchdog::{self, LinkWatchdog};
use rover_link::protocol::{DecodedMessage, FrameDecoder, HostReceiver};
use rover_link::remote::SbusReceiver;
use rover_link::serial::{FrameConsumer, LineSettings, SerialLink};

/// Interval between status log messages and indicator updates
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Status LED slots
const LED_IDLE: usize = 0;
const LED_HOST_ACTIVE: usize = 1;
const LED_REMOTE_LOST: usize = 2;

/// Rover chassis controller host link
#[derive(Debug, Parser)]
#[command(name = "rover-link", version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file (built-in defaults if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Main entry point for Rover Link
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging through a non-blocking stdout writer
///    - Load configuration
///    - Register the status LED, breathing effect, buzzer and watchdog with the daemon
///    - Open the host link (and the SBUS receiver when enabled)
///
/// 2. **Main Loop**
///    - Deliver every received chunk to its consumer
///    - Log decoded host messages
///    - Reopen the host link after it drops
///    - Update the status LED and log statistics every 5 seconds
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - Configuration cannot be loaded
/// - The daemon has no room for the indicators
/// - The host link cannot be opened at startup
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let (writer, _log_guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .init();

    info!("Rover Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    debug!(?config, "Configuration loaded");

    // Daemon and its owners
    let (daemon, daemon_handle) = DaemonScheduler::new(config.daemon.capacity);

    let leds = Arc::new(Mutex::new(LedBank::new(TracingLedDriver::new("status"))));
    {
        let mut bank = leds.lock().unwrap_or_else(PoisonError::into_inner);
        bank.create(LED_IDLE, Color::DARK_GOLDENROD)?;
        bank.create(LED_HOST_ACTIVE, Color::DARK_GREEN)?;
        bank.create(LED_REMOTE_LOST, Color::FIREBRICK)?;
        bank.start(LED_IDLE, pattern_for(LED_IDLE))?;
    }
    led::attach(&daemon_handle, Arc::clone(&leds), config.indicators.led_reload_ticks)?;

    if config.indicators.breathing_enabled {
        let effect = Breathing::new(
            TracingLedDriver::new("rgb-strip"),
            Color::MEDIUM_PURPLE,
            config.indicators.breathing(),
        );
        breathing::attach(
            &daemon_handle,
            Arc::new(Mutex::new(effect)),
            config.indicators.breathing_reload_ticks,
        )?;
    }

    let watchdog = Arc::new(LinkWatchdog::new());
    let mut buzzer = Buzzer::new(TracingBuzzerDriver::new("buzzer"));
    if config.remote.enabled {
        watchdog.enable();
        rc_watchdog::attach(&daemon_handle, Arc::clone(&watchdog), config.remote.loss_reload_ticks)?;
        buzzer.watch_link(Arc::clone(&watchdog));
    }
    beep::attach(&daemon_handle, Arc::new(Mutex::new(buzzer)), config.indicators.beep_reload_ticks)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let daemon_task = tokio::spawn(daemon.run_until(config.daemon.tick_period(), async move {
        let _ = shutdown_rx.await;
    }));

    // Host link
    let host_settings = LineSettings::host(&config.serial.port, config.serial.baud_rate);
    let mut host = Some(SerialLink::open(&host_settings)?);
    let decoder = Arc::new(FrameDecoder::new());
    let (message_tx, mut messages) = mpsc::channel(config.serial.queue_depth);
    let mut host_receiver = HostReceiver::new(Arc::clone(&decoder), message_tx);

    // Remote-control receiver
    let mut sbus = if config.remote.enabled {
        Some(SerialLink::open(&LineSettings::sbus(&config.remote.port))?)
    } else {
        None
    };
    let mut sbus_receiver = SbusReceiver::new(Arc::clone(&watchdog));

    let mut reconnect = interval(Duration::from_millis(config.serial.reconnect_interval_ms));
    reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut status = interval(STATUS_INTERVAL);
    let mut host_active = false;
    let mut shown_led = LED_IDLE;

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            result = pump_link(&mut host, &mut host_receiver) => {
                match result {
                    Ok(0) => {
                        warn!("Host link closed, reconnecting");
                        host = None;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Host link error: {}, reconnecting", e);
                        host = None;
                    }
                }
            }

            result = pump_link(&mut sbus, &mut sbus_receiver) => {
                if let Err(e) = result {
                    warn!("SBUS receiver error: {}", e);
                    sbus = None;
                } else if let Ok(0) = result {
                    warn!("SBUS receiver closed");
                    sbus = None;
                }
            }

            Some(message) = messages.recv() => {
                host_active = true;
                log_message(&message);
            }

            _ = reconnect.tick(), if host.is_none() => {
                match SerialLink::open(&host_settings) {
                    Ok(link) => {
                        info!("Host link restored");
                        host = Some(link);
                    }
                    Err(e) => debug!("Reconnect failed: {}", e),
                }
            }

            _ = status.tick() => {
                let stats = decoder.stats().snapshot();
                info!(
                    decoded = stats.decoded,
                    errors = stats.errors(),
                    header_crc = stats.header_crc,
                    frame_crc = stats.frame_crc,
                    dropped = host_receiver.dropped(),
                    remote_online = watchdog.is_online(),
                    "Link status"
                );

                let wanted = select_indicator(watchdog.is_enabled(), watchdog.is_online(), host_active);
                if wanted != shown_led {
                    let mut bank = leds.lock().unwrap_or_else(PoisonError::into_inner);
                    bank.start(wanted, pattern_for(wanted))?;
                    shown_led = wanted;
                }
                host_active = false;
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    let daemon = daemon_task.await.context("daemon task failed")?;
    info!(
        ticks = daemon.ticks(),
        decoded = decoder.stats().decoded_count(),
        errors = decoder.stats().error_count(),
        "Stopped"
    );

    Ok(())
}

/// Deliver one chunk from `link`, or wait forever when the link is down
async fn pump_link<R, C>(link: &mut Option<SerialLink<R>>, consumer: &mut C) -> rover_link::error::Result<usize>
where
    R: AsyncRead + Unpin,
    C: FrameConsumer,
{
    match link {
        Some(link) => link.pump(consumer).await,
        None => std::future::pending().await,
    }
}

fn log_message(message: &DecodedMessage) {
    let values: Vec<f32> = message.floats().collect();
    debug!(
        cmd_id = format_args!("{:#06x}", message.cmd_id),
        flags = format_args!("{:#06x}", message.flags_register),
        ?values,
        "Host message"
    );
}

/// LED to show for the current link state
fn select_indicator(remote_enabled: bool, remote_online: bool, host_active: bool) -> usize {
    if remote_enabled && !remote_online {
        LED_REMOTE_LOST
    } else if host_active {
        LED_HOST_ACTIVE
    } else {
        LED_IDLE
    }
}

fn pattern_for(led: usize) -> BlinkPattern {
    match led {
        LED_REMOTE_LOST => BlinkPattern::new(1, 1, 0),
        LED_HOST_ACTIVE => BlinkPattern::new(1, 0, 0),
        _ => BlinkPattern::new(1, 4, 0),
    }
}
