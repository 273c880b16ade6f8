#![forbid(unsafe_code)]

mod animation;
mod autostart;
mod behavior;
mod config;
mod constants;
mod error;
mod motion;
mod tray;
mod types;
mod updates;
mod window;

use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use animation::AnimationLibrary;
use config::{ConfigPatch, ConfigStore, PetConfig};
use constants::{assets, timing};
use motion::{DragSignal, MotionController, TickInput};
use tray::{PetCommand, PetTray, TrayLink};
use types::Position;
use window::{PetWindow, WindowEvent};

#[derive(Parser, Debug)]
#[command(name = "scamper", version, about = "Animated desktop pet overlay")]
struct Cli {
    /// Config file path (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Animation asset directory
    #[arg(long, default_value = constants::paths::ASSET_DIR)]
    assets: PathBuf,

    /// Seed for the behavior RNG, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let mut store = match cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::at_default_path(),
    };
    let mut config = store.load(false);
    info!(path = %store.path().display(), config = ?config, "config loaded");

    autostart::check_and_fix(config.auto_startup);

    // Window creation is the only fatal failure; everything downstream
    // degrades per feature.
    let mut window = PetWindow::new(types::Dimensions::new(64, 64), Position::new(0, 0))
        .context("Failed to create overlay window")?;
    let render_scale = config.scale() * window.dpi_scale();
    let mut library = Arc::new(AnimationLibrary::load(&cli.assets, render_scale));

    let bounds = window.screen_bounds();
    let size = library.pet_size();
    let start = Position::new(
        (bounds.width.saturating_sub(size.width) / 2) as i32,
        (bounds.height.saturating_sub(size.height) / 2) as i32,
    );
    window.apply_position(start);
    window.set_topmost(true);
    window.set_click_through(config.click_through);
    window.set_opacity(config.opacity());

    let rng = match cli.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };
    let mut controller = MotionController::new(Arc::clone(&library), bounds, start, rng);

    // Command channel for tray thread → tick loop
    let (command_tx, command_rx) = mpsc::channel();

    let tray_link = match tray::spawn(PetTray::new(
        command_tx.clone(),
        config.clone(),
        &cli.assets.join(assets::ICON),
    )) {
        Ok(link) => Some(link),
        Err(err) => {
            warn!(error = %err, "tray unavailable, continuing without it");
            None
        }
    };

    updates::spawn_check(command_tx.clone(), env!("CARGO_PKG_VERSION"));

    let quit = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&quit))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&quit))?;

    let tick = Duration::from_millis(timing::TICK_MS);
    let mut last_frame = None;
    let mut running = true;

    while running && !quit.load(Ordering::Relaxed) {
        let frame_start = Instant::now();

        // Drain tray and update-check commands (non-blocking)
        while let Ok(command) = command_rx.try_recv() {
            info!(command = ?command, "received command");
            match command {
                PetCommand::Quit => running = false,
                PetCommand::UpdateAvailable(version) => {
                    if let Some(link) = &tray_link {
                        link.notify_update(version);
                    } else {
                        info!(version = %version, "newer release available");
                    }
                }
                PetCommand::CheckUpdates => {
                    updates::spawn_check(command_tx.clone(), env!("CARGO_PKG_VERSION"));
                }
                PetCommand::OpenConfig => {
                    // Persist once so the file exists before the editor opens
                    config = apply_patch(&mut store, ConfigPatch::default());
                    if let Err(err) = std::process::Command::new("xdg-open")
                        .arg(store.path())
                        .spawn()
                    {
                        warn!(error = %err, "failed to open config file");
                    }
                }
                PetCommand::ToggleFollow => {
                    config = apply_patch(
                        &mut store,
                        ConfigPatch {
                            follow_mouse: Some(!config.follow_mouse),
                            ..Default::default()
                        },
                    );
                    sync_tray(&tray_link, &config);
                }
                PetCommand::ToggleClickThrough => {
                    config = apply_patch(
                        &mut store,
                        ConfigPatch {
                            click_through: Some(!config.click_through),
                            ..Default::default()
                        },
                    );
                    window.set_click_through(config.click_through);
                    sync_tray(&tray_link, &config);
                }
                PetCommand::ToggleAutostart => {
                    let enable = !config.auto_startup;
                    if let Err(err) = autostart::set(enable) {
                        warn!(error = %err, "autostart toggle failed");
                    }
                    config = apply_patch(
                        &mut store,
                        ConfigPatch {
                            auto_startup: Some(enable),
                            ..Default::default()
                        },
                    );
                    sync_tray(&tray_link, &config);
                }
                PetCommand::SetBehaviorMode(mode) => {
                    config = apply_patch(
                        &mut store,
                        ConfigPatch {
                            behavior_mode: Some(mode),
                            ..Default::default()
                        },
                    );
                    sync_tray(&tray_link, &config);
                }
                PetCommand::SetScale(index) => {
                    config = apply_patch(
                        &mut store,
                        ConfigPatch {
                            scale_index: Some(index),
                            ..Default::default()
                        },
                    );
                    let render_scale = config.scale() * window.dpi_scale();
                    library = Arc::new(AnimationLibrary::load(&cli.assets, render_scale));
                    controller.set_library(Arc::clone(&library));
                    last_frame = None;
                    sync_tray(&tray_link, &config);
                }
                PetCommand::SetOpacity(index) => {
                    config = apply_patch(
                        &mut store,
                        ConfigPatch {
                            opacity_index: Some(index),
                            ..Default::default()
                        },
                    );
                    window.set_opacity(config.opacity());
                    sync_tray(&tray_link, &config);
                }
            }
        }

        // Fold this tick's pointer events into one drag signal; release
        // wins over start, the latest move wins otherwise
        let mut drag = DragSignal::None;
        for event in window.poll_events() {
            drag = match (drag, event) {
                (_, WindowEvent::DragReleased) => DragSignal::Released,
                (DragSignal::Released, _) => DragSignal::Released,
                (DragSignal::None, WindowEvent::DragStarted) => DragSignal::Started,
                (DragSignal::Started, _) => DragSignal::Started,
                (_, WindowEvent::DragMoved(pos)) => DragSignal::Moved(pos),
                (current, _) => current,
            };
        }

        let input = TickInput {
            cursor: window.cursor_position(),
            drag,
        };
        let output = controller.tick(&input, &config);

        if output.moved {
            window.apply_position(output.position);
        }
        if last_frame != Some(output.frame) {
            window.present(library.frame(&output.frame));
            last_frame = Some(output.frame);
        }
        window.flush();

        let elapsed = frame_start.elapsed();
        if elapsed < tick {
            std::thread::sleep(tick - elapsed);
        }
    }

    info!("shutting down");
    Ok(())
}

/// Merge a patch into the store; a failed write keeps the in-memory value
/// so the running pet still honors the request.
fn apply_patch(store: &mut ConfigStore, patch: ConfigPatch) -> PetConfig {
    match store.update(patch) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "failed to persist config, keeping in-memory value");
            store.load(false)
        }
    }
}

fn sync_tray(link: &Option<TrayLink>, config: &PetConfig) {
    if let Some(link) = link {
        link.sync_config(config.clone());
    }
}
