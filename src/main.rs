//! Toucan MIDI - drive animation authoring from MIDI controllers
//!
//! Maps controller input to sequencer, rig and queue actions, with learn mode
//! for binding controls and an interactive console.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toucan_midi::actions::{ActionId, Modus};
use toucan_midi::app::{known_devices, App};
use toucan_midi::cli::{self, ConsoleCommand, QueueCommand};
use toucan_midi::config::{watcher::ConfigWatcher, AppConfig};
use toucan_midi::event::ControlEvent;
use toucan_midi::input::list_input_ports;
use toucan_midi::mapping::{MappedAction, MappingStore};
use toucan_midi::paths::AppPaths;
use toucan_midi::queue::{asset_name, AnimationQueue};
use toucan_midi::session::EditingSession;
use toucan_midi::settings::SettingsStore;

/// Toucan MIDI - MIDI controller mapping for rig-based animation authoring
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the detected app directory)
    #[arg(short, long, env = "TOUCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Write the log file as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the live MIDI loop (default)
    Run {
        /// Disable the interactive console
        #[arg(long)]
        no_console: bool,
    },
    /// List available MIDI input ports
    ListPorts,
    /// Show the action catalog
    Actions,
    /// Inspect or edit control mappings
    Mappings {
        #[command(subcommand)]
        action: MappingsCommand,
    },
    /// Inspect or edit the animation queue
    Queue {
        #[command(subcommand)]
        action: QueueArgs,
    },
}

#[derive(Subcommand, Debug)]
enum MappingsCommand {
    /// List mappings of configured and discovered devices
    List { device: Option<String> },
    /// Bind a control to an action
    Set {
        device: String,
        control_id: i32,
        /// Symbolic action name (see `actions`)
        action: String,
        /// Target control for `Rig.Control`
        target: Option<String>,
        /// Absolute, Relative or Toggle
        modus: Option<String>,
    },
    /// Remove a control binding
    Remove { device: String, control_id: i32 },
}

#[derive(Subcommand, Debug)]
enum QueueArgs {
    List,
    Add { paths: Vec<String> },
    /// Queue every animation under a content folder, recursively
    AddFolder { folder: String },
    Remove { index: usize },
    Clear,
    Next,
    /// Remove entries already baked
    Prune,
}

impl From<QueueArgs> for QueueCommand {
    fn from(args: QueueArgs) -> Self {
        match args {
            QueueArgs::List => QueueCommand::List,
            QueueArgs::Add { paths } => QueueCommand::Add(paths),
            QueueArgs::AddFolder { folder } => QueueCommand::AddFolder(folder),
            QueueArgs::Remove { index } => QueueCommand::Remove(index),
            QueueArgs::Clear => QueueCommand::Clear,
            QueueArgs::Next => QueueCommand::Next,
            QueueArgs::Prune => QueueCommand::Prune,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut paths = AppPaths::detect();
    if let Some(config) = &args.config {
        paths = paths.with_config(config);
    }
    paths.ensure_directories()?;

    let _log_guard = init_logging(&args.log_level, args.log_json, &paths.logs_dir)?;

    info!("Starting Toucan MIDI v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", paths.config.display());

    match args.command.unwrap_or(Command::Run { no_console: false }) {
        Command::Run { no_console } => run_app(&paths, !no_console).await?,
        Command::ListPorts => {
            let config = load_config(&paths.config).await?;
            print_ports(&config.midi.client_name)?;
        }
        Command::Actions => cli::print_actions(),
        Command::Mappings { action } => mappings_command(&paths, action).await?,
        Command::Queue { action } => {
            let settings = open_settings(&paths)?;
            let mut queue = AnimationQueue::load(settings.clone());
            cli::apply_queue(&mut queue, &action.into(), &paths.bake_root);
            settings.flush()?;
        }
    }

    Ok(())
}

fn init_logging(level: &str, json: bool, logs_dir: &Path) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let appender = tracing_appender::rolling::daily(logs_dir, "toucan-midi.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_text = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer.clone())
    });
    let file_json = json.then(|| tracing_subscriber::fmt::layer().json().with_writer(file_writer));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_text)
        .with(file_json)
        .init();

    Ok(guard)
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        warn!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    AppConfig::load(&path.to_string_lossy()).await
}

fn open_settings(paths: &AppPaths) -> Result<SettingsStore> {
    SettingsStore::open(paths.settings_dir()).with_context(|| {
        format!(
            "Failed to open settings store at {} (is another instance running?)",
            paths.settings_dir().display()
        )
    })
}

fn print_ports(client_name: &str) -> Result<()> {
    let ports = list_input_ports(client_name)?;
    println!("\n{}", "=== MIDI Input Ports ===".bold().cyan());
    if ports.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for (i, name) in ports.iter().enumerate() {
        println!("  {:>2}  {}", i, name.green());
    }
    Ok(())
}

async fn mappings_command(paths: &AppPaths, command: MappingsCommand) -> Result<()> {
    let config = load_config(&paths.config).await?;
    let settings = open_settings(paths).map_err(|e| warn!("{:#}", e)).ok();
    let session_rig = match &settings {
        Some(settings) => EditingSession::restored_rig(settings, &config.session),
        None => config.session.default_rig.clone(),
    };
    let session_rig = asset_name(&session_rig);
    let mut store = MappingStore::new(paths.mappings_dir());

    match command {
        MappingsCommand::List { device } => {
            let devices = match &device {
                Some(d) => vec![d.clone()],
                None => known_devices(&config, settings.as_ref()),
            };
            for device in &devices {
                store.initialize(device, config.rig_for_device(device, session_rig));
            }
            cli::print_mappings(&store, device.as_deref());
        }
        MappingsCommand::Set { device, control_id, action, target, modus } => {
            let action: ActionId = action.parse()?;
            let modus = modus.map(|m| Modus::parse_lenient(&m).as_str()).unwrap_or("");
            store.initialize(&device, config.rig_for_device(&device, session_rig));
            store.set(
                &device,
                control_id,
                MappedAction::new(action.name(), target.unwrap_or_default(), modus),
            )?;
            println!("{} {}:{} → {}", "✓".green(), device, control_id, action);
        }
        MappingsCommand::Remove { device, control_id } => {
            store.initialize(&device, config.rig_for_device(&device, session_rig));
            if store.remove(&device, control_id)? {
                println!("{} removed {}:{}", "✓".green(), device, control_id);
            } else {
                println!("{} {}:{} was not bound", "•".yellow(), device, control_id);
            }
        }
    }

    Ok(())
}

fn poll_interval(config: &AppConfig) -> Interval {
    let mut poll = interval(Duration::from_millis(config.midi.poll_interval_ms.max(100)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    poll
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

async fn run_app(paths: &AppPaths, interactive: bool) -> Result<()> {
    let (mut watcher, config) = if paths.config.exists() {
        let (watcher, config) =
            ConfigWatcher::new(paths.config.to_string_lossy().into_owned()).await?;
        info!("Configuration loaded with hot-reload enabled");
        (Some(watcher), config)
    } else {
        warn!("No config at {}, using defaults", paths.config.display());
        (None, AppConfig::default())
    };

    let settings = open_settings(paths)?;
    let (event_tx, mut event_rx) = mpsc::channel::<ControlEvent>(1024);

    let mut app = App::build(config, paths, settings, event_tx);
    app.start();

    let (console_tx, mut console_rx) = mpsc::channel::<ConsoleCommand>(16);
    if interactive {
        cli::spawn_repl(console_tx)?;
        cli::print_help();
    } else {
        drop(console_tx);
    }

    let mut poll = poll_interval(app.config());
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                let outcome = app.on_control_event(&event);
                trace!("{} → {:?}", event, outcome);
            }

            _ = poll.tick() => app.poll_devices(),

            Some(new_config) = next_config(&mut watcher) => {
                info!("📝 Configuration file changed, reloading...");
                if app.apply_config(new_config) {
                    poll = poll_interval(app.config());
                }
            }

            Some(command) = console_rx.recv() => {
                if !app.apply_console(command) {
                    break;
                }
            }

            _ = &mut shutdown => break,
        }
    }

    info!("Shutting down...");
    app.shutdown();
    info!("Toucan MIDI shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}
