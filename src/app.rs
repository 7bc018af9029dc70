//! Application state mutated by the main loop
//!
//! Startup is two-phase: [`App::build`] wires every component unbound, then
//! [`App::start`] loads device mappings and binds the router. Mapping files are
//! scoped per (device, rig): a device's rig override wins, otherwise the
//! session's selected rig.

use crate::actions::ActionId;
use crate::cli::{self, ConsoleCommand, QueueCommand};
use crate::config::AppConfig;
use crate::event::ControlEvent;
use crate::handlers::{register_all, HandlerContext};
use crate::input::{DeviceChange, DeviceInputs};
use crate::mapping::MappingStore;
use crate::paths::AppPaths;
use crate::rig::RigBinder;
use crate::router::{EventRouter, LearnCapture, RouteOutcome};
use crate::sequencer::{ConsoleSequencer, Sequencer, SequencerControl};
use crate::session::EditingSession;
use crate::settings::{sections, SettingsStore};
use colored::*;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configured devices plus devices recorded in the settings store
pub fn known_devices(config: &AppConfig, settings: Option<&SettingsStore>) -> Vec<String> {
    let mut devices: Vec<String> = config.devices.iter().map(|d| d.name.clone()).collect();
    if let Some(settings) = settings {
        for device in settings.discovered_devices() {
            if !devices.contains(&device) {
                devices.push(device);
            }
        }
    }
    devices
}

/// Everything the main loop mutates
pub struct App {
    config: AppConfig,
    router: EventRouter,
    session: Arc<Mutex<EditingSession>>,
    control: Arc<Mutex<SequencerControl>>,
    binder: Arc<Mutex<RigBinder>>,
    sequencer: Arc<ConsoleSequencer>,
    settings: SettingsStore,
    inputs: DeviceInputs,
    content_root: PathBuf,
}

impl App {
    /// Phase one: construct every component, unbound
    pub fn build(
        config: AppConfig,
        paths: &AppPaths,
        settings: SettingsStore,
        event_tx: mpsc::Sender<ControlEvent>,
    ) -> Self {
        let sequencer = Arc::new(ConsoleSequencer::new("console", config.session.default_length));
        sequencer.set_rigs(&config.rigs);
        let dyn_sequencer: Arc<dyn Sequencer> = sequencer.clone();

        let session = Arc::new(Mutex::new(EditingSession::new(
            dyn_sequencer.clone(),
            settings.clone(),
            &config.session,
            &paths.bake_root,
        )));
        let control = Arc::new(Mutex::new(SequencerControl::new(
            dyn_sequencer.clone(),
            config.sequencer.clone(),
        )));

        let binder = Arc::new(Mutex::new(RigBinder::new()));
        {
            let binder = Arc::clone(&binder);
            let sequencer = dyn_sequencer.clone();
            session.lock().on_rig_changed(Arc::new(move |rig: &str| {
                binder.lock().register_rig_controls(&*sequencer, rig);
            }));
        }

        let mut router = EventRouter::new(MappingStore::new(paths.mappings_dir()));
        register_all(
            router.registry_mut(),
            HandlerContext {
                control: Arc::clone(&control),
                session: Arc::clone(&session),
            },
        );
        router.on_learn(Arc::new(|capture: &LearnCapture| {
            println!(
                "{} {}:{} → {} (row {})",
                "✓ Learned".green().bold(),
                capture.device,
                capture.control_id,
                capture.target.action.action_name,
                capture.target.row
            );
        }));

        let inputs = DeviceInputs::new(
            config.midi.client_name.clone(),
            config.devices.clone(),
            event_tx,
        );

        Self {
            config,
            router,
            session,
            control,
            binder,
            sequencer,
            settings,
            inputs,
            content_root: paths.bake_root.clone(),
        }
    }

    /// Phase two: load known device mappings, register rig controls, bind the router
    pub fn start(&mut self) {
        for device in known_devices(&self.config, Some(&self.settings)) {
            let rig = self.mapping_rig(&device);
            self.router.device_connected(&device, &rig);
        }

        let rig = self.session.lock().rig().to_string();
        self.binder
            .lock()
            .register_rig_controls(&*self.sequencer, &rig);

        if self.router.on_host_ready() {
            info!("Router bound, ready to process MIDI events");
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut EventRouter {
        &mut self.router
    }

    pub fn session(&self) -> &Arc<Mutex<EditingSession>> {
        &self.session
    }

    pub fn on_control_event(&mut self, event: &ControlEvent) -> RouteOutcome {
        self.router.on_control_event(event)
    }

    /// Rig scoping a device's mappings under the current config and session
    fn mapping_rig(&self, device: &str) -> String {
        match self.config.device_rig(device) {
            Some(rig) => rig.to_string(),
            None => self.session.lock().mapping_rig().to_string(),
        }
    }

    /// Move every active device whose rig no longer matches onto its new file
    fn rescope_devices(&mut self) -> usize {
        let mut moved = 0;
        for device in self.router.store().devices() {
            let rig = self.mapping_rig(&device);
            if self.router.rescope_device(&device, &rig) {
                moved += 1;
            }
        }
        moved
    }

    pub fn poll_devices(&mut self) {
        let changes = match self.inputs.poll() {
            Ok(changes) => changes,
            Err(e) => {
                debug!("MIDI port scan failed: {:#}", e);
                return;
            }
        };
        for change in changes {
            self.apply_device_change(change);
        }
    }

    pub fn apply_device_change(&mut self, change: DeviceChange) {
        match change {
            DeviceChange::Connected { device, port } => {
                let rig = self.mapping_rig(&device);
                self.router.device_connected(&device, &rig);

                let section = format!("{}{}", sections::DEVICE_PREFIX, device);
                let now = chrono::Local::now().to_rfc3339();
                if let Err(e) = self
                    .settings
                    .set_string(&section, "Port", &port)
                    .and_then(|_| self.settings.set_string(&section, "LastSeen", &now))
                {
                    warn!(device = %device, "Failed to record device: {}", e);
                }
            }
            DeviceChange::Disconnected { device } => self.router.device_disconnected(&device),
        }
    }

    /// Apply a reloaded config; returns whether the poll interval changed
    ///
    /// Newly listed devices are initialized and devices whose rig override
    /// changed move to the matching mapping file.
    pub fn apply_config(&mut self, config: AppConfig) -> bool {
        self.sequencer.set_rigs(&config.rigs);
        self.control.lock().set_config(config.sequencer.clone());
        self.inputs.set_devices(config.devices.clone());

        let added: Vec<String> = config
            .devices
            .iter()
            .filter(|d| !self.config.devices.iter().any(|old| old.name == d.name))
            .map(|d| d.name.clone())
            .collect();
        let interval_changed = config.midi.poll_interval_ms != self.config.midi.poll_interval_ms;
        self.config = config;

        for device in &added {
            let rig = self.mapping_rig(device);
            self.router.device_connected(device, &rig);
        }
        let moved = self.rescope_devices();

        let rig = self.session.lock().rig().to_string();
        self.binder
            .lock()
            .register_rig_controls(&*self.sequencer, &rig);

        info!(
            added = added.len(),
            rescoped = moved,
            "✅ Configuration applied"
        );
        interval_changed
    }

    /// Apply one console command; `false` ends the loop
    pub fn apply_console(&mut self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Learn(mut target) => {
                if target.action.action().ok() == Some(ActionId::RigControl) {
                    let binder = self.binder.lock();
                    match binder.find(&target.action.target_control) {
                        Some(t) => target.action.target_control = t.id.clone(),
                        None => warn!(
                            "'{}' is not a control of rig '{}'",
                            target.action.target_control,
                            binder.rig()
                        ),
                    }
                }
                println!(
                    "{} row {} ({}), move a control...",
                    "● Learning".yellow().bold(),
                    target.row,
                    target.action.action_name
                );
                self.router.arm_learn(target);
            }
            ConsoleCommand::Cancel => {
                if self.router.cancel_learn().is_some() {
                    println!("Learn cancelled");
                }
            }
            ConsoleCommand::Unbind { device, control_id } => {
                if !self.router.unbind(&device, control_id) {
                    println!("{} {}:{} was not bound", "•".yellow(), device, control_id);
                }
            }
            ConsoleCommand::Mappings(device) => {
                cli::print_mappings(self.router.store(), device.as_deref())
            }
            ConsoleCommand::Queue(QueueCommand::Next) | ConsoleCommand::Next => {
                self.session.lock().load_next();
            }
            ConsoleCommand::Queue(command) => {
                let mut session = self.session.lock();
                cli::apply_queue(session.queue_mut(), &command, &self.content_root);
            }
            ConsoleCommand::Bake => {
                if let Some(path) = self.session.lock().bake_and_save() {
                    println!("{} {}", "✓ Baked".green(), path.display());
                }
            }
            ConsoleCommand::Rig(rig) => {
                let changed = self.session.lock().select_rig(&rig);
                if changed {
                    self.rescope_devices();
                }
            }
            ConsoleCommand::Mesh(mesh) => self.session.lock().select_mesh(&mesh),
            ConsoleCommand::Output(folder) => self.session.lock().set_output_folder(&folder),
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Help => cli::print_help(),
            ConsoleCommand::Quit => return false,
        }
        true
    }

    fn print_status(&self) {
        let session = self.session.lock();
        let frame_rate = self.config.session.frame_rate;

        println!("\n{}", "=== Session ===".bold().cyan());
        println!("  Mesh:     {}", session.mesh().unwrap_or("none").green());
        println!("  Rig:      {}", session.rig().green());
        println!("  Output:   {}", session.output_folder().green());

        let queue = session.queue();
        let cursor = queue
            .current()
            .map(|a| a.display_name.clone())
            .unwrap_or_else(|| "none".to_string());
        println!("  Queue:    {} item(s), current: {}", queue.len(), cursor.yellow());

        match (self.sequencer.current_frame(), self.sequencer.playback_range()) {
            (Some(frame), Some(range)) => println!(
                "  Frame:    {} ({:.2}s), range {}",
                frame,
                f64::from(frame) / frame_rate,
                range
            ),
            _ => println!("  Frame:    {}", "no sequence open".dimmed()),
        }

        let learning = match self.router.learn_target() {
            Some(t) => format!("row {} ({})", t.row, t.action.action_name).yellow(),
            None => "off".normal(),
        };
        println!("  Learn:    {}", learning);
        println!("  Devices:  {}", self.inputs.connected().join(", "));

        let binder = self.binder.lock();
        let labels: Vec<&str> = binder.targets().iter().map(|t| t.label.as_str()).collect();
        println!("  Controls: {}", labels.join(", "));
    }

    /// Close inputs and flush mappings and settings
    pub fn shutdown(&mut self) {
        for change in self.inputs.disconnect_all() {
            self.apply_device_change(change);
        }
        if let Err(e) = self.router.store().save_all() {
            warn!("Failed to save mappings: {}", e);
        }
        if let Err(e) = self.settings.flush() {
            warn!("Failed to flush settings: {}", e);
        }
    }
}
