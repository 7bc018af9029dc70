//! MIDI hardware input: one midir connection per configured device
//!
//! Incoming bytes are parsed on the midir thread and forwarded as
//! [`ControlEvent`]s over a tokio channel without blocking.

use crate::config::DeviceConfig;
use crate::error::MapperError;
use crate::event::ControlEvent;
use crate::midi::{format_hex, MidiMessage};
use anyhow::{anyhow, Context, Result};
use midir::{MidiInput, MidiInputConnection};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Connection state change reported by [`DeviceInputs::poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChange {
    Connected { device: String, port: String },
    Disconnected { device: String },
}

/// List available MIDI input ports
pub fn list_input_ports(client_name: &str) -> Result<Vec<String>> {
    let midi_in = MidiInput::new(client_name).context("Failed to create MIDI input")?;

    let mut port_names = Vec::new();
    for port in midi_in.ports() {
        if let Ok(name) = midi_in.port_name(&port) {
            port_names.push(name);
        }
    }

    Ok(port_names)
}

/// First port whose name contains `pattern` (case-insensitive)
pub fn match_port<'a>(ports: &'a [String], pattern: &str) -> Option<&'a str> {
    let pattern = pattern.to_lowercase();
    ports
        .iter()
        .find(|name| name.to_lowercase().contains(&pattern))
        .map(String::as_str)
}

/// Devices to connect (with their port) and connected devices whose port vanished
pub fn plan_changes(
    devices: &[DeviceConfig],
    connected: &HashMap<String, String>,
    ports: &[String],
) -> (Vec<(String, String)>, Vec<String>) {
    let mut to_connect = Vec::new();
    let mut to_drop = Vec::new();

    for device in devices {
        let port = match_port(ports, device.port_pattern());
        match (connected.get(&device.name), port) {
            (None, Some(port)) => to_connect.push((device.name.clone(), port.to_string())),
            (Some(current), _) if !ports.contains(current) => to_drop.push(device.name.clone()),
            _ => {}
        }
    }

    // Devices removed from the configuration
    let configured: HashSet<&str> = devices.iter().map(|d| d.name.as_str()).collect();
    for device in connected.keys() {
        if !configured.contains(device.as_str()) && !to_drop.contains(device) {
            to_drop.push(device.clone());
        }
    }
    to_drop.sort();

    (to_connect, to_drop)
}

struct DeviceConnection {
    port: String,
    _conn: MidiInputConnection<()>,
}

/// Live input connections for the configured devices
pub struct DeviceInputs {
    client_name: String,
    devices: Vec<DeviceConfig>,
    connections: HashMap<String, DeviceConnection>,
    event_tx: mpsc::Sender<ControlEvent>,
}

impl DeviceInputs {
    pub fn new(
        client_name: impl Into<String>,
        devices: Vec<DeviceConfig>,
        event_tx: mpsc::Sender<ControlEvent>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            devices,
            connections: HashMap::new(),
            event_tx,
        }
    }

    /// Replace the device list (config reload); takes effect on the next poll
    pub fn set_devices(&mut self, devices: Vec<DeviceConfig>) {
        self.devices = devices;
    }

    /// Connected device names, sorted
    pub fn connected(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Scan ports, connecting new devices and dropping vanished ones
    pub fn poll(&mut self) -> Result<Vec<DeviceChange>> {
        let ports = list_input_ports(&self.client_name)?;
        let connected: HashMap<String, String> = self
            .connections
            .iter()
            .map(|(device, conn)| (device.clone(), conn.port.clone()))
            .collect();

        let (to_connect, to_drop) = plan_changes(&self.devices, &connected, &ports);
        let mut changes = Vec::new();

        for device in to_drop {
            self.connections.remove(&device);
            info!(device = %device, "MIDI input closed");
            changes.push(DeviceChange::Disconnected { device });
        }

        for (device, port) in to_connect {
            match self.connect(&device, &port) {
                Ok(conn) => {
                    info!(device = %device, "Connected to input port: {}", port);
                    self.connections.insert(device.clone(), conn);
                    changes.push(DeviceChange::Connected { device, port });
                }
                Err(e) => warn!(device = %device, "Failed to connect to '{}': {:#}", port, e),
            }
        }

        Ok(changes)
    }

    fn connect(&self, device: &str, port_name: &str) -> Result<DeviceConnection> {
        let midi_in = MidiInput::new(&self.client_name).context("Failed to create MIDI input")?;

        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).map(|n| n == port_name).unwrap_or(false))
            .ok_or_else(|| anyhow!("Input port '{}' not found", port_name))?;

        let event_tx = self.event_tx.clone();
        let device_name = device.to_string();

        let conn = midi_in
            .connect(
                &port,
                &format!("{}-{}", self.client_name, device),
                move |_timestamp, data, _| {
                    let Some(message) = MidiMessage::parse(data) else {
                        trace!("Ignoring MIDI: {}", format_hex(data));
                        return;
                    };
                    if let Some(event) = ControlEvent::from_midi(&device_name, &message) {
                        // Never block the MIDI thread
                        if event_tx.try_send(event).is_err() {
                            debug!("Event channel full, dropping {}", message);
                        }
                    }
                },
                (),
            )
            .map_err(|e| MapperError::Midi(format!("Failed to connect to input port: {}", e)))?;

        Ok(DeviceConnection {
            port: port_name.to_string(),
            _conn: conn,
        })
    }

    /// Close every connection
    pub fn disconnect_all(&mut self) -> Vec<DeviceChange> {
        let mut devices: Vec<String> = self.connections.drain().map(|(d, _)| d).collect();
        devices.sort();
        devices
            .into_iter()
            .map(|device| DeviceChange::Disconnected { device })
            .collect()
    }
}
