//! Toucan MIDI - MIDI controller mapping core for rig-based animation authoring
//!
//! Routes control events from MIDI devices either into learn mode (binding the
//! control to an armed action) or to the typed command registry, and drives an
//! animation queue and editing session through the [`sequencer::Sequencer`] trait.

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod handlers;
pub mod input;
pub mod mapping;
pub mod midi;
pub mod paths;
pub mod queue;
pub mod rig;
pub mod router;
pub mod sequencer;
pub mod session;
pub mod settings;

pub use error::{MapperError, Result};
