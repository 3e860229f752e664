use crate::attribute::{BoxPower, PlayState};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Receives attribute values decoded from device reports.
pub trait DeviceStateSink {
    fn set_play_state(&mut self, state: PlayState);
    fn set_intensity(&mut self, percent: u8);
    fn set_current_pattern(&mut self, name: String);
    fn set_available_patterns(&mut self, names: Vec<String>);
    fn set_box_name(&mut self, name: String);
    fn set_voltages(&mut self, battery_v: f64, capacitor_v: f64, primary_current_a: f64);
}

/// User-facing log channel. `debug` carries text sent by the box on the Debug service.
pub trait LogSink {
    fn log(&mut self, text: &str);
    fn debug(&mut self, text: &str);
}

/// Last known state of a box.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceState {
    pub play_state: PlayState,
    pub intensity: u8,
    pub current_pattern: String,
    pub available_patterns: Vec<String>,
    pub box_name: String,
    pub power: BoxPower,
}

/// A single state update, for consumers that prefer events over a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    PlayState(PlayState),
    Intensity(u8),
    CurrentPattern(String),
    AvailablePatterns(Vec<String>),
    BoxName(String),
    Power(BoxPower),
}

impl DeviceState {
    pub fn apply(&mut self, change: StateChange) {
        match change {
            StateChange::PlayState(state) => self.play_state = state,
            StateChange::Intensity(percent) => self.intensity = percent,
            StateChange::CurrentPattern(name) => self.current_pattern = name,
            StateChange::AvailablePatterns(names) => self.available_patterns = names,
            StateChange::BoxName(name) => self.box_name = name,
            StateChange::Power(power) => self.power = power,
        }
    }
}

fn power(battery_v: f64, capacitor_v: f64, primary_current_a: f64) -> BoxPower {
    BoxPower {
        battery_v,
        capacitor_v,
        primary_current_a,
    }
}

/// Anything that can absorb a [`StateChange`] gets the [`DeviceStateSink`] setters for free.
pub trait ChangeSink {
    fn push(&mut self, change: StateChange);
}

impl<T: ChangeSink> DeviceStateSink for T {
    fn set_play_state(&mut self, state: PlayState) {
        self.push(StateChange::PlayState(state));
    }

    fn set_intensity(&mut self, percent: u8) {
        self.push(StateChange::Intensity(percent));
    }

    fn set_current_pattern(&mut self, name: String) {
        self.push(StateChange::CurrentPattern(name));
    }

    fn set_available_patterns(&mut self, names: Vec<String>) {
        self.push(StateChange::AvailablePatterns(names));
    }

    fn set_box_name(&mut self, name: String) {
        self.push(StateChange::BoxName(name));
    }

    fn set_voltages(&mut self, battery_v: f64, capacitor_v: f64, primary_current_a: f64) {
        self.push(StateChange::Power(power(battery_v, capacitor_v, primary_current_a)));
    }
}

impl ChangeSink for DeviceState {
    fn push(&mut self, change: StateChange) {
        self.apply(change);
    }
}

impl ChangeSink for watch::Sender<DeviceState> {
    fn push(&mut self, change: StateChange) {
        self.send_modify(|state| state.apply(change));
    }
}

impl ChangeSink for mpsc::UnboundedSender<StateChange> {
    fn push(&mut self, change: StateChange) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.send(change);
    }
}

/// Forwards the log channel to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&mut self, text: &str) {
        info!(target: "neodk", "{text}");
    }

    fn debug(&mut self, text: &str) {
        debug!(target: "neodk::box", "{text}");
    }
}

/// Collects log lines in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    pub lines: Vec<String>,
    pub debug_lines: Vec<String>,
}

impl LogSink for MemoryLogSink {
    fn log(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn debug(&mut self, text: &str) {
        self.debug_lines.push(text.to_string());
    }
}
