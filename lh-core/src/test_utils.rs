//! Test doubles shared by the unit tests

use parking_lot::Mutex;
use std::sync::Arc;

use lh_error::Result;
use lh_protocol::ActuatorCommand;

use crate::alert::{Alert, AlertSink};
use crate::config::{ActuatorRole, HubConfig};
use crate::context::HubContext;
use crate::settings::{LightingState, StateStore};

/// Records every command instead of sending it
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(ActuatorRole, ActuatorCommand)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<(ActuatorRole, ActuatorCommand)> {
        self.sent.lock().clone()
    }

    pub fn led_levels(&self) -> Vec<u8> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, cmd)| match cmd {
                ActuatorCommand::LedSet { level } => Some(*level),
                _ => None,
            })
            .collect()
    }

    pub fn lamp_commands(&self) -> Vec<(u32, u8)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, cmd)| match cmd {
                ActuatorCommand::LampSet { secs, level } => Some((*secs, *level)),
                _ => None,
            })
            .collect()
    }
}

impl crate::link::ActuatorSink for RecordingSink {
    fn send(&self, role: ActuatorRole, command: &ActuatorCommand) -> Result<()> {
        self.sent.lock().push((role, command.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    played: Mutex<Vec<Alert>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<Alert> {
        self.played.lock().clone()
    }

    pub fn last(&self) -> Option<Alert> {
        self.played.lock().last().copied()
    }
}

impl AlertSink for RecordingAlerts {
    fn play(&self, alert: Alert, _volume: u32) {
        self.played.lock().push(alert);
    }
}

/// Context wired to recording doubles, persisting into a temp dir
pub struct TestHub {
    pub ctx: HubContext,
    pub sink: Arc<RecordingSink>,
    pub alerts: Arc<RecordingAlerts>,
    _dir: tempfile::TempDir,
}

impl TestHub {
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = StateStore::new(dir.path().join("settings.json"), LightingState::default());
        let sink = Arc::new(RecordingSink::new());
        let alerts = Arc::new(RecordingAlerts::new());
        let ctx = HubContext::new(config, state, sink.clone(), alerts.clone());
        Self {
            ctx,
            sink,
            alerts,
            _dir: dir,
        }
    }
}
