//! Audible feedback for remote input

use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, warn};

use crate::config::{AlertConfig, DelayLevel};
use crate::constants::sounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    Up,
    Down,
    MotionOn,
    MotionOff,
    BadInput,
    Preset,
    /// Announces the newly selected delay level
    DelayLevel(usize),
}

/// Fire-and-forget alert playback
pub trait AlertSink: Send + Sync {
    fn play(&self, alert: Alert, volume: u32);
}

/// Plays alert files through an external player process
pub struct SoundPlayer {
    config: AlertConfig,
    delay_sounds: Vec<String>,
}

impl SoundPlayer {
    pub fn new(config: AlertConfig, delay_levels: &[DelayLevel]) -> Self {
        Self {
            config,
            delay_sounds: delay_levels.iter().map(|d| d.sound.clone()).collect(),
        }
    }

    fn sound_path(&self, alert: Alert) -> Option<PathBuf> {
        let file = match alert {
            Alert::Up => sounds::UP,
            Alert::Down => sounds::DOWN,
            Alert::MotionOn => sounds::MOTION_ON,
            Alert::MotionOff => sounds::MOTION_OFF,
            Alert::BadInput => sounds::BAD_INPUT,
            Alert::Preset => sounds::PRESET,
            Alert::DelayLevel(idx) => self.delay_sounds.get(idx)?.as_str(),
        };
        Some(self.config.sounds_dir.join(file))
    }
}

impl AlertSink for SoundPlayer {
    fn play(&self, alert: Alert, volume: u32) {
        if !self.config.enabled {
            return;
        }
        let Some(path) = self.sound_path(alert) else {
            warn!(?alert, "No sound configured for alert");
            return;
        };

        debug!(?alert, volume, "Playing {:?}", path);
        let spawned = tokio::process::Command::new(&self.config.player)
            .arg("-q")
            .arg("-f")
            .arg(volume.to_string())
            .arg(&path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn();

        match spawned {
            Ok(mut child) => {
                tokio::spawn(async move {
                    if let Err(e) = child.wait().await {
                        debug!("Alert player failed: {}", e);
                    }
                });
            }
            Err(e) => warn!("Failed to start {}: {}", self.config.player, e),
        }
    }
}

/// Used when alerts are disabled
pub struct SilentAlerts;

impl AlertSink for SilentAlerts {
    fn play(&self, alert: Alert, _volume: u32) {
        debug!(?alert, "Alert suppressed");
    }
}
