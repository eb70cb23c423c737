//! Persisted lighting state
//!
//! The router owns a single [`LightingState`] through a [`StateStore`]. The
//! state lives behind a `parking_lot::Mutex` that is never held across an
//! await point; writes to disk are serialized by a second mutex and go
//! through a temp file + rename so a crash never leaves a torn file.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use lh_error::{HubError, Result};
use lh_protocol::MAX_LEVEL;

use crate::constants::state;

/// Runtime lighting state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightingState {
    pub led_brightness: u8,
    pub lamp_brightness: u8,
    /// Runtime only; the hub always boots with the lights considered on
    pub power_on: bool,
    pub motion_enabled: bool,
    /// Index into the delay-level table
    pub delay_level: usize,
    pub volume: u32,
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            led_brightness: state::LED_BRIGHTNESS,
            lamp_brightness: state::LAMP_BRIGHTNESS,
            power_on: true,
            motion_enabled: state::MOTION_ENABLED,
            delay_level: state::DELAY_LEVEL,
            volume: state::VOLUME,
        }
    }
}

/// On-disk shape. Wide integer types so out-of-range values clamp instead
/// of failing the whole file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    #[serde(default = "default_led_brightness")]
    led_brightness: i64,
    #[serde(default = "default_lamp_brightness")]
    lamp_brightness: i64,
    #[serde(default = "default_delay_level")]
    delay_level: i64,
    #[serde(default = "default_motion_enabled")]
    motion_enabled: bool,
    #[serde(default = "default_volume")]
    volume: i64,
}

fn default_led_brightness() -> i64 { state::LED_BRIGHTNESS as i64 }
fn default_lamp_brightness() -> i64 { state::LAMP_BRIGHTNESS as i64 }
fn default_delay_level() -> i64 { state::DELAY_LEVEL as i64 }
fn default_motion_enabled() -> bool { state::MOTION_ENABLED }
fn default_volume() -> i64 { state::VOLUME as i64 }

impl From<&LightingState> for StoredState {
    fn from(s: &LightingState) -> Self {
        Self {
            led_brightness: s.led_brightness as i64,
            lamp_brightness: s.lamp_brightness as i64,
            delay_level: s.delay_level as i64,
            motion_enabled: s.motion_enabled,
            volume: s.volume as i64,
        }
    }
}

/// Bounds applied when loading persisted values
#[derive(Debug, Clone, Copy)]
pub struct StateLimits {
    pub delay_levels: usize,
    pub volume_max: u32,
}

impl StoredState {
    fn into_state(self, limits: StateLimits) -> LightingState {
        let max_delay = limits.delay_levels.saturating_sub(1) as i64;
        LightingState {
            led_brightness: self.led_brightness.clamp(0, MAX_LEVEL as i64) as u8,
            lamp_brightness: self.lamp_brightness.clamp(0, MAX_LEVEL as i64) as u8,
            power_on: true,
            motion_enabled: self.motion_enabled,
            delay_level: self.delay_level.clamp(0, max_delay) as usize,
            volume: self.volume.clamp(0, limits.volume_max as i64) as u32,
        }
    }
}

/// Shared handle to the lighting state and its backing file
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: Mutex<LightingState>,
    write_lock: Mutex<()>,
    path: PathBuf,
}

impl StateStore {
    /// In-memory store with the given state, persisting to `path`
    pub fn new(path: impl Into<PathBuf>, initial: LightingState) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(initial),
                write_lock: Mutex::new(()),
                path: path.into(),
            }),
        }
    }

    /// Load from `path`, falling back to defaults when the file is missing
    /// or unreadable. Startup must never fail on a bad state file.
    pub fn load(path: impl Into<PathBuf>, limits: StateLimits) -> Self {
        let path = path.into();
        let state = match read_state(&path, limits) {
            Ok(Some(state)) => {
                debug!(?state, "Loaded lighting state from {:?}", path);
                state
            }
            Ok(None) => {
                debug!("No state file at {:?}, using defaults", path);
                LightingState::default()
            }
            Err(e) => {
                warn!("Ignoring unreadable state file: {}", e);
                LightingState::default()
            }
        };
        Self::new(path, state)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn snapshot(&self) -> LightingState {
        self.inner.state.lock().clone()
    }

    /// Mutate the state under the lock and return the closure's result
    pub fn update<R>(&self, f: impl FnOnce(&mut LightingState) -> R) -> R {
        let mut state = self.inner.state.lock();
        f(&mut state)
    }

    pub fn brightness(&self, lamp: bool) -> u8 {
        let state = self.inner.state.lock();
        if lamp {
            state.lamp_brightness
        } else {
            state.led_brightness
        }
    }

    /// Record a level applied by a ramp step
    pub fn record_level(&self, lamp: bool, level: u8) {
        let mut state = self.inner.state.lock();
        if lamp {
            state.lamp_brightness = level;
        } else {
            state.led_brightness = level;
        }
    }

    pub fn power_on(&self) -> bool {
        self.inner.state.lock().power_on
    }

    pub fn set_power_on(&self, on: bool) {
        self.inner.state.lock().power_on = on;
    }

    /// Write the current state to disk atomically
    pub fn persist(&self) -> Result<()> {
        let _guard = self.inner.write_lock.lock();
        let stored = StoredState::from(&self.snapshot());
        write_atomic(&self.inner.path, &stored)
    }

    /// Persist from async context without blocking the runtime
    pub async fn persist_async(&self) {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.persist()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to persist lighting state: {}", e),
            Err(e) => warn!("Persist task failed: {}", e),
        }
    }
}

fn read_state(path: &Path, limits: StateLimits) -> Result<Option<LightingState>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).map_err(|e| HubError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let stored: StoredState = serde_json::from_str(&contents)?;
    Ok(Some(stored.into_state(limits)))
}

fn write_atomic(path: &Path, stored: &StoredState) -> Result<()> {
    let json = serde_json::to_string_pretty(stored)?;
    let write_err = |e: std::io::Error| HubError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
    }

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;
    file.write_all(json.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, path).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: StateLimits = StateLimits {
        delay_levels: 11,
        volume_max: 32768,
    };

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = StateStore::new(&path, LightingState::default());
        store.update(|s| {
            s.led_brightness = 55;
            s.lamp_brightness = 5;
            s.delay_level = 4;
            s.motion_enabled = false;
            s.volume = 4096;
            s.power_on = false;
        });
        store.persist().unwrap();

        let loaded = StateStore::load(&path, LIMITS).snapshot();
        assert_eq!(loaded.led_brightness, 55);
        assert_eq!(loaded.lamp_brightness, 5);
        assert_eq!(loaded.delay_level, 4);
        assert!(!loaded.motion_enabled);
        assert_eq!(loaded.volume, 4096);
        // power_on is not persisted
        assert!(loaded.power_on);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path().join("none.json"), LIMITS);
        assert_eq!(store.snapshot(), LightingState::default());
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"led_brightness": 400, "lamp_brightness": -3, "delay_level": 99, "volume": 100000}"#,
        )
        .unwrap();

        let state = StateStore::load(&path, LIMITS).snapshot();
        assert_eq!(state.led_brightness, 100);
        assert_eq!(state.lamp_brightness, 0);
        assert_eq!(state.delay_level, 10);
        assert_eq!(state.volume, 32768);
        assert!(state.motion_enabled);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(StateStore::load(&path, LIMITS).snapshot(), LightingState::default());
    }

    #[test]
    fn test_persist_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/settings.json");
        StateStore::new(&path, LightingState::default()).persist().unwrap();
        assert!(path.exists());
    }
}
