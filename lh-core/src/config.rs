//! Hub configuration
//!
//! Static configuration loaded once at startup from a JSON file. Every field
//! has a default so a partial (or missing) file still yields a usable hub.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use lh_error::{HubError, Result};
use lh_protocol::{validate_passthrough, RemoteButton};

use crate::constants;

/// Logical function of an actuator on the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorRole {
    /// LED bank dimmer
    Led,
    /// Lamp dimmer
    Lamp,
    /// Infrared passthrough device
    Aux,
    /// Primary (PIR) motion sensor
    Motion,
    /// Secondary (radar) motion sensor, less reliable
    Radar,
}

impl ActuatorRole {
    pub fn is_sensor(&self) -> bool {
        matches!(self, ActuatorRole::Motion | ActuatorRole::Radar)
    }
}

/// How a channel's ramp reaches the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampStyle {
    /// The hub emits every intermediate level
    Stepped,
    /// The actuator fades itself; the hub sends the target once and waits
    Delegated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSpec {
    pub name: String,
    pub role: ActuatorRole,
    /// Hardware address used for discovery when `address` is unset
    #[serde(default)]
    pub mac: Option<String>,
    /// Static address; skips discovery
    #[serde(default)]
    pub address: Option<IpAddr>,
    /// Overrides `network.actuator_port`
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: SocketAddr,
    pub actuator_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_ms: u64,
    pub remote_refractory_ms: u64,
    pub settle_ms: u64,
    pub health_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub startup_motion_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    pub power_on_secs: f32,
    pub power_off_secs: f32,
    pub adjust_secs: f32,
    pub preset_secs: f32,
    pub motion_on_secs: f32,
    pub motion_off_secs: f32,
    pub motion_off_level: u8,
    pub led_style: RampStyle,
    pub lamp_style: RampStyle,
    pub lamp_guard_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustConfig {
    pub brightness_step: u8,
    pub volume_step: u32,
    pub volume_max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayLevel {
    pub seconds: u64,
    pub sound: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub sounds_dir: PathBuf,
    pub player: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Extra RF codes mapped to `IR_*` passthrough symbols
    pub passthrough: HashMap<u32, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub settings_file: PathBuf,
    /// File or FIFO the RF decoder helper writes codes to
    pub rf_source: Option<PathBuf>,
}

/// Top-level hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub network: NetworkConfig,
    pub actuators: Vec<ActuatorSpec>,
    pub timing: TimingConfig,
    pub fades: FadeConfig,
    pub adjust: AdjustConfig,
    pub delay_levels: Vec<DelayLevel>,
    pub alerts: AlertConfig,
    pub remote: RemoteConfig,
    pub paths: PathsConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: constants::network::BIND_ADDRESS
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], constants::network::ACTUATOR_PORT))),
            actuator_port: constants::network::ACTUATOR_PORT,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: constants::timing::TICK_MS,
            remote_refractory_ms: constants::timing::REMOTE_REFRACTORY_MS,
            settle_ms: constants::timing::SETTLE_MS,
            health_interval_secs: constants::timing::HEALTH_INTERVAL_SECS,
            probe_timeout_secs: constants::timing::PROBE_TIMEOUT_SECS,
            startup_motion_grace_secs: constants::timing::STARTUP_MOTION_GRACE_SECS,
        }
    }
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            power_on_secs: constants::fades::POWER_ON_SECS,
            power_off_secs: constants::fades::POWER_OFF_SECS,
            adjust_secs: constants::fades::ADJUST_SECS,
            preset_secs: constants::fades::PRESET_SECS,
            motion_on_secs: constants::fades::MOTION_ON_SECS,
            motion_off_secs: constants::fades::MOTION_OFF_SECS,
            motion_off_level: constants::fades::MOTION_OFF_LEVEL,
            led_style: RampStyle::Stepped,
            lamp_style: RampStyle::Delegated,
            lamp_guard_ms: constants::timing::LAMP_GUARD.as_millis() as u64,
        }
    }
}

impl Default for AdjustConfig {
    fn default() -> Self {
        Self {
            brightness_step: constants::adjust::BRIGHTNESS_STEP,
            volume_step: constants::adjust::VOLUME_STEP,
            volume_max: constants::adjust::VOLUME_MAX,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sounds_dir: PathBuf::from(constants::paths::SOUNDS_DIR),
            player: constants::sounds::PLAYER.to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            settings_file: PathBuf::from(constants::paths::SETTINGS_FILE),
            rf_source: None,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            actuators: default_actuators(),
            timing: TimingConfig::default(),
            fades: FadeConfig::default(),
            adjust: AdjustConfig::default(),
            delay_levels: default_delay_levels(),
            alerts: AlertConfig::default(),
            remote: RemoteConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

fn default_actuators() -> Vec<ActuatorSpec> {
    vec![
        ActuatorSpec {
            name: "led".to_string(),
            role: ActuatorRole::Led,
            mac: None,
            address: constants::network::LED_DRIVER_ADDRESS.parse().ok(),
            port: None,
        },
        ActuatorSpec {
            name: "lamp".to_string(),
            role: ActuatorRole::Lamp,
            mac: Some(constants::actuators::LAMP_MAC.to_string()),
            address: None,
            port: None,
        },
        ActuatorSpec {
            name: "motion".to_string(),
            role: ActuatorRole::Motion,
            mac: Some(constants::actuators::MOTION_MAC.to_string()),
            address: None,
            port: None,
        },
        ActuatorSpec {
            name: "radar".to_string(),
            role: ActuatorRole::Radar,
            mac: Some(constants::actuators::RADAR_MAC.to_string()),
            address: None,
            port: None,
        },
    ]
}

pub fn default_delay_levels() -> Vec<DelayLevel> {
    constants::DELAY_LEVELS
        .iter()
        .map(|(seconds, sound)| DelayLevel {
            seconds: *seconds,
            sound: (*sound).to_string(),
        })
        .collect()
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn remote_refractory(&self) -> Duration {
        Duration::from_millis(self.remote_refractory_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn startup_motion_grace(&self) -> Duration {
        Duration::from_secs(self.startup_motion_grace_secs)
    }
}

impl HubConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path).map_err(|e| HubError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: HubConfig = serde_json::from_str(&contents)
            .map_err(|e| HubError::config(format!("Failed to parse {:?}: {}", path, e)))?;
        config.validate()?;

        debug!(
            actuators = config.actuators.len(),
            delay_levels = config.delay_levels.len(),
            "Config loaded from {:?}",
            path
        );
        Ok(config)
    }

    /// Pretty JSON rendering, used by `--print-default-config`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delay_levels.is_empty() {
            return Err(HubError::invalid_config("delay_levels", "must not be empty"));
        }
        if self.delay_levels.iter().any(|d| d.seconds == 0) {
            return Err(HubError::invalid_config("delay_levels", "durations must be positive"));
        }

        let step = self.adjust.brightness_step;
        if step == 0 || step % 5 != 0 || step > lh_protocol::MAX_LEVEL {
            return Err(HubError::invalid_config(
                "adjust.brightness_step",
                format!("{} is not a positive multiple of 5 up to 100", step),
            ));
        }
        if self.adjust.volume_step == 0 || self.adjust.volume_step > self.adjust.volume_max {
            return Err(HubError::invalid_config(
                "adjust.volume_step",
                "must be positive and not exceed volume_max",
            ));
        }
        if self.fades.motion_off_level > lh_protocol::MAX_LEVEL {
            return Err(HubError::invalid_config("fades.motion_off_level", "must be 0-100"));
        }

        let durations = [
            ("fades.power_on_secs", self.fades.power_on_secs),
            ("fades.power_off_secs", self.fades.power_off_secs),
            ("fades.adjust_secs", self.fades.adjust_secs),
            ("fades.preset_secs", self.fades.preset_secs),
            ("fades.motion_on_secs", self.fades.motion_on_secs),
            ("fades.motion_off_secs", self.fades.motion_off_secs),
        ];
        for (field, secs) in durations {
            if !secs.is_finite() || !(0.0..=constants::fades::MAX_RAMP_SECS).contains(&secs) {
                return Err(HubError::invalid_config(
                    field,
                    format!(
                        "{} is not a duration between 0 and {} seconds",
                        secs,
                        constants::fades::MAX_RAMP_SECS
                    ),
                ));
            }
        }

        if self.timing.tick_ms == 0 || self.timing.health_interval_secs == 0 {
            return Err(HubError::invalid_config("timing", "tick and health interval must be positive"));
        }
        let max_grace = constants::timing::MAX_STARTUP_MOTION_GRACE_SECS;
        if self.timing.startup_motion_grace_secs > max_grace {
            return Err(HubError::invalid_config(
                "timing.startup_motion_grace_secs",
                format!("must not exceed {} seconds", max_grace),
            ));
        }

        let mut names = HashSet::new();
        for actuator in &self.actuators {
            if actuator.name.is_empty() {
                return Err(HubError::invalid_config("actuators", "actuator name must not be empty"));
            }
            if !names.insert(actuator.name.as_str()) {
                return Err(HubError::invalid_config(
                    "actuators",
                    format!("duplicate actuator name {}", actuator.name),
                ));
            }
        }
        for role in [ActuatorRole::Led, ActuatorRole::Lamp] {
            let count = self.actuators.iter().filter(|a| a.role == role).count();
            if count != 1 {
                return Err(HubError::invalid_config(
                    "actuators",
                    format!("expected exactly one {:?} actuator, found {}", role, count),
                ));
            }
        }

        for (code, symbol) in &self.remote.passthrough {
            if RemoteButton::from_code(*code).is_some() {
                return Err(HubError::invalid_config(
                    "remote.passthrough",
                    format!("code {} is already bound to a remote button", code),
                ));
            }
            validate_passthrough(symbol)
                .map_err(|reason| HubError::invalid_config("remote.passthrough", reason))?;
        }

        Ok(())
    }

    /// Index of the delay level lasting exactly `seconds`
    pub fn delay_index(&self, seconds: u64) -> Option<usize> {
        self.delay_levels.iter().position(|d| d.seconds == seconds)
    }

    pub fn actuator(&self, role: ActuatorRole) -> Option<&ActuatorSpec> {
        self.actuators.iter().find(|a| a.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delay_index(30), Some(0));
        assert_eq!(config.delay_index(3 * 60 * 60), Some(8));
        assert_eq!(config.actuator(ActuatorRole::Lamp).map(|a| a.name.as_str()), Some("lamp"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"timing": {{"remote_refractory_ms": 250}}}}"#).unwrap();

        let config = HubConfig::load(file.path()).unwrap();
        assert_eq!(config.timing.remote_refractory_ms, 250);
        assert_eq!(config.timing.settle_ms, constants::timing::SETTLE_MS);
        assert_eq!(config.fades.lamp_style, RampStyle::Delegated);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HubConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.actuators.len(), 4);
    }

    #[test]
    fn test_rejects_bad_step_and_empty_table() {
        let mut config = HubConfig::default();
        config.adjust.brightness_step = 3;
        assert!(config.validate().is_err());

        let mut config = HubConfig::default();
        config.delay_levels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_passthrough_shadowing_button() {
        let mut config = HubConfig::default();
        config
            .remote
            .passthrough
            .insert(RemoteButton::PowerButton.code(), "IR_TV_POWER".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        let mut config = HubConfig::default();
        config.fades.motion_off_secs = 1.0e30;
        assert!(matches!(
            config.validate(),
            Err(HubError::InvalidConfig { ref field, .. }) if field == "fades.motion_off_secs"
        ));

        let mut config = HubConfig::default();
        config.fades.adjust_secs = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = HubConfig::default();
        config.fades.power_on_secs = constants::fades::MAX_RAMP_SECS;
        assert!(config.validate().is_ok());

        let mut config = HubConfig::default();
        config.timing.startup_motion_grace_secs = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(HubError::InvalidConfig { ref field, .. }) if field == "timing.startup_motion_grace_secs"
        ));
    }

    #[test]
    fn test_rejects_duplicate_lamp() {
        let mut config = HubConfig::default();
        let mut extra = config.actuator(ActuatorRole::Lamp).unwrap().clone();
        extra.name = "lamp2".into();
        config.actuators.push(extra);
        assert!(config.validate().is_err());
    }
}
