//! Constants and configuration defaults for lumenhub
//!
//! Centralizes the magic numbers behind every tunable in [`crate::config`].
//! Add new defaults here first, then reference them from the config layer.

use std::time::Duration;

/// Filesystem locations
pub mod paths {
    /// Default configuration file
    pub const CONFIG_FILE: &str = "/etc/lumenhub/config.json";

    /// Persisted lighting state
    pub const SETTINGS_FILE: &str = "/var/lib/lumenhub/settings.json";

    /// Directory holding alert sounds
    pub const SOUNDS_DIR: &str = "/usr/share/lumenhub/sounds";
}

/// Network defaults
pub mod network {
    /// Hub bind address for sensor datagrams
    pub const BIND_ADDRESS: &str = "0.0.0.0:2390";

    /// Port the actuators listen on
    pub const ACTUATOR_PORT: u16 = lh_protocol::DEFAULT_PORT;

    /// LED driver helper runs on the hub itself
    pub const LED_DRIVER_ADDRESS: &str = "127.0.0.1";
}

/// Loop and supervision timing
pub mod timing {
    use super::Duration;

    /// Control loop tick
    pub const TICK_MS: u64 = 10;

    /// Remote presses within this window of the last accepted press are dropped
    pub const REMOTE_REFRACTORY_MS: u64 = 100;

    /// Pause after each accepted remote event so ramps get scheduled
    pub const SETTLE_MS: u64 = 50;

    /// Reachability refresh period
    pub const HEALTH_INTERVAL_SECS: u64 = 10;

    /// Per-probe timeout handed to `ping -W`
    pub const PROBE_TIMEOUT_SECS: u64 = 1;

    /// Motion timer is pushed this far into the future at startup
    pub const STARTUP_MOTION_GRACE_SECS: u64 = 10;

    /// Upper bound accepted for the startup grace
    pub const MAX_STARTUP_MOTION_GRACE_SECS: u64 = 3600;

    /// Extra hold after a delegated lamp fade before the channel is released
    pub const LAMP_GUARD: Duration = Duration::from_millis(100);

    /// Control loop iterations slower than this are reported
    pub const SLOW_TICK_WARN: Duration = Duration::from_millis(50);

    /// A stepping ramp saves its level at most this often
    pub const RAMP_CHECKPOINT: Duration = Duration::from_secs(1);
}

/// Ramp durations and levels
pub mod fades {
    /// Critical ramp to the remembered levels on power on
    pub const POWER_ON_SECS: f32 = 2.0;

    /// Critical ramp to zero on power off
    pub const POWER_OFF_SECS: f32 = 1.0;

    /// Relative brightness and lamp adjustments
    pub const ADJUST_SECS: f32 = 0.5;

    /// BRIGHTNESS_MIN and BRIGHTNESS_75 presets
    pub const PRESET_SECS: f32 = 1.0;

    /// Motion detected while the lights are off
    pub const MOTION_ON_SECS: f32 = 1.0;

    /// Auto-dim after the motionless timeout
    pub const MOTION_OFF_SECS: f32 = 3.0;

    /// Auto-dim lands here rather than at zero
    pub const MOTION_OFF_LEVEL: u8 = 1;

    /// BRIGHTNESS_MIN targets
    pub const MIN_LED_LEVEL: u8 = 1;
    pub const MIN_LAMP_LEVEL: u8 = 5;

    /// BRIGHTNESS_75 target
    pub const PRESET_LEVEL: u8 = 75;

    /// Longest ramp duration accepted in the config
    pub const MAX_RAMP_SECS: f32 = 3600.0;
}

/// Relative adjustment steps
pub mod adjust {
    /// Brightness step; adjusted values stay on this grid
    pub const BRIGHTNESS_STEP: u8 = 5;

    /// Player volume step
    pub const VOLUME_STEP: u32 = 1024;

    /// Player volume ceiling
    pub const VOLUME_MAX: u32 = 32768;
}

/// Defaults for a first start without a settings file
pub mod state {
    pub const LED_BRIGHTNESS: u8 = 20;
    pub const LAMP_BRIGHTNESS: u8 = 20;
    pub const DELAY_LEVEL: usize = 0;
    pub const MOTION_ENABLED: bool = true;
    pub const VOLUME: u32 = 2048;
}

/// Motionless-timeout table: (seconds, announcement sound)
pub const DELAY_LEVELS: &[(u64, &str)] = &[
    (30, "30s.mp3"),
    (60, "1m.mp3"),
    (2 * 60, "2m.mp3"),
    (5 * 60, "5m.mp3"),
    (10 * 60, "10m.mp3"),
    (30 * 60, "30m.mp3"),
    (60 * 60, "1h.mp3"),
    (2 * 60 * 60, "2h.mp3"),
    (3 * 60 * 60, "3h.mp3"),
    (6 * 60 * 60, "6h.mp3"),
    (12 * 60 * 60, "12h.mp3"),
];

/// Alert sound files
pub mod sounds {
    pub const UP: &str = "up.mp3";
    pub const DOWN: &str = "down.mp3";
    pub const MOTION_ON: &str = "motion_on.mp3";
    pub const MOTION_OFF: &str = "motion_off.mp3";
    pub const BAD_INPUT: &str = "bad_input.mp3";
    pub const PRESET: &str = "preset.mp3";

    /// Player binary used for alerts
    pub const PLAYER: &str = "mpg123";
}

/// Default actuator hardware identifiers
pub mod actuators {
    pub const LAMP_MAC: &str = "E0:5A:1B:79:8D:88";
    pub const MOTION_MAC: &str = "08:B6:1F:81:D8:C4";
    pub const RADAR_MAC: &str = "08:B6:1F:81:6D:E0";
}
