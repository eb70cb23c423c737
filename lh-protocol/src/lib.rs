//! Wire vocabulary shared by the lumenhub core and daemon.
//!
//! Everything that crosses a process boundary lives here: the RF remote code
//! table, the symbols decoded from remote and sensor input, and the UTF-8
//! datagram commands sent to the dimmer actuators.

use std::fmt;

/// Maximum inbound datagram size (sensor events are short ASCII lines)
pub const MAX_DATAGRAM_SIZE: usize = 32;

/// Reply sent to every inbound datagram
pub const ACK: &str = "ACK";

/// Default UDP port shared by the hub and its actuators
pub const DEFAULT_PORT: u16 = 2390;

/// Prefix of auxiliary one-shot remote symbols forwarded unchanged
pub const PASSTHROUGH_PREFIX: &str = "IR_";

/// Maximum brightness level accepted by any actuator
pub const MAX_LEVEL: u8 = 100;

/// Exact lines the radar sensor prints around its readings
const DIAGNOSTIC_HEADERS: &[&str] = &["Reading from sensor:", "OK"];

/// Substrings that mark a free-text sensor diagnostic line
const DIAGNOSTIC_MARKERS: &[&str] = &["Stationary", "Moving", "Detected", "MotionBLE"];

/// Fixed buttons on the RF remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteButton {
    PowerButton,
    StopButton,
    BrightnessUp,
    BrightnessDown,
    BrightnessMin,
    Brightness75,
    LampUp,
    LampDown,
    VolumeUp,
    VolumeDown,
    Delay30s,
    Delay10m,
    Delay1h,
    Delay3h,
}

/// RF code → button table for the hub's remote
const REMOTE_CODES: &[(u32, RemoteButton)] = &[
    (59137, RemoteButton::PowerButton),
    (59139, RemoteButton::StopButton),
    (59140, RemoteButton::BrightnessUp),
    (59141, RemoteButton::LampUp),
    (59142, RemoteButton::Brightness75),
    (59143, RemoteButton::BrightnessDown),
    (59144, RemoteButton::LampDown),
    (59145, RemoteButton::BrightnessMin),
    (59150, RemoteButton::VolumeUp),
    (59152, RemoteButton::Delay30s),
    (59153, RemoteButton::VolumeDown),
    (59154, RemoteButton::Delay1h),
    (59155, RemoteButton::Delay3h),
    (59156, RemoteButton::Delay10m),
];

impl RemoteButton {
    pub const ALL: [RemoteButton; 14] = [
        RemoteButton::PowerButton,
        RemoteButton::StopButton,
        RemoteButton::BrightnessUp,
        RemoteButton::BrightnessDown,
        RemoteButton::BrightnessMin,
        RemoteButton::Brightness75,
        RemoteButton::LampUp,
        RemoteButton::LampDown,
        RemoteButton::VolumeUp,
        RemoteButton::VolumeDown,
        RemoteButton::Delay30s,
        RemoteButton::Delay10m,
        RemoteButton::Delay1h,
        RemoteButton::Delay3h,
    ];

    /// Look up the button bound to a raw RF code
    pub fn from_code(code: u32) -> Option<Self> {
        REMOTE_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, button)| *button)
    }

    /// Reverse lookup, used by test tooling and diagnostics
    pub fn code(&self) -> u32 {
        REMOTE_CODES
            .iter()
            .find(|(_, b)| b == self)
            .map(|(c, _)| *c)
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteButton::PowerButton => "POWER_BUTTON",
            RemoteButton::StopButton => "STOP_BUTTON",
            RemoteButton::BrightnessUp => "BRIGHTNESS_UP",
            RemoteButton::BrightnessDown => "BRIGHTNESS_DOWN",
            RemoteButton::BrightnessMin => "BRIGHTNESS_MIN",
            RemoteButton::Brightness75 => "BRIGHTNESS_75",
            RemoteButton::LampUp => "LAMP_UP",
            RemoteButton::LampDown => "LAMP_DOWN",
            RemoteButton::VolumeUp => "VOLUME_UP",
            RemoteButton::VolumeDown => "VOLUME_DOWN",
            RemoteButton::Delay30s => "DELAY_30S",
            RemoteButton::Delay10m => "DELAY_10M",
            RemoteButton::Delay1h => "DELAY_1H",
            RemoteButton::Delay3h => "DELAY_3H",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.as_str() == name)
    }
}

impl fmt::Display for RemoteButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded remote-control symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteSymbol {
    Button(RemoteButton),
    /// Auxiliary `IR_*` command forwarded to the passthrough actuator
    Passthrough(String),
}

impl RemoteSymbol {
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(button) = RemoteButton::from_name(s) {
            return Some(RemoteSymbol::Button(button));
        }
        if validate_passthrough(s).is_ok() {
            return Some(RemoteSymbol::Passthrough(s.to_string()));
        }
        None
    }

    pub fn as_str(&self) -> &str {
        match self {
            RemoteSymbol::Button(b) => b.as_str(),
            RemoteSymbol::Passthrough(s) => s,
        }
    }
}

impl fmt::Display for RemoteSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RemoteButton> for RemoteSymbol {
    fn from(button: RemoteButton) -> Self {
        RemoteSymbol::Button(button)
    }
}

/// Symbols emitted by the motion sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionSymbol {
    Detected,
    Motionless,
    /// Acknowledgement echoed by a sensor; only triggers a timeout check
    Ack,
}

impl MotionSymbol {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MOTION_DETECTED" => Some(MotionSymbol::Detected),
            "MOTIONLESS" => Some(MotionSymbol::Motionless),
            ACK => Some(MotionSymbol::Ack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MotionSymbol::Detected => "MOTION_DETECTED",
            MotionSymbol::Motionless => "MOTIONLESS",
            MotionSymbol::Ack => ACK,
        }
    }
}

impl fmt::Display for MotionSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any input the router understands, tagged by class.
///
/// Classes are tested in priority order: remote, motion, diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Remote(RemoteSymbol),
    Motion(MotionSymbol),
    Diagnostic(String),
    Unknown(String),
}

impl Event {
    /// Classify a raw input line. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(symbol) = RemoteSymbol::parse(line) {
            return Some(Event::Remote(symbol));
        }
        if let Some(symbol) = MotionSymbol::parse(line) {
            return Some(Event::Motion(symbol));
        }
        if is_diagnostic_line(line) {
            return Some(Event::Diagnostic(line.to_string()));
        }
        Some(Event::Unknown(line.to_string()))
    }
}

/// Whether a line is free-text sensor chatter rather than a command
pub fn is_diagnostic_line(line: &str) -> bool {
    DIAGNOSTIC_HEADERS.contains(&line) || DIAGNOSTIC_MARKERS.iter().any(|m| line.contains(m))
}

/// Commands sent to actuators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorCommand {
    /// Lamp fades itself to `level` over `secs`
    LampSet { secs: u32, level: u8 },
    /// LED driver jumps to `level`
    LedSet { level: u8 },
    /// Auxiliary device command, forwarded verbatim
    Passthrough(String),
    Ack,
}

impl ActuatorCommand {
    /// Encode as the UTF-8 datagram payload
    pub fn encode(&self) -> String {
        match self {
            ActuatorCommand::LampSet { secs, level } => format!("LAMPSET {} {}", secs, level),
            ActuatorCommand::LedSet { level } => format!("LEDSET {}", level),
            ActuatorCommand::Passthrough(payload) => payload.clone(),
            ActuatorCommand::Ack => ACK.to_string(),
        }
    }

    /// Parse a payload as an actuator would
    pub fn parse(payload: &str) -> Result<Self, String> {
        let payload = payload.trim();
        let mut parts = payload.split_whitespace();
        match parts.next() {
            Some("LAMPSET") => {
                let secs = parse_field(parts.next(), "duration")?;
                let level = parse_level(parts.next())?;
                Ok(ActuatorCommand::LampSet { secs, level })
            }
            Some("LEDSET") => {
                let level = parse_level(parts.next())?;
                Ok(ActuatorCommand::LedSet { level })
            }
            Some(ACK) => Ok(ActuatorCommand::Ack),
            Some(_) => {
                validate_passthrough(payload)?;
                Ok(ActuatorCommand::Passthrough(payload.to_string()))
            }
            None => Err("Empty payload".into()),
        }
    }

    /// Validate command parameters before sending
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ActuatorCommand::LampSet { level, .. } | ActuatorCommand::LedSet { level } => {
                validate_level(*level)
            }
            ActuatorCommand::Passthrough(payload) => validate_passthrough(payload),
            ActuatorCommand::Ack => Ok(()),
        }
    }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_field(field: Option<&str>, name: &str) -> Result<u32, String> {
    field
        .ok_or_else(|| format!("Missing {}", name))?
        .parse()
        .map_err(|_| format!("Invalid {}", name))
}

fn parse_level(field: Option<&str>) -> Result<u8, String> {
    let level = parse_field(field, "level")?;
    let level = u8::try_from(level).map_err(|_| format!("Level out of range: {}", level))?;
    validate_level(level)?;
    Ok(level)
}

pub fn validate_level(level: u8) -> Result<(), String> {
    if level > MAX_LEVEL {
        return Err(format!("Level must be 0-{}, got {}", MAX_LEVEL, level));
    }
    Ok(())
}

/// Passthrough payloads must be short printable `IR_*` tokens
pub fn validate_passthrough(payload: &str) -> Result<(), String> {
    if !payload.starts_with(PASSTHROUGH_PREFIX) || payload.len() == PASSTHROUGH_PREFIX.len() {
        return Err(format!("Passthrough must start with {}", PASSTHROUGH_PREFIX));
    }
    if payload.len() > MAX_DATAGRAM_SIZE {
        return Err(format!(
            "Passthrough too long: {} > {} bytes",
            payload.len(),
            MAX_DATAGRAM_SIZE
        ));
    }
    if let Some(c) = payload
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_')
    {
        return Err(format!("Passthrough contains invalid character: {:?}", c));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_table_round_trips_every_button() {
        for button in RemoteButton::ALL {
            assert_eq!(RemoteButton::from_code(button.code()), Some(button));
        }
        assert_eq!(RemoteButton::from_code(12345), None);
    }

    #[test]
    fn test_event_priority_order() {
        assert_eq!(
            Event::parse(" POWER_BUTTON\n"),
            Some(Event::Remote(RemoteButton::PowerButton.into()))
        );
        assert_eq!(
            Event::parse("MOTION_DETECTED"),
            Some(Event::Motion(MotionSymbol::Detected))
        );
        assert_eq!(Event::parse("ACK"), Some(Event::Motion(MotionSymbol::Ack)));
        assert_eq!(
            Event::parse("Moving target: 120cm"),
            Some(Event::Diagnostic("Moving target: 120cm".into()))
        );
        assert_eq!(Event::parse("OK"), Some(Event::Diagnostic("OK".into())));
        assert_eq!(Event::parse("GARBAGE"), Some(Event::Unknown("GARBAGE".into())));
        assert_eq!(Event::parse("   "), None);
    }

    #[test]
    fn test_passthrough_symbols() {
        assert_eq!(
            Event::parse("IR_TV_POWER"),
            Some(Event::Remote(RemoteSymbol::Passthrough("IR_TV_POWER".into())))
        );
        assert!(validate_passthrough("IR_").is_err());
        assert!(validate_passthrough("IR_TV;reboot").is_err());
        assert!(validate_passthrough("TV_POWER").is_err());
    }

    #[test]
    fn test_command_encoding() {
        assert_eq!(ActuatorCommand::LampSet { secs: 2, level: 40 }.encode(), "LAMPSET 2 40");
        assert_eq!(ActuatorCommand::LedSet { level: 7 }.encode(), "LEDSET 7");
        assert_eq!(ActuatorCommand::Ack.encode(), "ACK");
        assert_eq!(
            ActuatorCommand::parse("LAMPSET 3 1"),
            Ok(ActuatorCommand::LampSet { secs: 3, level: 1 })
        );
    }

    #[test]
    fn test_command_validation() {
        assert!(ActuatorCommand::LedSet { level: 101 }.validate().is_err());
        assert!(ActuatorCommand::parse("LEDSET 300").is_err());
        assert!(ActuatorCommand::parse("LAMPSET x 10").is_err());
        assert!(ActuatorCommand::parse("").is_err());
    }
}
