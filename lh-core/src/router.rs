//! Top-level event handling
//!
//! Every input, whether an RF remote press or a sensor datagram, arrives as
//! an [`Event`] and is dispatched here. Remote events mutate the lighting
//! state and drive the fade engine; motion events go to the supervisor;
//! sensor chatter is logged and dropped.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use lh_protocol::{ActuatorCommand, Event, RemoteButton, RemoteSymbol, MAX_LEVEL};

use crate::alert::Alert;
use crate::config::ActuatorRole;
use crate::constants::fades;
use crate::context::HubContext;
use crate::fade::{Channel, RampRequest};
use crate::link::SensorSource;
use crate::motion::{MotionAction, MotionSupervisor};

/// Result of routing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Remote event applied
    Accepted,
    /// Rejected by policy (at a limit, nothing to change)
    BadInput,
    /// Not applied: a ramp still owns the channel or the target is missing
    Ignored,
    /// Inside the refractory window of the previous remote event
    Debounced,
    Motion(MotionAction),
    Diagnostic,
    Unknown,
}

enum Action {
    Done(Alert),
    Bad,
    /// Nothing applied; no alert, no save
    Skipped,
}

/// Round to the nearest multiple of 5
pub fn round_to_5(level: u8) -> u8 {
    (((level as u16 + 2) / 5) * 5).min(MAX_LEVEL as u16) as u8
}

/// Next level for a relative adjustment, or `None` when already at the limit
pub fn adjust_level(current: u8, up: bool, step: u8) -> Option<u8> {
    let base = round_to_5(current);
    let next = if up {
        base.saturating_add(step).min(MAX_LEVEL)
    } else {
        base.saturating_sub(step)
    };
    (next != current).then_some(next)
}

pub struct EventRouter {
    ctx: HubContext,
    motion: MotionSupervisor,
    last_remote: Option<Instant>,
}

impl EventRouter {
    pub fn new(ctx: HubContext) -> Self {
        let motion = MotionSupervisor::new(ctx.clone());
        Self {
            ctx,
            motion,
            last_remote: None,
        }
    }

    pub fn motion(&self) -> &MotionSupervisor {
        &self.motion
    }

    /// Bring the actuators to the remembered levels after a restart
    pub async fn restore(&self) {
        let state = self.ctx.state.snapshot();
        if !state.power_on {
            return;
        }
        info!(
            led = state.led_brightness,
            lamp = state.lamp_brightness,
            "Restoring lighting levels"
        );
        let fades = &self.ctx.fades;
        fades.seed_level(Channel::Led, state.led_brightness);
        fades
            .start_ramp(RampRequest::new(Channel::Led, 0.0, state.led_brightness).critical())
            .await;
        fades
            .start_ramp(
                RampRequest::new(Channel::Lamp, self.ctx.config.fades.preset_secs, state.lamp_brightness)
                    .critical(),
            )
            .await;
    }

    pub async fn handle(&mut self, event: Event, source: SensorSource) -> Outcome {
        match event {
            Event::Remote(symbol) => self.handle_remote(symbol).await,
            Event::Motion(symbol) => {
                debug!(%symbol, ?source, "Motion event");
                Outcome::Motion(self.motion.on_motion(symbol, source).await)
            }
            Event::Diagnostic(line) => {
                debug!(?source, "Sensor: {}", line);
                Outcome::Diagnostic
            }
            Event::Unknown(line) => {
                info!(?source, "Unknown event: {:?}", line);
                Outcome::Unknown
            }
        }
    }

    /// Per-tick housekeeping
    pub async fn tick(&self) -> MotionAction {
        self.motion.tick().await
    }

    async fn handle_remote(&mut self, symbol: RemoteSymbol) -> Outcome {
        let now = Instant::now();
        if let Some(last) = self.last_remote {
            if now.duration_since(last) < self.ctx.config.timing.remote_refractory() {
                debug!(%symbol, "Remote event too soon after the last one, dropped");
                return Outcome::Debounced;
            }
        }
        self.last_remote = Some(now);
        self.motion.clear_off_due_to_motion();
        info!(%symbol, "Remote event");

        let action = match &symbol {
            RemoteSymbol::Button(button) => self.handle_button(*button).await,
            RemoteSymbol::Passthrough(code) => self.passthrough(code),
        };

        let outcome = match action {
            Action::Skipped => {
                info!(%symbol, "Remote event not applied");
                return Outcome::Ignored;
            }
            Action::Bad => {
                debug!(%symbol, "Bad input");
                self.ctx.alert(Alert::BadInput);
                Outcome::BadInput
            }
            Action::Done(alert) => {
                self.ctx.alert(alert);
                self.ctx.state.persist_async().await;
                Outcome::Accepted
            }
        };

        tokio::time::sleep(self.ctx.config.timing.settle()).await;
        outcome
    }

    async fn handle_button(&self, button: RemoteButton) -> Action {
        match button {
            RemoteButton::PowerButton => self.toggle_power().await,
            RemoteButton::StopButton => {
                let enabled = self.ctx.state.update(|s| {
                    s.motion_enabled = !s.motion_enabled;
                    s.motion_enabled
                });
                info!(enabled, "Motion control toggled");
                Action::Done(if enabled { Alert::MotionOn } else { Alert::MotionOff })
            }
            RemoteButton::BrightnessUp => self.adjust(Channel::Led, true).await,
            RemoteButton::BrightnessDown => self.adjust(Channel::Led, false).await,
            RemoteButton::LampUp => self.adjust(Channel::Lamp, true).await,
            RemoteButton::LampDown => self.adjust(Channel::Lamp, false).await,
            RemoteButton::BrightnessMin => {
                self.preset(fades::MIN_LED_LEVEL, fades::MIN_LAMP_LEVEL).await
            }
            RemoteButton::Brightness75 => {
                self.preset(fades::PRESET_LEVEL, fades::PRESET_LEVEL).await
            }
            RemoteButton::Delay30s => self.set_delay(30),
            RemoteButton::Delay10m => self.set_delay(10 * 60),
            RemoteButton::Delay1h => self.set_delay(60 * 60),
            RemoteButton::Delay3h => self.set_delay(3 * 60 * 60),
            RemoteButton::VolumeUp => self.step_volume(true),
            RemoteButton::VolumeDown => self.step_volume(false),
        }
    }

    async fn toggle_power(&self) -> Action {
        let fades = &self.ctx.fades;
        if fades.is_busy(Channel::Led) || fades.is_busy(Channel::Lamp) {
            return Action::Skipped;
        }

        let state = self.ctx.state.update(|s| {
            s.power_on = !s.power_on;
            s.clone()
        });
        let config = &self.ctx.config.fades;
        let (secs, led, lamp) = if state.power_on {
            (config.power_on_secs, state.led_brightness, state.lamp_brightness)
        } else {
            (config.power_off_secs, 0, 0)
        };
        info!(on = state.power_on, "Power toggled");

        tokio::join!(
            fades.start_ramp(RampRequest::new(Channel::Led, secs, led).critical()),
            fades.start_ramp(RampRequest::new(Channel::Lamp, secs, lamp).critical()),
        );
        Action::Done(Alert::Preset)
    }

    async fn adjust(&self, channel: Channel, up: bool) -> Action {
        let current = self.ctx.state.brightness(channel.is_lamp());
        let step = self.ctx.config.adjust.brightness_step;
        let Some(target) = adjust_level(current, up, step) else {
            return Action::Bad;
        };

        let request = RampRequest::new(channel, self.ctx.config.fades.adjust_secs, target);
        if !self.ctx.fades.start_ramp(request).await {
            return Action::Skipped;
        }
        self.ctx.state.set_power_on(true);
        debug!(?channel, current, target, "Brightness adjusted");
        Action::Done(if up { Alert::Up } else { Alert::Down })
    }

    async fn preset(&self, led: u8, lamp: u8) -> Action {
        let before = self.ctx.state.brightness(false);
        let secs = self.ctx.config.fades.preset_secs;
        let fades = &self.ctx.fades;

        let (led_started, lamp_started) = tokio::join!(
            fades.start_ramp(RampRequest::new(Channel::Led, secs, led)),
            fades.start_ramp(RampRequest::new(Channel::Lamp, secs, lamp)),
        );
        if !led_started && !lamp_started {
            return Action::Skipped;
        }
        self.ctx.state.set_power_on(true);

        Action::Done(match before.cmp(&led) {
            std::cmp::Ordering::Less => Alert::Up,
            std::cmp::Ordering::Greater => Alert::Down,
            std::cmp::Ordering::Equal => Alert::BadInput,
        })
    }

    fn set_delay(&self, seconds: u64) -> Action {
        let Some(index) = self.ctx.config.delay_index(seconds) else {
            warn!(seconds, "No delay level configured for this duration");
            return Action::Bad;
        };
        self.ctx.state.update(|s| s.delay_level = index);
        info!(seconds, index, "Motion delay set");
        Action::Done(Alert::DelayLevel(index))
    }

    fn step_volume(&self, up: bool) -> Action {
        let adjust = &self.ctx.config.adjust;
        let changed = self.ctx.state.update(|s| {
            let next = if up {
                if s.volume >= adjust.volume_max {
                    return None;
                }
                (s.volume + adjust.volume_step).min(adjust.volume_max)
            } else {
                if s.volume == 0 {
                    return None;
                }
                s.volume.saturating_sub(adjust.volume_step)
            };
            s.volume = next;
            Some(next)
        });

        match changed {
            Some(volume) => {
                debug!(volume, "Volume changed");
                Action::Done(if up { Alert::Up } else { Alert::Down })
            }
            None => Action::Bad,
        }
    }

    fn passthrough(&self, code: &str) -> Action {
        let command = ActuatorCommand::Passthrough(code.to_string());
        match self.ctx.sink.send(ActuatorRole::Aux, &command) {
            Ok(()) => Action::Done(Alert::Preset),
            Err(e) => {
                warn!(code, "Passthrough not sent: {}", e);
                Action::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestHub;
    use lh_protocol::MotionSymbol;
    use std::time::Duration;

    fn press(button: RemoteButton) -> Event {
        Event::Remote(button.into())
    }

    async fn press_and_settle(router: &mut EventRouter, button: RemoteButton) -> Outcome {
        let outcome = router.handle(press(button), SensorSource::Other).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        outcome
    }

    #[test]
    fn test_round_and_adjust() {
        assert_eq!(round_to_5(0), 0);
        assert_eq!(round_to_5(2), 0);
        assert_eq!(round_to_5(3), 5);
        assert_eq!(round_to_5(99), 100);

        assert_eq!(adjust_level(20, true, 5), Some(25));
        assert_eq!(adjust_level(23, true, 5), Some(30));
        assert_eq!(adjust_level(1, false, 5), Some(0));
        assert_eq!(adjust_level(98, true, 5), Some(100));
        assert_eq!(adjust_level(100, true, 5), None);
        assert_eq!(adjust_level(0, false, 5), None);
    }

    #[test]
    fn test_repeated_up_converges_to_100() {
        let mut level = 7;
        let mut seen = Vec::new();
        while let Some(next) = adjust_level(level, true, 5) {
            assert_eq!(next % 5, 0);
            assert!(next > level);
            seen.push(next);
            level = next;
        }
        assert_eq!(level, 100);
        assert_eq!(seen.first(), Some(&10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_brightness_up_ramps_and_persists() {
        let hub = TestHub::new();
        let mut router = EventRouter::new(hub.ctx.clone());
        hub.ctx.fades.seed_level(Channel::Led, 20);

        let outcome = press_and_settle(&mut router, RemoteButton::BrightnessUp).await;
        hub.ctx.fades.wait_all_idle().await;

        assert_eq!(outcome, Outcome::Accepted);
        assert_eq!(hub.sink.led_levels(), vec![21, 22, 23, 24, 25]);
        assert_eq!(hub.alerts.last(), Some(Alert::Up));

        let saved = std::fs::read_to_string(hub.ctx.state.path()).unwrap();
        assert!(saved.contains("\"led_brightness\": 25"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_gives_bad_input_without_mutation() {
        let hub = TestHub::new();
        hub.ctx.state.update(|s| s.lamp_brightness = 100);
        let mut router = EventRouter::new(hub.ctx.clone());

        let outcome = press_and_settle(&mut router, RemoteButton::LampUp).await;
        assert_eq!(outcome, Outcome::BadInput);
        assert_eq!(hub.alerts.last(), Some(Alert::BadInput));
        assert!(hub.sink.commands().is_empty());
        assert_eq!(hub.ctx.state.snapshot().lamp_brightness, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refractory_window_drops_repeat() {
        let hub = TestHub::new();
        let mut router = EventRouter::new(hub.ctx.clone());

        assert_eq!(
            router.handle(press(RemoteButton::VolumeUp), SensorSource::Other).await,
            Outcome::Accepted
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            router.handle(press(RemoteButton::VolumeUp), SensorSource::Other).await,
            Outcome::Debounced
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            router.handle(press(RemoteButton::VolumeUp), SensorSource::Other).await,
            Outcome::Accepted
        );
        assert_eq!(hub.ctx.state.snapshot().volume, 2048 + 2 * 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adjust_while_busy_is_ignored() {
        let hub = TestHub::new();
        let mut router = EventRouter::new(hub.ctx.clone());
        hub.ctx
            .fades
            .start_ramp(RampRequest::new(Channel::Lamp, 20.0, 90))
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let outcome = press_and_settle(&mut router, RemoteButton::LampDown).await;
        assert_eq!(outcome, Outcome::Ignored);
        assert!(hub.alerts.played().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_toggle_off_and_on() {
        let hub = TestHub::new();
        hub.ctx.state.update(|s| {
            s.led_brightness = 30;
            s.lamp_brightness = 50;
        });
        hub.ctx.fades.seed_level(Channel::Led, 30);
        let mut router = EventRouter::new(hub.ctx.clone());

        assert_eq!(
            press_and_settle(&mut router, RemoteButton::PowerButton).await,
            Outcome::Accepted
        );
        hub.ctx.fades.wait_all_idle().await;
        assert!(!hub.ctx.state.power_on());
        assert_eq!(hub.sink.led_levels().last(), Some(&0));
        assert_eq!(hub.sink.lamp_commands(), vec![(1, 0)]);
        // Stored brightness is untouched by a power ramp
        assert_eq!(hub.ctx.state.snapshot().led_brightness, 30);

        assert_eq!(
            press_and_settle(&mut router, RemoteButton::PowerButton).await,
            Outcome::Accepted
        );
        hub.ctx.fades.wait_all_idle().await;
        assert!(hub.ctx.state.power_on());
        assert_eq!(hub.sink.led_levels().last(), Some(&30));
        assert_eq!(hub.sink.lamp_commands().last(), Some(&(2, 50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_rejected_while_ramping() {
        let hub = TestHub::new();
        let mut router = EventRouter::new(hub.ctx.clone());
        hub.ctx
            .fades
            .start_ramp(RampRequest::new(Channel::Led, 5.0, 60))
            .await;

        let outcome = press_and_settle(&mut router, RemoteButton::PowerButton).await;
        assert_eq!(outcome, Outcome::Ignored);
        assert!(hub.ctx.state.power_on());
    }

    #[tokio::test(start_paused = true)]
    async fn test_presets_and_delay_and_stop() {
        let hub = TestHub::new();
        let mut router = EventRouter::new(hub.ctx.clone());

        assert_eq!(
            press_and_settle(&mut router, RemoteButton::Brightness75).await,
            Outcome::Accepted
        );
        hub.ctx.fades.wait_all_idle().await;
        assert_eq!(hub.alerts.last(), Some(Alert::Up));
        assert_eq!(hub.sink.led_levels().last(), Some(&75));
        assert_eq!(hub.sink.lamp_commands().last(), Some(&(1, 75)));

        press_and_settle(&mut router, RemoteButton::BrightnessMin).await;
        hub.ctx.fades.wait_all_idle().await;
        assert_eq!(hub.alerts.last(), Some(Alert::Down));
        let state = hub.ctx.state.snapshot();
        assert_eq!((state.led_brightness, state.lamp_brightness), (1, 5));

        press_and_settle(&mut router, RemoteButton::Delay3h).await;
        assert_eq!(hub.ctx.state.snapshot().delay_level, 8);
        assert_eq!(hub.alerts.last(), Some(Alert::DelayLevel(8)));

        press_and_settle(&mut router, RemoteButton::StopButton).await;
        assert!(!hub.ctx.state.snapshot().motion_enabled);
        assert_eq!(hub.alerts.last(), Some(Alert::MotionOff));
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_bounds() {
        let hub = TestHub::new();
        hub.ctx.state.update(|s| s.volume = 0);
        let mut router = EventRouter::new(hub.ctx.clone());

        assert_eq!(
            press_and_settle(&mut router, RemoteButton::VolumeDown).await,
            Outcome::BadInput
        );
        hub.ctx.state.update(|s| s.volume = 32768);
        assert_eq!(
            press_and_settle(&mut router, RemoteButton::VolumeUp).await,
            Outcome::BadInput
        );
        assert_eq!(
            press_and_settle(&mut router, RemoteButton::VolumeDown).await,
            Outcome::Accepted
        );
        assert_eq!(hub.ctx.state.snapshot().volume, 32768 - 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn test_passthrough_forwarded_to_aux() {
        let mut config = crate::config::HubConfig::default();
        config.actuators.push(crate::config::ActuatorSpec {
            name: "ir".into(),
            role: ActuatorRole::Aux,
            mac: None,
            address: "127.0.0.1".parse().ok(),
            port: None,
        });
        let hub = TestHub::with_config(config);
        let mut router = EventRouter::new(hub.ctx.clone());
        let before = hub.ctx.state.snapshot();

        let event = Event::parse("IR_TV_POWER").unwrap();
        assert_eq!(router.handle(event, SensorSource::Other).await, Outcome::Accepted);
        assert_eq!(
            hub.sink.commands(),
            vec![(ActuatorRole::Aux, ActuatorCommand::Passthrough("IR_TV_POWER".into()))]
        );
        assert_eq!(hub.ctx.state.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_event_clears_motion_distrust() {
        let hub = TestHub::new();
        let mut router = EventRouter::new(hub.ctx.clone());

        tokio::time::sleep(Duration::from_secs(41)).await;
        assert_eq!(router.tick().await, MotionAction::Dimmed);
        hub.ctx.fades.wait_all_idle().await;
        assert!(router.motion().off_due_to_motion());

        press_and_settle(&mut router, RemoteButton::VolumeUp).await;
        assert!(!router.motion().off_due_to_motion());

        let outcome = router
            .handle(Event::Motion(MotionSymbol::Detected), SensorSource::Secondary)
            .await;
        assert_eq!(outcome, Outcome::Motion(MotionAction::LightsOn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_reapplies_remembered_levels() {
        let hub = TestHub::new();
        let router = EventRouter::new(hub.ctx.clone());

        router.restore().await;
        hub.ctx.fades.wait_all_idle().await;

        assert_eq!(hub.sink.led_levels(), vec![20]);
        assert_eq!(hub.sink.lamp_commands(), vec![(1, 20)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_lines_classified() {
        let hub = TestHub::new();
        let mut router = EventRouter::new(hub.ctx.clone());

        let diag = Event::parse("Stationary target: 80cm").unwrap();
        assert_eq!(router.handle(diag, SensorSource::Secondary).await, Outcome::Diagnostic);
        let junk = Event::parse("HELLO").unwrap();
        assert_eq!(router.handle(junk, SensorSource::Other).await, Outcome::Unknown);
        assert!(hub.sink.commands().is_empty());
    }
}
