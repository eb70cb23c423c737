//! Motion-driven auto-dim and auto-on
//!
//! Tracks the time since the last trusted detection. Once that exceeds the
//! selected delay level while the lights are on, both channels fade down to
//! a near-off level and the lights are marked off "due to motion". Until a
//! trusted detection or a manual remote event clears that mark, the
//! secondary (radar) sensor is ignored, since it tends to report phantom
//! motion right after the room goes dark.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use lh_protocol::MotionSymbol;

use crate::context::HubContext;
use crate::fade::{Channel, RampRequest};
use crate::link::SensorSource;

#[derive(Debug, Clone, Copy)]
struct MotionState {
    last_motion: Instant,
    off_due_to_motion: bool,
}

/// What a motion event or tick caused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAction {
    None,
    /// Secondary sensor distrusted after an auto-dim
    Ignored,
    LightsOn,
    Dimmed,
}

pub struct MotionSupervisor {
    ctx: HubContext,
    state: Mutex<MotionState>,
}

impl MotionSupervisor {
    pub fn new(ctx: HubContext) -> Self {
        let grace = ctx.config.timing.startup_motion_grace();
        Self {
            ctx,
            state: Mutex::new(MotionState {
                last_motion: Instant::now() + grace,
                off_due_to_motion: false,
            }),
        }
    }

    pub fn off_due_to_motion(&self) -> bool {
        self.state.lock().off_due_to_motion
    }

    /// Manual input takes the lights out of the auto-dimmed state
    pub fn clear_off_due_to_motion(&self) {
        self.state.lock().off_due_to_motion = false;
    }

    pub fn motionless_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.state.lock().last_motion)
    }

    pub async fn on_motion(&self, symbol: MotionSymbol, source: SensorSource) -> MotionAction {
        let snapshot = self.ctx.state.snapshot();

        if !snapshot.motion_enabled {
            if symbol == MotionSymbol::Detected {
                self.state.lock().last_motion = Instant::now();
            }
            return MotionAction::None;
        }

        if symbol == MotionSymbol::Detected {
            {
                let mut state = self.state.lock();
                if source == SensorSource::Secondary && state.off_due_to_motion {
                    debug!("Ignoring secondary sensor while dimmed by motion timeout");
                    return MotionAction::Ignored;
                }
                state.last_motion = Instant::now();
                state.off_due_to_motion = false;
            }

            if !snapshot.power_on {
                info!(?source, "Motion detected with lights off, turning on");
                self.ctx.state.set_power_on(true);
                let secs = self.ctx.config.fades.motion_on_secs;
                self.ramp_both(secs, snapshot.led_brightness, snapshot.lamp_brightness)
                    .await;
                return MotionAction::LightsOn;
            }
        }

        self.check_timeout().await
    }

    /// Periodic timeout check from the control loop
    pub async fn tick(&self) -> MotionAction {
        if !self.ctx.state.snapshot().motion_enabled {
            return MotionAction::None;
        }
        self.check_timeout().await
    }

    async fn check_timeout(&self) -> MotionAction {
        let snapshot = self.ctx.state.snapshot();
        if !snapshot.power_on {
            return MotionAction::None;
        }

        let delay = self
            .ctx
            .config
            .delay_levels
            .get(snapshot.delay_level)
            .map(|d| Duration::from_secs(d.seconds))
            .unwrap_or(Duration::MAX);

        let motionless = self.motionless_for();
        if motionless <= delay {
            return MotionAction::None;
        }

        info!(
            motionless_secs = motionless.as_secs(),
            delay_secs = delay.as_secs(),
            "No motion, dimming lights"
        );
        self.state.lock().off_due_to_motion = true;
        self.ctx.state.set_power_on(false);

        let fades = &self.ctx.config.fades;
        self.ramp_both(fades.motion_off_secs, fades.motion_off_level, fades.motion_off_level)
            .await;
        MotionAction::Dimmed
    }

    async fn ramp_both(&self, secs: f32, led: u8, lamp: u8) {
        let fades = &self.ctx.fades;
        tokio::join!(
            fades.start_ramp(RampRequest::new(Channel::Led, secs, led).critical()),
            fades.start_ramp(RampRequest::new(Channel::Lamp, secs, lamp).critical()),
        );
    }
}
