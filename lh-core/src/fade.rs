//! Per-channel brightness ramps
//!
//! Each channel (LED bank, lamp) owns an exclusive `tokio::sync::Mutex`. A
//! ramp task holds that lock for its whole lifetime, so at most one ramp
//! runs per channel and its steps reach the wire strictly in order. The two
//! channels are independent.
//!
//! Priority rules:
//! - A non-critical request against a busy channel is rejected outright.
//! - A critical request raises the channel's preempt flag, then waits for
//!   the lock. Non-critical tasks poll the flag every step and bail out;
//!   critical tasks ignore it and run to completion.
//!
//! Non-critical ramps save the state file about once a second while
//! stepping, and again when they finish or are preempted.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use lh_protocol::{ActuatorCommand, MAX_LEVEL};

use crate::config::{ActuatorRole, FadeConfig, RampStyle};
use crate::constants::timing::RAMP_CHECKPOINT;
use crate::link::ActuatorSink;
use crate::settings::StateStore;

/// A dimmable output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Led,
    Lamp,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Led, Channel::Lamp];

    pub fn role(&self) -> ActuatorRole {
        match self {
            Channel::Led => ActuatorRole::Led,
            Channel::Lamp => ActuatorRole::Lamp,
        }
    }

    pub fn is_lamp(&self) -> bool {
        matches!(self, Channel::Lamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampRequest {
    pub channel: Channel,
    pub duration_secs: f32,
    pub target: u8,
    /// Power and motion transitions; never dropped, never preempted
    pub critical: bool,
}

impl RampRequest {
    pub fn new(channel: Channel, duration_secs: f32, target: u8) -> Self {
        Self {
            channel,
            duration_secs,
            target,
            critical: false,
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

/// Engine counters
#[derive(Debug, Default)]
pub struct FadeStats {
    pub started: AtomicU64,
    pub rejected: AtomicU64,
    pub preempted: AtomicU64,
    pub completed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FadeStatsSnapshot {
    pub started: u64,
    pub rejected: u64,
    pub preempted: u64,
    pub completed: u64,
}

struct ChannelSlot {
    lock: Arc<Mutex<()>>,
    /// Last level written to the actuator
    level: AtomicU8,
    preempt: AtomicBool,
    preempted: Notify,
    style: RampStyle,
}

impl ChannelSlot {
    fn new(style: RampStyle) -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            level: AtomicU8::new(0),
            preempt: AtomicBool::new(false),
            preempted: Notify::new(),
            style,
        }
    }
}

struct EngineInner {
    led: ChannelSlot,
    lamp: ChannelSlot,
    sink: Arc<dyn ActuatorSink>,
    state: StateStore,
    lamp_guard: Duration,
    stats: FadeStats,
}

#[derive(Clone)]
pub struct FadeEngine {
    inner: Arc<EngineInner>,
}

impl FadeEngine {
    pub fn new(config: &FadeConfig, sink: Arc<dyn ActuatorSink>, state: StateStore) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                led: ChannelSlot::new(config.led_style),
                lamp: ChannelSlot::new(config.lamp_style),
                sink,
                state,
                lamp_guard: Duration::from_millis(config.lamp_guard_ms),
                stats: FadeStats::default(),
            }),
        }
    }

    fn slot(&self, channel: Channel) -> &ChannelSlot {
        match channel {
            Channel::Led => &self.inner.led,
            Channel::Lamp => &self.inner.lamp,
        }
    }

    /// Start a ramp. Returns `false` only for a non-critical request against
    /// a busy channel; critical requests wait their turn and always start.
    pub async fn start_ramp(&self, request: RampRequest) -> bool {
        let slot = self.slot(request.channel);

        let guard = match Arc::clone(&slot.lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) if !request.critical => {
                self.inner.stats.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(channel = ?request.channel, target = request.target, "Channel busy, ramp rejected");
                return false;
            }
            Err(_) => {
                debug!(channel = ?request.channel, target = request.target, "Preempting running ramp");
                slot.preempt.store(true, Ordering::SeqCst);
                slot.preempted.notify_waiters();
                let guard = Arc::clone(&slot.lock).lock_owned().await;
                slot.preempt.store(false, Ordering::SeqCst);
                guard
            }
        };

        self.inner.stats.started.fetch_add(1, Ordering::Relaxed);
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_ramp(request, guard).await;
        });
        true
    }

    async fn run_ramp(&self, request: RampRequest, _guard: OwnedMutexGuard<()>) {
        let slot = self.slot(request.channel);
        let target = request.target.min(MAX_LEVEL);

        let finished = match slot.style {
            RampStyle::Stepped => self.run_stepped(slot, request, target).await,
            RampStyle::Delegated => self.run_delegated(slot, request, target).await,
        };

        if finished {
            self.inner.stats.completed.fetch_add(1, Ordering::Relaxed);
            trace!(channel = ?request.channel, target, "Ramp complete");
        } else {
            self.inner.stats.preempted.fetch_add(1, Ordering::Relaxed);
            debug!(channel = ?request.channel, level = slot.level.load(Ordering::SeqCst), "Ramp preempted");
        }

        // Saved while still holding the channel, so a preempting ramp starts
        // only once the last visible level is on disk
        if !request.critical {
            self.inner.state.persist_async().await;
        }
    }

    /// Emit every intermediate level. Returns `false` if preempted.
    async fn run_stepped(&self, slot: &ChannelSlot, request: RampRequest, target: u8) -> bool {
        let start = slot.level.load(Ordering::SeqCst);
        let steps = start.abs_diff(target) as u32;

        if steps == 0 {
            self.apply(slot, request, target);
            return true;
        }

        let delay = duration_from_secs(request.duration_secs) / steps;
        let mut level = start;
        let mut last_checkpoint = Instant::now();
        for _ in 0..steps {
            if !request.critical && slot.preempt.load(Ordering::SeqCst) {
                return false;
            }
            level = if target > level { level + 1 } else { level - 1 };
            self.apply(slot, request, level);

            if !request.critical && last_checkpoint.elapsed() >= RAMP_CHECKPOINT {
                self.inner.state.persist_async().await;
                last_checkpoint = Instant::now();
            }

            if !self.hold(slot, request.critical, delay).await {
                return false;
            }
        }
        true
    }

    /// Hand the fade to the actuator and keep the channel for its duration
    async fn run_delegated(&self, slot: &ChannelSlot, request: RampRequest, target: u8) -> bool {
        let secs = request.duration_secs.max(0.0) as u32;
        self.send(request.channel, &ActuatorCommand::LampSet { secs, level: target });
        self.record(slot, request, target);

        let hold = duration_from_secs(request.duration_secs) + self.inner.lamp_guard;
        self.hold(slot, request.critical, hold).await
    }

    /// Sleep for `duration`. Non-critical holds end early on preemption.
    async fn hold(&self, slot: &ChannelSlot, critical: bool, duration: Duration) -> bool {
        if critical {
            tokio::time::sleep(duration).await;
            return true;
        }

        let notified = slot.preempted.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if slot.preempt.load(Ordering::SeqCst) {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = notified => false,
        }
    }

    fn apply(&self, slot: &ChannelSlot, request: RampRequest, level: u8) {
        let command = match request.channel {
            Channel::Led => ActuatorCommand::LedSet { level },
            Channel::Lamp => ActuatorCommand::LampSet { secs: 0, level },
        };
        self.send(request.channel, &command);
        self.record(slot, request, level);
    }

    fn record(&self, slot: &ChannelSlot, request: RampRequest, level: u8) {
        slot.level.store(level, Ordering::SeqCst);
        if !request.critical {
            self.inner.state.record_level(request.channel.is_lamp(), level);
        }
    }

    fn send(&self, channel: Channel, command: &ActuatorCommand) {
        if let Err(e) = self.inner.sink.send(channel.role(), command) {
            if e.is_transient() {
                debug!(?channel, %command, "Send skipped: {}", e);
            } else {
                warn!(?channel, %command, "Send failed: {}", e);
            }
        }
    }

    pub fn is_busy(&self, channel: Channel) -> bool {
        self.slot(channel).lock.try_lock().is_err()
    }

    /// Last level applied to the channel
    pub fn level(&self, channel: Channel) -> u8 {
        self.slot(channel).level.load(Ordering::SeqCst)
    }

    /// Set the starting point for the next ramp without touching hardware
    pub fn seed_level(&self, channel: Channel, level: u8) {
        self.slot(channel).level.store(level.min(MAX_LEVEL), Ordering::SeqCst);
    }

    /// Wait until no ramp holds the channel
    pub async fn wait_idle(&self, channel: Channel) {
        let _guard = self.slot(channel).lock.lock().await;
    }

    pub async fn wait_all_idle(&self) {
        for channel in Channel::ALL {
            self.wait_idle(channel).await;
        }
    }

    pub fn stats(&self) -> FadeStatsSnapshot {
        let s = &self.inner.stats;
        FadeStatsSnapshot {
            started: s.started.load(Ordering::Relaxed),
            rejected: s.rejected.load(Ordering::Relaxed),
            preempted: s.preempted.load(Ordering::Relaxed),
            completed: s.completed.load(Ordering::Relaxed),
        }
    }
}

fn duration_from_secs(secs: f32) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f32(secs)
    } else {
        Duration::ZERO
    }
}
