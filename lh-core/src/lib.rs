//! lumenhub core library
//!
//! Real-time control core of a two-channel home lighting hub.
//!
//! # Features
//!
//! - **Fade Engine**: Interruptible per-channel brightness ramps with priority
//! - **Event Router**: Remote and sensor events mapped onto the lighting state
//! - **Motion Supervisor**: Auto-dim after a motionless timeout, auto-on on motion
//! - **Health Monitor**: Actuator discovery and reachability gating
//! - **Persistence**: Lighting state saved atomically after every change
//!
//! # Example
//!
//! ```no_run
//! use lh_core::{HubConfig, HubContext, EventRouter, StateStore, StateLimits};
//! use lh_core::alert::SilentAlerts;
//! use lh_core::link::ActuatorSink;
//! use std::sync::Arc;
//!
//! # async fn run(sink: Arc<dyn ActuatorSink>) {
//! let config = HubConfig::default();
//! let limits = StateLimits { delay_levels: config.delay_levels.len(), volume_max: config.adjust.volume_max };
//! let state = StateStore::load(&config.paths.settings_file, limits);
//! let ctx = HubContext::new(config, state, sink, Arc::new(SilentAlerts));
//! let mut router = EventRouter::new(ctx);
//! router.handle(lh_protocol::Event::Remote(lh_protocol::RemoteButton::PowerButton.into()),
//!               lh_core::link::SensorSource::Other).await;
//! # }
//! ```

pub mod actuators;
pub mod alert;
pub mod config;
pub mod constants;
pub mod context;
pub mod fade;
pub mod health;
pub mod link;
pub mod motion;
pub mod remote;
pub mod router;
pub mod settings;

#[cfg(test)]
mod test_utils;

pub use lh_error::{HubError, Result};

pub use actuators::ActuatorDirectory;
pub use config::{ActuatorRole, HubConfig, RampStyle};
pub use context::HubContext;
pub use fade::{Channel, FadeEngine, RampRequest};
pub use health::{HealthMonitor, Reachability};
pub use link::{SensorSource, UdpLink};
pub use motion::{MotionAction, MotionSupervisor};
pub use remote::{RemoteDecoder, RfReading, RfSource};
pub use router::{EventRouter, Outcome};
pub use settings::{LightingState, StateLimits, StateStore};
