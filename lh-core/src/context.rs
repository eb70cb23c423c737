//! Shared handles passed to every component constructor

use std::sync::Arc;

use crate::actuators::ActuatorDirectory;
use crate::alert::AlertSink;
use crate::config::HubConfig;
use crate::fade::FadeEngine;
use crate::health::Reachability;
use crate::link::ActuatorSink;
use crate::settings::StateStore;

#[derive(Clone)]
pub struct HubContext {
    pub config: Arc<HubConfig>,
    pub state: StateStore,
    pub directory: ActuatorDirectory,
    pub reachability: Reachability,
    pub sink: Arc<dyn ActuatorSink>,
    pub alerts: Arc<dyn AlertSink>,
    pub fades: FadeEngine,
}

impl HubContext {
    pub fn new(
        config: HubConfig,
        state: StateStore,
        sink: Arc<dyn ActuatorSink>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let directory = ActuatorDirectory::from_config(&config);
        Self::with_network(config, state, directory, Reachability::new(), sink, alerts)
    }

    pub fn with_network(
        config: HubConfig,
        state: StateStore,
        directory: ActuatorDirectory,
        reachability: Reachability,
        sink: Arc<dyn ActuatorSink>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let fades = FadeEngine::new(&config.fades, Arc::clone(&sink), state.clone());
        Self {
            config: Arc::new(config),
            state,
            directory,
            reachability,
            sink,
            alerts,
            fades,
        }
    }

    /// Play an alert at the current volume
    pub fn alert(&self, alert: crate::alert::Alert) {
        let volume = self.state.snapshot().volume;
        self.alerts.play(alert, volume);
    }
}
