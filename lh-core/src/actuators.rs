//! Actuator address table
//!
//! Maps logical actuator names to network endpoints. Static addresses come
//! straight from config; the rest are filled in by discovery and stay fixed
//! once resolved.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::{ActuatorRole, ActuatorSpec, HubConfig};

#[derive(Debug, Clone)]
pub struct ActuatorEntry {
    pub spec: ActuatorSpec,
    pub port: u16,
}

#[derive(Clone)]
pub struct ActuatorDirectory {
    entries: Arc<Vec<ActuatorEntry>>,
    resolved: Arc<RwLock<HashMap<String, IpAddr>>>,
}

impl ActuatorDirectory {
    pub fn from_config(config: &HubConfig) -> Self {
        let entries: Vec<ActuatorEntry> = config
            .actuators
            .iter()
            .map(|spec| ActuatorEntry {
                port: spec.port.unwrap_or(config.network.actuator_port),
                spec: spec.clone(),
            })
            .collect();

        let resolved = entries
            .iter()
            .filter_map(|e| e.spec.address.map(|ip| (e.spec.name.clone(), ip)))
            .collect();

        Self {
            entries: Arc::new(entries),
            resolved: Arc::new(RwLock::new(resolved)),
        }
    }

    pub fn entries(&self) -> &[ActuatorEntry] {
        &self.entries
    }

    /// First actuator with the given role
    pub fn by_role(&self, role: ActuatorRole) -> Option<&ActuatorEntry> {
        self.entries.iter().find(|e| e.spec.role == role)
    }

    pub fn name_of(&self, role: ActuatorRole) -> Option<&str> {
        self.by_role(role).map(|e| e.spec.name.as_str())
    }

    /// Resolved endpoint for a named actuator
    pub fn address(&self, name: &str) -> Option<SocketAddr> {
        let entry = self.entries.iter().find(|e| e.spec.name == name)?;
        let ip = *self.resolved.read().get(name)?;
        Some(SocketAddr::new(ip, entry.port))
    }

    pub fn ip(&self, name: &str) -> Option<IpAddr> {
        self.resolved.read().get(name).copied()
    }

    pub fn set_address(&self, name: &str, ip: IpAddr) {
        self.resolved.write().insert(name.to_string(), ip);
    }

    /// Actuators still waiting on discovery, as `(name, mac)`
    pub fn unresolved(&self) -> Vec<(String, String)> {
        let resolved = self.resolved.read();
        self.entries
            .iter()
            .filter(|e| !resolved.contains_key(&e.spec.name))
            .filter_map(|e| e.spec.mac.clone().map(|mac| (e.spec.name.clone(), mac)))
            .collect()
    }

    /// Role of the actuator at `ip`, if any
    pub fn role_of_ip(&self, ip: IpAddr) -> Option<ActuatorRole> {
        let resolved = self.resolved.read();
        self.entries
            .iter()
            .find(|e| resolved.get(&e.spec.name) == Some(&ip))
            .map(|e| e.spec.role)
    }
}
