//! Actuator health monitoring
//!
//! A background task that periodically resolves any actuator whose address
//! is still unknown and probes every resolved one. The combined result is
//! published as a [`Reachability`] snapshot that the control loop and the
//! link consult before polling or sending.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use lh_error::{HubError, Result};

use crate::actuators::ActuatorDirectory;

/// Published reachability, keyed by actuator name
#[derive(Clone, Default)]
pub struct Reachability {
    inner: Arc<RwLock<HashMap<String, bool>>>,
}

impl Reachability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown actuators are reported unreachable
    pub fn is_reachable(&self, name: &str) -> bool {
        self.inner.read().get(name).copied().unwrap_or(false)
    }

    pub fn snapshot(&self) -> HashMap<String, bool> {
        self.inner.read().clone()
    }

    pub fn publish(&self, snapshot: HashMap<String, bool>) {
        *self.inner.write() = snapshot;
    }

    pub fn set(&self, name: &str, reachable: bool) {
        self.inner.write().insert(name.to_string(), reachable);
    }
}

/// Resolves a hardware address to a network address
#[cfg_attr(test, mockall::automock)]
pub trait Discovery: Send + Sync {
    fn resolve(&self, mac: &str) -> Result<Option<IpAddr>>;
}

/// Liveness check for a single host. `Err` means the check itself could
/// not run; the host then counts as unreachable for the period.
#[cfg_attr(test, mockall::automock)]
pub trait ReachabilityProbe: Send + Sync {
    fn probe(&self, addr: IpAddr) -> Result<bool>;
}

/// Discovery through `arp-scan` on the local network
pub struct ArpScanDiscovery;

impl Discovery for ArpScanDiscovery {
    fn resolve(&self, mac: &str) -> Result<Option<IpAddr>> {
        let output = Command::new("arp-scan")
            .arg(format!("--destaddr={}", mac))
            .arg("--localnet")
            .stderr(Stdio::null())
            .output()
            .map_err(|e| HubError::Discovery {
                mac: mac.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(HubError::Discovery {
                mac: mac.to_string(),
                reason: format!("arp-scan exited with {}", output.status),
            });
        }

        Ok(parse_arp_scan(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Last IPv4 address that begins a line of `arp-scan` output
pub fn parse_arp_scan(output: &str) -> Option<IpAddr> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|field| field.parse::<Ipv4Addr>().ok())
        .last()
        .map(IpAddr::V4)
}

/// ICMP probe through the system `ping`
pub struct PingProbe {
    pub timeout_secs: u64,
}

impl ReachabilityProbe for PingProbe {
    fn probe(&self, addr: IpAddr) -> Result<bool> {
        let status = Command::new("ping")
            .args(["-c", "1", "-W"])
            .arg(self.timeout_secs.max(1).to_string())
            .arg(addr.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| HubError::Probe {
                target: addr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(status.success())
    }
}

pub struct HealthMonitor {
    directory: ActuatorDirectory,
    reachability: Reachability,
    discovery: Arc<dyn Discovery>,
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(
        directory: ActuatorDirectory,
        reachability: Reachability,
        discovery: Arc<dyn Discovery>,
        probe: Arc<dyn ReachabilityProbe>,
        interval: Duration,
    ) -> Self {
        Self {
            directory,
            reachability,
            discovery,
            probe,
            interval,
        }
    }

    /// One resolve + probe pass. Blocking collaborators run off the runtime.
    pub async fn refresh_once(&self) {
        let directory = self.directory.clone();
        let discovery = Arc::clone(&self.discovery);
        let probe = Arc::clone(&self.probe);

        let result =
            tokio::task::spawn_blocking(move || refresh_blocking(&directory, &*discovery, &*probe))
                .await;

        match result {
            Ok(snapshot) => {
                let previous = self.reachability.snapshot();
                for (name, up) in &snapshot {
                    if previous.get(name) != Some(up) {
                        info!(actuator = %name, reachable = up, "Actuator reachability changed");
                    }
                }
                self.reachability.publish(snapshot);
            }
            Err(e) => warn!("Health refresh task failed: {}", e),
        }
    }

    /// Refresh every interval until `shutdown` is set. The first refresh
    /// comes one interval after start; startup runs [`Self::refresh_once`].
    pub async fn run(self, shutdown: Arc<AtomicBool>) {
        info!("Health monitor started (interval {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Completes immediately
        ticker.tick().await;

        while !shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            self.refresh_once().await;
        }
        info!("Health monitor stopped");
    }

    /// Whether any motion sensor is reachable
    pub fn any_sensor_reachable(directory: &ActuatorDirectory, reachability: &Reachability) -> bool {
        directory
            .entries()
            .iter()
            .filter(|entry| entry.spec.role.is_sensor())
            .any(|entry| reachability.is_reachable(&entry.spec.name))
    }
}

fn refresh_blocking(
    directory: &ActuatorDirectory,
    discovery: &dyn Discovery,
    probe: &dyn ReachabilityProbe,
) -> HashMap<String, bool> {
    for (name, mac) in directory.unresolved() {
        match discovery.resolve(&mac) {
            Ok(Some(ip)) => {
                info!(actuator = %name, %ip, "Resolved actuator address");
                directory.set_address(&name, ip);
            }
            Ok(None) => debug!(actuator = %name, %mac, "Actuator not found on network"),
            Err(e) => debug!(actuator = %name, "Discovery failed: {}", e),
        }
    }

    directory
        .entries()
        .iter()
        .map(|entry| {
            let name = entry.spec.name.clone();
            let up = match directory.ip(&name) {
                Some(ip) => probe.probe(ip).unwrap_or_else(|e| {
                    warn!(actuator = %name, "{}", e);
                    false
                }),
                None => false,
            };
            (name, up)
        })
        .collect()
}
