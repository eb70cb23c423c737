//! Actuator datagram link
//!
//! One UDP socket carries both directions: sensor lines arriving from the
//! actuators (each answered with `ACK`) and commands sent to the dimmers.
//! Every operation is non-blocking; a send that cannot go out immediately is
//! dropped and the next ramp step or event re-synchronizes the device.

use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use lh_error::{HubError, Result};
use lh_protocol::{ActuatorCommand, MAX_DATAGRAM_SIZE};

use crate::actuators::ActuatorDirectory;
use crate::config::ActuatorRole;
use crate::health::Reachability;

/// Destination for actuator commands
pub trait ActuatorSink: Send + Sync {
    fn send(&self, role: ActuatorRole, command: &ActuatorCommand) -> Result<()>;
}

/// Which sensor a datagram came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    /// PIR sensor
    Primary,
    /// Radar sensor; distrusted after an auto-dim
    Secondary,
    /// Any other sender, trusted like the primary sensor
    Other,
}

impl SensorSource {
    pub fn from_role(role: Option<ActuatorRole>) -> Self {
        match role {
            Some(ActuatorRole::Motion) => SensorSource::Primary,
            Some(ActuatorRole::Radar) => SensorSource::Secondary,
            _ => SensorSource::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Inbound {
    pub line: String,
    pub source: SensorSource,
    pub from: SocketAddr,
}

pub struct UdpLink {
    socket: UdpSocket,
    directory: ActuatorDirectory,
    reachability: Reachability,
}

impl UdpLink {
    pub async fn bind(
        addr: SocketAddr,
        directory: ActuatorDirectory,
        reachability: Reachability,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| HubError::Bind { addr, source })?;
        debug!("Actuator link bound on {}", addr);
        Ok(Self {
            socket,
            directory,
            reachability,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Take one pending datagram, if any, and acknowledge it
    pub fn try_recv(&self) -> Option<Inbound> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = match self.socket.try_recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) => {
                debug!("{}", HubError::Receive(e.to_string()));
                return None;
            }
        };

        let ack = ActuatorCommand::Ack.encode();
        if let Err(e) = self.socket.try_send_to(ack.as_bytes(), from) {
            debug!(%from, "Failed to acknowledge datagram: {}", e);
        }

        let line = match std::str::from_utf8(&buf[..len]) {
            Ok(s) => s.to_string(),
            Err(e) => {
                warn!(%from, "Dropping non-UTF-8 datagram: {}", e);
                return None;
            }
        };

        let source = SensorSource::from_role(self.directory.role_of_ip(from.ip()));
        trace!(%from, ?source, line = %line.trim(), "Datagram received");
        Some(Inbound { line, source, from })
    }
}

impl ActuatorSink for UdpLink {
    fn send(&self, role: ActuatorRole, command: &ActuatorCommand) -> Result<()> {
        let name = self
            .directory
            .name_of(role)
            .ok_or_else(|| HubError::UnknownActuator(format!("{:?}", role)))?;

        command.validate().map_err(|reason| HubError::send(name, reason))?;

        let addr = self
            .directory
            .address(name)
            .ok_or_else(|| HubError::Unresolved(name.to_string()))?;
        if !self.reachability.is_reachable(name) {
            return Err(HubError::Unreachable(name.to_string()));
        }

        let payload = command.encode();
        self.socket
            .try_send_to(payload.as_bytes(), addr)
            .map_err(|e| HubError::send(name, e.to_string()))?;
        trace!(actuator = name, %addr, %payload, "Sent");
        Ok(())
    }
}
