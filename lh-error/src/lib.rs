//! Unified error handling for lumenhub
//!
//! This crate provides a single error type used across all lumenhub components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Result type alias using HubError
pub type Result<T> = std::result::Result<T, HubError>;

/// Unified error type for all lumenhub operations
#[derive(thiserror::Error, Debug)]
pub enum HubError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration and Settings Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("Failed to bind datagram socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: io::Error,
    },

    #[error("Failed to send to {actuator}: {reason}")]
    Send {
        actuator: String,
        reason: String,
    },

    #[error("Failed to receive datagram: {0}")]
    Receive(String),

    #[error("Unknown actuator: {0}")]
    UnknownActuator(String),

    #[error("Actuator {0} is not reachable")]
    Unreachable(String),

    #[error("Actuator {0} has no resolved address")]
    Unresolved(String),

    // ============================================================================
    // Discovery and Health Errors
    // ============================================================================
    #[error("Discovery failed for {mac}: {reason}")]
    Discovery {
        mac: String,
        reason: String,
    },

    #[error("Reachability probe failed for {target}: {reason}")]
    Probe {
        target: String,
        reason: String,
    },
}

impl HubError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid config value error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a send error for an actuator
    pub fn send(actuator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Send {
            actuator: actuator.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error is transient I/O that the next event will re-synchronize
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Send { .. } | Self::Receive(_) | Self::Unreachable(_) | Self::Unresolved(_)
        )
    }
}
