//! Error types returned by the monitoring core

use thiserror::Error;

use crate::monitor::alerts::{AlertId, FaultKind};

/// Result type alias for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors surfaced by the registry, the alert manager and configuration
///
/// Probe failures are not represented here: an unreachable or timed out
/// target is an ordinary `Measurement` with `reachable == false`.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The device address cannot be probed (rejected at registration)
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// No device with this id is registered
    #[error("device '{0}' not found")]
    DeviceNotFound(String),

    /// No alert with this id exists
    #[error("alert {0} not found")]
    AlertNotFound(AlertId),

    /// A device with this id is already registered
    #[error("device '{0}' is already registered")]
    DuplicateDevice(String),

    /// A second active alert for the same device and fault kind was about to
    /// be created. The alert manager coalesces instead of returning this.
    #[error("device '{device_id}' already has an active {kind} alert")]
    DuplicateActiveAlert { device_id: String, kind: FaultKind },

    /// Configuration values are out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorError {
    pub(crate) fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        MonitorError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error reports an unknown device or alert id
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MonitorError::DeviceNotFound(_) | MonitorError::AlertNotFound(_)
        )
    }
}
