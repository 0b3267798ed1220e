//! Error types for WireGuard key and device operations.

use thiserror::Error;

/// Errors that can occur during WireGuard key and device operations.
#[derive(Debug, Error)]
pub enum WireGuardError {
    /// Invalid base64 encoding.
    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(String),

    /// Invalid key length.
    #[error("invalid key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    /// The named device does not exist on this host.
    #[error("device {0} does not exist")]
    DeviceNotFound(String),

    /// The kernel control plane rejected an operation.
    #[error("device {device}: {message}")]
    DeviceError {
        /// Interface name the operation targeted.
        device: String,
        /// Underlying control-plane message.
        message: String,
    },
}

/// Result type for WireGuard operations.
pub type Result<T> = std::result::Result<T, WireGuardError>;
