//! Error types for the driver and its RPC surface.

use thiserror::Error;

use dwgd_storage::StorageError;
use dwgd_wireguard::WireGuardError;

/// Errors surfaced to the container engine as RPC failures.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A required CreateNetwork option was not supplied.
    #[error("{0} option missing")]
    MissingOption(&'static str),

    /// A CreateNetwork option or endpoint address failed to parse.
    #[error("invalid {option} value {value:?}: {message}")]
    InvalidOption {
        /// Option or field name.
        option: &'static str,
        /// The offending value.
        value: String,
        /// Parse failure detail.
        message: String,
    },

    /// The referenced network does not exist.
    #[error("NetworkID {0} not found")]
    NetworkNotFound(String),

    /// The referenced endpoint does not exist.
    #[error("EndpointID {0} not found")]
    EndpointNotFound(String),

    /// The endpoint ID is already taken.
    #[error("EndpointID {0} already exists")]
    EndpointExists(String),

    /// A rootless `docker.pid` file was unreadable or not a pid.
    #[error("invalid pid file {path}: {message}")]
    InvalidPidFile {
        /// Path of the pid file.
        path: String,
        /// Failure detail.
        message: String,
    },

    /// State store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// WireGuard control-plane failure.
    #[error(transparent)]
    WireGuard(#[from] WireGuardError),

    /// An `ip`/`nsenter` invocation or filesystem operation failed.
    #[error(transparent)]
    Command(#[from] std::io::Error),
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
