//! The WireGuard control-plane capability set.
//!
//! [`WgControl`] is the seam between the driver and the kernel: it can read a
//! device and apply a configuration, nothing more. Production wiring uses
//! [`crate::linux::KernelWg`]; tests substitute [`FakeWg`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::IpNet;
use tokio::sync::RwLock;

use crate::error::{Result, WireGuardError};
use crate::keys::{PrivateKey, PublicKey};

/// A snapshot of a WireGuard device as read from the kernel.
#[derive(Clone, Debug)]
pub struct Device {
    /// Interface name.
    pub name: String,
    /// The device's private key.
    pub private_key: PrivateKey,
    /// The device's public key.
    pub public_key: PublicKey,
    /// UDP port the device listens on.
    pub listen_port: u16,
    /// Firewall mark, zero when unset.
    pub fwmark: u32,
}

/// A single peer entry inside a [`DeviceConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerUpdate {
    /// The peer's public key.
    pub public_key: PublicKey,
    /// Remove this peer instead of adding or updating it.
    pub remove: bool,
    /// UDP endpoint of the peer, `None` when the peer dials in.
    pub endpoint: Option<SocketAddr>,
    /// Persistent keepalive interval.
    pub persistent_keepalive: Option<Duration>,
    /// Networks this peer is allowed to use.
    pub allowed_ips: Vec<IpNet>,
    /// Replace the peer's allowed-IPs set instead of extending it.
    pub replace_allowed_ips: bool,
}

/// A configuration to apply to a WireGuard device.
///
/// `None` fields are left untouched. With `replace_peers` unset the peer list
/// is an incremental update: each entry adds, updates, or (with
/// [`PeerUpdate::remove`]) removes exactly one peer.
#[derive(Clone, Debug, Default)]
pub struct DeviceConfig {
    /// Private key to install.
    pub private_key: Option<PrivateKey>,
    /// Listen port to install.
    pub listen_port: Option<u16>,
    /// Firewall mark to install.
    pub fwmark: Option<u32>,
    /// Drop all peers not named in `peers`.
    pub replace_peers: bool,
    /// Peer entries to apply.
    pub peers: Vec<PeerUpdate>,
}

/// Capability set over the kernel WireGuard implementation.
#[async_trait]
pub trait WgControl: Send + Sync {
    /// Reads the named device.
    ///
    /// # Errors
    ///
    /// Returns [`WireGuardError::DeviceNotFound`] when no such interface
    /// exists on the host.
    async fn device(&self, name: &str) -> Result<Device>;

    /// Applies a configuration to the named device.
    async fn configure_device(&self, name: &str, config: DeviceConfig) -> Result<()>;
}

/// An in-memory [`WgControl`] for tests.
///
/// Holds a map of devices and records every `configure_device` call so tests
/// can assert on the exact configuration the driver produced.
#[derive(Clone, Default)]
pub struct FakeWg {
    devices: Arc<RwLock<HashMap<String, Device>>>,
    configure_history: Arc<RwLock<Vec<(String, DeviceConfig)>>>,
}

impl FakeWg {
    /// Creates an empty fake with no devices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device that subsequent `device` calls will return.
    pub async fn add_device(&self, device: Device) {
        self.devices.write().await.insert(device.name.clone(), device);
    }

    /// Returns every `configure_device` call seen so far, in order.
    pub async fn configure_history(&self) -> Vec<(String, DeviceConfig)> {
        self.configure_history.read().await.clone()
    }
}

#[async_trait]
impl WgControl for FakeWg {
    async fn device(&self, name: &str) -> Result<Device> {
        self.devices
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| WireGuardError::DeviceNotFound(name.to_string()))
    }

    async fn configure_device(&self, name: &str, config: DeviceConfig) -> Result<()> {
        self.configure_history
            .write()
            .await
            .push((name.to_string(), config));
        Ok(())
    }
}
