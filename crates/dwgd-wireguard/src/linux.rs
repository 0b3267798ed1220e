//! Kernel WireGuard control plane using the netlink API.
//!
//! Wraps `defguard_wireguard_rs` with the `Kernel` backend to implement
//! [`WgControl`] against real interfaces. Interface creation and deletion are
//! not handled here: the driver owns those through the `ip` utility, this
//! client only reads and configures existing devices.

use std::str::FromStr;

use async_trait::async_trait;
use defguard_wireguard_rs::host::Peer as DgPeer;
use defguard_wireguard_rs::key::Key;
use defguard_wireguard_rs::net::IpAddrMask;
use defguard_wireguard_rs::{InterfaceConfiguration, Kernel, WGApi, WireguardInterfaceApi};
use tracing::debug;

use crate::control::{Device, DeviceConfig, PeerUpdate, WgControl};
use crate::error::{Result, WireGuardError};
use crate::keys::{PrivateKey, PublicKey, KEY_SIZE};

/// Kernel-backed [`WgControl`] implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct KernelWg;

impl KernelWg {
    /// Creates a new kernel control client.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn api_for(name: &str) -> Result<WGApi<Kernel>> {
    WGApi::<Kernel>::new(name.to_string()).map_err(|e| WireGuardError::DeviceError {
        device: name.to_string(),
        message: format!("WGApi::new: {e}"),
    })
}

fn to_defguard_key(key: &PublicKey) -> Result<Key> {
    Key::try_from(key.as_bytes().as_slice()).map_err(|e| WireGuardError::DeviceError {
        device: String::new(),
        message: format!("key conversion: {e}"),
    })
}

fn build_defguard_peer(peer: &PeerUpdate) -> Result<DgPeer> {
    let mut dg_peer = DgPeer::new(to_defguard_key(&peer.public_key)?);

    dg_peer.endpoint = peer.endpoint;
    if let Some(keepalive) = peer.persistent_keepalive {
        dg_peer.persistent_keepalive_interval = Some(keepalive.as_secs() as u16);
    }
    for net in &peer.allowed_ips {
        let mask = IpAddrMask::from_str(&net.to_string()).map_err(|e| {
            WireGuardError::DeviceError {
                device: String::new(),
                message: format!("{net}: {e}"),
            }
        })?;
        dg_peer.allowed_ips.push(mask);
    }

    Ok(dg_peer)
}

#[async_trait]
impl WgControl for KernelWg {
    async fn device(&self, name: &str) -> Result<Device> {
        let api = api_for(name)?;
        let host = api
            .read_interface_data()
            .map_err(|_| WireGuardError::DeviceNotFound(name.to_string()))?;

        let private_key = match host.private_key {
            Some(ref key) => {
                let bytes: [u8; KEY_SIZE] = key.as_array();
                PrivateKey::from_bytes_array(bytes)
            }
            None => PrivateKey::from_bytes_array([0u8; KEY_SIZE]),
        };
        let public_key = private_key.public_key();

        Ok(Device {
            name: name.to_string(),
            private_key,
            public_key,
            listen_port: host.listen_port as u16,
            fwmark: host.fwmark.unwrap_or(0),
        })
    }

    async fn configure_device(&self, name: &str, config: DeviceConfig) -> Result<()> {
        let api = api_for(name)?;

        if config.replace_peers {
            let prvkey = config
                .private_key
                .as_ref()
                .map(PrivateKey::to_base64)
                .unwrap_or_default();
            let mut peers = Vec::new();
            for peer in config.peers.iter().filter(|p| !p.remove) {
                peers.push(build_defguard_peer(peer)?);
            }

            let iface_config = InterfaceConfiguration {
                name: name.to_string(),
                prvkey,
                addresses: Vec::new(),
                port: u32::from(config.listen_port.unwrap_or(0)),
                peers,
                mtu: None,
            };
            debug!(device = %name, "replacing device configuration");
            api.configure_interface(&iface_config)
                .map_err(|e| WireGuardError::DeviceError {
                    device: name.to_string(),
                    message: format!("configure_interface: {e}"),
                })?;
            return Ok(());
        }

        // Additive update: interface-level fields were read from the live
        // device by the caller and are already in place, only peers change.
        for peer in &config.peers {
            if peer.remove {
                let key = to_defguard_key(&peer.public_key)?;
                debug!(device = %name, peer = %peer.public_key, "removing peer");
                api.remove_peer(&key).map_err(|e| WireGuardError::DeviceError {
                    device: name.to_string(),
                    message: format!("remove_peer: {e}"),
                })?;
            } else {
                let dg_peer = build_defguard_peer(peer)?;
                debug!(device = %name, peer = %peer.public_key, "adding peer");
                api.configure_peer(&dg_peer)
                    .map_err(|e| WireGuardError::DeviceError {
                        device: name.to_string(),
                        message: format!("configure_peer: {e}"),
                    })?;
            }
        }

        Ok(())
    }
}
