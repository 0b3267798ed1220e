//! In-memory entities and their WireGuard configurations.
//!
//! A [`Network`] describes the server side of an overlay: where clients peer
//! to and the seed their keys are derived from. A [`Client`] is one container
//! attachment, owning a copy of its network record (there is no live
//! back-reference, records are hydrated together on read).

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use ipnet::IpNet;

use dwgd_wireguard::{derive_private_key, DeviceConfig, PeerUpdate, PublicKey};

/// Persistent keepalive applied to every peer in both directions.
pub const KEEPALIVE: Duration = Duration::from_secs(25);

/// An overlay network registered by the container engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    /// Opaque network ID assigned by the engine.
    pub id: String,
    /// UDP endpoint clients peer against.
    pub endpoint: SocketAddr,
    /// Shared secret for key derivation.
    pub seed: Vec<u8>,
    /// Public key of the server peer.
    pub pubkey: PublicKey,
    /// Optional CIDR routed through the overlay, empty when unset.
    pub route: String,
    /// Local server device owned by the driver, empty in pubkey mode.
    pub ifname: String,
}

impl Network {
    /// The client→server peer entry: everything is allowed through the
    /// server and the allowed-IPs set is replaced wholesale.
    #[must_use]
    pub fn peer_update(&self) -> PeerUpdate {
        let allowed_ips: Vec<IpNet> = vec!["0.0.0.0/0".parse().expect("valid cidr")];

        PeerUpdate {
            public_key: self.pubkey,
            remove: false,
            endpoint: Some(self.endpoint),
            persistent_keepalive: Some(KEEPALIVE),
            allowed_ips,
            replace_allowed_ips: true,
        }
    }
}

/// A container attachment to a [`Network`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Client {
    /// Endpoint ID assigned by the engine.
    pub id: String,
    /// The single address the engine assigned to this attachment.
    pub ip: IpAddr,
    /// Kernel interface name, a pure function of `id`.
    pub ifname: String,
    /// The owning network, hydrated on read.
    pub network: Network,
}

impl Client {
    /// The full configuration for this client's own interface: the derived
    /// private key plus the single client→server peer.
    #[must_use]
    pub fn device_config(&self) -> DeviceConfig {
        let private_key = derive_private_key(&self.network.seed, self.ip);

        DeviceConfig {
            private_key: Some(private_key),
            listen_port: None,
            fwmark: None,
            replace_peers: true,
            peers: vec![self.network.peer_update()],
        }
    }

    /// The server→client peer entry used on the network's own device in
    /// ifname mode. No endpoint: the server waits for the client to dial in.
    #[must_use]
    pub fn peer_update(&self) -> PeerUpdate {
        let prefix = match self.ip {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let allowed_ips = vec![IpNet::new(self.ip, prefix).expect("host prefix")];

        PeerUpdate {
            public_key: derive_private_key(&self.network.seed, self.ip).public_key(),
            remove: false,
            endpoint: None,
            persistent_keepalive: Some(KEEPALIVE),
            allowed_ips,
            replace_allowed_ips: true,
        }
    }
}

/// Derives the kernel interface name for an endpoint ID.
///
/// The name is `wg-` plus the first twelve characters of the ID, which keeps
/// it inside the kernel's IFNAMSIZ limit while staying recognizable.
#[must_use]
pub fn client_ifname(endpoint_id: &str) -> String {
    let short: String = endpoint_id.chars().take(12).collect();
    format!("wg-{short}")
}
