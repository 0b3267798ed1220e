//! The plugin state machine behind the six network-driver operations.
//!
//! The driver mediates between the store, the exec abstraction, and the
//! WireGuard control plane. Networks come in two flavors: in ifname mode the
//! driver also owns a local server device and peers clients on it directly;
//! in pubkey mode the server is remote and only the client side is
//! configured.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use ipnet::IpNet;
use tokio::sync::Mutex;
use tracing::{trace, warn};

use dwgd_proto::{
    CapabilitiesResponse, CreateEndpointRequest, CreateEndpointResponse, CreateNetworkRequest,
    DeleteEndpointRequest, DeleteNetworkRequest, InfoRequest, InfoResponse, InterfaceName,
    JoinRequest, JoinResponse, LeaveRequest, StaticRoute,
};
use dwgd_storage::{client_ifname, Client, Network, Storage};
use dwgd_wireguard::{DeviceConfig, WgControl};

use crate::commander::Commander;
use crate::error::{DriverError, Result};
use crate::rootless::{rootless_runtime_dir, DOCKER_PID_FILE_NAME};

/// Destination prefix the engine renames client interfaces to.
const DST_PREFIX: &str = "wg";

/// The dwgd network driver.
pub struct Driver<C, W> {
    storage: Storage,
    commander: C,
    wg: W,
    // Serializes read-modify-write cycles on server devices so concurrent
    // Joins against the same ifname-mode network do not interleave.
    server_device_lock: Mutex<()>,
}

impl<C: Commander, W: WgControl> Driver<C, W> {
    /// Opens the state database and wires up a driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn new(db_path: &str, commander: C, wg: W) -> Result<Self> {
        match commander.lookup_path("ip").await {
            Ok(path) => trace!(path = %path.display(), "using 'ip' utility"),
            Err(err) => trace!(error = %err, "couldn't find 'ip' utility"),
        }

        let storage = Storage::open(db_path).await?;
        Ok(Self {
            storage,
            commander,
            wg,
            server_device_lock: Mutex::new(()),
        })
    }

    /// Closes the state database.
    pub async fn close(&self) {
        self.storage.close().await;
    }

    /// Declares this driver host-local.
    pub fn get_capabilities(&self) -> CapabilitiesResponse {
        trace!("GetCapabilities");
        CapabilitiesResponse::default()
    }

    /// Registers a new overlay network from the engine's options.
    pub async fn create_network(&self, request: &CreateNetworkRequest) -> Result<()> {
        trace!(request = ?request, "CreateNetwork");

        // An ifname option switches the network into ifname mode; its
        // absence is not an error, it just means the server is remote.
        let device = match request.driver_option("dwgd.ifname") {
            Some(name) => Some(self.wg.device(name).await?),
            None => None,
        };

        let (pubkey, ifname) = match &device {
            Some(device) => {
                trace!(device = %device.name, "using local WireGuard server interface");
                (device.public_key, device.name.clone())
            }
            None => {
                let payload = request
                    .driver_option("dwgd.pubkey")
                    .ok_or(DriverError::MissingOption("dwgd.pubkey"))?;
                let pubkey = dwgd_wireguard::PublicKey::from_base64(payload)?;
                (pubkey, String::new())
            }
        };

        let endpoint = match request.driver_option("dwgd.endpoint") {
            Some(payload) => resolve_endpoint(payload)?,
            None => match &device {
                Some(device) => resolve_endpoint(&format!("localhost:{}", device.listen_port))?,
                None => return Err(DriverError::MissingOption("dwgd.endpoint")),
            },
        };

        let seed = request
            .driver_option("dwgd.seed")
            .ok_or(DriverError::MissingOption("dwgd.seed"))?
            .as_bytes()
            .to_vec();

        let route = request.driver_option("dwgd.route").unwrap_or_default().to_string();

        let network = Network {
            id: request.network_id.clone(),
            endpoint,
            seed,
            pubkey,
            route,
            ifname,
        };
        self.storage.add_network(&network).await?;
        Ok(())
    }

    /// Removes a network; leftover endpoint records go with it.
    pub async fn delete_network(&self, request: &DeleteNetworkRequest) -> Result<()> {
        trace!(request = ?request, "DeleteNetwork");
        self.storage.remove_network(&request.network_id).await?;
        Ok(())
    }

    /// Records an endpoint. No kernel state is touched until Join.
    pub async fn create_endpoint(
        &self,
        request: &CreateEndpointRequest,
    ) -> Result<CreateEndpointResponse> {
        trace!(request = ?request, "CreateEndpoint");

        let network = self
            .storage
            .get_network(&request.network_id)
            .await?
            .ok_or_else(|| DriverError::NetworkNotFound(request.network_id.clone()))?;

        if self.storage.get_client(&request.endpoint_id).await?.is_some() {
            return Err(DriverError::EndpointExists(request.endpoint_id.clone()));
        }

        let ip = parse_interface_address(&request.interface.address)?;

        let client = Client {
            id: request.endpoint_id.clone(),
            ip,
            ifname: client_ifname(&request.endpoint_id),
            network,
        };
        self.storage.add_client(&client).await?;

        Ok(CreateEndpointResponse::default())
    }

    /// Deletes the endpoint's host-side interface and its record.
    ///
    /// The record stays in place when the `ip` invocation fails, so the
    /// engine can retry the delete.
    pub async fn delete_endpoint(&self, request: &DeleteEndpointRequest) -> Result<()> {
        trace!(request = ?request, "DeleteEndpoint");

        let client = self
            .storage
            .get_client(&request.endpoint_id)
            .await?
            .ok_or_else(|| DriverError::EndpointNotFound(request.endpoint_id.clone()))?;

        self.commander.run("ip", &["link", "delete", client.ifname.as_str()]).await?;
        self.storage.remove_client(&request.endpoint_id).await?;
        Ok(())
    }

    /// Reports no operational data for an endpoint.
    pub async fn endpoint_info(&self, request: &InfoRequest) -> Result<InfoResponse> {
        trace!(request = ?request, "EndpointInfo");
        Ok(InfoResponse::default())
    }

    /// Creates, configures, and hands over an endpoint's interface.
    pub async fn join(&self, request: &JoinRequest) -> Result<JoinResponse> {
        trace!(request = ?request, "Join");

        let client = self
            .storage
            .get_client(&request.endpoint_id)
            .await?
            .ok_or_else(|| DriverError::EndpointNotFound(request.endpoint_id.clone()))?;

        self.commander
            .run("ip", &["link", "add", "name", client.ifname.as_str(), "type", "wireguard"])
            .await?;

        if let Err(err) = self.program_joined_interface(&client, &request.sandbox_key).await {
            // The interface was already created; try not to leak it.
            if let Err(cleanup_err) =
                self.commander.run("ip", &["link", "delete", client.ifname.as_str()]).await
            {
                warn!(
                    ifname = %client.ifname,
                    error = %cleanup_err,
                    "couldn't remove interface after failed join"
                );
            }
            return Err(err);
        }

        let mut static_routes = Vec::new();
        if !client.network.route.is_empty() {
            static_routes.push(StaticRoute {
                destination: client.network.route.clone(),
                route_type: 1,
                next_hop: String::new(),
            });
        }

        Ok(JoinResponse {
            interface_name: InterfaceName {
                src_name: client.ifname.clone(),
                dst_prefix: DST_PREFIX.to_string(),
            },
            static_routes,
            disable_gateway_service: true,
            ..JoinResponse::default()
        })
    }

    /// Configures the freshly created interface, peers it on the server
    /// device in ifname mode, and relocates it into a rootless namespace
    /// when the sandbox asks for one.
    ///
    /// Ordering matters: the WireGuard configuration must reach the
    /// interface while it still lives in the host namespace.
    async fn program_joined_interface(&self, client: &Client, sandbox_key: &str) -> Result<()> {
        self.wg.configure_device(&client.ifname, client.device_config()).await?;

        if !client.network.ifname.is_empty() {
            trace!(device = %client.network.ifname, "adding peer to server interface");
            self.update_server_device(client, false).await?;
        }

        self.move_to_rootless_namespace_if_necessary(sandbox_key, &client.ifname).await?;
        Ok(())
    }

    /// Removes the client's peer from the server device in ifname mode.
    ///
    /// The in-sandbox interface itself is destroyed later by DeleteEndpoint.
    pub async fn leave(&self, request: &LeaveRequest) -> Result<()> {
        trace!(request = ?request, "Leave");

        let client = self
            .storage
            .get_client(&request.endpoint_id)
            .await?
            .ok_or_else(|| DriverError::EndpointNotFound(request.endpoint_id.clone()))?;

        if !client.network.ifname.is_empty() {
            trace!(device = %client.network.ifname, "removing peer from server interface");
            self.update_server_device(&client, true).await?;
        }

        Ok(())
    }

    /// Applies a single-peer update to the network's server device.
    ///
    /// The device's own fields are re-read from the kernel first so the
    /// update never clobbers the private key, listen port, or fwmark, and
    /// `replace_peers` stays off so every other peer survives.
    async fn update_server_device(&self, client: &Client, remove: bool) -> Result<()> {
        let _guard = self.server_device_lock.lock().await;

        let device = self.wg.device(&client.network.ifname).await?;

        let mut peer = client.peer_update();
        peer.remove = remove;

        let config = DeviceConfig {
            private_key: Some(device.private_key.clone()),
            listen_port: Some(device.listen_port),
            fwmark: Some(device.fwmark),
            replace_peers: false,
            peers: vec![peer],
        };
        trace!(device = %device.name, remove, "updating server device configuration");

        self.wg.configure_device(&device.name, config).await?;
        Ok(())
    }

    /// Moves `ifname` into the user namespace of a rootless engine when the
    /// sandbox key points under `/run/user/<uid>`.
    async fn move_to_rootless_namespace_if_necessary(
        &self,
        sandbox_key: &str,
        ifname: &str,
    ) -> Result<()> {
        let Some(runtime_dir) = rootless_runtime_dir(sandbox_key) else {
            return Ok(());
        };

        let pid_path = Path::new(runtime_dir).join(DOCKER_PID_FILE_NAME);
        let data = self.commander.read_file(&pid_path).await?;
        let pid: i32 = std::str::from_utf8(&data)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| DriverError::InvalidPidFile {
                path: pid_path.display().to_string(),
                message: "contents are not a pid".to_string(),
            })?;

        trace!(ifname, pid, "moving interface to rootless namespace");
        let pid_arg = pid.to_string();
        self.commander.run("ip", &["link", "set", ifname, "netns", pid_arg.as_str()]).await?;
        Ok(())
    }
}

fn resolve_endpoint(payload: &str) -> Result<SocketAddr> {
    payload
        .to_socket_addrs()
        .map_err(|err| DriverError::InvalidOption {
            option: "dwgd.endpoint",
            value: payload.to_string(),
            message: err.to_string(),
        })?
        .next()
        .ok_or_else(|| DriverError::InvalidOption {
            option: "dwgd.endpoint",
            value: payload.to_string(),
            message: "no addresses resolved".to_string(),
        })
}

fn parse_interface_address(address: &str) -> Result<std::net::IpAddr> {
    address
        .parse::<IpNet>()
        .map(|net| net.addr())
        .map_err(|err| DriverError::InvalidOption {
            option: "interface address",
            value: address.to_string(),
            message: err.to_string(),
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::commander::FakeCommander;
    use serde_json::json;

    use dwgd_storage::IN_MEMORY;
    use dwgd_wireguard::{derive_private_key, Device, FakeWg, PublicKey};

    pub(crate) const SERVER_PUBKEY: &str = "BR1A+UneCu1FVBW/zPI/UVKA4gcNMUroj72LwFMMUUs=";

    pub(crate) fn network_fixture() -> Network {
        Network {
            id: "n1".to_string(),
            endpoint: resolve_endpoint("localhost:51820").expect("endpoint"),
            seed: b"supersecretseed".to_vec(),
            pubkey: PublicKey::from_base64(SERVER_PUBKEY).expect("pubkey"),
            route: "0.0.0.0/0".to_string(),
            ifname: "dwgd0".to_string(),
        }
    }

    pub(crate) fn client_fixture(network: Network) -> Client {
        Client {
            id: "c1".to_string(),
            ip: "10.0.0.2".parse().expect("ip"),
            ifname: "wg-c1".to_string(),
            network,
        }
    }

    async fn driver_fixture() -> (Driver<FakeCommander, FakeWg>, FakeCommander, FakeWg) {
        let commander = FakeCommander::new();
        let wg = FakeWg::new();
        let network = network_fixture();
        wg.add_device(Device {
            name: network.ifname.clone(),
            private_key: derive_private_key(b"server-device", "10.0.0.1".parse().unwrap()),
            public_key: network.pubkey,
            listen_port: network.endpoint.port(),
            fwmark: 0,
        })
        .await;

        let driver = Driver::new(IN_MEMORY, commander.clone(), wg.clone())
            .await
            .expect("driver");
        (driver, commander, wg)
    }

    fn create_network_request(ifname_mode: bool, with_endpoint: bool) -> CreateNetworkRequest {
        let network = network_fixture();
        let mut options = serde_json::Map::new();
        options.insert("dwgd.seed".into(), json!("supersecretseed"));
        options.insert("dwgd.route".into(), json!(network.route));
        if with_endpoint {
            options.insert("dwgd.endpoint".into(), json!("localhost:51820"));
        }
        if ifname_mode {
            options.insert("dwgd.ifname".into(), json!(network.ifname));
        } else {
            options.insert("dwgd.pubkey".into(), json!(SERVER_PUBKEY));
        }

        serde_json::from_value(json!({
            "NetworkID": network.id,
            "Options": { "com.docker.network.generic": options }
        }))
        .expect("request")
    }

    async fn must_create_network(driver: &Driver<FakeCommander, FakeWg>, ifname_mode: bool) -> Network {
        driver
            .create_network(&create_network_request(ifname_mode, true))
            .await
            .expect("create network");

        let mut expected = network_fixture();
        if !ifname_mode {
            expected.ifname = String::new();
        }

        let stored = driver
            .storage
            .get_network(&expected.id)
            .await
            .expect("get network")
            .expect("network present");
        assert_eq!(stored, expected);
        stored
    }

    async fn must_create_endpoint(driver: &Driver<FakeCommander, FakeWg>) -> Client {
        let network = network_fixture();
        let request = CreateEndpointRequest {
            network_id: network.id.clone(),
            endpoint_id: "c1".to_string(),
            interface: dwgd_proto::EndpointInterface {
                address: "10.0.0.2/32".to_string(),
                ..Default::default()
            },
        };
        driver.create_endpoint(&request).await.expect("create endpoint");

        let stored = driver
            .storage
            .get_client("c1")
            .await
            .expect("get client")
            .expect("client present");
        assert_eq!(stored.ifname, "wg-c1");
        assert_eq!(stored.ip, "10.0.0.2".parse::<std::net::IpAddr>().unwrap());
        stored
    }

    #[tokio::test]
    async fn capabilities_are_local() {
        let (driver, _, _) = driver_fixture().await;
        let caps = driver.get_capabilities();
        assert_eq!(caps.scope, "local");
        assert_eq!(caps.connectivity_scope, "local");
    }

    #[tokio::test]
    async fn create_network_pubkey_mode() {
        let (driver, _, _) = driver_fixture().await;
        let stored = must_create_network(&driver, false).await;
        assert_eq!(stored.ifname, "");
        assert_eq!(stored.endpoint.port(), 51820);
        assert_eq!(stored.pubkey, PublicKey::from_base64(SERVER_PUBKEY).unwrap());
    }

    #[tokio::test]
    async fn create_network_ifname_mode() {
        let (driver, _, _) = driver_fixture().await;
        let stored = must_create_network(&driver, true).await;
        assert_eq!(stored.ifname, "dwgd0");
    }

    #[tokio::test]
    async fn create_network_ifname_mode_defaults_endpoint_from_device() {
        let (driver, _, _) = driver_fixture().await;
        driver
            .create_network(&create_network_request(true, false))
            .await
            .expect("create network");

        let stored = driver
            .storage
            .get_network("n1")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(stored.ifname, "dwgd0");
        assert_eq!(stored.endpoint, resolve_endpoint("localhost:51820").unwrap());
        assert_eq!(stored.pubkey, PublicKey::from_base64(SERVER_PUBKEY).unwrap());
    }

    #[tokio::test]
    async fn create_network_requires_seed() {
        let (driver, _, _) = driver_fixture().await;
        let request = serde_json::from_value(json!({
            "NetworkID": "n1",
            "Options": { "com.docker.network.generic": {
                "dwgd.pubkey": SERVER_PUBKEY,
                "dwgd.endpoint": "localhost:51820"
            }}
        }))
        .expect("request");

        let err = driver.create_network(&request).await.unwrap_err();
        assert!(matches!(err, DriverError::MissingOption("dwgd.seed")));
    }

    #[tokio::test]
    async fn create_network_pubkey_mode_requires_endpoint() {
        let (driver, _, _) = driver_fixture().await;
        let err = driver
            .create_network(&create_network_request(false, false))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::MissingOption("dwgd.endpoint")));
    }

    #[tokio::test]
    async fn create_network_unknown_device_propagates() {
        let (driver, _, _) = driver_fixture().await;
        let request = serde_json::from_value(json!({
            "NetworkID": "n1",
            "Options": { "com.docker.network.generic": {
                "dwgd.seed": "supersecretseed",
                "dwgd.ifname": "missing0"
            }}
        }))
        .expect("request");

        let err = driver.create_network(&request).await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::WireGuard(dwgd_wireguard::WireGuardError::DeviceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_network_removes_record() {
        let (driver, _, _) = driver_fixture().await;
        let network = must_create_network(&driver, true).await;

        driver
            .delete_network(&DeleteNetworkRequest { network_id: network.id.clone() })
            .await
            .expect("delete");

        let stored = driver.storage.get_network(&network.id).await.expect("get");
        assert_eq!(stored, None);
    }

    #[tokio::test]
    async fn create_endpoint_names_interface_deterministically() {
        let (driver, _, _) = driver_fixture().await;
        must_create_network(&driver, true).await;
        must_create_endpoint(&driver).await;
    }

    #[tokio::test]
    async fn create_endpoint_requires_network() {
        let (driver, _, _) = driver_fixture().await;
        let request = CreateEndpointRequest {
            network_id: "nope".to_string(),
            endpoint_id: "c1".to_string(),
            interface: dwgd_proto::EndpointInterface {
                address: "10.0.0.2/32".to_string(),
                ..Default::default()
            },
        };

        let err = driver.create_endpoint(&request).await.unwrap_err();
        assert!(matches!(err, DriverError::NetworkNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn create_endpoint_rejects_duplicate_id() {
        let (driver, _, _) = driver_fixture().await;
        must_create_network(&driver, true).await;
        must_create_endpoint(&driver).await;

        let request = CreateEndpointRequest {
            network_id: "n1".to_string(),
            endpoint_id: "c1".to_string(),
            interface: dwgd_proto::EndpointInterface {
                address: "10.0.0.3/32".to_string(),
                ..Default::default()
            },
        };
        let err = driver.create_endpoint(&request).await.unwrap_err();
        assert!(matches!(err, DriverError::EndpointExists(id) if id == "c1"));
    }

    #[tokio::test]
    async fn delete_endpoint_removes_interface_then_record() {
        let (driver, commander, _) = driver_fixture().await;
        must_create_network(&driver, true).await;
        let client = must_create_endpoint(&driver).await;

        driver
            .delete_endpoint(&DeleteEndpointRequest {
                network_id: client.network.id.clone(),
                endpoint_id: client.id.clone(),
            })
            .await
            .expect("delete endpoint");

        assert_eq!(commander.run_history(), vec![vec![
            "ip".to_string(),
            "link".to_string(),
            "delete".to_string(),
            "wg-c1".to_string(),
        ]]);
        let stored = driver.storage.get_client(&client.id).await.expect("get");
        assert_eq!(stored, None);
    }

    #[tokio::test]
    async fn delete_endpoint_keeps_record_when_command_fails() {
        let (driver, commander, _) = driver_fixture().await;
        must_create_network(&driver, true).await;
        let client = must_create_endpoint(&driver).await;

        commander.fail_runs_matching(&["ip", "link", "delete"]);
        driver
            .delete_endpoint(&DeleteEndpointRequest {
                network_id: client.network.id.clone(),
                endpoint_id: client.id.clone(),
            })
            .await
            .unwrap_err();

        let stored = driver.storage.get_client(&client.id).await.expect("get");
        assert!(stored.is_some(), "record must survive a failed delete");
    }

    #[tokio::test]
    async fn join_outside_rootless_issues_single_command() {
        let (driver, commander, _) = driver_fixture().await;
        must_create_network(&driver, true).await;
        let client = must_create_endpoint(&driver).await;

        let response = driver
            .join(&JoinRequest {
                network_id: client.network.id.clone(),
                endpoint_id: client.id.clone(),
                sandbox_key: "/foo/bar".to_string(),
            })
            .await
            .expect("join");

        assert_eq!(commander.run_history(), vec![vec![
            "ip".to_string(),
            "link".to_string(),
            "add".to_string(),
            "name".to_string(),
            "wg-c1".to_string(),
            "type".to_string(),
            "wireguard".to_string(),
        ]]);
        assert_eq!(response.interface_name.src_name, "wg-c1");
        assert_eq!(response.interface_name.dst_prefix, "wg");
        assert!(response.disable_gateway_service);
        assert_eq!(response.static_routes, vec![StaticRoute {
            destination: "0.0.0.0/0".to_string(),
            route_type: 1,
            next_hop: String::new(),
        }]);
    }

    #[tokio::test]
    async fn join_in_rootless_sandbox_moves_interface() {
        let (driver, commander, _) = driver_fixture().await;
        must_create_network(&driver, true).await;
        let client = must_create_endpoint(&driver).await;

        commander.seed_file("/run/user/1000/docker.pid", b"1000");
        driver
            .join(&JoinRequest {
                network_id: client.network.id.clone(),
                endpoint_id: client.id.clone(),
                sandbox_key: "/run/user/1000".to_string(),
            })
            .await
            .expect("join");

        assert_eq!(commander.run_history(), vec![
            vec![
                "ip".to_string(),
                "link".to_string(),
                "add".to_string(),
                "name".to_string(),
                "wg-c1".to_string(),
                "type".to_string(),
                "wireguard".to_string(),
            ],
            vec![
                "ip".to_string(),
                "link".to_string(),
                "set".to_string(),
                "wg-c1".to_string(),
                "netns".to_string(),
                "1000".to_string(),
            ],
        ]);
    }

    #[tokio::test]
    async fn join_configures_client_then_server_device() {
        let (driver, _, wg) = driver_fixture().await;
        must_create_network(&driver, true).await;
        let client = must_create_endpoint(&driver).await;

        driver
            .join(&JoinRequest {
                network_id: client.network.id.clone(),
                endpoint_id: client.id.clone(),
                sandbox_key: "/foo/bar".to_string(),
            })
            .await
            .expect("join");

        let history = wg.configure_history().await;
        assert_eq!(history.len(), 2);

        let (client_target, client_config) = &history[0];
        assert_eq!(client_target, "wg-c1");
        let expected_key = derive_private_key(b"supersecretseed", client.ip);
        assert_eq!(client_config.private_key, Some(expected_key));
        assert_eq!(client_config.peers.len(), 1);
        assert_eq!(client_config.peers[0].public_key, client.network.pubkey);

        let (server_target, server_config) = &history[1];
        assert_eq!(server_target, "dwgd0");
        assert!(!server_config.replace_peers);
        assert_eq!(server_config.peers.len(), 1);
        assert!(!server_config.peers[0].remove);
        assert_eq!(server_config.peers[0].public_key, client.peer_update().public_key);
    }

    #[tokio::test]
    async fn join_missing_endpoint_fails() {
        let (driver, _, _) = driver_fixture().await;
        let err = driver
            .join(&JoinRequest {
                network_id: "n1".to_string(),
                endpoint_id: "ghost".to_string(),
                sandbox_key: "/foo/bar".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::EndpointNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn leave_removes_only_the_client_peer() {
        let (driver, _, wg) = driver_fixture().await;
        must_create_network(&driver, true).await;
        let client = must_create_endpoint(&driver).await;

        driver
            .join(&JoinRequest {
                network_id: client.network.id.clone(),
                endpoint_id: client.id.clone(),
                sandbox_key: "/foo/bar".to_string(),
            })
            .await
            .expect("join");
        driver
            .leave(&LeaveRequest {
                network_id: client.network.id.clone(),
                endpoint_id: client.id.clone(),
            })
            .await
            .expect("leave");

        let history = wg.configure_history().await;
        let (target, config) = history.last().expect("configure call");
        assert_eq!(target, "dwgd0");
        assert!(!config.replace_peers);
        assert_eq!(config.peers.len(), 1);
        assert!(config.peers[0].remove);

        let expected_key = derive_private_key(b"supersecretseed", client.ip).public_key();
        assert_eq!(config.peers[0].public_key, expected_key);
    }

    #[tokio::test]
    async fn leave_is_a_noop_in_pubkey_mode() {
        let (driver, _, wg) = driver_fixture().await;
        must_create_network(&driver, false).await;
        let client = must_create_endpoint(&driver).await;

        driver
            .leave(&LeaveRequest {
                network_id: client.network.id.clone(),
                endpoint_id: client.id.clone(),
            })
            .await
            .expect("leave");

        assert!(wg.configure_history().await.is_empty());
    }

    #[tokio::test]
    async fn endpoint_info_is_empty() {
        let (driver, _, _) = driver_fixture().await;
        let info = driver
            .endpoint_info(&InfoRequest {
                network_id: "n1".to_string(),
                endpoint_id: "c1".to_string(),
            })
            .await
            .expect("info");
        assert!(info.value.is_empty());
    }
}
