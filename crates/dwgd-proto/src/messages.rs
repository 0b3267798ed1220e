//! Plugin protocol message definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope key under which the engine nests driver-specific options.
pub const GENERIC_OPTIONS_KEY: &str = "com.docker.network.generic";

/// Scope value declaring a host-local driver.
pub const LOCAL_SCOPE: &str = "local";

/// Plugin kind implemented by dwgd.
pub const NETWORK_DRIVER: &str = "NetworkDriver";

/// Response to `/Plugin.Activate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivateResponse {
    /// Plugin kinds this daemon implements.
    #[serde(rename = "Implements")]
    pub implements: Vec<String>,
}

impl Default for ActivateResponse {
    fn default() -> Self {
        Self {
            implements: vec![NETWORK_DRIVER.to_string()],
        }
    }
}

/// Response to `/NetworkDriver.GetCapabilities`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilitiesResponse {
    /// Network scope, `local` for this driver.
    #[serde(rename = "Scope")]
    pub scope: String,
    /// Connectivity scope, `local` for this driver.
    #[serde(rename = "ConnectivityScope")]
    pub connectivity_scope: String,
}

impl Default for CapabilitiesResponse {
    fn default() -> Self {
        Self {
            scope: LOCAL_SCOPE.to_string(),
            connectivity_scope: LOCAL_SCOPE.to_string(),
        }
    }
}

/// Request for `/NetworkDriver.CreateNetwork`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateNetworkRequest {
    /// Engine-assigned network ID.
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    /// Option envelope; driver options nest under [`GENERIC_OPTIONS_KEY`].
    #[serde(rename = "Options", default)]
    pub options: HashMap<String, Value>,
}

impl CreateNetworkRequest {
    /// Returns a driver option (`dwgd.*`) from the generic envelope, if
    /// present and a string.
    #[must_use]
    pub fn driver_option(&self, key: &str) -> Option<&str> {
        self.options
            .get(GENERIC_OPTIONS_KEY)?
            .as_object()?
            .get(key)?
            .as_str()
    }
}

/// Request for `/NetworkDriver.DeleteNetwork`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNetworkRequest {
    /// Engine-assigned network ID.
    #[serde(rename = "NetworkID")]
    pub network_id: String,
}

/// Interface record inside endpoint requests and responses.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EndpointInterface {
    /// IPv4 address in CIDR form.
    #[serde(rename = "Address", default)]
    pub address: String,
    /// IPv6 address in CIDR form.
    #[serde(rename = "AddressIPv6", default)]
    pub address_ipv6: String,
    /// MAC address.
    #[serde(rename = "MacAddress", default)]
    pub mac_address: String,
}

/// Request for `/NetworkDriver.CreateEndpoint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEndpointRequest {
    /// Engine-assigned network ID.
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    /// Engine-assigned endpoint ID.
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
    /// Pre-assigned addressing for the endpoint.
    #[serde(rename = "Interface", default)]
    pub interface: EndpointInterface,
}

/// Response for `/NetworkDriver.CreateEndpoint`.
///
/// The interface stays empty: addressing came from the engine and the driver
/// adds nothing to it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateEndpointResponse {
    /// Interface fields populated by the driver, if any.
    #[serde(rename = "Interface", skip_serializing_if = "Option::is_none")]
    pub interface: Option<EndpointInterface>,
}

/// Request for `/NetworkDriver.DeleteEndpoint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEndpointRequest {
    /// Engine-assigned network ID.
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    /// Engine-assigned endpoint ID.
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
}

/// Request for `/NetworkDriver.EndpointOperInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoRequest {
    /// Engine-assigned network ID.
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    /// Engine-assigned endpoint ID.
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
}

/// Response for `/NetworkDriver.EndpointOperInfo`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InfoResponse {
    /// Operational data, empty for this driver.
    #[serde(rename = "Value")]
    pub value: HashMap<String, String>,
}

/// Request for `/NetworkDriver.Join`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Engine-assigned network ID.
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    /// Engine-assigned endpoint ID.
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
    /// Path identifying the sandbox's network namespace.
    #[serde(rename = "SandboxKey", default)]
    pub sandbox_key: String,
}

/// Interface naming inside a [`JoinResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct InterfaceName {
    /// Host-side name of the interface handed to the sandbox.
    #[serde(rename = "SrcName")]
    pub src_name: String,
    /// Prefix the engine renames the interface to inside the sandbox.
    #[serde(rename = "DstPrefix")]
    pub dst_prefix: String,
}

/// A static route handed to the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticRoute {
    /// Destination CIDR.
    #[serde(rename = "Destination")]
    pub destination: String,
    /// Route type; 1 means connected (no next hop).
    #[serde(rename = "RouteType")]
    pub route_type: i32,
    /// Next-hop address, empty for connected routes.
    #[serde(rename = "NextHop", default)]
    pub next_hop: String,
}

/// Response for `/NetworkDriver.Join`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JoinResponse {
    /// The interface to move into the sandbox.
    #[serde(rename = "InterfaceName")]
    pub interface_name: InterfaceName,
    /// IPv4 gateway, empty when the overlay provides no gateway.
    #[serde(rename = "Gateway", default)]
    pub gateway: String,
    /// IPv6 gateway.
    #[serde(rename = "GatewayIPv6", default)]
    pub gateway_ipv6: String,
    /// Static routes for the sandbox.
    #[serde(rename = "StaticRoutes", default)]
    pub static_routes: Vec<StaticRoute>,
    /// Disable the engine's own gateway service for this sandbox.
    #[serde(rename = "DisableGatewayService", default)]
    pub disable_gateway_service: bool,
}

/// Request for `/NetworkDriver.Leave`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    /// Engine-assigned network ID.
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    /// Engine-assigned endpoint ID.
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
}

/// Error envelope returned for any failed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    #[serde(rename = "Err")]
    pub err: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_network_request_reads_nested_driver_options() {
        let raw = json!({
            "NetworkID": "n1",
            "Options": {
                "com.docker.network.generic": {
                    "dwgd.seed": "supersecretseed",
                    "dwgd.endpoint": "localhost:51820"
                }
            }
        });

        let request: CreateNetworkRequest = serde_json::from_value(raw).expect("decode");
        assert_eq!(request.network_id, "n1");
        assert_eq!(request.driver_option("dwgd.seed"), Some("supersecretseed"));
        assert_eq!(request.driver_option("dwgd.ifname"), None);
    }

    #[test]
    fn capabilities_serialize_with_wire_names() {
        let encoded = serde_json::to_value(CapabilitiesResponse::default()).expect("encode");
        assert_eq!(
            encoded,
            json!({"Scope": "local", "ConnectivityScope": "local"})
        );
    }

    #[test]
    fn join_response_uses_pascal_case_wire_names() {
        let response = JoinResponse {
            interface_name: InterfaceName {
                src_name: "wg-c1".to_string(),
                dst_prefix: "wg".to_string(),
            },
            static_routes: vec![StaticRoute {
                destination: "0.0.0.0/0".to_string(),
                route_type: 1,
                next_hop: String::new(),
            }],
            disable_gateway_service: true,
            ..JoinResponse::default()
        };

        let encoded = serde_json::to_value(&response).expect("encode");
        assert_eq!(encoded["InterfaceName"]["SrcName"], "wg-c1");
        assert_eq!(encoded["InterfaceName"]["DstPrefix"], "wg");
        assert_eq!(encoded["StaticRoutes"][0]["RouteType"], 1);
        assert_eq!(encoded["DisableGatewayService"], true);
    }

    #[test]
    fn activate_response_lists_network_driver() {
        let encoded = serde_json::to_value(ActivateResponse::default()).expect("encode");
        assert_eq!(encoded, json!({"Implements": ["NetworkDriver"]}));
    }
}
