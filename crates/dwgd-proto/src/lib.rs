//! # dwgd-proto
//!
//! Record types for the container engine's network-driver plugin protocol.
//!
//! The engine speaks JSON-over-HTTP on a unix socket: one POST per lifecycle
//! operation, PascalCase field names on the wire. These are plain data
//! carriers; all behavior lives in the daemon crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod messages;

pub use messages::{
    ActivateResponse, CapabilitiesResponse, CreateEndpointRequest, CreateEndpointResponse,
    CreateNetworkRequest, DeleteEndpointRequest, DeleteNetworkRequest, EndpointInterface,
    ErrorResponse, InfoRequest, InfoResponse, InterfaceName, JoinRequest, JoinResponse,
    LeaveRequest, StaticRoute, GENERIC_OPTIONS_KEY, LOCAL_SCOPE, NETWORK_DRIVER,
};
