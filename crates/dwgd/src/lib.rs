//! dwgd - Docker WireGuard driver.
//!
//! A local network-driver plugin that attaches containers to WireGuard-backed
//! overlay networks. The engine discovers the plugin over a unix socket and
//! drives it through the network-driver RPC; for every endpoint the driver
//! derives a WireGuard key pair from the network seed and the endpoint IP,
//! materializes an interface in the host namespace, programs it, and hands it
//! over. A background symlinker keeps the plugin discoverable inside rootless
//! engines' user namespaces.

pub mod commander;
pub mod config;
pub mod daemon;
pub mod driver;
pub mod error;
pub mod listener;
pub mod rootless;
pub mod server;

pub use commander::{Commander, ExecCommander};
pub use config::Config;
pub use daemon::Dwgd;
pub use driver::Driver;
pub use error::DriverError;
pub use rootless::RootlessSymlinker;
