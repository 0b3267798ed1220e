//! WireGuard key handling and kernel control plane for dwgd.
//!
//! Two concerns live here:
//!
//! - [`keys`] — Curve25519 key types and the deterministic derivation of a
//!   client private key from a network seed and an IP address.
//! - [`control`] — the [`WgControl`] capability set (`device` +
//!   `configure_device`) with a kernel-backed implementation and an
//!   in-memory fake for tests.

pub mod control;
pub mod error;
pub mod keys;
pub mod linux;

pub use control::{Device, DeviceConfig, FakeWg, PeerUpdate, WgControl};
pub use error::WireGuardError;
pub use keys::{derive_private_key, PrivateKey, PublicKey, KEY_SIZE};
pub use linux::KernelWg;
