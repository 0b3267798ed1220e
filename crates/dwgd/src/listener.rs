//! The plugin's unix socket and the discovery paths around it.
//!
//! The engine finds network-driver plugins by scanning
//! `/run/docker/plugins`; dwgd keeps its real socket under `/run/dwgd` and
//! plants a symlink in the scan directory. Both paths disappear again on
//! shutdown.

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::UnixListener;
use tracing::{info, trace};

use crate::commander::Commander;

/// Directory holding the real plugin socket.
pub const DWGD_RUN_DIR: &str = "/run/dwgd";

/// File name of the plugin socket.
pub const DWGD_SOCK_NAME: &str = "dwgd.sock";

/// Directory the engine scans for plugin sockets.
pub const DOCKER_PLUGIN_SOCK_DIR: &str = "/run/docker/plugins";

/// Full path of the plugin socket.
#[must_use]
pub fn socket_path() -> PathBuf {
    Path::new(DWGD_RUN_DIR).join(DWGD_SOCK_NAME)
}

/// Full path of the discovery symlink.
#[must_use]
pub fn discovery_symlink_path() -> PathBuf {
    Path::new(DOCKER_PLUGIN_SOCK_DIR).join(DWGD_SOCK_NAME)
}

/// Creates the run directory, binds the plugin socket, and plants the
/// discovery symlink at the well-known paths.
pub async fn bind<C: Commander>(commander: &C) -> io::Result<UnixListener> {
    bind_at(commander, Path::new(DWGD_RUN_DIR), Path::new(DOCKER_PLUGIN_SOCK_DIR)).await
}

/// [`bind`] against explicit directories.
pub async fn bind_at<C: Commander>(
    commander: &C,
    run_dir: &Path,
    plugin_dir: &Path,
) -> io::Result<UnixListener> {
    commander.mkdir_all(run_dir, 0o777).await?;

    let sock = run_dir.join(DWGD_SOCK_NAME);
    // A stale socket from an unclean shutdown would make the bind fail.
    let _ = commander.remove(&sock).await;
    let listener = UnixListener::bind(&sock)?;
    commander.chmod(&sock, 0o777).await?;

    commander.mkdir_all(plugin_dir, 0o755).await?;
    let link = plugin_dir.join(DWGD_SOCK_NAME);
    let _ = commander.remove(&link).await;
    commander.symlink(&sock, &link).await?;

    info!(socket = %sock.display(), symlink = %link.display(), "plugin socket bound");
    Ok(listener)
}

/// Removes the discovery symlink and the plugin socket.
///
/// Failures are logged and skipped so one missing path never blocks the
/// rest of the teardown.
pub async fn cleanup<C: Commander>(commander: &C) {
    cleanup_at(commander, Path::new(DWGD_RUN_DIR), Path::new(DOCKER_PLUGIN_SOCK_DIR)).await;
}

/// [`cleanup`] against explicit directories.
pub async fn cleanup_at<C: Commander>(commander: &C, run_dir: &Path, plugin_dir: &Path) {
    for path in [plugin_dir.join(DWGD_SOCK_NAME), run_dir.join(DWGD_SOCK_NAME)] {
        if let Err(err) = commander.remove(&path).await {
            trace!(path = %path.display(), error = %err, "couldn't remove plugin path");
        }
    }
}
