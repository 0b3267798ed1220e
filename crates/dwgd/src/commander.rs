//! Thin indirection over filesystem operations and process spawning.
//!
//! Everything the driver does to the outside world that is not SQL or
//! netlink goes through [`Commander`], so the rest of the system can be
//! unit-tested without touching the real OS. Production wiring uses
//! [`ExecCommander`]; tests substitute [`FakeCommander`].

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Capability set over the OS: a handful of filesystem operations plus
/// process spawning.
#[async_trait]
pub trait Commander: Send + Sync {
    /// Changes the mode of `path`.
    async fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Creates `path` and any missing parents with the given mode.
    async fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Reads the entire contents of a file.
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Lists the entries of a directory as full paths.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Removes a file or symlink.
    async fn remove(&self, path: &Path) -> io::Result<()>;

    /// Creates a symlink at `link` pointing to `target`.
    async fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Resolves a program name against `$PATH`.
    async fn lookup_path(&self, program: &str) -> io::Result<PathBuf>;

    /// Runs a program to completion, failing on a non-zero exit.
    async fn run(&self, program: &str, args: &[&str]) -> io::Result<()>;
}

/// [`Commander`] backed by the real OS.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecCommander;

impl ExecCommander {
    /// Creates a new OS-backed commander.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Commander for ExecCommander {
    async fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        builder.mode(mode);
        builder.create(path).await
    }

    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        Ok(paths)
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        tokio::fs::symlink(target, link).await
    }

    async fn lookup_path(&self, program: &str) -> io::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path_var = std::env::var_os("PATH").unwrap_or_default();
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(program);
            if let Ok(metadata) = std::fs::metadata(&candidate) {
                if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
                    return Ok(candidate);
                }
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{program} not found in PATH"),
        ))
    }

    async fn run(&self, program: &str, args: &[&str]) -> io::Result<()> {
        let output = tokio::process::Command::new(program).args(args).output().await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(io::Error::other(format!(
                "{program} {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
pub(crate) use fake::FakeCommander;
