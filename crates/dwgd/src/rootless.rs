//! Plugin discovery inside rootless engines' user namespaces.
//!
//! A rootless engine looks for plugin sockets inside its own mount
//! namespace, where `/run/docker/plugins` is private to the user. The
//! symlinker watches `/run/user/` for per-user runtime directories, and for
//! every `docker.pid` found inside one it enters that namespace with
//! `nsenter` and plants a symlink to the host-side socket. Links are removed
//! again on shutdown.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use notify::event::{AccessKind, AccessMode, CreateKind, EventKind};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::commander::Commander;
use crate::listener;

/// Root under which per-user runtime directories live.
pub const XDG_RUNTIME_ROOT: &str = "/run/user/";

/// File inside a runtime dir holding the rootless engine's pid.
pub const DOCKER_PID_FILE_NAME: &str = "docker.pid";

/// Deadline on each event read, bounding how long Stop can take.
const READ_DEADLINE: Duration = Duration::from_millis(200);

/// Attempts per symlink before giving up on a namespace.
const SYMLINK_RETRIES: u32 = 5;

fn runtime_dir_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^/run/user/\d+").expect("valid regex"))
}

/// Returns the `/run/user/<uid>` prefix of `path` when it has one.
pub(crate) fn rootless_runtime_dir(path: &str) -> Option<&str> {
    runtime_dir_regex().find(path).map(|found| found.as_str())
}

fn is_runtime_dir(path: &Path) -> bool {
    path.to_str()
        .and_then(rootless_runtime_dir)
        .is_some_and(|prefix| prefix.len() == path.as_os_str().len())
}

fn is_under_runtime_dir(path: &Path) -> bool {
    path.to_str().and_then(rootless_runtime_dir).is_some()
}

/// Background watcher maintaining plugin-socket symlinks inside rootless
/// namespaces as they appear and disappear.
pub struct RootlessSymlinker<C> {
    commander: C,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl<C: Commander + Clone + 'static> RootlessSymlinker<C> {
    /// Creates a symlinker, verifying `nsenter` is available.
    ///
    /// # Errors
    ///
    /// Returns an error when `nsenter` cannot be found; without it no
    /// namespace can be entered and rootless support is dead weight.
    pub async fn new(commander: C) -> io::Result<Self> {
        match commander.lookup_path("nsenter").await {
            Ok(path) => trace!(path = %path.display(), "using 'nsenter' utility"),
            Err(err) => {
                trace!(error = %err, "couldn't find 'nsenter' utility");
                return Err(err);
            }
        }

        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            commander,
            stop_tx,
            handle: None,
        })
    }

    /// Starts watching `/run/user/` on a background task.
    ///
    /// # Errors
    ///
    /// Returns an error when the inotify watch cannot be established.
    pub fn start(&mut self) -> notify::Result<()> {
        let (events_tx, events_rx) = mpsc::channel(64);
        let mut watcher = notify::recommended_watcher(move |result| {
            let _ = events_tx.blocking_send(result);
        })?;
        watcher.watch(Path::new(XDG_RUNTIME_ROOT), RecursiveMode::NonRecursive)?;

        let commander = self.commander.clone();
        let stop_rx = self.stop_tx.subscribe();
        self.handle = Some(tokio::spawn(run(watcher, events_rx, stop_rx, commander)));
        Ok(())
    }

    /// Signals the watch loop and waits for it to tear down its symlinks.
    ///
    /// The loop observes the signal within one read deadline.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn run<C: Commander>(
    mut watcher: RecommendedWatcher,
    mut events: mpsc::Receiver<notify::Result<Event>>,
    stop: watch::Receiver<bool>,
    commander: C,
) {
    let mut links: HashMap<i32, PathBuf> = HashMap::new();

    scan_existing(&mut watcher, &commander, &mut links).await;

    trace!("starting to listen for events");
    loop {
        if *stop.borrow() {
            break;
        }
        match tokio::time::timeout(READ_DEADLINE, events.recv()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                trace!(error = %err, "error during inotify read");
            }
            Ok(Some(Ok(event))) => {
                handle_event(&mut watcher, &commander, &mut links, &event).await;
            }
        }
    }

    remove_symlinks(&commander, &links).await;
}

/// Handles runtime dirs that existed before the watch was set up, as if
/// their create and close-write events had just fired.
async fn scan_existing<C: Commander>(
    watcher: &mut RecommendedWatcher,
    commander: &C,
    links: &mut HashMap<i32, PathBuf>,
) {
    let entries = match commander.read_dir(Path::new(XDG_RUNTIME_ROOT)).await {
        Ok(entries) => entries,
        Err(err) => {
            trace!(error = %err, "couldn't scan runtime root");
            return;
        }
    };

    for entry in entries {
        if !is_runtime_dir(&entry) {
            continue;
        }
        watch_runtime_dir(watcher, &entry);

        let sub_entries = match commander.read_dir(&entry).await {
            Ok(sub_entries) => sub_entries,
            Err(err) => {
                trace!(path = %entry.display(), error = %err, "couldn't scan runtime dir");
                continue;
            }
        };
        for sub_entry in sub_entries {
            if sub_entry.file_name().is_some_and(|name| name == DOCKER_PID_FILE_NAME) {
                link_with_retries(commander, &sub_entry, links).await;
            }
        }
    }
}

async fn handle_event<C: Commander>(
    watcher: &mut RecommendedWatcher,
    commander: &C,
    links: &mut HashMap<i32, PathBuf>,
    event: &Event,
) {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => {
            for path in &event.paths {
                if is_runtime_dir(path) {
                    watch_runtime_dir(watcher, path);
                }
            }
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            for path in &event.paths {
                if is_under_runtime_dir(path) {
                    trace!(path = %path.display(), "creating symlink");
                    link_with_retries(commander, path, links).await;
                }
            }
        }
        _ => {}
    }
}

fn watch_runtime_dir(watcher: &mut RecommendedWatcher, path: &Path) {
    if let Err(err) = watcher.watch(path, RecursiveMode::NonRecursive) {
        trace!(path = %path.display(), error = %err, "couldn't watch runtime dir");
    }
}

/// Generates the socket symlink for one `docker.pid`, backing off
/// exponentially between attempts and giving up after the last one.
async fn link_with_retries<C: Commander>(
    commander: &C,
    pid_file: &Path,
    links: &mut HashMap<i32, PathBuf>,
) {
    for attempt in 0..SYMLINK_RETRIES {
        match generate_sock_symlink(commander, pid_file).await {
            Ok((pid, link)) => {
                links.insert(pid, link);
                return;
            }
            Err(err) => {
                trace!(error = %err, "error during creation of socket symlink");
                let wait = Duration::from_secs(1 << attempt);
                trace!(
                    attempt = attempt + 1,
                    retries = SYMLINK_RETRIES,
                    wait_secs = wait.as_secs(),
                    "backing off"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Enters the namespace named by a pid file and plants the discovery
/// symlink there. Returns the pid and the link path for later cleanup.
async fn generate_sock_symlink<C: Commander>(
    commander: &C,
    pid_file: &Path,
) -> io::Result<(i32, PathBuf)> {
    let data = commander.read_file(pid_file).await?;
    let pid: i32 = std::str::from_utf8(&data)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} contents are not a pid", pid_file.display()),
            )
        })?;

    let sock = listener::socket_path();
    let link = listener::discovery_symlink_path();
    let pid_arg = pid.to_string();
    commander
        .run(
            "nsenter",
            &[
                "-U",
                "-n",
                "-m",
                "-t",
                pid_arg.as_str(),
                "ln",
                "-s",
                "-f",
                sock.to_str().unwrap_or_default(),
                link.to_str().unwrap_or_default(),
            ],
        )
        .await?;

    trace!(pid, "created symlink for rootless namespace");
    Ok((pid, link))
}

/// Removes every remembered symlink from inside its namespace. Failures
/// are logged and skipped; one broken namespace must not block the rest.
async fn remove_symlinks<C: Commander>(commander: &C, links: &HashMap<i32, PathBuf>) {
    for (pid, link) in links {
        let pid_arg = pid.to_string();
        let result = commander
            .run(
                "nsenter",
                &[
                    "-U",
                    "-n",
                    "-m",
                    "-t",
                    pid_arg.as_str(),
                    "rm",
                    "-f",
                    link.to_str().unwrap_or_default(),
                ],
            )
            .await;
        if let Err(err) = result {
            trace!(pid, error = %err, "couldn't remove symlink on rootless namespace");
        }
    }
}
