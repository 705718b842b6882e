//! File watcher that reloads policy on change, with debouncing

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;

use super::{PolicyReloader, ReloadError};

/// Quiet period after the last file event before reloading
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Symlink kubelet swaps when it updates a mounted ConfigMap
///
/// The mounted key is a link through `..data`, so an update never produces an
/// event naming the policy file itself.
const CONFIG_MAP_DATA_LINK: &str = "..data";

/// Watches a policy file and triggers a reload after edits settle
///
/// The parent directory is watched rather than the file itself so that
/// editors replacing the file by rename are seen. Swaps of a ConfigMap
/// volume's `..data` link count as changes too; the reload compares the new
/// contents, so a swap that leaves the policy alone publishes nothing.
/// Dropping the watcher stops the reload task.
pub struct PolicyFileWatcher {
    path: PathBuf,
    _watcher: notify::RecommendedWatcher,
}

impl PolicyFileWatcher {
    /// Start watching `path`, reloading through `reloader`
    ///
    /// # Arguments
    /// * `reloader` - Reloader for the policy source backed by `path`
    /// * `path` - Policy file to watch
    /// * `debounce_ms` - Milliseconds of quiet before reloading
    pub fn spawn(
        reloader: Arc<PolicyReloader>,
        path: &Path,
        debounce_ms: u64,
    ) -> Result<Self, ReloadError> {
        let file_name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>(100);

        let mut watcher = recommended_watcher(move |event: notify::Result<notify::Event>| {
            let relevant = match &event {
                Ok(event) => event
                    .paths
                    .iter()
                    .filter_map(|p| p.file_name())
                    .any(|name| name == file_name.as_os_str() || name == CONFIG_MAP_DATA_LINK),
                Err(_) => true,
            };
            if relevant {
                // Runs on the notify thread, outside the runtime
                let _ = tx.blocking_send(event);
            }
        })?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching policy file: {:?}", path);

        tokio::spawn(Self::debounce_loop(rx, reloader, debounce_ms));

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for an event, then for a quiet period, then reload
    async fn debounce_loop(
        mut rx: mpsc::Receiver<notify::Result<notify::Event>>,
        reloader: Arc<PolicyReloader>,
        debounce_ms: u64,
    ) {
        let debounce_duration = Duration::from_millis(debounce_ms);

        loop {
            match rx.recv().await {
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Policy file watch error: {}", e);
                    continue;
                }
                // Watcher dropped
                None => break,
            }

            tracing::debug!("Policy file change detected, starting debounce");

            loop {
                match tokio::time::timeout(debounce_duration, rx.recv()).await {
                    Ok(Some(_)) => {
                        tracing::debug!("More events during debounce, resetting timer");
                    }
                    Ok(None) => return,
                    Err(_) => break,
                }
            }

            tracing::info!("Policy file changed, reloading");
            // Failures are logged and recorded by reload()
            let _ = reloader.reload().await;
        }
    }
}
