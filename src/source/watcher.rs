//! Route file watcher for hot reload.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use uuid::Uuid;

use crate::events::{ChangeBatch, KeyPattern};
use crate::reload::ChangeConsumer;
use crate::source::diff::diff;
use crate::source::file::{RouteFile, SourceError};

/// Turns edits of a TOML route file into change batches.
///
/// The last successfully submitted property map is kept; every sync diffs
/// the file against it, so the first sync submits every key as added.
pub struct FileSource {
    path: PathBuf,
    keys: KeyPattern,
    consumer: Arc<dyn ChangeConsumer>,
    last: Mutex<BTreeMap<String, String>>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, keys: KeyPattern, consumer: Arc<dyn ChangeConsumer>) -> Self {
        Self {
            path: path.into(),
            keys,
            consumer,
            last: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file and submit whatever changed since the last sync.
    ///
    /// Returns the submitted batch id, or `None` when the file is unchanged.
    /// On error the previous content stays the baseline.
    pub fn sync(&self) -> Result<Option<Uuid>, SourceError> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        let file = RouteFile::load(&self.path)?;
        let props = file.to_properties(&self.keys);
        let events = diff(&last, &props);
        if events.is_empty() {
            tracing::debug!(path = ?self.path, "Route file unchanged");
            return Ok(None);
        }

        let batch = ChangeBatch::new(events);
        let id = batch.id();
        tracing::info!(
            path = ?self.path,
            batch_id = %id,
            events = batch.len(),
            routes = file.routes.len(),
            "Submitting route file changes"
        );
        self.consumer.submit(batch)?;
        *last = props;
        Ok(Some(id))
    }

    /// Watch the file's directory and sync on every change to the file.
    ///
    /// The directory is watched rather than the file so editors that replace
    /// the file by rename keep being observed. Drop the returned watcher to stop.
    pub fn watch(self: Arc<Self>, poll_interval: Duration) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let source = self.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !ours || !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    tracing::info!(path = ?source.path, "Route file change detected");
                    if let Err(e) = source.sync() {
                        tracing::error!(
                            path = ?source.path,
                            error = %e,
                            "Failed to sync route file, keeping previous content"
                        );
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(poll_interval),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Route file watcher started");
        Ok(watcher)
    }
}
