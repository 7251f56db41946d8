//! Watching the markdown and stylesheet files for live re-rendering.
//!
//! Uses notify for cross-platform file system events. Each watched file is
//! debounced on its own so a burst of writes from an editor reloads once.
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

#[derive(Debug)]
struct WatchedFile {
    root: PathBuf,
    path: PathBuf,
    name: Option<OsString>,
    pending_since: Option<Instant>,
}

impl WatchedFile {
    fn new(path: &Path) -> Self {
        // Event paths from the OS are absolute and canonical.
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self {
            root: watch_root_for(&path),
            name: path.file_name().map(std::ffi::OsStr::to_os_string),
            path,
            pending_since: None,
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.root
                || path == &self.path
                || self
                    .name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

/// Watches a fixed set of files and reports debounced changes per file.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    files: Vec<WatchedFile>,
    debounce: Duration,
}

impl FileWatcher {
    /// Watch every path in `paths`; indices in [`FileWatcher::take_changed`]
    /// refer to this order.
    ///
    /// # Errors
    /// Returns an error if the watcher cannot be created or a directory
    /// cannot be watched.
    pub fn new<P: AsRef<Path>>(paths: &[P], debounce: Duration) -> notify::Result<Self> {
        let files = paths
            .iter()
            .map(|path| WatchedFile::new(path.as_ref()))
            .collect::<Vec<_>>();

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        let roots = files
            .iter()
            .map(|file| file.root.clone())
            .collect::<BTreeSet<_>>();
        for root in &roots {
            watcher.watch(root, RecursiveMode::NonRecursive)?;
        }
        tracing::debug!(files = files.len(), roots = roots.len(), "watching files");

        Ok(Self {
            _watcher: watcher,
            rx,
            files,
            debounce,
        })
    }

    /// Canonical path of the file at `index`.
    pub fn target_path(&self, index: usize) -> Option<&Path> {
        self.files.get(index).map(|file| file.path.as_path())
    }

    /// Indices of the files whose debounced change is ready.
    pub fn take_changed(&mut self) -> Vec<usize> {
        let mut total_events = 0u32;
        let mut irrelevant_events = 0u32;
        let now = Instant::now();
        while let Ok(event) = self.rx.try_recv() {
            total_events += 1;
            match event {
                Ok(ev) => {
                    let mut relevant = false;
                    for file in &mut self.files {
                        if file.is_relevant(&ev) {
                            file.pending_since = Some(now);
                            relevant = true;
                        }
                    }
                    if !relevant {
                        irrelevant_events += 1;
                        crate::perf::log_event(
                            "watcher.irrelevant",
                            format!("kind={:?} paths={:?}", ev.kind, ev.paths),
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "file watcher error");
                    crate::perf::log_event("watcher.error", format!("{err}"));
                }
            }
        }

        if total_events > 0 {
            crate::perf::log_event(
                "watcher.poll",
                format!("total={total_events} irrelevant={irrelevant_events}"),
            );
        }

        let debounce = self.debounce;
        self.files
            .iter_mut()
            .enumerate()
            .filter_map(|(index, file)| {
                let since = file.pending_since?;
                (since.elapsed() >= debounce).then(|| {
                    file.pending_since = None;
                    index
                })
            })
            .collect()
    }
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
