//! Polling file watcher behind the [`WatchSubscription`] seam.
//!
//! A terminal has no editor watcher to lean on, so this walks the folder
//! on an interval and diffs modification times. The walk respects
//! gitignore rules and is restricted to the requested glob, which keeps
//! each pass cheap even in large workspaces.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, SystemTime};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use tern_host::{FileEvent, FileEventKind, WatchRequest, WatchSubscription};
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn a polling watcher for `request`. The poll loop stops on its own
/// once the returned subscription is dropped.
pub(crate) fn spawn_poll_watcher(request: WatchRequest, interval: Duration) -> WatchSubscription {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(poll_loop(request, interval, tx));
    WatchSubscription::new(rx)
}

async fn poll_loop(request: WatchRequest, interval: Duration, tx: mpsc::Sender<FileEvent>) {
    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Files present at startup are the baseline, not create events; the
    // consumer does its own initial scan.
    let mut seen = match snapshot_task(&request).await {
        Some(seen) => seen,
        None => return,
    };

    loop {
        ticks.tick().await;

        let Some(current) = snapshot_task(&request).await else {
            return;
        };

        for (path, mtime) in &current {
            let kind = match seen.get(path) {
                None => FileEventKind::Created,
                Some(old) if old != mtime => FileEventKind::Changed,
                Some(_) => continue,
            };
            if request.kinds.accepts(kind)
                && tx
                    .send(FileEvent {
                        path: path.clone(),
                        kind,
                    })
                    .await
                    .is_err()
            {
                return;
            }
        }

        for path in seen.keys() {
            if !current.contains_key(path)
                && request.kinds.accepts(FileEventKind::Deleted)
                && tx
                    .send(FileEvent {
                        path: path.clone(),
                        kind: FileEventKind::Deleted,
                    })
                    .await
                    .is_err()
            {
                return;
            }
        }

        seen = current;
    }
}

async fn snapshot_task(request: &WatchRequest) -> Option<HashMap<std::path::PathBuf, SystemTime>> {
    let root = request.root.clone();
    let pattern = request.pattern.clone();
    tokio::task::spawn_blocking(move || snapshot(&root, &pattern))
        .await
        .ok()
}

fn snapshot(root: &Path, pattern: &str) -> HashMap<std::path::PathBuf, SystemTime> {
    let mut out = HashMap::new();

    let mut builder = OverrideBuilder::new(root);
    if builder.add(pattern).is_err() {
        tracing::warn!(%pattern, "invalid watch pattern");
        return out;
    }
    let Ok(overrides) = builder.build() else {
        return out;
    };

    let walker = WalkBuilder::new(root).overrides(overrides).build();
    for entry in walker.flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Ok(metadata) = entry.metadata()
            && let Ok(mtime) = metadata.modified()
        {
            out.insert(entry.into_path(), mtime);
        }
    }
    out
}
