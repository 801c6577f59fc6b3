//! File-watch capability types.
//!
//! The editor owns the actual watcher primitives; this module defines the
//! request/subscription seam the shell consumes. Events flow over a plain
//! mpsc channel, so dropping a subscription ends the host's watch task
//! through send failure rather than an explicit unregister call.

use std::path::PathBuf;

use tokio::sync::mpsc;

/// Which event kinds a subscription wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchKinds {
    pub create: bool,
    pub change: bool,
    pub delete: bool,
}

impl WatchKinds {
    /// Deletions only. Used for the document-sync channel.
    #[must_use]
    pub const fn deletions() -> Self {
        Self {
            create: false,
            change: false,
            delete: true,
        }
    }

    /// Creations and content changes, no deletions.
    #[must_use]
    pub const fn creations_and_changes() -> Self {
        Self {
            create: true,
            change: true,
            delete: false,
        }
    }

    #[must_use]
    pub const fn accepts(self, kind: FileEventKind) -> bool {
        match kind {
            FileEventKind::Created => self.create,
            FileEventKind::Changed => self.change,
            FileEventKind::Deleted => self.delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

/// A request to watch one folder for files matching a glob pattern.
#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub root: PathBuf,
    /// Glob relative to `root`, e.g. `**/*.tern`.
    pub pattern: String,
    pub kinds: WatchKinds,
}

/// A live watch subscription. Dropping it releases the host-side watcher.
pub struct WatchSubscription {
    events: mpsc::Receiver<FileEvent>,
}

impl WatchSubscription {
    #[must_use]
    pub fn new(events: mpsc::Receiver<FileEvent>) -> Self {
        Self { events }
    }

    /// A subscription that yields no events (for hosts without watchers).
    #[must_use]
    pub fn disconnected() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self { events: rx }
    }

    /// Next file event, or `None` once the watcher is gone.
    pub async fn next_event(&mut self) -> Option<FileEvent> {
        self.events.recv().await
    }
}
