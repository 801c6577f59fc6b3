//! Install progress events and the cancellable progress scope.

use std::fmt;

use tokio::sync::{mpsc, watch};

/// A classified line of install-tool output.
///
/// Raw `cargo install` output is noisy; only lines the classifier
/// recognizes become events, the rest are dropped and never surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallProgress {
    /// The package index is being refreshed.
    IndexUpdate,
    /// The crate source is being fetched.
    Fetch,
    /// One compilation unit, carrying the crate name.
    CompileUnit(String),
    /// Free-form message reported by the provisioner itself.
    Generic(String),
}

impl fmt::Display for InstallProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexUpdate => f.write_str("updating crates.io index"),
            Self::Fetch => f.write_str("fetching crate"),
            Self::CompileUnit(name) => write!(f, "compiling {name}"),
            Self::Generic(message) => f.write_str(message),
        }
    }
}

/// The provisioner's end of a user-visible progress surface.
///
/// Obtained from [`Host::begin_install`](crate::Host::begin_install). The
/// install loop reports classified events through it and selects on
/// [`cancelled`](Self::cancelled) to honor user cancellation.
pub struct ProgressScope {
    events: mpsc::UnboundedSender<InstallProgress>,
    cancel: watch::Receiver<bool>,
}

impl ProgressScope {
    /// Report a progress event. Reports after the consumer is gone are
    /// dropped silently.
    pub fn report(&self, event: InstallProgress) {
        let _ = self.events.send(event);
    }

    /// A future that resolves when the user cancels the scope.
    ///
    /// The future is detached from `self` so callers can `select!` on it
    /// while still reporting through the scope. It pends forever if the
    /// controlling [`ProgressHandle`] was dropped without cancelling, so
    /// select arms using it never fire spuriously.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut cancel = self.cancel.clone();
        async move {
            loop {
                if *cancel.borrow() {
                    return;
                }
                if cancel.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

/// The host's end of a progress surface: receives events, can cancel.
pub struct ProgressHandle {
    events: mpsc::UnboundedReceiver<InstallProgress>,
    cancel: watch::Sender<bool>,
}

impl ProgressHandle {
    /// Signal cooperative cancellation to the running install.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Next progress event, or `None` once the install side is done.
    pub async fn next_event(&mut self) -> Option<InstallProgress> {
        self.events.recv().await
    }
}

/// Create a connected scope/handle pair.
#[must_use]
pub fn progress_channel() -> (ProgressScope, ProgressHandle) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    (
        ProgressScope {
            events: event_tx,
            cancel: cancel_rx,
        },
        ProgressHandle {
            events: event_rx,
            cancel: cancel_tx,
        },
    )
}
