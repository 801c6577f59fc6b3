//! The editor capability seam.

use std::path::Path;

use tokio::sync::oneshot;

use crate::diag::TernDiagnostic;
use crate::progress::ProgressScope;
use crate::watch::{WatchRequest, WatchSubscription};

/// Surfaces the shell needs from the embedding editor.
///
/// Implementations must return quickly: prompts hand back a receiver that
/// resolves later, everything else is fire-and-forget. A dropped prompt
/// sender counts as decline.
pub trait Host: Send + Sync {
    fn show_info(&self, message: &str);
    fn show_warning(&self, message: &str);
    fn show_error(&self, message: &str);

    /// Modal yes/no prompt.
    fn confirm(&self, message: &str) -> oneshot::Receiver<bool>;

    /// Open a cancellable, user-visible progress scope for an install.
    fn begin_install(&self, title: &str) -> ProgressScope;

    /// Subscribe to file events. Hosts without watcher support return
    /// [`WatchSubscription::disconnected`].
    fn watch(&self, request: WatchRequest) -> WatchSubscription;

    /// Publish diagnostics for one file, replacing whatever was shown.
    fn publish_diagnostics(&self, path: &Path, diagnostics: &[TernDiagnostic]);

    /// Drop every diagnostic previously published for files under `root`.
    fn clear_diagnostics(&self, root: &Path);
}

/// Await a [`Host::confirm`] prompt, treating a closed channel as decline.
pub async fn confirmed(host: &dyn Host, message: &str) -> bool {
    host.confirm(message).await.unwrap_or(false)
}
