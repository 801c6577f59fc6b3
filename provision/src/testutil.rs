//! Scripted host double shared by the unit tests in this crate.

use std::sync::Mutex;

use tern_host::{
    Host, ProgressHandle, ProgressScope, TernDiagnostic, WatchRequest, WatchSubscription,
    progress_channel,
};
use tokio::sync::oneshot;

/// A [`Host`] that answers every prompt by policy and records everything.
pub(crate) struct ScriptedHost {
    accept_prompts: bool,
    cancel_installs: bool,
    pub prompts: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    progress: Mutex<Option<ProgressHandle>>,
}

impl ScriptedHost {
    fn new(accept_prompts: bool, cancel_installs: bool) -> Self {
        Self {
            accept_prompts,
            cancel_installs,
            prompts: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            infos: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            progress: Mutex::new(None),
        }
    }

    pub fn accepting() -> Self {
        Self::new(true, false)
    }

    pub fn declining() -> Self {
        Self::new(false, false)
    }

    /// Accepts prompts but cancels every install scope immediately.
    pub fn cancelling_installs() -> Self {
        Self::new(true, true)
    }

    /// The handle for the most recent install scope.
    pub fn take_progress(&self) -> ProgressHandle {
        self.progress
            .lock()
            .unwrap()
            .take()
            .expect("an install scope was opened")
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl Host for ScriptedHost {
    fn show_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn show_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn confirm(&self, message: &str) -> oneshot::Receiver<bool> {
        self.prompts.lock().unwrap().push(message.to_string());
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(self.accept_prompts);
        rx
    }

    fn begin_install(&self, _title: &str) -> ProgressScope {
        let (scope, handle) = progress_channel();
        if self.cancel_installs {
            handle.cancel();
        }
        *self.progress.lock().unwrap() = Some(handle);
        scope
    }

    fn watch(&self, _request: WatchRequest) -> WatchSubscription {
        WatchSubscription::disconnected()
    }

    fn publish_diagnostics(&self, _path: &std::path::Path, _diagnostics: &[TernDiagnostic]) {}

    fn clear_diagnostics(&self, _root: &std::path::Path) {}
}
