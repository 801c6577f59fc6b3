//! Recording [`Host`] double for fleet tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tern_host::{
    Host, ProgressHandle, ProgressScope, TernDiagnostic, WatchRequest, WatchSubscription,
    progress_channel,
};
use tokio::sync::oneshot;

pub(crate) struct RecordingHost {
    accept_prompts: bool,
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub published: Mutex<Vec<(PathBuf, Vec<TernDiagnostic>)>>,
    pub cleared: Mutex<Vec<PathBuf>>,
    progress: Mutex<Vec<ProgressHandle>>,
}

impl RecordingHost {
    pub fn accepting() -> Self {
        Self::new(true)
    }

    pub fn declining() -> Self {
        Self::new(false)
    }

    fn new(accept_prompts: bool) -> Self {
        Self {
            accept_prompts,
            infos: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
            progress: Mutex::new(Vec::new()),
        }
    }
}

impl Host for RecordingHost {
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
        self.progress.lock().unwrap().push(handle);
        scope
    }

    fn watch(&self, _request: WatchRequest) -> WatchSubscription {
        WatchSubscription::disconnected()
    }

    fn publish_diagnostics(&self, path: &Path, diagnostics: &[TernDiagnostic]) {
        self.published
            .lock()
            .unwrap()
            .push((path.to_path_buf(), diagnostics.to_vec()));
    }

    fn clear_diagnostics(&self, root: &Path) {
        self.cleared.lock().unwrap().push(root.to_path_buf());
    }
}
