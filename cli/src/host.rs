//! Terminal implementation of the [`Host`] capability trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tern_host::{
    Host, ProgressScope, TernDiagnostic, WatchRequest, WatchSubscription, progress_channel,
};
use tokio::sync::oneshot;

use crate::watch;

/// Host backed by stdout: prompts answer by policy (`--yes`), progress
/// and diagnostics print as they arrive, watches come from the polling
/// walker.
pub struct TerminalHost {
    assume_yes: bool,
    diagnostics: Mutex<HashMap<PathBuf, Vec<TernDiagnostic>>>,
}

impl TerminalHost {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            diagnostics: Mutex::new(HashMap::new()),
        }
    }

    /// Summary of everything currently published, like `E:2 W:1`.
    fn summary(&self) -> String {
        let diagnostics = self.diagnostics.lock().unwrap();
        let (mut errors, mut warnings) = (0, 0);
        for item in diagnostics.values().flatten() {
            if item.severity().is_error() {
                errors += 1;
            } else {
                warnings += 1;
            }
        }
        format!("E:{errors} W:{warnings}")
    }
}

impl Host for TerminalHost {
    fn show_info(&self, message: &str) {
        println!("{message}");
    }

    fn show_warning(&self, message: &str) {
        println!("warning: {message}");
    }

    fn show_error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    fn confirm(&self, message: &str) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        // Prompts are answered by policy, not stdin: a headless run must
        // never hang on a question nobody is there to answer.
        if self.assume_yes {
            println!("{message} [accepted: --yes]");
            let _ = tx.send(true);
        } else {
            println!("{message} [declined; pass --yes to accept]");
            let _ = tx.send(false);
        }
        rx
    }

    fn begin_install(&self, title: &str) -> ProgressScope {
        println!("{title}...");
        let (scope, mut handle) = progress_channel();
        // The printing task owns the handle; there is no cancel UI in the
        // terminal, interrupting the process cancels everything anyway.
        tokio::spawn(async move {
            while let Some(event) = handle.next_event().await {
                println!("  {event}");
            }
        });
        scope
    }

    fn watch(&self, request: WatchRequest) -> WatchSubscription {
        watch::spawn_poll_watcher(request, watch::POLL_INTERVAL)
    }

    fn publish_diagnostics(&self, path: &Path, diagnostics: &[TernDiagnostic]) {
        {
            let mut map = self.diagnostics.lock().unwrap();
            if diagnostics.is_empty() {
                if map.remove(path).is_none() {
                    return;
                }
                println!("{}: clean", path.display());
            } else {
                for item in diagnostics {
                    // LSP positions are zero-based; print one-based.
                    println!(
                        "{}:{}:{} {}: {}",
                        path.display(),
                        item.line() + 1,
                        item.col() + 1,
                        item.severity().label(),
                        item.message()
                    );
                }
                map.insert(path.to_path_buf(), diagnostics.to_vec());
            }
        }
        println!("[{}]", self.summary());
    }

    fn clear_diagnostics(&self, root: &Path) {
        let mut map = self.diagnostics.lock().unwrap();
        map.retain(|path, _| !path.starts_with(root));
    }
}
