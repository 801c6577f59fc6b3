//! Per-file diagnostics aggregated across all workspace clients.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tern_host::TernDiagnostic;

pub(crate) struct DiagnosticsStore {
    data: HashMap<PathBuf, Vec<TernDiagnostic>>,
}

impl DiagnosticsStore {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Replace the diagnostics for one file. An empty set removes the file,
    /// matching the LSP convention of clearing by publishing empty.
    pub fn update(&mut self, path: PathBuf, items: Vec<TernDiagnostic>) {
        if items.is_empty() {
            self.data.remove(&path);
        } else {
            self.data.insert(path, items);
        }
    }

    /// Drop every diagnostic for files under `root`, returning the
    /// affected paths.
    pub fn clear_folder(&mut self, root: &Path) -> Vec<PathBuf> {
        let removed: Vec<PathBuf> = self
            .data
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect();
        for path in &removed {
            self.data.remove(path);
        }
        removed
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut files: Vec<(PathBuf, Vec<TernDiagnostic>)> = self
            .data
            .iter()
            .map(|(path, items)| (path.clone(), items.clone()))
            .collect();

        // Files with errors first, then alphabetically.
        files.sort_by(|a, b| {
            let a_has_errors = a.1.iter().any(|d| d.severity().is_error());
            let b_has_errors = b.1.iter().any(|d| d.severity().is_error());
            b_has_errors.cmp(&a_has_errors).then_with(|| a.0.cmp(&b.0))
        });

        DiagnosticsSnapshot { files }
    }
}

/// Immutable snapshot of all diagnostics, suitable for summary output.
///
/// Counts are computed from the file list rather than cached, so there is
/// nothing to keep in sync.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSnapshot {
    files: Vec<(PathBuf, Vec<TernDiagnostic>)>,
}

impl DiagnosticsSnapshot {
    /// Per-file diagnostics, error-containing files first.
    #[must_use]
    pub fn files(&self) -> &[(PathBuf, Vec<TernDiagnostic>)] {
        &self.files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn count_errors(&self, want_error: bool) -> usize {
        self.files
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|d| d.severity().is_error() == want_error)
            .count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count_errors(true)
    }

    /// Everything that is not an error (warnings, info, hints).
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count_errors(false)
    }

    /// Compact status like `E:3 W:5`, empty when there is nothing to show.
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("E:{} W:{}", self.error_count(), self.warning_count())
    }
}
