//! Workspace folder identity.

use std::path::{Path, PathBuf};

/// A project root the editor has open; the unit of client scoping.
///
/// Identity is the root path: the fleet keys entries by the root's
/// `file://` URI string, so two folders denote the same entry exactly
/// when their roots are the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    root: PathBuf,
}

impl WorkspaceFolder {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Short display name (the root's final component).
    #[must_use]
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_final_component() {
        let folder = WorkspaceFolder::new(PathBuf::from("/work/grammar"));
        assert_eq!(folder.name(), "grammar");
        assert_eq!(folder.root(), Path::new("/work/grammar"));
    }

    #[test]
    fn name_falls_back_to_display_for_bare_root() {
        let folder = WorkspaceFolder::new(PathBuf::from("/"));
        assert_eq!(folder.name(), "/");
    }
}
