//! Shared domain types for the Tern editor shell.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//! workspace folders, diagnostics, install progress events, and the
//! [`Host`] capability trait through which an embedding editor provides
//! its UI surfaces (prompts, progress, notifications, file watchers,
//! the diagnostics surface).
//!
//! Nothing here spawns processes or touches the network. The seams are
//! plain channels so hosts and tests can drive them without mocking
//! machinery: a prompt is a `oneshot` receiver, a watcher is an `mpsc`
//! receiver, a progress scope is an `mpsc` sender paired with a `watch`
//! cancel flag.

mod diag;
mod folder;
mod host;
mod progress;
mod watch;

pub use diag::{DiagnosticSeverity, TernDiagnostic};
pub use folder::WorkspaceFolder;
pub use host::{Host, confirmed};
pub use progress::{InstallProgress, ProgressHandle, ProgressScope, progress_channel};
pub use watch::{FileEvent, FileEventKind, WatchKinds, WatchRequest, WatchSubscription};
