//! LSP clients for the Tern language server, one per workspace folder,
//! plus the fleet manager that owns them.
//!
//! The [`Fleet`] is the single owner of all running connections: it reacts
//! to folder add/remove, configuration changes, and restart requests, and
//! fans teardown out across every entry. Each [`WorkspaceClient`] wraps one
//! spawned `tern-language-server` process speaking JSON-RPC over stdio.

mod client;
mod diagnostics;
mod fleet;
mod protocol;
#[cfg(test)]
mod testutil;
mod transport;

pub use client::{ClientEvent, StopReason, WorkspaceClient};
pub use diagnostics::DiagnosticsSnapshot;
pub use fleet::{Fleet, FleetEvent};
pub use transport::{FrameReader, FrameWriter, TransportError};
