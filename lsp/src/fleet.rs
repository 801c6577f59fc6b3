//! Owns every running language-server connection, one per workspace folder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tern_config::Settings;
use tern_host::{Host, WorkspaceFolder};
use tern_provision::{Installer, Platform, Resolver, UpdateChecker, check_validity};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::client::{ClientEvent, StopReason, WorkspaceClient};
use crate::diagnostics::DiagnosticsStore;
use crate::protocol::normalize_path;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Editor-side lifecycle events the fleet reacts to.
#[derive(Debug)]
pub enum FleetEvent {
    FolderAdded(WorkspaceFolder),
    FolderRemoved(WorkspaceFolder),
    ConfigChanged(Settings),
    RestartRequested,
}

/// The connection manager.
///
/// Single-owner design: all clients live in the fleet's event loop, so
/// starting, stopping, and restarting never race each other. Closing the
/// [`FleetEvent`] sender tears every connection down and ends [`Fleet::run`].
pub struct Fleet {
    settings: Settings,
    host: Arc<dyn Host>,
    resolver: Resolver,
    updater: UpdateChecker,
    installer: Installer,
    folders: Vec<WorkspaceFolder>,
    entries: HashMap<PathBuf, WorkspaceClient>,
    diagnostics: DiagnosticsStore,
    events_rx: mpsc::Receiver<FleetEvent>,
    client_tx: mpsc::Sender<ClientEvent>,
    client_rx: mpsc::Receiver<ClientEvent>,
}

impl Fleet {
    #[must_use]
    pub fn new(settings: Settings, host: Arc<dyn Host>) -> (Self, mpsc::Sender<FleetEvent>) {
        Self::with_parts(
            settings,
            host,
            Resolver::new(),
            UpdateChecker::new(),
            Installer::new(Platform::current()),
        )
    }

    /// Construction seam for tests: inject the provisioning collaborators.
    #[must_use]
    pub fn with_parts(
        settings: Settings,
        host: Arc<dyn Host>,
        resolver: Resolver,
        updater: UpdateChecker,
        installer: Installer,
    ) -> (Self, mpsc::Sender<FleetEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (client_tx, client_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let fleet = Self {
            settings,
            host,
            resolver,
            updater,
            installer,
            folders: Vec::new(),
            entries: HashMap::new(),
            diagnostics: DiagnosticsStore::new(),
            events_rx,
            client_tx,
            client_rx,
        };
        (fleet, events_tx)
    }

    /// Drive the fleet until the [`FleetEvent`] sender is dropped, then
    /// shut every connection down before returning.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                event = self.client_rx.recv() => {
                    // Never `None`: the fleet holds a sender clone.
                    if let Some(event) = event {
                        self.handle_client_event(event);
                    }
                }
            }
        }

        tracing::info!("shutting down {} server connection(s)", self.entries.len());
        let mut shutdowns = JoinSet::new();
        for (root, client) in self.entries.drain() {
            // Same contract as stop_folder: nothing a client published may
            // outlive it on the host surface.
            self.diagnostics.clear_folder(&root);
            self.host.clear_diagnostics(&root);
            shutdowns.spawn(client.shutdown());
        }
        while shutdowns.join_next().await.is_some() {}
    }

    async fn handle_event(&mut self, event: FleetEvent) {
        match event {
            FleetEvent::FolderAdded(folder) => {
                let root = normalize_path(folder.root());
                if !self.folders.iter().any(|f| normalize_path(f.root()) == root) {
                    self.folders.push(folder.clone());
                }
                self.start_folder(folder).await;
            }
            FleetEvent::FolderRemoved(folder) => {
                let root = normalize_path(folder.root());
                self.folders.retain(|f| normalize_path(f.root()) != root);
                self.stop_folder(&root).await;
            }
            FleetEvent::ConfigChanged(settings) => {
                let path_changed = settings.server_path != self.settings.server_path;
                self.settings = settings;
                if path_changed {
                    tracing::info!("server path configuration changed, restarting servers");
                    self.restart_entries().await;
                }
            }
            FleetEvent::RestartRequested => {
                if let Some(folder) = self.folders.first().cloned() {
                    self.start_folder(folder).await;
                } else {
                    self.host.show_info(
                        "Tern Language Server restart requested, but no workspace folder is open.",
                    );
                }
            }
        }
    }

    fn handle_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Diagnostics {
                folder,
                path,
                items,
            } => {
                tracing::debug!(
                    folder = %folder.display(),
                    path = %path.display(),
                    count = items.len(),
                    "diagnostics update"
                );
                self.host.publish_diagnostics(&path, &items);
                self.diagnostics.update(path, items);
                let status = self.diagnostics.snapshot().status_string();
                if !status.is_empty() {
                    tracing::debug!(%status, "workspace diagnostics");
                }
            }
            ClientEvent::Stopped { folder, reason } => match reason {
                StopReason::Exited => {
                    tracing::info!(folder = %folder.display(), "server connection closed");
                }
                StopReason::Failed(message) => {
                    tracing::warn!(folder = %folder.display(), "server connection failed: {message}");
                }
            },
        }
    }

    /// Resolve a binary and start a connection for `folder`, replacing any
    /// existing connection for the same root.
    async fn start_folder(&mut self, folder: WorkspaceFolder) {
        let root = normalize_path(folder.root());
        if self.entries.contains_key(&root) {
            // Restart path: the old connection's diagnostics are cleared
            // and its teardown completes before the new spawn begins.
            self.stop_folder(&root).await;
        }

        let Some(binary) = self
            .resolver
            .resolve(&self.settings, &self.folders, self.host.as_ref())
            .await
        else {
            // The resolver already surfaced anything the user must see.
            tracing::info!(folder = %folder.name(), "no server binary resolved");
            return;
        };

        if !check_validity(&binary).await {
            self.host.show_error(&format!(
                "Tern Language Server not found at {}.",
                binary.display()
            ));
            return;
        }

        self.updater
            .check(&binary, &self.settings, self.host.as_ref(), &self.installer)
            .await;

        match WorkspaceClient::start(
            folder.clone(),
            &binary,
            self.host.as_ref(),
            self.client_tx.clone(),
        )
        .await
        {
            Ok(client) => {
                tracing::info!(
                    folder = %folder.name(),
                    binary = %binary.display(),
                    "language server started"
                );
                self.entries.insert(root, client);
            }
            Err(e) => {
                self.host
                    .show_error(&format!("Failed to start Tern Language Server: {e:#}"));
            }
        }
    }

    /// Stop the connection for `root` and drop everything it published.
    async fn stop_folder(&mut self, root: &Path) {
        self.diagnostics.clear_folder(root);
        self.host.clear_diagnostics(root);
        if let Some(client) = self.entries.remove(root) {
            client.shutdown().await;
        }
    }

    /// Stop and start every folder that currently has a connection.
    async fn restart_entries(&mut self) {
        let folders: Vec<WorkspaceFolder> = self
            .entries
            .values()
            .map(|client| client.folder().clone())
            .collect();
        for folder in folders {
            self.start_folder(folder).await;
        }
    }
}
