//! One language-server connection bound to one workspace folder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tern_host::{Host, TernDiagnostic, WatchKinds, WatchRequest, WatchSubscription, WorkspaceFolder};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::protocol::{self, Notification, PublishDiagnosticsParams, Request};
use crate::transport::{FrameReader, FrameWriter};

/// LSP language identifier for Tern grammars.
pub(crate) const LANGUAGE_ID: &str = "tern";

/// File extension the server analyzes.
pub(crate) const TARGET_EXTENSION: &str = "tern";

/// Watch pattern handed to the host, scoped per folder.
pub(crate) const TARGET_PATTERN: &str = "**/*.tern";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SHUTDOWN_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

const EXIT_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

const WRITER_CHANNEL_CAPACITY: usize = 64;

enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

enum IncomingFrame {
    Response {
        id: u64,
        body: serde_json::Value,
    },
    ServerRequest {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
        params: Option<serde_json::Value>,
    },
}

/// Why a client's connection ended on its own.
#[derive(Debug)]
pub enum StopReason {
    Exited,
    Failed(String),
}

/// Events a running client reports back to the fleet, keyed by folder root.
#[derive(Debug)]
pub enum ClientEvent {
    Diagnostics {
        folder: PathBuf,
        path: PathBuf,
        items: Vec<TernDiagnostic>,
    },
    Stopped {
        folder: PathBuf,
        reason: StopReason,
    },
}

fn parse_incoming(frame: &serde_json::Value) -> Option<IncomingFrame> {
    let id = frame.get("id");
    let method = frame
        .get("method")
        .and_then(|m| m.as_str())
        .map(String::from);
    let has_result_or_error = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, has_result_or_error) {
        (Some(id_val), None, true) => Some(IncomingFrame::Response {
            id: id_val.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id_val), Some(method), _) => Some(IncomingFrame::ServerRequest {
            id: id_val.clone(),
            method,
        }),
        (None, Some(method), _) => Some(IncomingFrame::Notification {
            method,
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

/// Tracks which documents have been opened and their sync versions.
#[derive(Default)]
struct DocumentTracker {
    versions: HashMap<String, i32>,
}

impl DocumentTracker {
    /// Record a touch of `uri`. Returns `(first_open, version)`: version 1
    /// and `true` the first time, a bumped version and `false` after.
    fn touch(&mut self, uri: &str) -> (bool, i32) {
        match self.versions.get_mut(uri) {
            Some(version) => {
                *version += 1;
                (false, *version)
            }
            None => {
                self.versions.insert(uri.to_string(), 1);
                (true, 1)
            }
        }
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;

/// A live connection to one `tern-language-server` process.
///
/// Owns the child process and three tasks: a frame reader, a frame writer,
/// and a watch pump feeding document sync from the host's file watchers.
/// Holding a `WorkspaceClient` is proof the LSP handshake succeeded.
pub struct WorkspaceClient {
    folder: WorkspaceFolder,
    child: Child,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: u64,
    pending: PendingMap,
    pump_handle: Option<tokio::task::JoinHandle<()>>,
}

impl WorkspaceClient {
    /// Spawn the server binary for `folder`, perform the handshake, wire
    /// the folder's file watchers, and proactively open every existing
    /// target file so diagnostics populate without user interaction.
    pub async fn start(
        folder: WorkspaceFolder,
        binary: &Path,
        host: &dyn Host,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Self> {
        let mut child = Command::new(binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", binary.display()))?;

        let stdout = child.stdout.take().context("no stdout from server")?;
        let stdin = child.stdin.take().context("no stdin from server")?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // The writer task ends on a Shutdown command or when every sender
        // is gone; the reader task ends at stdout EOF.
        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut writer = FrameWriter::new(stdin);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            tracing::warn!("LSP write error: {e}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let root = protocol::normalize_path(folder.root());
        let reader_pending = pending.clone();
        let reader_events = events.clone();
        let reader_writer_tx = writer_tx.clone();
        let reader_root = root.clone();
        tokio::spawn(async move {
            let mut reader = FrameReader::new(stdout);
            loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => {
                        Self::dispatch_frame(
                            &frame,
                            &reader_pending,
                            &reader_events,
                            &reader_writer_tx,
                            &reader_root,
                        )
                        .await;
                    }
                    Ok(None) => {
                        tracing::info!(folder = %reader_root.display(), "server closed stdout");
                        let _ = reader_events
                            .send(ClientEvent::Stopped {
                                folder: reader_root.clone(),
                                reason: StopReason::Exited,
                            })
                            .await;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(folder = %reader_root.display(), "LSP reader error: {e}");
                        let _ = reader_events
                            .send(ClientEvent::Stopped {
                                folder: reader_root.clone(),
                                reason: StopReason::Failed(e.to_string()),
                            })
                            .await;
                        break;
                    }
                }
            }
        });

        let mut client = Self {
            folder,
            child,
            writer_tx,
            next_id: 1,
            pending,
            pump_handle: None,
        };

        client.initialize().await?;

        // Two subscriptions per folder: deletions feed document sync, and
        // creations/changes (no deletions, to avoid handling them twice)
        // eagerly open documents.
        let delete_sub = host.watch(WatchRequest {
            root: root.clone(),
            pattern: TARGET_PATTERN.to_string(),
            kinds: WatchKinds::deletions(),
        });
        let change_sub = host.watch(WatchRequest {
            root: root.clone(),
            pattern: TARGET_PATTERN.to_string(),
            kinds: WatchKinds::creations_and_changes(),
        });
        client.pump_handle = Some(tokio::spawn(pump_watches(
            root,
            delete_sub,
            change_sub,
            client.writer_tx.clone(),
        )));

        Ok(client)
    }

    #[must_use]
    pub fn folder(&self) -> &WorkspaceFolder {
        &self.folder
    }

    async fn dispatch_frame(
        frame: &serde_json::Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>,
        events: &mpsc::Sender<ClientEvent>,
        writer_tx: &mpsc::Sender<WriterCommand>,
        root: &Path,
    ) {
        let Some(incoming) = parse_incoming(frame) else {
            tracing::trace!("ignoring malformed JSON-RPC frame");
            return;
        };

        match incoming {
            IncomingFrame::Response { id, body } => {
                let sender = pending.lock().await.remove(&id);
                if let Some(tx) = sender {
                    let _ = tx.send(body);
                }
            }
            IncomingFrame::ServerRequest { id, method } => {
                // Answer anything the server asks so it never blocks on us.
                tracing::debug!("server request {method}, replying method not found");
                let response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32601,
                        "message": format!("Method not found: {method}")
                    }
                });
                let _ = writer_tx.send(WriterCommand::Send(response)).await;
            }
            IncomingFrame::Notification { method, params } => {
                Self::handle_notification(&method, params, events, root).await;
            }
        }
    }

    async fn handle_notification(
        method: &str,
        params: Option<serde_json::Value>,
        events: &mpsc::Sender<ClientEvent>,
        root: &Path,
    ) {
        if method != "textDocument/publishDiagnostics" {
            tracing::trace!("ignoring notification: {method}");
            return;
        }
        let Some(params) = params else { return };
        let diag_params = match serde_json::from_value::<PublishDiagnosticsParams>(params) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!("failed to parse publishDiagnostics: {e}");
                return;
            }
        };
        let Some(path) = protocol::file_uri_to_path(&diag_params.uri) else {
            return;
        };
        let normalized = protocol::normalize_path(&path);
        if !normalized.starts_with(root) {
            tracing::warn!(
                "server reported diagnostics outside the workspace folder: {}",
                path.display()
            );
            return;
        }
        let items = diag_params
            .diagnostics
            .iter()
            .map(protocol::LspDiagnostic::to_tern_diagnostic)
            .collect();
        let _ = events
            .send(ClientEvent::Diagnostics {
                folder: root.to_path_buf(),
                path: normalized,
                items,
            })
            .await;
    }

    async fn initialize(&mut self) -> Result<()> {
        let root_uri = protocol::path_to_file_uri(self.folder.root())
            .context("converting workspace root to URI")?;

        let params = protocol::initialize_params(root_uri.as_str(), &self.folder.name());
        let response = self
            .send_request("initialize", Some(params), REQUEST_TIMEOUT)
            .await?;

        if let Some(error) = response.get("error") {
            bail!(
                "LSP initialize failed: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }

        self.send_notification("initialized", Some(serde_json::json!({})))
            .await?;

        Ok(())
    }

    async fn send_request(
        &mut self,
        method: &'static str,
        params: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = Request::new(id, method, params);
        let frame = serde_json::to_value(&request).context("serializing request")?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            bail!("writer channel closed");
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                // Reader task is gone; drop the pending entry with it.
                self.pending.lock().await.remove(&id);
                bail!("response channel dropped");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("request timed out");
            }
        }
    }

    async fn send_notification(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let notification = Notification::new(method, params);
        let frame = serde_json::to_value(&notification).context("serializing notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow::anyhow!("writer channel closed"))?;
        Ok(())
    }

    /// Gracefully stop the connection. Consumes self; resolves only after
    /// the child has exited (or been killed after a bounded wait), so a
    /// follow-up start for the same folder never races this instance.
    pub async fn shutdown(mut self) {
        if let Some(pump) = self.pump_handle.take() {
            pump.abort();
        }

        match self
            .send_request("shutdown", None, SHUTDOWN_REQUEST_TIMEOUT)
            .await
        {
            Ok(response) if response.get("error").is_none() => {
                let _ = self.send_notification("exit", None).await;
            }
            Ok(_) => tracing::debug!("server rejected shutdown request, skipping exit"),
            Err(e) => tracing::debug!("shutdown request failed: {e:#}"),
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        if tokio::time::timeout(EXIT_WAIT_TIMEOUT, self.child.wait())
            .await
            .is_err()
        {
            tracing::debug!(folder = %self.folder.name(), "server did not exit in time, killing");
            let _ = self.child.kill().await;
        }
    }
}

/// Feed watcher events into the connection: deletions become
/// `workspace/didChangeWatchedFiles`, creations and changes eagerly open
/// the document. Starts with a scan of every existing target file.
async fn pump_watches(
    root: PathBuf,
    mut delete_sub: WatchSubscription,
    mut change_sub: WatchSubscription,
    writer_tx: mpsc::Sender<WriterCommand>,
) {
    let mut docs = DocumentTracker::default();

    let scan_root = root.clone();
    let existing = tokio::task::spawn_blocking(move || scan_target_files(&scan_root))
        .await
        .unwrap_or_default();
    for path in existing {
        open_or_update(&path, &mut docs, &writer_tx).await;
    }

    let mut deletes_open = true;
    let mut changes_open = true;
    while deletes_open || changes_open {
        tokio::select! {
            event = delete_sub.next_event(), if deletes_open => match event {
                Some(event) => notify_deleted(&event.path, &writer_tx).await,
                None => deletes_open = false,
            },
            event = change_sub.next_event(), if changes_open => match event {
                Some(event) => open_or_update(&event.path, &mut docs, &writer_tx).await,
                None => changes_open = false,
            },
        }
    }
}

async fn open_or_update(
    path: &Path,
    docs: &mut DocumentTracker,
    writer_tx: &mpsc::Sender<WriterCommand>,
) {
    let uri = match protocol::path_to_file_uri(path) {
        Ok(uri) => uri.to_string(),
        Err(e) => {
            tracing::warn!("skipping document sync: {e}");
            return;
        }
    };
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("cannot read {}: {e}", path.display());
            return;
        }
    };

    let (first_open, version) = docs.touch(&uri);
    let notification = if first_open {
        Notification::new(
            "textDocument/didOpen",
            Some(protocol::did_open_params(&uri, LANGUAGE_ID, version, &text)),
        )
    } else {
        Notification::new(
            "textDocument/didChange",
            Some(protocol::did_change_params(&uri, version, &text)),
        )
    };
    send_frame(writer_tx, &notification).await;
}

async fn notify_deleted(path: &Path, writer_tx: &mpsc::Sender<WriterCommand>) {
    let uri = match protocol::path_to_file_uri(path) {
        Ok(uri) => uri.to_string(),
        Err(e) => {
            tracing::warn!("skipping delete notification: {e}");
            return;
        }
    };
    let notification = Notification::new(
        "workspace/didChangeWatchedFiles",
        Some(protocol::watched_files_deleted_params(&uri)),
    );
    send_frame(writer_tx, &notification).await;
}

async fn send_frame(writer_tx: &mpsc::Sender<WriterCommand>, notification: &Notification) {
    match serde_json::to_value(notification) {
        Ok(frame) => {
            let _ = writer_tx.send(WriterCommand::Send(frame)).await;
        }
        Err(e) => tracing::warn!("serializing notification: {e}"),
    }
}

fn scan_target_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in ignore::WalkBuilder::new(root).build().flatten() {
        let path = entry.path();
        if entry.file_type().is_some_and(|t| t.is_file())
            && path.extension().is_some_and(|ext| ext == TARGET_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }
    files
}
