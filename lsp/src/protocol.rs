//! JSON-RPC message shapes exchanged with the language server.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tern_host::{DiagnosticSeverity, TernDiagnostic};

/// LSP `FileChangeType.Deleted`.
pub(crate) const FILE_CHANGE_DELETED: u8 = 3;

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub(crate) struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

pub(crate) fn initialize_params(root_uri: &str, folder_name: &str) -> serde_json::Value {
    serde_json::json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "willSave": false,
                    "willSaveWaitUntil": false,
                    "didSave": false
                },
                "publishDiagnostics": {
                    "relatedInformation": false
                }
            },
            "workspace": {
                "workspaceFolders": true,
                "didChangeWatchedFiles": {
                    "dynamicRegistration": false
                }
            }
        },
        "workspaceFolders": [{
            "uri": root_uri,
            "name": folder_name
        }]
    })
}

pub(crate) fn did_open_params(
    uri: &str,
    language_id: &str,
    version: i32,
    text: &str,
) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub(crate) fn did_change_params(uri: &str, version: i32, text: &str) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "version": version
        },
        "contentChanges": [{
            "text": text
        }]
    })
}

pub(crate) fn watched_files_deleted_params(uri: &str) -> serde_json::Value {
    serde_json::json!({
        "changes": [{
            "uri": uri,
            "type": FILE_CHANGE_DELETED
        }]
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<LspDiagnostic>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LspDiagnostic {
    pub range: LspRange,
    pub severity: Option<u64>,
    pub source: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LspRange {
    pub start: LspPosition,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LspPosition {
    pub line: u32,
    pub character: u32,
}

impl LspDiagnostic {
    pub fn to_tern_diagnostic(&self) -> TernDiagnostic {
        TernDiagnostic::new(
            self.severity
                .and_then(DiagnosticSeverity::from_lsp)
                .unwrap_or(DiagnosticSeverity::Warning),
            self.message.clone(),
            self.range.start.line,
            self.range.start.character,
            self.source
                .clone()
                .unwrap_or_else(|| String::from("tern-language-server")),
        )
    }
}

pub(crate) fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

pub(crate) fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri).ok().and_then(|u| u.to_file_path().ok())
}

/// Collapse `.` and `..` segments without touching the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_params_carry_root_and_folder() {
        let params = initialize_params("file:///work/grammar", "grammar");
        assert!(params["processId"].is_number());
        assert_eq!(params["rootUri"], "file:///work/grammar");
        assert_eq!(params["workspaceFolders"][0]["name"], "grammar");
        assert!(params["capabilities"]["textDocument"]["publishDiagnostics"].is_object());
    }

    #[test]
    fn did_open_params_shape() {
        let params = did_open_params("file:///g.tern", "tern", 1, "rule = { ANY }");
        assert_eq!(params["textDocument"]["uri"], "file:///g.tern");
        assert_eq!(params["textDocument"]["languageId"], "tern");
        assert_eq!(params["textDocument"]["version"], 1);
        assert_eq!(params["textDocument"]["text"], "rule = { ANY }");
    }

    #[test]
    fn did_change_params_use_full_text_sync() {
        let params = did_change_params("file:///g.tern", 2, "rule = { SOI }");
        assert_eq!(params["textDocument"]["version"], 2);
        assert_eq!(params["contentChanges"][0]["text"], "rule = { SOI }");
    }

    #[test]
    fn watched_files_deleted_params_shape() {
        let params = watched_files_deleted_params("file:///g.tern");
        assert_eq!(params["changes"][0]["uri"], "file:///g.tern");
        assert_eq!(params["changes"][0]["type"], 3);
    }

    #[test]
    fn request_params_are_omitted_not_null() {
        let req = Request::new(1, "shutdown", None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 1);
        assert!(json.get("params").is_none());
    }

    #[test]
    fn notification_params_are_omitted_not_null() {
        let notif = Notification::new("exit", None);
        let json = serde_json::to_value(&notif).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("params").is_none());
    }

    #[test]
    fn diagnostic_conversion_maps_fields() {
        let diag = LspDiagnostic {
            range: LspRange {
                start: LspPosition {
                    line: 10,
                    character: 5,
                },
            },
            severity: Some(1),
            source: Some("tern".to_string()),
            message: "unknown rule".to_string(),
        };

        let converted = diag.to_tern_diagnostic();
        assert!(converted.severity().is_error());
        assert_eq!(converted.line(), 10);
        assert_eq!(converted.col(), 5);
        assert_eq!(converted.source(), "tern");
        assert_eq!(converted.message(), "unknown rule");
    }

    #[test]
    fn missing_severity_defaults_to_warning() {
        let json = serde_json::json!({
            "uri": "file:///g.tern",
            "diagnostics": [{
                "range": { "start": { "line": 5, "character": 3 }, "end": { "line": 5, "character": 9 } },
                "message": "unused rule"
            }]
        });
        let params: PublishDiagnosticsParams = serde_json::from_value(json).unwrap();
        let diag = params.diagnostics[0].to_tern_diagnostic();
        assert_eq!(diag.severity(), DiagnosticSeverity::Warning);
        assert_eq!(diag.source(), "tern-language-server");
    }

    #[test]
    fn empty_diagnostics_array_deserializes() {
        let json = serde_json::json!({ "uri": "file:///g.tern", "diagnostics": [] });
        let params: PublishDiagnosticsParams = serde_json::from_value(json).unwrap();
        assert!(params.diagnostics.is_empty());
    }

    #[test]
    fn path_uri_roundtrip() {
        #[cfg(windows)]
        let path = PathBuf::from(r"C:\work\grammar\g.tern");
        #[cfg(not(windows))]
        let path = PathBuf::from("/work/grammar/g.tern");

        let uri = path_to_file_uri(&path).unwrap();
        assert_eq!(file_uri_to_path(uri.as_str()).unwrap(), path);
    }

    #[test]
    fn non_file_uris_do_not_convert() {
        assert!(file_uri_to_path("not-a-uri").is_none());
        assert!(file_uri_to_path("https://example.com/g.tern").is_none());
    }

    #[test]
    fn normalize_collapses_traversal() {
        assert_eq!(
            normalize_path(Path::new("/work/grammar/../other/./g.tern")),
            PathBuf::from("/work/other/g.tern")
        );
    }
}
