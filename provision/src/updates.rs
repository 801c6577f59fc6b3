//! Informational update check against crates.io.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tern_config::Settings;
use tern_host::{Host, confirmed};
use tokio::process::Command;

use crate::install::Installer;

/// How long the metadata fetch may run before it loses the race.
pub const UPDATE_CHECK_TIMEOUT: Duration = Duration::from_millis(2500);

const METADATA_ENDPOINT: &str = "https://crates.io/api/v1/crates/tern-language-server";

const USER_AGENT: &str = concat!("tern-ide/", env!("CARGO_PKG_VERSION"));

/// Compares the installed binary's version with the latest published one
/// and offers an automatic update on mismatch.
///
/// Strictly informational: every failure degrades to a log line, and the
/// check never blocks or fails server startup.
pub struct UpdateChecker {
    endpoint: String,
}

impl Default for UpdateChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateChecker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: METADATA_ENDPOINT.to_string(),
        }
    }

    /// Point the check at a different metadata endpoint (tests).
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Run the update check for the resolved binary.
    ///
    /// Skips silently when the feature is disabled or a custom
    /// `server_path` is configured (custom paths are user-managed).
    pub async fn check(
        &self,
        binary: &Path,
        settings: &Settings,
        host: &dyn Host,
        installer: &Installer,
    ) {
        if !settings.check_for_updates || settings.server_path.is_some() {
            return;
        }
        tracing::info!("checking for server updates");
        if let Err(e) = self.run(binary, host, installer).await {
            tracing::info!("update check failed: {e:#}");
        }
    }

    async fn run(&self, binary: &Path, host: &dyn Host, installer: &Installer) -> Result<()> {
        let output = Command::new(binary)
            .arg("--version")
            .output()
            .await
            .context("querying server version")?;
        if !output.status.success() {
            // A broken binary must not masquerade as version "" and
            // trigger a bogus update prompt.
            bail!("version query exited with {}", output.status);
        }
        let current = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::info!(version = %current, "installed server version");

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("building http client")?;
        let fetch = async {
            client
                .get(&self.endpoint)
                .send()
                .await?
                .json::<serde_json::Value>()
                .await
        };
        // First to settle wins; on timeout the in-flight request is dropped
        // with the fetch future, on success the timer is dropped.
        let json = match tokio::time::timeout(UPDATE_CHECK_TIMEOUT, fetch).await {
            Ok(response) => response.context("fetching published version metadata")?,
            Err(_) => {
                tracing::info!(
                    "update check timed out after {}ms",
                    UPDATE_CHECK_TIMEOUT.as_millis()
                );
                return Ok(());
            }
        };
        let latest = json["crate"]["max_version"]
            .as_str()
            .context("response missing crate.max_version")?;

        // String inequality on purpose: any mismatch counts as an update,
        // regardless of direction.
        if current == latest {
            tracing::info!("server is up to date");
            return Ok(());
        }

        let message = format!(
            "A new version of the Tern Language Server is available \
             (v{current} -> v{latest}). Would you like to update automatically?"
        );
        if confirmed(host, &message).await && !installer.install(host).await {
            host.show_error("Failed to update Tern Language Server.");
        }
        Ok(())
    }
}
