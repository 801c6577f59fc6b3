//! Runs the install command under a cancellable progress scope.

use std::process::Stdio;

use anyhow::{Context, Result};
use tern_host::{Host, InstallProgress, ProgressScope};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::platform::{INSTALL_COMMAND, Platform};
use crate::process::{self, ChildGuard};

/// Installs (or updates) the server binary by spawning the fixed
/// `cargo install` command through the platform shell.
#[derive(Debug, Clone)]
pub struct Installer {
    platform: Platform,
    command_line: String,
}

impl Installer {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            command_line: INSTALL_COMMAND.to_string(),
        }
    }

    /// Run an arbitrary command line instead of the fixed install command.
    /// Construction seam for tests; production code uses [`Installer::new`].
    #[must_use]
    pub fn with_command(platform: Platform, command_line: impl Into<String>) -> Self {
        Self {
            platform,
            command_line: command_line.into(),
        }
    }

    /// Install the server. Returns `true` only if the install command exited
    /// with status zero and was not cancelled.
    ///
    /// The command's stdout and stderr are streamed through the line
    /// classifier into a progress scope obtained from the host; lines the
    /// classifier does not recognize are dropped. Cancelling the scope kills
    /// the spawned process group, and the call still resolves once the
    /// process has exited.
    pub async fn install(&self, host: &dyn Host) -> bool {
        let scope = host.begin_install("Installing Tern Language Server");
        scope.report(InstallProgress::Generic(
            "spawning `cargo install` command".to_string(),
        ));

        match self.run(&scope).await {
            Ok(true) => {
                scope.report(InstallProgress::Generic("installed".to_string()));
                true
            }
            Ok(false) => {
                scope.report(InstallProgress::Generic("an error occurred".to_string()));
                false
            }
            Err(e) => {
                tracing::warn!("install failed: {e:#}");
                scope.report(InstallProgress::Generic("an error occurred".to_string()));
                false
            }
        }
    }

    async fn run(&self, scope: &ProgressScope) -> Result<bool> {
        let mut cmd = Command::new(self.platform.shell());
        cmd.arg(self.platform.shell_arg())
            .arg(&self.command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        process::set_new_session(&mut cmd);

        let mut child = cmd.spawn().context("spawning install command")?;
        let stdout = child
            .stdout
            .take()
            .context("no stdout from install command")?;
        let stderr = child
            .stderr
            .take()
            .context("no stderr from install command")?;
        let mut guard = ChildGuard::new(child);

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_done = false;
        let mut err_done = false;
        let mut cancelled = false;

        let cancel = scope.cancelled();
        tokio::pin!(cancel);

        // Drain both streams to EOF; a kill on cancellation closes them.
        while !(out_done && err_done) {
            tokio::select! {
                () = &mut cancel, if !cancelled => {
                    tracing::info!("install cancelled, killing install command");
                    cancelled = true;
                    process::terminate(guard.child_mut());
                }
                line = out_lines.next_line(), if !out_done => match line {
                    Ok(Some(line)) => report_classified(&line, scope),
                    Ok(None) => out_done = true,
                    Err(e) => {
                        tracing::debug!("install stdout read error: {e}");
                        out_done = true;
                    }
                },
                line = err_lines.next_line(), if !err_done => match line {
                    Ok(Some(line)) => report_classified(&line, scope),
                    Ok(None) => err_done = true,
                    Err(e) => {
                        tracing::debug!("install stderr read error: {e}");
                        err_done = true;
                    }
                },
            }
        }

        let status = guard
            .child_mut()
            .wait()
            .await
            .context("waiting for install command")?;
        guard.disarm();
        tracing::info!(code = ?status.code(), "install command exited");

        Ok(status.success() && !cancelled)
    }
}

fn report_classified(line: &str, scope: &ProgressScope) {
    if let Some(event) = classify_line(line) {
        tracing::debug!("install progress: {event}");
        scope.report(event);
    }
}

/// Classify one line of `cargo install` output.
///
/// Only recognized lines become progress events; everything else is noise
/// and is never surfaced.
fn classify_line(line: &str) -> Option<InstallProgress> {
    let line = line.trim();
    if line == "Updating crates.io index" {
        Some(InstallProgress::IndexUpdate)
    } else if line.starts_with("Updating git repository") {
        Some(InstallProgress::Fetch)
    } else {
        line.strip_prefix("Compiling ").map(|rest| {
            InstallProgress::CompileUnit(strip_version(rest).trim_end().to_string())
        })
    }
}

/// Everything before the first `v<major>.<minor>.<patch>` fragment.
fn strip_version(rest: &str) -> &str {
    for (idx, _) in rest.match_indices('v') {
        if starts_with_version(&rest[idx..]) {
            return &rest[..idx];
        }
    }
    rest
}

fn starts_with_version(s: &str) -> bool {
    let Some(digits) = s.strip_prefix('v') else {
        return false;
    };
    let mut dots = 0;
    let mut run = 0;
    for c in digits.chars() {
        if c.is_ascii_digit() {
            run += 1;
        } else if c == '.' && run > 0 && dots < 2 {
            dots += 1;
            run = 0;
        } else {
            break;
        }
    }
    dots == 2 && run > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_index_update() {
        assert_eq!(
            classify_line("    Updating crates.io index"),
            Some(InstallProgress::IndexUpdate)
        );
    }

    #[test]
    fn classifies_git_fetch_any_source() {
        assert_eq!(
            classify_line("Updating git repository `https://example.com/tern/tern`"),
            Some(InstallProgress::Fetch)
        );
    }

    #[test]
    fn classifies_compile_unit_and_strips_version() {
        assert_eq!(
            classify_line("   Compiling serde v1.0.210"),
            Some(InstallProgress::CompileUnit("serde".to_string()))
        );
        assert_eq!(
            classify_line("Compiling tern-language-server v0.3.1 (/build)"),
            Some(InstallProgress::CompileUnit("tern-language-server".to_string()))
        );
    }

    #[test]
    fn compile_unit_with_v_in_crate_name() {
        assert_eq!(
            classify_line("Compiling vte v0.11.1"),
            Some(InstallProgress::CompileUnit("vte".to_string()))
        );
    }

    #[test]
    fn unrecognized_lines_are_dropped() {
        assert_eq!(classify_line("Downloading 47 crates"), None);
        assert_eq!(classify_line("warning: unused import"), None);
        assert_eq!(classify_line(""), None);
    }

    #[test]
    fn version_fragment_detection() {
        assert!(starts_with_version("v1.2.3"));
        assert!(starts_with_version("v0.11.1 (/build)"));
        assert!(starts_with_version("v1.2.3-alpha"));
        assert!(!starts_with_version("version"));
        assert!(!starts_with_version("v1.2"));
        assert!(!starts_with_version("te v0.1.0"));
    }

    #[cfg(unix)]
    mod spawn {
        use std::time::Duration;

        use crate::testutil::ScriptedHost;

        use super::*;

        #[tokio::test]
        async fn zero_exit_is_success_and_reports_classified_lines() {
            let host = ScriptedHost::declining();
            let installer = Installer::with_command(
                Platform::unix(),
                "printf 'Updating crates.io index\\n   Compiling serde v1.0.0\\nnoise\\n'",
            );

            assert!(installer.install(&host).await);

            let mut handle = host.take_progress();
            let mut events = Vec::new();
            while let Some(event) = handle.next_event().await {
                events.push(event);
            }
            assert!(events.contains(&InstallProgress::IndexUpdate));
            assert!(events.contains(&InstallProgress::CompileUnit("serde".to_string())));
            assert_eq!(events.last(), Some(&InstallProgress::Generic("installed".to_string())));
            assert!(!events.iter().any(
                |e| matches!(e, InstallProgress::Generic(msg) if msg.contains("noise"))
            ));
        }

        #[tokio::test]
        async fn nonzero_exit_is_failure() {
            let host = ScriptedHost::declining();
            let installer = Installer::with_command(Platform::unix(), "exit 1");

            assert!(!installer.install(&host).await);

            let mut handle = host.take_progress();
            let mut last = None;
            while let Some(event) = handle.next_event().await {
                last = Some(event);
            }
            assert_eq!(
                last,
                Some(InstallProgress::Generic("an error occurred".to_string()))
            );
        }

        #[tokio::test]
        async fn stderr_lines_are_classified_too() {
            let host = ScriptedHost::declining();
            let installer = Installer::with_command(
                Platform::unix(),
                "printf 'Updating crates.io index\\n' >&2",
            );

            assert!(installer.install(&host).await);

            let mut handle = host.take_progress();
            let mut events = Vec::new();
            while let Some(event) = handle.next_event().await {
                events.push(event);
            }
            assert!(events.contains(&InstallProgress::IndexUpdate));
        }

        #[tokio::test]
        async fn cancellation_kills_the_child_and_resolves_false() {
            let host = ScriptedHost::cancelling_installs();
            let installer = Installer::with_command(Platform::unix(), "sleep 30");

            let result = tokio::time::timeout(
                Duration::from_secs(5),
                installer.install(&host),
            )
            .await
            .expect("cancelled install must resolve in bounded time");
            assert!(!result);
        }
    }
}
