//! Computes the path of the server executable to run.

use std::env;
use std::path::{Component, Path, PathBuf};

use tern_config::Settings;
use tern_host::{Host, WorkspaceFolder, confirmed};

use crate::install::Installer;
use crate::platform::Platform;

/// Environment lookup seam so tests can run against a fixed table.
pub type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves the filesystem path of the `tern-language-server` binary.
///
/// Resolution never errors; every failure mode collapses to `None` after
/// the appropriate logging or user notification. The result is not cached:
/// configuration and the installed binary can change between restarts, so
/// the fleet re-resolves on every start.
pub struct Resolver {
    platform: Platform,
    env: EnvLookup,
    installer: Installer,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    #[must_use]
    pub fn new() -> Self {
        let platform = Platform::current();
        Self {
            platform,
            env: Box::new(|key| env::var(key).ok()),
            installer: Installer::new(platform),
        }
    }

    /// Construction seam for tests: injected platform, environment, and
    /// install command.
    #[must_use]
    pub fn with_parts(platform: Platform, env: EnvLookup, installer: Installer) -> Self {
        Self {
            platform,
            env,
            installer,
        }
    }

    /// Resolve the server path, offering to install when nothing is found.
    ///
    /// Order: configured `server_path` (returned without an existence
    /// check), then the cargo bin directory chain, then an install prompt.
    /// Callers must still run [`check_validity`] on the result before
    /// using it; the custom-path route skips the early check on purpose.
    pub async fn resolve(
        &self,
        settings: &Settings,
        folders: &[WorkspaceFolder],
        host: &dyn Host,
    ) -> Option<PathBuf> {
        if let Some(custom) = settings.server_path.as_deref()
            && let Some(first) = folders.first()
        {
            let path = resolve_against(first.root(), custom);
            tracing::info!(path = %path.display(), "using configured server path");
            return Some(path);
        }

        let bin_dir = self.cargo_bin_directory()?;
        let candidate = bin_dir.join(self.platform.binary_name());
        tracing::debug!(path = %candidate.display(), "trying default server path");

        if check_validity(&candidate).await {
            return Some(candidate);
        }

        let wants_install = confirmed(
            host,
            "Failed to find an installed Tern Language Server. \
             Would you like to install one using `cargo install`?",
        )
        .await;
        if !wants_install {
            tracing::info!("user declined server install");
            return None;
        }

        if self.installer.install(host).await {
            Some(candidate)
        } else {
            host.show_error(
                "Failed to install Tern Language Server. Please either run \
                 `cargo install tern-language-server`, or set a custom path using \
                 the `server_path` configuration.",
            );
            None
        }
    }

    /// The directory `cargo install` places binaries in:
    /// `CARGO_INSTALL_ROOT`, then `CARGO_HOME/bin`, then `<home>/.cargo/bin`.
    fn cargo_bin_directory(&self) -> Option<PathBuf> {
        if let Some(root) = (self.env)("CARGO_INSTALL_ROOT") {
            return Some(PathBuf::from(root));
        }
        if let Some(cargo_home) = (self.env)("CARGO_HOME") {
            return Some(Path::new(&cargo_home).join("bin"));
        }
        if let Some(home) = (self.env)(self.platform.home_var()) {
            return Some(Path::new(&home).join(".cargo").join("bin"));
        }
        tracing::warn!("could not find cargo bin directory");
        None
    }
}

/// Final existence check before a resolved path is used.
pub async fn check_validity(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

fn resolve_against(base: &Path, raw: &str) -> PathBuf {
    let raw = Path::new(raw);
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        base.join(raw)
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
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
    use std::collections::HashMap;

    use crate::testutil::ScriptedHost;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> EnvLookup {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Box::new(move |key| map.get(key).cloned())
    }

    fn resolver_with_env(pairs: &[(&str, &str)]) -> Resolver {
        Resolver::with_parts(
            Platform::unix(),
            env_from(pairs),
            Installer::with_command(Platform::unix(), "exit 1"),
        )
    }

    fn folder(root: &Path) -> Vec<WorkspaceFolder> {
        vec![WorkspaceFolder::new(root.to_path_buf())]
    }

    #[test]
    fn install_root_wins_over_cargo_home_and_home() {
        let resolver = resolver_with_env(&[
            ("CARGO_INSTALL_ROOT", "/opt/cargo-bin"),
            ("CARGO_HOME", "/opt/cargo"),
            ("HOME", "/home/dev"),
        ]);
        assert_eq!(
            resolver.cargo_bin_directory(),
            Some(PathBuf::from("/opt/cargo-bin"))
        );
    }

    #[test]
    fn cargo_home_gets_bin_appended() {
        let resolver = resolver_with_env(&[("CARGO_HOME", "/opt/cargo"), ("HOME", "/home/dev")]);
        assert_eq!(
            resolver.cargo_bin_directory(),
            Some(PathBuf::from("/opt/cargo/bin"))
        );
    }

    #[test]
    fn home_gets_dot_cargo_bin_appended() {
        let resolver = resolver_with_env(&[("HOME", "/home/dev")]);
        assert_eq!(
            resolver.cargo_bin_directory(),
            Some(PathBuf::from("/home/dev/.cargo/bin"))
        );
    }

    #[test]
    fn no_env_means_no_bin_directory() {
        let resolver = resolver_with_env(&[]);
        assert_eq!(resolver.cargo_bin_directory(), None);
    }

    #[tokio::test]
    async fn custom_path_returned_without_existence_check() {
        let resolver = resolver_with_env(&[]);
        let host = ScriptedHost::declining();
        let settings = Settings {
            server_path: Some("/does/not/exist/tern-language-server".to_string()),
            check_for_updates: true,
        };

        let path = resolver
            .resolve(&settings, &folder(Path::new("/work/grammar")), &host)
            .await;
        assert_eq!(
            path,
            Some(PathBuf::from("/does/not/exist/tern-language-server"))
        );
        assert_eq!(host.prompt_count(), 0);
    }

    #[tokio::test]
    async fn relative_custom_path_resolves_against_first_folder() {
        let resolver = resolver_with_env(&[]);
        let host = ScriptedHost::declining();
        let settings = Settings {
            server_path: Some("bin/../tools/tern-language-server".to_string()),
            check_for_updates: true,
        };

        let path = resolver
            .resolve(&settings, &folder(Path::new("/work/grammar")), &host)
            .await;
        assert_eq!(
            path,
            Some(PathBuf::from("/work/grammar/tools/tern-language-server"))
        );
    }

    #[tokio::test]
    async fn custom_path_without_folders_falls_through_to_default_chain() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("tern-language-server");
        std::fs::write(&binary, b"").unwrap();

        let install_root = dir.path().to_str().unwrap().to_string();
        let resolver = resolver_with_env(&[("CARGO_INSTALL_ROOT", &install_root)]);
        let host = ScriptedHost::declining();
        let settings = Settings {
            server_path: Some("custom/tern-language-server".to_string()),
            check_for_updates: true,
        };

        let path = resolver.resolve(&settings, &[], &host).await;
        assert_eq!(path, Some(binary));
    }

    #[tokio::test]
    async fn existing_default_binary_resolves_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("tern-language-server");
        std::fs::write(&binary, b"").unwrap();

        let install_root = dir.path().to_str().unwrap().to_string();
        let resolver = resolver_with_env(&[("CARGO_INSTALL_ROOT", &install_root)]);
        let host = ScriptedHost::declining();

        let path = resolver.resolve(&Settings::default(), &[], &host).await;
        assert_eq!(path, Some(binary));
        assert_eq!(host.prompt_count(), 0);
    }

    #[tokio::test]
    async fn declined_install_fails_resolution_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let install_root = dir.path().to_str().unwrap().to_string();

        let resolver = Resolver::with_parts(
            Platform::unix(),
            env_from(&[("CARGO_INSTALL_ROOT", &install_root)]),
            Installer::with_command(
                Platform::unix(),
                format!("touch {}", marker.display()),
            ),
        );
        let host = ScriptedHost::declining();

        let path = resolver.resolve(&Settings::default(), &[], &host).await;
        assert_eq!(path, None);
        assert_eq!(host.prompt_count(), 1);
        assert!(!marker.exists(), "declined install must not spawn anything");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn accepted_install_success_returns_candidate_path() {
        let dir = tempfile::tempdir().unwrap();
        let install_root = dir.path().to_str().unwrap().to_string();

        let resolver = Resolver::with_parts(
            Platform::unix(),
            env_from(&[("CARGO_INSTALL_ROOT", &install_root)]),
            Installer::with_command(Platform::unix(), "exit 0"),
        );
        let host = ScriptedHost::accepting();

        let path = resolver.resolve(&Settings::default(), &[], &host).await;
        assert_eq!(path, Some(dir.path().join("tern-language-server")));
        assert_eq!(host.error_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn accepted_install_failure_shows_one_error_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let install_root = dir.path().to_str().unwrap().to_string();

        let resolver = Resolver::with_parts(
            Platform::unix(),
            env_from(&[("CARGO_INSTALL_ROOT", &install_root)]),
            Installer::with_command(Platform::unix(), "exit 1"),
        );
        let host = ScriptedHost::accepting();

        let path = resolver.resolve(&Settings::default(), &[], &host).await;
        assert_eq!(path, None);
        assert_eq!(host.error_count(), 1);
        let errors = host.errors.lock().unwrap();
        assert!(errors[0].contains("cargo install tern-language-server"));
        assert!(errors[0].contains("server_path"));
    }

    #[tokio::test]
    async fn check_validity_tracks_existence() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present");
        std::fs::write(&present, b"").unwrap();

        assert!(check_validity(&present).await);
        assert!(!check_validity(&dir.path().join("absent")).await);
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }
}
