//! Platform-dependent names, resolved once instead of branching inline.

/// The crates.io package (and binary) name of the analysis engine.
pub const SERVER_CRATE: &str = "tern-language-server";

/// The fixed install command line. Never built from user input.
pub const INSTALL_COMMAND: &str = "cargo install tern-language-server";

/// Per-platform table: home variable, executable suffix, shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    home_var: &'static str,
    exe_suffix: &'static str,
    shell: &'static str,
    shell_arg: &'static str,
}

impl Platform {
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else {
            Self::unix()
        }
    }

    #[must_use]
    pub const fn unix() -> Self {
        Self {
            home_var: "HOME",
            exe_suffix: "",
            shell: "sh",
            shell_arg: "-c",
        }
    }

    #[must_use]
    pub const fn windows() -> Self {
        Self {
            home_var: "USERPROFILE",
            exe_suffix: ".exe",
            shell: "cmd",
            shell_arg: "/C",
        }
    }

    /// Environment variable holding the user's home directory.
    #[must_use]
    pub const fn home_var(&self) -> &'static str {
        self.home_var
    }

    /// Expected file name of the server binary in the cargo bin directory.
    #[must_use]
    pub fn binary_name(&self) -> String {
        format!("{SERVER_CRATE}{}", self.exe_suffix)
    }

    #[must_use]
    pub const fn shell(&self) -> &'static str {
        self.shell
    }

    #[must_use]
    pub const fn shell_arg(&self) -> &'static str {
        self.shell_arg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_table() {
        let platform = Platform::unix();
        assert_eq!(platform.home_var(), "HOME");
        assert_eq!(platform.binary_name(), "tern-language-server");
        assert_eq!(platform.shell(), "sh");
        assert_eq!(platform.shell_arg(), "-c");
    }

    #[test]
    fn windows_table() {
        let platform = Platform::windows();
        assert_eq!(platform.home_var(), "USERPROFILE");
        assert_eq!(platform.binary_name(), "tern-language-server.exe");
        assert_eq!(platform.shell(), "cmd");
        assert_eq!(platform.shell_arg(), "/C");
    }

    #[test]
    fn current_matches_compile_target() {
        let platform = Platform::current();
        if cfg!(windows) {
            assert_eq!(platform, Platform::windows());
        } else {
            assert_eq!(platform, Platform::unix());
        }
    }
}
