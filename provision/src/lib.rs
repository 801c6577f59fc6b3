//! Provisioning for the Tern language server binary.
//!
//! Three collaborating pieces, used by the fleet before it spawns a
//! workspace client:
//!
//! - [`Resolver`] computes the path of the `tern-language-server`
//!   executable from configuration and environment, offering to install
//!   it when nothing is found.
//! - [`Installer`] runs `cargo install tern-language-server` through the
//!   platform shell under a cancellable progress scope.
//! - [`UpdateChecker`] compares the installed binary's `--version` output
//!   against the latest version published on crates.io.
//!
//! All user interaction goes through the [`Host`](tern_host::Host) seam,
//! so the same flow drives an editor dialog or a terminal prompt.

mod install;
mod platform;
mod process;
mod resolver;
#[cfg(test)]
mod testutil;
mod updates;

pub use install::Installer;
pub use platform::{INSTALL_COMMAND, Platform, SERVER_CRATE};
pub use resolver::{EnvLookup, Resolver, check_validity};
pub use updates::{UPDATE_CHECK_TIMEOUT, UpdateChecker};
