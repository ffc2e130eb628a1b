//! Mount path blocklists.
//!
//! These protect against misconfiguration (mounting `/etc` or the Docker
//! socket, shadowing system directories in the container), not against the
//! agent itself, which has a full shell inside the sandbox.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Blocklist of exact paths plus path prefixes
///
/// A prefix blocks itself and everything below it, compared by path
/// component so `/usr` blocks `/usr/bin` but not `/usrdata`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPolicy {
    exact: BTreeSet<PathBuf>,
    prefixes: Vec<PathBuf>,
}

impl PathPolicy {
    /// Build a policy from exact paths and prefixes
    #[must_use]
    pub fn new<E, P>(exact: E, prefixes: P) -> Self
    where
        E: IntoIterator,
        E::Item: Into<PathBuf>,
        P: IntoIterator,
        P::Item: Into<PathBuf>,
    {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// True if `path` equals an exact entry or lies under a prefix
    #[must_use]
    pub fn blocks(&self, path: &Path) -> bool {
        self.exact.contains(path) || self.prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// Host paths that must never be bind-mounted.
///
/// `/private/etc` is listed because macOS resolves `/etc` there. `/var` is
/// not a prefix: the socket is matched exactly and `/var/folders` is the
/// macOS temp directory.
pub(crate) static HOST_POLICY: LazyLock<PathPolicy> = LazyLock::new(|| {
    PathPolicy::new(
        ["/var/run/docker.sock", "/run/docker.sock"],
        ["/etc", "/private/etc", "/proc", "/sys"],
    )
});

/// Container paths user mounts must not overwrite.
pub(crate) static CONTAINER_POLICY: LazyLock<PathPolicy> = LazyLock::new(|| {
    PathPolicy::new(
        ["/", "/root", "/root/.ssh"],
        ["/bin", "/etc", "/lib", "/lib64", "/proc", "/sbin", "/sys", "/usr"],
    )
});

/// Host directory names that hold secrets, refused regardless of location.
///
/// Best-effort: a renamed or nested secret store is not caught.
pub(crate) const SECRET_DIR_NAMES: [&str; 4] = [".gnupg", ".aws", ".azure", ".config"];
