//! Error types for container lifecycle, sandbox sync and credential extraction.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from docker CLI operations
#[derive(Debug, Error)]
pub enum DockerError {
    /// The docker CLI is not on `PATH`
    #[error("docker CLI is not installed or not in PATH")]
    NotAvailable,
    /// The CLI is present but the daemon does not answer
    #[error("docker daemon is not running; start Docker and try again")]
    DaemonNotRunning,
    /// The request cannot be sent to docker as given
    #[error("cannot create container {name}: {reason}")]
    InvalidConfig {
        /// Container name
        name: String,
        /// What is missing
        reason: &'static str,
    },
    /// The CLI ran and exited non-zero
    #[error("{action} {target}: {output} (exit status {code})")]
    Exit {
        /// Operation, e.g. "creating container"
        action: &'static str,
        /// Container or image the operation targeted
        target: String,
        /// Trimmed combined output of the CLI
        output: String,
        /// Exit code, -1 when terminated by a signal
        code: i32,
    },
    /// The CLI could not be run at all
    #[error("{action} {target}: {source}")]
    Spawn {
        /// Operation, e.g. "inspecting container"
        action: &'static str,
        /// Container or image the operation targeted
        target: String,
        /// Underlying process error
        #[source]
        source: io::Error,
    },
}

impl DockerError {
    /// True when docker itself reported the failure through its exit status
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(self, Self::Exit { .. })
    }
}

/// Errors from host-to-sandbox config sync
#[derive(Debug, Error)]
pub enum SyncError {
    /// Sandbox directory could not be created
    #[error("creating sandbox dir {}: {source}", path.display())]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// Host directory exists but could not be listed
    #[error("reading host dir {}: {source}", path.display())]
    ReadDir {
        /// Directory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// Symlink evaluation failed (broken link or missing path)
    #[error("cannot resolve {}: {source}", path.display())]
    Unresolvable {
        /// Path that was evaluated
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// Resolved target lies outside the permitted tree
    #[error(
        "symlink {} resolves outside boundary {} to {}",
        path.display(),
        boundary.display(),
        resolved.display()
    )]
    OutsideBoundary {
        /// Path that was evaluated
        path: PathBuf,
        /// Directory the target had to stay within
        boundary: PathBuf,
        /// Where the path actually resolved
        resolved: PathBuf,
    },
    /// File copy failed
    #[error("copying {} to {}: {source}", src.display(), dst.display())]
    Copy {
        /// Source path
        src: PathBuf,
        /// Destination path
        dst: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// Seed or credential file could not be written
    #[error("writing {}: {source}", path.display())]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Errors from platform credential extraction
///
/// Never carries the output of the credential store, which may contain
/// secret material.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The credential tool could not be run
    #[error("running credential lookup for service {service}: {source}")]
    Spawn {
        /// Keychain service name
        service: String,
        /// Underlying process error
        #[source]
        source: io::Error,
    },
    /// The keychain lookup failed for a reason other than a missing entry
    #[error("reading keychain service {service}: security exited with status {code}")]
    Keychain {
        /// Keychain service name
        service: String,
        /// Exit code, -1 when terminated by a signal
        code: i32,
    },
    /// The extracted credential could not be written
    #[error("writing credential file {}: {source}", path.display())]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}
