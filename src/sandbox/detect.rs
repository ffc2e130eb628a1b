//! Docker availability detection.

use std::time::Duration;
use tracing::{debug, instrument};

use super::container::DockerCli;
use super::error::DockerError;
use crate::config::DAEMON_CHECK_TIMEOUT_SECS;

impl DockerCli {
    /// Check if the CLI binary is on `PATH`
    #[must_use]
    pub fn is_available(&self) -> bool {
        which::which(self.program()).is_ok()
    }

    /// Check if the daemon answers `docker info`
    ///
    /// Bounded by a 5 second timeout on top of whatever deadline the caller
    /// applies, so callers without one cannot hang on a wedged daemon.
    #[instrument(skip(self))]
    pub async fn is_daemon_running(&self) -> bool {
        let args = ["info", "--format", "{{.ServerVersion}}"].map(String::from);
        let probe = tokio::time::timeout(
            Duration::from_secs(DAEMON_CHECK_TIMEOUT_SECS),
            self.runner().run(self.program(), &args),
        )
        .await;

        match probe {
            Ok(Ok(out)) if out.success() => !out.stdout.trim().is_empty(),
            Ok(Ok(out)) => {
                debug!(code = out.code, "docker info failed");
                false
            }
            Ok(Err(e)) => {
                debug!(error = %e, "docker info could not be run");
                false
            }
            Err(_) => {
                debug!(timeout_secs = DAEMON_CHECK_TIMEOUT_SECS, "docker info timed out");
                false
            }
        }
    }

    /// Verify both the CLI and the daemon are usable
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::NotAvailable`] without probing the daemon when
    /// the CLI is missing, and [`DockerError::DaemonNotRunning`] otherwise.
    pub async fn check_availability(&self) -> Result<(), DockerError> {
        if !self.is_available() {
            return Err(DockerError::NotAvailable);
        }
        if !self.is_daemon_running().await {
            return Err(DockerError::DaemonNotRunning);
        }
        Ok(())
    }
}

/// Check if the docker CLI is installed and in `PATH`
#[must_use]
pub fn is_docker_available() -> bool {
    DockerCli::system().is_available()
}

/// Check if the docker daemon is responsive
pub async fn is_daemon_running() -> bool {
    DockerCli::system().is_daemon_running().await
}

/// Verify docker is ready for use
///
/// # Errors
///
/// See [`DockerCli::check_availability`].
pub async fn check_availability() -> Result<(), DockerError> {
    DockerCli::system().check_availability().await
}
