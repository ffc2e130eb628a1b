//! Host to sandbox config sync.
//!
//! Each tool's host config dir is mirrored into `<host dir>/sandbox`, and
//! that mirror, never the live host dir, is what gets bind-mounted. The
//! mirror outlives sessions and is synchronized in place on every refresh.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::agents::{agent_config_mounts, AgentConfigMount, HOME_SEEDS_DIR_NAME};
use super::credentials::{platform_extractor, CredentialExtractor};
use super::error::SyncError;
use super::fsutil::{
    copy_dir_recursive, copy_file, create_private_dir, ensure_real_dir, overwrite_private_file,
    resolve_and_validate_symlink, write_private_file,
};
use super::options::{ContainerOption, VolumeMount};
use crate::config::CONTAINER_HOME;

/// Why a tool got no mounts during a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The tool's host config dir does not exist
    MissingHostDir,
    /// Syncing failed; holds the error message
    SyncFailed(String),
}

/// A tool left out of a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTool {
    /// Host-relative config dir of the tool, e.g. `.codex`
    pub tool: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// Result of [`SandboxSync::refresh_agent_configs`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Sandbox dir mounts, one per synced tool
    pub bind_mounts: Vec<VolumeMount>,
    /// Home-level seed file mounts
    pub home_mounts: Vec<VolumeMount>,
    /// Tools that produced no mounts
    pub skipped: Vec<SkippedTool>,
}

impl From<RefreshOutcome> for ContainerOption {
    fn from(outcome: RefreshOutcome) -> Self {
        Self::AgentConfigs {
            bind_mounts: outcome.bind_mounts,
            home_mounts: outcome.home_mounts,
        }
    }
}

/// Sync engine over a fixed set of tool definitions
#[derive(Clone)]
pub struct SandboxSync {
    mounts: Vec<AgentConfigMount>,
    extractor: Arc<dyn CredentialExtractor>,
}

impl fmt::Debug for SandboxSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxSync")
            .field("mounts", &self.mounts)
            .finish_non_exhaustive()
    }
}

impl SandboxSync {
    /// Engine over custom tool definitions
    #[must_use]
    pub fn new(mounts: Vec<AgentConfigMount>, extractor: Arc<dyn CredentialExtractor>) -> Self {
        Self { mounts, extractor }
    }

    /// Engine over the built-in registry with the running platform's extractor
    #[must_use]
    pub fn for_platform() -> Self {
        Self::new(agent_config_mounts(), platform_extractor())
    }

    /// Tool definitions this engine syncs
    #[must_use]
    pub fn mounts(&self) -> &[AgentConfigMount] {
        &self.mounts
    }

    /// Sync one tool's host config into its sandbox dir and return that dir.
    ///
    /// Entry-level problems (broken or escaping symlinks, failed copies, a
    /// failed credential extraction) are logged and skipped.
    ///
    /// # Errors
    ///
    /// Fails only if the sandbox dir cannot be created or the host dir
    /// exists but cannot be listed.
    pub fn sync_agent_config(
        &self,
        home: &Path,
        mount: &AgentConfigMount,
    ) -> Result<PathBuf, SyncError> {
        let host_dir = mount.host_dir(home);
        let sandbox_dir = mount.sandbox_dir(home);

        create_private_dir(&sandbox_dir).map_err(|source| SyncError::CreateDir {
            path: sandbox_dir.clone(),
            source,
        })?;

        // Write-once: the container may have accumulated state in these.
        for (name, content) in mount.seed_files() {
            let dest = sandbox_dir.join(name);
            if dest.symlink_metadata().is_ok() {
                continue;
            }
            if let Err(source) = write_private_file(&dest, content.as_bytes()) {
                let e = SyncError::Write { path: dest, source };
                warn!(file = %name, error = %e, "Writing seed file");
            }
        }

        let entries = match fs::read_dir(&host_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(sandbox_dir),
            Err(source) => {
                return Err(SyncError::ReadDir {
                    path: host_dir,
                    source,
                })
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %host_dir.display(), error = %e, "Reading host dir entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if mount.skip_entries().contains(&name) {
                continue;
            }
            sync_entry(mount, &host_dir, &sandbox_dir, &entry.path(), &name);
        }

        if let Some(keychain) = mount.keychain_credential() {
            let dest = sandbox_dir.join(keychain.filename());
            if let Err(e) = self.extractor.extract(keychain.service(), &dest) {
                warn!(service = keychain.service(), error = %e, "Extracting keychain credential");
            }
        }

        Ok(sandbox_dir)
    }

    /// Sync every tool whose host dir exists and collect its mounts.
    ///
    /// Never fails as a whole: a tool that cannot be synced is recorded in
    /// [`RefreshOutcome::skipped`] and the rest proceed. Home seed files are
    /// rewritten on every call since agents may clobber them mid-session.
    #[instrument(skip_all, fields(home = %home.display()))]
    pub fn refresh_agent_configs(&self, home: &Path, container_home: &str) -> RefreshOutcome {
        let container_home = if container_home.is_empty() {
            CONTAINER_HOME
        } else {
            container_home
        };
        let mut outcome = RefreshOutcome::default();

        for mount in &self.mounts {
            let host_dir = mount.host_dir(home);
            if fs::metadata(&host_dir).is_err() {
                debug!(dir = %host_dir.display(), "Host config dir missing, skipping");
                outcome.skipped.push(SkippedTool {
                    tool: mount.host_rel().to_string(),
                    reason: SkipReason::MissingHostDir,
                });
                continue;
            }

            let sandbox_dir = match self.sync_agent_config(home, mount) {
                Ok(dir) => dir,
                Err(e) => {
                    warn!(tool = mount.host_rel(), error = %e, "Sandbox sync failed, skipping");
                    outcome.skipped.push(SkippedTool {
                        tool: mount.host_rel().to_string(),
                        reason: SkipReason::SyncFailed(e.to_string()),
                    });
                    continue;
                }
            };

            outcome.bind_mounts.push(VolumeMount::new(
                &sandbox_dir,
                mount.container_path(container_home),
                false,
            ));
            write_home_seeds(mount, &sandbox_dir, container_home, &mut outcome.home_mounts);
        }

        outcome
    }

    /// Delete credential files extracted from the Keychain.
    ///
    /// Called at session teardown; missing files are fine.
    pub fn cleanup_keychain_credentials(&self, home: &Path) {
        for mount in &self.mounts {
            let Some(keychain) = mount.keychain_credential() else {
                continue;
            };
            let path = mount.sandbox_dir(home).join(keychain.filename());
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed keychain credential file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Removing keychain credential file"),
            }
        }
    }
}

fn sync_entry(
    mount: &AgentConfigMount,
    host_dir: &Path,
    sandbox_dir: &Path,
    src: &Path,
    name: &str,
) {
    let resolved = match resolve_and_validate_symlink(src, host_dir) {
        Ok(p) => p,
        Err(e) => {
            warn!(path = %src.display(), error = %e, "Skipping entry");
            return;
        }
    };
    let meta = match fs::metadata(&resolved) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %src.display(), error = %e, "Skipping entry (cannot stat)");
            return;
        }
    };

    let dest = sandbox_dir.join(name);
    if meta.is_dir() {
        if mount.copy_dirs().iter().any(|d| d == name) {
            if let Err(e) = copy_dir_recursive(&resolved, &dest) {
                warn!(src = %resolved.display(), error = %e, "Copying directory");
            }
        }
        return;
    }

    let preserved = mount.preserve_files().iter().any(|f| f == name);
    if preserved && dest.symlink_metadata().is_ok() {
        return;
    }
    if let Err(e) = copy_file(&resolved, &dest) {
        warn!(src = %resolved.display(), error = %e, "Copying file");
    }
}

/// Home seeds live in their own subdirectory so they cannot collide with
/// host config files of the same name.
fn write_home_seeds(
    mount: &AgentConfigMount,
    sandbox_dir: &Path,
    container_home: &str,
    out: &mut Vec<VolumeMount>,
) {
    if mount.home_seed_files().is_empty() {
        return;
    }
    // The sandbox dir is writable from the container; the seed dir may
    // have been swapped for a symlink since the last refresh.
    let seed_dir = sandbox_dir.join(HOME_SEEDS_DIR_NAME);
    if let Err(source) = ensure_real_dir(&seed_dir) {
        let e = SyncError::CreateDir {
            path: seed_dir,
            source,
        };
        warn!(error = %e, "Creating home seed dir");
        return;
    }
    for (name, content) in mount.home_seed_files() {
        let seed_path = seed_dir.join(name);
        if let Err(source) = overwrite_private_file(&seed_path, content.as_bytes()) {
            let e = SyncError::Write {
                path: seed_path,
                source,
            };
            warn!(file = %name, error = %e, "Writing home seed file");
            continue;
        }
        out.push(VolumeMount::new(
            seed_path,
            format!("{container_home}/{name}"),
            false,
        ));
    }
}

/// Sync one tool with the platform extractor
///
/// # Errors
///
/// See [`SandboxSync::sync_agent_config`].
pub fn sync_agent_config(home: &Path, mount: &AgentConfigMount) -> Result<PathBuf, SyncError> {
    SandboxSync::new(Vec::new(), platform_extractor()).sync_agent_config(home, mount)
}

/// Sync all built-in tools; see [`SandboxSync::refresh_agent_configs`]
#[must_use]
pub fn refresh_agent_configs(home: &Path, container_home: &str) -> RefreshOutcome {
    SandboxSync::for_platform().refresh_agent_configs(home, container_home)
}

/// Remove extracted credentials of built-in tools
pub fn cleanup_keychain_credentials(home: &Path) {
    SandboxSync::for_platform().cleanup_keychain_credentials(home);
}
