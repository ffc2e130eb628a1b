//! Configuration and settings management
//!
//! Loads sandbox settings from an optional config file and environment
//! variables, and defines the container constants shared by the sandbox module.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::sandbox::ContainerOption;

/// Sandbox image used when none is configured.
///
/// Built locally (`docker build -t agent-deck-sandbox sandbox/`); pin a tag
/// through [`SandboxSettings::image`] for reproducibility.
pub const DEFAULT_SANDBOX_IMAGE: &str = "agent-deck-sandbox:latest";

/// Home directory inside the container for the default (root) image.
pub const CONTAINER_HOME: &str = "/root";

/// Project mount point and default working directory inside the container.
pub const CONTAINER_WORK_DIR: &str = "/workspace";

/// Name prefix of every managed container.
pub const CONTAINER_NAME_PREFIX: &str = "agent-deck-";

/// Label attached to every managed container; enumeration filters on it.
pub const MANAGED_LABEL: &str = "managed-by=agent-deck";

/// Process limit applied to every container (fork-bomb guard).
pub const SANDBOX_PIDS_LIMIT: u32 = 4096;

/// Upper bound for the daemon health probe, layered on the caller's own deadline.
pub const DAEMON_CHECK_TIMEOUT_SECS: u64 = 5;

/// Writable tmpfs for `/tmp` on the read-only root filesystem.
pub const TMPFS_TMP: &str = "/tmp:rw,noexec,nosuid,size=256m";

/// Writable tmpfs for `/var/tmp`.
pub const TMPFS_VAR_TMP: &str = "/var/tmp:rw,noexec,nosuid,size=128m";

/// Mount options for the npm cache tmpfs under the container home.
pub const TMPFS_NPM_OPTS: &str = "rw,nosuid,size=256m";

/// Mount options for the general cache tmpfs under the container home.
pub const TMPFS_CACHE_OPTS: &str = "rw,nosuid,size=512m";

/// Environment variable prefix for settings overrides.
const ENV_PREFIX: &str = "AGENT_DECK_SANDBOX";

/// User-facing sandbox settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxSettings {
    /// Docker image for new containers (empty means [`DEFAULT_SANDBOX_IMAGE`])
    pub image: String,
    /// CPU quota passed to `--cpus` (e.g. "2.0")
    pub cpu_limit: String,
    /// Memory cap passed to `--memory` (e.g. "4g")
    pub memory_limit: String,
    /// Mount the host `~/.ssh` read-only
    pub mount_ssh: bool,
    /// Mount the host `~/.gitconfig` read-only
    pub mount_gitconfig: bool,
    /// Home directory inside the image, for non-root images
    pub container_home: String,
    /// Workspace subdirectories shadowed by anonymous volumes (e.g. `node_modules`)
    pub volume_ignores: Vec<String>,
    /// Static environment for the container
    pub environment: BTreeMap<String, String>,
    /// Additional bind mounts, host path to container path
    pub extra_volumes: BTreeMap<String, String>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            image: String::new(),
            cpu_limit: String::new(),
            memory_limit: String::new(),
            mount_ssh: false,
            mount_gitconfig: true,
            container_home: String::new(),
            volume_ignores: Vec::new(),
            environment: BTreeMap::new(),
            extra_volumes: BTreeMap::new(),
        }
    }
}

impl SandboxSettings {
    /// Load settings from `config/sandbox.*` and `AGENT_DECK_SANDBOX_*` variables
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use agent_deck_sandbox::config::SandboxSettings;
    ///
    /// let settings = SandboxSettings::load().expect("Failed to load sandbox settings");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a source cannot be read or deserialized.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // Optional file, any format the config crate understands
            .add_source(File::with_name("config/sandbox").required(false))
            // Eg.. `AGENT_DECK_SANDBOX_CPU_LIMIT=2.0` sets `cpu_limit`
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("volume_ignores")
                    .try_parsing(true)
                    .ignore_empty(true),
            );
        Self::from_sources(builder)
    }

    /// Deserialize settings from an already assembled builder
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if building or deserialization fails.
    pub fn from_sources(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Self = builder.build()?.try_deserialize()?;
        debug!(
            image = %settings.image_or_default(),
            extra_volumes = settings.extra_volumes.len(),
            volume_ignores = settings.volume_ignores.len(),
            "Sandbox settings loaded"
        );
        Ok(settings)
    }

    /// Configured image, falling back to [`DEFAULT_SANDBOX_IMAGE`]
    #[must_use]
    pub fn image_or_default(&self) -> &str {
        if self.image.is_empty() {
            DEFAULT_SANDBOX_IMAGE
        } else {
            &self.image
        }
    }

    /// Translate settings into container options
    ///
    /// `host_home` is the host user's home; `.gitconfig` and `.ssh` are only
    /// mounted when enabled and present there.
    #[must_use]
    pub fn container_options(&self, host_home: &Path) -> Vec<ContainerOption> {
        let mut opts = Vec::new();

        // Home must come first so the git/ssh targets land under it.
        if !self.container_home.is_empty() {
            opts.push(ContainerOption::ContainerHome(self.container_home.clone()));
        }

        if self.mount_gitconfig {
            let gitconfig = host_home.join(".gitconfig");
            if gitconfig.is_file() {
                opts.push(ContainerOption::GitConfig(gitconfig));
            }
        }

        if self.mount_ssh {
            let ssh = host_home.join(".ssh");
            if ssh.is_dir() {
                opts.push(ContainerOption::Ssh(ssh));
            }
        }

        if !self.volume_ignores.is_empty() {
            opts.push(ContainerOption::VolumeIgnores(self.volume_ignores.clone()));
        }
        if !self.extra_volumes.is_empty() {
            opts.push(ContainerOption::ExtraVolumes(self.extra_volumes.clone()));
        }
        if !self.cpu_limit.is_empty() {
            opts.push(ContainerOption::CpuLimit(self.cpu_limit.clone()));
        }
        if !self.memory_limit.is_empty() {
            opts.push(ContainerOption::MemoryLimit(self.memory_limit.clone()));
        }
        if !self.environment.is_empty() {
            opts.push(ContainerOption::Environment(self.environment.clone()));
        }

        opts
    }
}
