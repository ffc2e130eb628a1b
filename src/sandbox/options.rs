//! Container configuration assembly.
//!
//! A [`ContainerConfig`] is built once from a project path and an ordered
//! list of [`ContainerOption`]s. Fields are private so a config can only be
//! produced through [`ContainerConfig::new`], which always finishes by
//! forcing `IS_SANDBOX=1`.

use path_clean::PathClean;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::policy::{CONTAINER_POLICY, HOST_POLICY, SECRET_DIR_NAMES};
use crate::config::{CONTAINER_HOME, CONTAINER_WORK_DIR};

/// A single bind mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    host_path: PathBuf,
    container_path: String,
    read_only: bool,
}

impl VolumeMount {
    pub(crate) fn new(
        host_path: impl Into<PathBuf>,
        container_path: impl Into<String>,
        read_only: bool,
    ) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only,
        }
    }

    /// Source path on the host
    #[must_use]
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    /// Target path inside the container
    #[must_use]
    pub fn container_path(&self) -> &str {
        &self.container_path
    }

    /// Whether the mount is read-only
    #[must_use]
    pub const fn read_only(&self) -> bool {
        self.read_only
    }

    /// `host:container[:ro]` as passed to `docker create -v`
    #[must_use]
    pub fn to_bind_spec(&self) -> String {
        let mut spec = format!("{}:{}", self.host_path.display(), self.container_path);
        if self.read_only {
            spec.push_str(":ro");
        }
        spec
    }
}

/// One customization applied by [`ContainerConfig::new`], in caller order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerOption {
    /// Home directory inside the image (non-root images); affects later git/SSH targets
    ContainerHome(String),
    /// Host gitconfig file, mounted read-only at `<home>/.gitconfig`
    GitConfig(PathBuf),
    /// Host SSH directory, mounted read-only at `<home>/.ssh`
    Ssh(PathBuf),
    /// Workspace subdirectory names shadowed by anonymous volumes
    VolumeIgnores(Vec<String>),
    /// Mount the whole repository and work inside one of its worktrees
    Worktree {
        /// Absolute host path of the repository root
        repo_root: PathBuf,
        /// Worktree path relative to `repo_root`
        relative_path: String,
    },
    /// User-configured bind mounts, host path to container path
    ExtraVolumes(BTreeMap<String, String>),
    /// CPU quota for `--cpus`
    CpuLimit(String),
    /// Memory cap for `--memory`
    MemoryLimit(String),
    /// Environment merged into the container's
    Environment(BTreeMap<String, String>),
    /// Mounts produced by the sandbox sync engine
    AgentConfigs {
        /// Tool config directory mounts
        bind_mounts: Vec<VolumeMount>,
        /// Home-level seed file mounts
        home_mounts: Vec<VolumeMount>,
    },
}

/// Settings for container creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    working_dir: String,
    container_home: String,
    volumes: Vec<VolumeMount>,
    anonymous_volumes: Vec<String>,
    environment: BTreeMap<String, String>,
    cpu_limit: String,
    memory_limit: String,
}

impl ContainerConfig {
    /// Build a config mounting `project_path` at `/workspace`
    ///
    /// Options are applied in order. `IS_SANDBOX=1` is set afterwards and
    /// cannot be overridden by any option.
    #[must_use]
    pub fn new<P, I>(project_path: P, opts: I) -> Self
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = ContainerOption>,
    {
        let project_path = project_path.as_ref();
        let mut cfg = Self {
            working_dir: CONTAINER_WORK_DIR.to_string(),
            container_home: CONTAINER_HOME.to_string(),
            volumes: Vec::new(),
            anonymous_volumes: Vec::new(),
            environment: BTreeMap::new(),
            cpu_limit: String::new(),
            memory_limit: String::new(),
        };

        if project_path.as_os_str().is_empty() {
            warn!("Container config built with empty project path; /workspace not mounted");
        } else {
            cfg.volumes
                .push(VolumeMount::new(project_path, CONTAINER_WORK_DIR, false));
        }

        for opt in opts {
            cfg.apply(opt);
        }

        // Lets agents run unattended inside the container; always last.
        cfg.environment
            .insert("IS_SANDBOX".to_string(), "1".to_string());
        cfg
    }

    fn apply(&mut self, opt: ContainerOption) {
        match opt {
            ContainerOption::ContainerHome(home) => {
                if !home.is_empty() {
                    self.container_home = home;
                }
            }
            ContainerOption::GitConfig(path) => self.mount_home_read_only(path, ".gitconfig"),
            ContainerOption::Ssh(path) => self.mount_home_read_only(path, ".ssh"),
            ContainerOption::VolumeIgnores(dirs) => {
                for dir in dirs {
                    if dir.is_empty() || dir.contains("..") || dir.contains(['/', '\\']) {
                        debug!(dir = %dir, "Ignoring invalid volume ignore entry");
                        continue;
                    }
                    self.anonymous_volumes
                        .push(format!("{CONTAINER_WORK_DIR}/{dir}"));
                }
            }
            ContainerOption::Worktree {
                repo_root,
                relative_path,
            } => self.mount_worktree(repo_root, &relative_path),
            ContainerOption::ExtraVolumes(volumes) => {
                for (host, container) in &volumes {
                    match validate_extra_volume(host, container) {
                        Ok(mount) => self.volumes.push(mount),
                        Err(reason) => {
                            warn!(host = %host, container = %container, reason, "Skipping extra volume");
                        }
                    }
                }
            }
            ContainerOption::CpuLimit(limit) => {
                if !limit.is_empty() {
                    self.cpu_limit = limit;
                }
            }
            ContainerOption::MemoryLimit(limit) => {
                if !limit.is_empty() {
                    self.memory_limit = limit;
                }
            }
            ContainerOption::Environment(env) => self.environment.extend(env),
            ContainerOption::AgentConfigs {
                bind_mounts,
                home_mounts,
            } => {
                self.volumes.extend(bind_mounts);
                self.volumes.extend(home_mounts);
            }
        }
    }

    fn mount_home_read_only(&mut self, path: PathBuf, name: &str) {
        if path.as_os_str().is_empty() {
            return;
        }
        let target = format!("{}/{name}", self.container_home);
        self.volumes.push(VolumeMount::new(path, target, true));
    }

    /// Worktrees share the repository's object store, so the whole repo is
    /// mounted and the working directory moves into the worktree.
    fn mount_worktree(&mut self, repo_root: PathBuf, relative_path: &str) {
        if repo_root.as_os_str().is_empty() {
            return;
        }
        for v in &mut self.volumes {
            if v.container_path == CONTAINER_WORK_DIR {
                v.host_path.clone_from(&repo_root);
                v.read_only = false;
            }
        }
        if !relative_path.is_empty() {
            self.working_dir = Path::new(CONTAINER_WORK_DIR)
                .join(relative_path)
                .clean()
                .to_string_lossy()
                .into_owned();
        }
    }

    /// Working directory inside the container
    #[must_use]
    pub fn working_dir(&self) -> &str {
        &self.working_dir
    }

    /// Home directory inside the container
    #[must_use]
    pub fn container_home(&self) -> &str {
        &self.container_home
    }

    /// Bind mounts, in the order they were added
    #[must_use]
    pub fn volumes(&self) -> &[VolumeMount] {
        &self.volumes
    }

    /// Container-only volume paths
    #[must_use]
    pub fn anonymous_volumes(&self) -> &[String] {
        &self.anonymous_volumes
    }

    /// Container environment, sorted by key
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// CPU quota, empty when unlimited
    #[must_use]
    pub fn cpu_limit(&self) -> &str {
        &self.cpu_limit
    }

    /// Memory cap, empty when unlimited
    #[must_use]
    pub fn memory_limit(&self) -> &str {
        &self.memory_limit
    }
}

/// Shorthand for [`ContainerConfig::new`]
#[must_use]
pub fn new_container_config<P, I>(project_path: P, opts: I) -> ContainerConfig
where
    P: AsRef<Path>,
    I: IntoIterator<Item = ContainerOption>,
{
    ContainerConfig::new(project_path, opts)
}

/// Check one user-supplied mount and build it from the resolved host path.
///
/// Both the cleaned and the symlink-resolved host path go through the host
/// blocklist: macOS rewrites `/etc` to `/private/etc`, and checking both
/// forms catches a bypass whichever one the user supplied.
fn validate_extra_volume(host: &str, container: &str) -> Result<VolumeMount, &'static str> {
    if host.is_empty() || container.is_empty() {
        return Err("empty path");
    }

    let clean_host = PathBuf::from(host).clean();
    if !clean_host.is_absolute() {
        return Err("host path is not absolute");
    }
    let resolved_host = match fs::canonicalize(&clean_host) {
        Ok(p) => p,
        Err(e) => {
            debug!(path = %clean_host.display(), error = %e, "Cannot resolve extra volume");
            return Err("cannot resolve host path");
        }
    };

    let clean_container = PathBuf::from(container).clean();
    if !clean_container.is_absolute() {
        return Err("container path is not absolute");
    }

    if HOST_POLICY.blocks(&clean_host) || HOST_POLICY.blocks(&resolved_host) {
        return Err("host path is blocked");
    }
    let is_secret_dir = resolved_host
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| SECRET_DIR_NAMES.contains(&n));
    if is_secret_dir {
        return Err("host path is a secret directory");
    }
    if CONTAINER_POLICY.blocks(&clean_container) {
        return Err("container path is blocked");
    }

    Ok(VolumeMount::new(
        resolved_host,
        clean_container.to_string_lossy(),
        false,
    ))
}
