//! Docker container lifecycle via the docker CLI
//!
//! Manages the hardened containers agent sessions run in. Handles carry no
//! docker-side state: existence and run state are queried live on every
//! call. Exec prefixes are returned unquoted; see [`super::shell_join_args`]
//! for the single point where quoting is applied.
//!
//! The Docker socket is never mounted into containers. Agents get a shell
//! inside the sandbox, not access to the host daemon.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::error::DockerError;
use super::options::ContainerConfig;
use super::runner::{CommandOutput, CommandRunner, SystemRunner};
use crate::config::{
    DEFAULT_SANDBOX_IMAGE, MANAGED_LABEL, SANDBOX_PIDS_LIMIT, TMPFS_CACHE_OPTS, TMPFS_NPM_OPTS,
    TMPFS_TMP, TMPFS_VAR_TMP,
};

/// Docker CLI entry point bound to a process runner
#[derive(Clone)]
pub struct DockerCli {
    program: String,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for DockerCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerCli")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::system()
    }
}

impl DockerCli {
    /// `docker` from `PATH`, run through [`SystemRunner`]
    #[must_use]
    pub fn system() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    /// `docker` run through a custom runner
    #[must_use]
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: "docker".to_string(),
            runner,
        }
    }

    /// Use a different CLI binary (e.g. a docker-compatible `podman`)
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// CLI binary name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    pub(crate) fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Handle for a container to be created; an empty image means the default
    #[must_use]
    pub fn container(&self, name: impl Into<String>, image: impl Into<String>) -> Container {
        let image = image.into();
        Container {
            name: name.into(),
            image: if image.is_empty() {
                DEFAULT_SANDBOX_IMAGE.to_string()
            } else {
                image
            },
            cli: self.clone(),
        }
    }

    /// Handle for an existing container
    ///
    /// Supports every lifecycle operation except [`Container::create`].
    #[must_use]
    pub fn from_name(&self, name: impl Into<String>) -> Container {
        Container {
            name: name.into(),
            image: String::new(),
            cli: self.clone(),
        }
    }

    async fn docker<S: AsRef<str>>(&self, args: &[S]) -> io::Result<CommandOutput> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        self.runner.run(&self.program, &args).await
    }

    /// Names of all containers carrying the managed label
    ///
    /// # Errors
    ///
    /// Returns an error if `docker ps` cannot be run or fails.
    #[instrument(skip(self))]
    pub async fn list_managed_containers(&self) -> Result<Vec<String>, DockerError> {
        let filter = format!("label={MANAGED_LABEL}");
        let result = self
            .docker(&["ps", "-a", "--filter", filter.as_str(), "--format", "{{.Names}}"])
            .await;
        let out = check(result, "listing", "managed containers")?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Make sure `image` is available locally, pulling it if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails.
    #[instrument(skip(self))]
    pub async fn ensure_image(&self, image: &str) -> Result<(), DockerError> {
        if matches!(self.docker(&["image", "inspect", image]).await, Ok(out) if out.success()) {
            debug!(image, "Image present locally");
            return Ok(());
        }
        info!(image, "Pulling sandbox image");
        check(self.docker(&["pull", image]).await, "pulling", format!("image {image}"))?;
        Ok(())
    }
}

/// Turn a CLI result into the output on success or a wrapped error.
fn check(
    result: io::Result<CommandOutput>,
    action: &'static str,
    target: impl Into<String>,
) -> Result<CommandOutput, DockerError> {
    match result {
        Ok(out) if out.success() => Ok(out),
        Ok(out) => Err(DockerError::Exit {
            action,
            target: target.into(),
            output: out.combined(),
            code: out.code,
        }),
        Err(source) => Err(DockerError::Spawn {
            action,
            target: target.into(),
            source,
        }),
    }
}

/// A single managed container
///
/// A plain `(name, image)` pair plus the CLI used to reach it.
#[derive(Debug, Clone)]
pub struct Container {
    name: String,
    image: String,
    cli: DockerCli,
}

impl Container {
    /// Create a handle for a container to be created with `image`
    #[must_use]
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        DockerCli::system().container(name, image)
    }

    /// Create a handle for an existing container by name
    #[must_use]
    pub fn from_name(name: impl Into<String>) -> Self {
        DockerCli::system().from_name(name)
    }

    /// Container name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image name; empty for handles built with [`Container::from_name`]
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    fn target(&self) -> String {
        format!("container {}", self.name)
    }

    /// Query `docker inspect`; a non-zero exit means "no such container".
    async fn inspect(&self, format: &str) -> Result<Option<String>, DockerError> {
        match self
            .cli
            .docker(&["inspect", "--format", format, self.name.as_str()])
            .await
        {
            Ok(out) if out.success() => Ok(Some(out.stdout.trim().to_string())),
            Ok(_) => Ok(None),
            Err(source) => Err(DockerError::Spawn {
                action: "inspecting",
                target: self.target(),
                source,
            }),
        }
    }

    /// Check if the container exists (running or stopped)
    ///
    /// # Errors
    ///
    /// Returns an error only if docker cannot be run; a missing container is `Ok(false)`.
    pub async fn exists(&self) -> Result<bool, DockerError> {
        Ok(self.inspect("{{.State.Status}}").await?.is_some())
    }

    /// Check if the container is currently running
    ///
    /// # Errors
    ///
    /// Returns an error only if docker cannot be run; a missing container is `Ok(false)`.
    pub async fn is_running(&self) -> Result<bool, DockerError> {
        Ok(self.inspect("{{.State.Running}}").await?.as_deref() == Some("true"))
    }

    /// `docker create` arguments for this container and `cfg`
    fn create_args(&self, cfg: &ContainerConfig) -> Vec<String> {
        let home = cfg.container_home();
        let mut args: Vec<String> = vec![
            "create".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--label".to_string(),
            MANAGED_LABEL.to_string(),
            "--cap-drop=ALL".to_string(),
            "--security-opt=no-new-privileges".to_string(),
            format!("--pids-limit={SANDBOX_PIDS_LIMIT}"),
            // Writable paths on the read-only root are explicit tmpfs mounts.
            "--read-only".to_string(),
            "--tmpfs".to_string(),
            TMPFS_TMP.to_string(),
            "--tmpfs".to_string(),
            TMPFS_VAR_TMP.to_string(),
            "--tmpfs".to_string(),
            format!("{home}/.npm:{TMPFS_NPM_OPTS}"),
            "--tmpfs".to_string(),
            format!("{home}/.cache:{TMPFS_CACHE_OPTS}"),
        ];

        if !cfg.working_dir().is_empty() {
            args.extend(["--workdir".to_string(), cfg.working_dir().to_string()]);
        }

        for v in cfg.volumes() {
            args.extend(["-v".to_string(), v.to_bind_spec()]);
        }

        for anon in cfg.anonymous_volumes() {
            args.extend(["-v".to_string(), anon.clone()]);
        }

        // Passed as discrete argv entries, never through a shell. BTreeMap keeps keys sorted.
        for (k, v) in cfg.environment() {
            args.extend(["-e".to_string(), format!("{k}={v}")]);
        }

        if !cfg.cpu_limit().is_empty() {
            args.extend(["--cpus".to_string(), cfg.cpu_limit().to_string()]);
        }
        if !cfg.memory_limit().is_empty() {
            args.extend(["--memory".to_string(), cfg.memory_limit().to_string()]);
        }

        args.push(self.image.clone());
        // Keeps the container alive for docker exec.
        args.extend(["sleep".to_string(), "infinity".to_string()]);
        args
    }

    /// Create the container from `cfg` without starting it
    ///
    /// Returns the container name. An already existing container is treated
    /// as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle has no image or docker fails and the
    /// container does not exist afterwards.
    #[instrument(skip(self, cfg), fields(name = %self.name, image = %self.image))]
    pub async fn create(&self, cfg: &ContainerConfig) -> Result<String, DockerError> {
        if self.image.is_empty() {
            return Err(DockerError::InvalidConfig {
                name: self.name.clone(),
                reason: "no image specified",
            });
        }

        let result = self.cli.docker(&self.create_args(cfg)).await;
        if matches!(&result, Ok(out) if out.success()) {
            info!(volumes = cfg.volumes().len(), "Sandbox container created");
            return Ok(self.name.clone());
        }

        if matches!(self.exists().await, Ok(true)) {
            debug!("Container already exists, reusing");
            return Ok(self.name.clone());
        }
        check(result, "creating", self.target())?;
        Ok(self.name.clone())
    }

    /// Start the container; already running is a no-op
    ///
    /// # Errors
    ///
    /// Returns an error if docker fails and the container is not running afterwards.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn start(&self) -> Result<(), DockerError> {
        let result = self.cli.docker(&["start", self.name.as_str()]).await;
        if matches!(&result, Ok(out) if out.success()) {
            info!("Sandbox container started");
            return Ok(());
        }

        if matches!(self.is_running().await, Ok(true)) {
            debug!("Container already running");
            return Ok(());
        }
        check(result, "starting", self.target())?;
        Ok(())
    }

    /// Stop the container gracefully
    ///
    /// # Errors
    ///
    /// Returns an error if `docker stop` fails.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn stop(&self) -> Result<(), DockerError> {
        check(
            self.cli.docker(&["stop", self.name.as_str()]).await,
            "stopping",
            self.target(),
        )?;
        info!("Sandbox container stopped");
        Ok(())
    }

    /// Remove the container and its anonymous volumes
    ///
    /// `force` kills a running container first. A container that no longer
    /// exists is treated as success.
    ///
    /// # Errors
    ///
    /// Returns an error if docker fails for any other reason.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn remove(&self, force: bool) -> Result<(), DockerError> {
        let mut args = vec!["rm", "-v"];
        if force {
            args.push("-f");
        }
        args.push(self.name.as_str());

        match check(self.cli.docker(&args).await, "removing", self.target()) {
            Ok(_) => {
                info!("Sandbox container removed");
                Ok(())
            }
            Err(DockerError::Exit { ref output, .. })
                if output.to_lowercase().contains("no such container") =>
            {
                debug!("Container already gone");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to remove container");
                Err(e)
            }
        }
    }

    /// Command prefix for running a command inside this container
    ///
    /// `["docker", "exec", "-it", name]`, unquoted.
    #[must_use]
    pub fn exec_prefix(&self) -> Vec<String> {
        self.exec_prefix_with_env(BTreeMap::<String, String>::new())
    }

    /// Command prefix with `-e K=V` flags for runtime environment
    ///
    /// Each token is a discrete argument (no shell quoting); keys are sorted.
    /// Render with [`super::shell_join_args`] before crossing a shell.
    #[must_use]
    pub fn exec_prefix_with_env<I, K, V>(&self, env: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let sorted: BTreeMap<String, String> = env
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let mut args = vec![
            self.cli.program().to_string(),
            "exec".to_string(),
            "-it".to_string(),
        ];
        for (k, v) in sorted {
            args.extend(["-e".to_string(), format!("{k}={v}")]);
        }
        args.push(self.name.clone());
        args
    }
}

/// Default sandbox image name
#[must_use]
pub const fn default_image() -> &'static str {
    DEFAULT_SANDBOX_IMAGE
}

/// List managed containers through the system docker CLI
///
/// # Errors
///
/// See [`DockerCli::list_managed_containers`].
pub async fn list_managed_containers() -> Result<Vec<String>, DockerError> {
    DockerCli::system().list_managed_containers().await
}

/// Ensure `image` exists locally through the system docker CLI
///
/// # Errors
///
/// See [`DockerCli::ensure_image`].
pub async fn ensure_image(image: &str) -> Result<(), DockerError> {
    DockerCli::system().ensure_image(image).await
}
