//! Sandbox module
//!
//! Hardened agent containers driven through the docker CLI, and the sync
//! engine that mirrors agent tool configs into them.

/// Registry of agent tool config directories
pub mod agents;
/// Container handles and the docker CLI wrapper
pub mod container;
/// Platform credential extraction
pub mod credentials;
/// Docker availability checks
pub mod detect;
/// Error types
pub mod error;
mod fsutil;
/// Container name generation
pub mod naming;
/// Container configuration builder
pub mod options;
/// Mount path blocklists
pub mod policy;
/// Process execution seam
pub mod runner;
/// Shell-safe argv rendering
pub mod shell;
/// Host to sandbox config sync
pub mod sync;

pub use agents::{agent_config_mounts, sandbox_dir, AgentConfigMount, KeychainEntry};
pub use container::{default_image, ensure_image, list_managed_containers, Container, DockerCli};
pub use credentials::{platform_extractor, CredentialExtractor, KeychainExtractor, NoopExtractor};
pub use detect::{check_availability, is_daemon_running, is_docker_available};
pub use error::{CredentialError, DockerError, SyncError};
pub use naming::{generate_name, is_managed_container};
pub use options::{new_container_config, ContainerConfig, ContainerOption, VolumeMount};
pub use policy::PathPolicy;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use shell::shell_join_args;
pub use sync::{
    cleanup_keychain_credentials, refresh_agent_configs, sync_agent_config, RefreshOutcome,
    SandboxSync, SkipReason, SkippedTool,
};
