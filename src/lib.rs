#![deny(missing_docs)]
//! Agent Deck sandbox library.
//!
//! Provisions hardened, disposable Docker containers for AI coding-agent
//! shells and mirrors each agent tool's host configuration into them
//! through a filtered sandbox directory.

/// Settings and constants.
pub mod config;
/// Tracing setup with secret redaction.
pub mod logging;
/// Container lifecycle and host-to-sandbox config sync.
pub mod sandbox;

pub use sandbox::{
    agent_config_mounts, check_availability, cleanup_keychain_credentials, default_image,
    ensure_image, generate_name, is_daemon_running, is_docker_available, is_managed_container,
    list_managed_containers, new_container_config, platform_extractor, refresh_agent_configs,
    sandbox_dir, shell_join_args, sync_agent_config, AgentConfigMount, CommandOutput,
    CommandRunner, Container, ContainerConfig, ContainerOption, CredentialError,
    CredentialExtractor, DockerCli, DockerError, KeychainEntry, KeychainExtractor, NoopExtractor,
    PathPolicy, RefreshOutcome, SandboxSync, SkipReason, SkippedTool, SyncError, SystemRunner,
    VolumeMount,
};
