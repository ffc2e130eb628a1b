//! Registry of agent tool config directories mirrored into sandboxes.
//!
//! Adding a tool only needs a new registry entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Name of the per-tool mirror directory inside the host config dir
pub const SANDBOX_DIR_NAME: &str = "sandbox";
/// Subdirectory of the sandbox dir holding home-level seed files
pub const HOME_SEEDS_DIR_NAME: &str = ".home-seeds";

/// A macOS Keychain credential to materialize into the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeychainEntry {
    service: String,
    filename: String,
}

impl KeychainEntry {
    /// Keychain service name, e.g. `Claude Code-credentials`
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Target file name inside the sandbox dir
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// How one tool's config directory is synced into sandbox containers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfigMount {
    host_rel: String,
    container_suffix: String,
    skip_entries: Vec<String>,
    copy_dirs: Vec<String>,
    seed_files: BTreeMap<String, String>,
    home_seed_files: BTreeMap<String, String>,
    preserve_files: Vec<String>,
    keychain_credential: Option<KeychainEntry>,
}

impl AgentConfigMount {
    /// Tool config at `<home>/<host_rel>`, mounted at `<container home>/<container_suffix>`
    #[must_use]
    pub fn new(host_rel: impl Into<String>, container_suffix: impl Into<String>) -> Self {
        Self {
            host_rel: host_rel.into(),
            container_suffix: container_suffix.into(),
            skip_entries: Vec::new(),
            copy_dirs: Vec::new(),
            seed_files: BTreeMap::new(),
            home_seed_files: BTreeMap::new(),
            preserve_files: Vec::new(),
            keychain_credential: None,
        }
    }

    /// Top-level entry names never copied (exact match, not recursive)
    #[must_use]
    pub fn with_skip_entries<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_entries.extend(names.into_iter().map(Into::into));
        self
    }

    /// Top-level directories copied recursively; other directories are ignored
    #[must_use]
    pub fn with_copy_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.copy_dirs.extend(names.into_iter().map(Into::into));
        self
    }

    /// File written into the sandbox dir only if absent
    #[must_use]
    pub fn with_seed_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.seed_files.insert(name.into(), content.into());
        self
    }

    /// File mounted at the container home, rewritten on every refresh
    #[must_use]
    pub fn with_home_seed_file(
        mut self,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.home_seed_files.insert(name.into(), content.into());
        self
    }

    /// Files never overwritten once present in the sandbox
    #[must_use]
    pub fn with_preserve_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserve_files.extend(names.into_iter().map(Into::into));
        self
    }

    /// Keychain item extracted into `<sandbox dir>/<filename>` on macOS
    #[must_use]
    pub fn with_keychain_credential(
        mut self,
        service: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        self.keychain_credential = Some(KeychainEntry {
            service: service.into(),
            filename: filename.into(),
        });
        self
    }

    /// Path relative to the host home, e.g. `.claude`
    #[must_use]
    pub fn host_rel(&self) -> &str {
        &self.host_rel
    }

    /// Path relative to the container home
    #[must_use]
    pub fn container_suffix(&self) -> &str {
        &self.container_suffix
    }

    /// Full container path of the config dir for a given container home
    #[must_use]
    pub fn container_path(&self, home: &str) -> String {
        format!("{home}/{}", self.container_suffix)
    }

    /// Host config directory
    #[must_use]
    pub fn host_dir(&self, home: &Path) -> PathBuf {
        home.join(&self.host_rel)
    }

    /// Sandbox mirror directory, the actual bind mount source
    #[must_use]
    pub fn sandbox_dir(&self, home: &Path) -> PathBuf {
        sandbox_dir(home, &self.host_rel)
    }

    /// Top-level names excluded from copying
    #[must_use]
    pub fn skip_entries(&self) -> &[String] {
        &self.skip_entries
    }

    /// Directories copied recursively
    #[must_use]
    pub fn copy_dirs(&self) -> &[String] {
        &self.copy_dirs
    }

    /// Write-once seed files, name to content
    #[must_use]
    pub const fn seed_files(&self) -> &BTreeMap<String, String> {
        &self.seed_files
    }

    /// Home-level seed files, name to content
    #[must_use]
    pub const fn home_seed_files(&self) -> &BTreeMap<String, String> {
        &self.home_seed_files
    }

    /// Files kept once present in the sandbox
    #[must_use]
    pub fn preserve_files(&self) -> &[String] {
        &self.preserve_files
    }

    /// Keychain item to extract, if any
    #[must_use]
    pub const fn keychain_credential(&self) -> Option<&KeychainEntry> {
        self.keychain_credential.as_ref()
    }
}

static AGENT_CONFIG_MOUNTS: LazyLock<Vec<AgentConfigMount>> = LazyLock::new(|| {
    vec![
        AgentConfigMount::new(".claude", ".claude")
            .with_skip_entries([SANDBOX_DIR_NAME, "projects", HOME_SEEDS_DIR_NAME])
            .with_copy_dirs(["plugins", "skills"])
            .with_home_seed_file(".claude.json", r#"{"hasCompletedOnboarding":true}"#)
            .with_preserve_files([".credentials.json", "statsig_user_id"])
            .with_keychain_credential("Claude Code-credentials", ".credentials.json"),
        AgentConfigMount::new(".local/share/opencode", ".local/share/opencode")
            .with_skip_entries([SANDBOX_DIR_NAME]),
        AgentConfigMount::new(".codex", ".codex").with_skip_entries([SANDBOX_DIR_NAME]),
        AgentConfigMount::new(".gemini", ".gemini").with_skip_entries([SANDBOX_DIR_NAME]),
    ]
});

/// Built-in tool definitions
///
/// Returns a copy; the registry itself cannot be modified.
#[must_use]
pub fn agent_config_mounts() -> Vec<AgentConfigMount> {
    AGENT_CONFIG_MOUNTS.clone()
}

/// Shared sandbox directory for a tool: `<home>/<host_rel>/sandbox`
#[must_use]
pub fn sandbox_dir(home: &Path, host_rel: &str) -> PathBuf {
    home.join(host_rel).join(SANDBOX_DIR_NAME)
}
