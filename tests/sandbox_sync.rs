use agent_deck_sandbox::{
    agent_config_mounts, sandbox_dir, AgentConfigMount, NoopExtractor, SandboxSync, SkipReason,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn claude_like() -> AgentConfigMount {
    AgentConfigMount::new(".agent", ".agent")
        .with_skip_entries(["sandbox", "projects", ".home-seeds"])
        .with_copy_dirs(["plugins"])
        .with_seed_file("state.json", r#"{"firstRun":true}"#)
        .with_home_seed_file(".agent.json", r#"{"hasCompletedOnboarding":true}"#)
        .with_preserve_files([".credentials.json"])
}

fn engine() -> SandboxSync {
    SandboxSync::new(vec![claude_like()], Arc::new(NoopExtractor))
}

fn read(path: &Path) -> std::io::Result<String> {
    fs::read_to_string(path)
}

#[test]
fn seed_files_are_write_once() -> TestResult {
    let home = tempfile::tempdir()?;
    fs::create_dir(home.path().join(".agent"))?;
    let sync = engine();

    let dir = sync.sync_agent_config(home.path(), &claude_like())?;
    let seed = dir.join("state.json");
    assert_eq!(read(&seed)?, r#"{"firstRun":true}"#);

    fs::write(&seed, r#"{"firstRun":false,"history":[1]}"#)?;
    sync.sync_agent_config(home.path(), &claude_like())?;
    assert_eq!(read(&seed)?, r#"{"firstRun":false,"history":[1]}"#);
    Ok(())
}

#[test]
fn preserved_files_survive_host_updates() -> TestResult {
    let home = tempfile::tempdir()?;
    let host = home.path().join(".agent");
    fs::create_dir(&host)?;
    fs::write(host.join(".credentials.json"), "host-v1")?;
    fs::write(host.join("settings.json"), "settings-v1")?;
    let sync = engine();

    let dir = sync.sync_agent_config(home.path(), &claude_like())?;
    assert_eq!(read(&dir.join(".credentials.json"))?, "host-v1");

    // Container refreshed its token; host copy moves on independently.
    fs::write(dir.join(".credentials.json"), "container-refreshed")?;
    fs::write(host.join(".credentials.json"), "host-v2")?;
    fs::write(host.join("settings.json"), "settings-v2")?;
    sync.sync_agent_config(home.path(), &claude_like())?;

    assert_eq!(read(&dir.join(".credentials.json"))?, "container-refreshed");
    assert_eq!(read(&dir.join("settings.json"))?, "settings-v2");
    Ok(())
}

#[test]
fn home_seeds_are_always_rewritten() -> TestResult {
    let home = tempfile::tempdir()?;
    fs::create_dir(home.path().join(".agent"))?;
    let sync = engine();

    let outcome = sync.refresh_agent_configs(home.path(), "/root");
    assert_eq!(outcome.home_mounts.len(), 1);
    let seed = outcome.home_mounts[0].host_path().to_path_buf();
    assert_eq!(
        seed,
        sandbox_dir(home.path(), ".agent").join(".home-seeds/.agent.json")
    );
    assert_eq!(outcome.home_mounts[0].container_path(), "/root/.agent.json");

    fs::write(&seed, r#"{"theme":"dark"}"#)?;
    sync.refresh_agent_configs(home.path(), "/root");
    assert_eq!(read(&seed)?, r#"{"hasCompletedOnboarding":true}"#);
    Ok(())
}

#[test]
fn only_allowlisted_dirs_are_copied() -> TestResult {
    let home = tempfile::tempdir()?;
    let host = home.path().join(".agent");
    fs::create_dir_all(host.join("plugins/market"))?;
    fs::create_dir_all(host.join("projects/big-repo"))?;
    fs::create_dir_all(host.join("todos"))?;
    fs::write(host.join("plugins/market/manifest.json"), "{}")?;
    fs::write(host.join("projects/big-repo/log.jsonl"), "")?;
    fs::write(host.join("todos/a.json"), "[]")?;

    let dir = engine().sync_agent_config(home.path(), &claude_like())?;
    assert!(dir.join("plugins/market/manifest.json").is_file());
    assert!(!dir.join("projects").exists());
    assert!(!dir.join("todos").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlinks_escaping_the_config_dir_are_skipped() -> TestResult {
    use std::os::unix::fs::symlink;

    let home = tempfile::tempdir()?;
    let host = home.path().join(".agent");
    fs::create_dir_all(host.join("plugins"))?;
    fs::create_dir(home.path().join(".ssh"))?;
    fs::write(home.path().join(".ssh/id_ed25519"), "PRIVATE KEY")?;

    symlink(home.path().join(".ssh/id_ed25519"), host.join("key.json"))?;
    symlink(home.path().join(".ssh"), host.join("plugins/ssh"))?;
    fs::write(host.join("plugins/ok.js"), "ok")?;

    let dir = engine().sync_agent_config(home.path(), &claude_like())?;
    assert!(!dir.join("key.json").exists());
    assert!(!dir.join("plugins/ssh").exists());
    assert_eq!(read(&dir.join("plugins/ok.js"))?, "ok");
    Ok(())
}

#[test]
fn one_broken_tool_does_not_block_others() -> TestResult {
    let home = tempfile::tempdir()?;
    fs::create_dir(home.path().join(".agent"))?;
    fs::create_dir(home.path().join(".other"))?;
    fs::write(home.path().join(".other/sandbox"), "not a dir")?;

    let sync = SandboxSync::new(
        vec![
            AgentConfigMount::new(".other", ".other"),
            claude_like(),
            AgentConfigMount::new(".absent", ".absent"),
        ],
        Arc::new(NoopExtractor),
    );
    let outcome = sync.refresh_agent_configs(home.path(), "/home/agent");

    assert_eq!(outcome.bind_mounts.len(), 1);
    assert_eq!(outcome.bind_mounts[0].container_path(), "/home/agent/.agent");
    let reasons: Vec<(&str, bool)> = outcome
        .skipped
        .iter()
        .map(|s| {
            (
                s.tool.as_str(),
                matches!(s.reason, SkipReason::SyncFailed(_)),
            )
        })
        .collect();
    assert_eq!(reasons, [(".other", true), (".absent", false)]);
    Ok(())
}

#[test]
fn builtin_registry_mirrors_claude_config() -> TestResult {
    let home = tempfile::tempdir()?;
    let host = home.path().join(".claude");
    fs::create_dir_all(host.join("skills/review"))?;
    fs::write(host.join("settings.json"), r#"{"model":"opus"}"#)?;
    fs::write(host.join("skills/review/SKILL.md"), "# review")?;

    let sync = SandboxSync::new(agent_config_mounts(), Arc::new(NoopExtractor));
    let outcome = sync.refresh_agent_configs(home.path(), "");

    assert_eq!(outcome.bind_mounts.len(), 1);
    assert_eq!(outcome.bind_mounts[0].container_path(), "/root/.claude");
    assert_eq!(outcome.home_mounts[0].container_path(), "/root/.claude.json");
    let dir = outcome.bind_mounts[0].host_path();
    assert_eq!(read(&dir.join("settings.json"))?, r#"{"model":"opus"}"#);
    assert_eq!(read(&dir.join("skills/review/SKILL.md"))?, "# review");
    assert_eq!(outcome.skipped.len(), 3);
    Ok(())
}

#[cfg(unix)]
#[test]
fn container_planted_home_seed_symlink_is_not_followed() -> TestResult {
    use std::os::unix::fs::{symlink, PermissionsExt};

    let home = tempfile::tempdir()?;
    fs::create_dir(home.path().join(".agent"))?;
    let bashrc = home.path().join(".bashrc");
    fs::write(&bashrc, "alias ll='ls -l'\n")?;
    fs::set_permissions(&bashrc, fs::Permissions::from_mode(0o644))?;
    let sync = engine();
    sync.refresh_agent_configs(home.path(), "/root");

    let seed = sandbox_dir(home.path(), ".agent").join(".home-seeds/.agent.json");
    fs::remove_file(&seed)?;
    symlink(&bashrc, &seed)?;
    sync.refresh_agent_configs(home.path(), "/root");

    assert_eq!(read(&bashrc)?, "alias ll='ls -l'\n");
    assert_eq!(fs::metadata(&bashrc)?.permissions().mode() & 0o777, 0o644);
    assert_eq!(read(&seed)?, r#"{"hasCompletedOnboarding":true}"#);
    Ok(())
}

#[cfg(unix)]
#[test]
fn container_planted_copy_dir_symlink_is_not_followed() -> TestResult {
    use std::os::unix::fs::symlink;

    let home = tempfile::tempdir()?;
    let host = home.path().join(".agent");
    fs::create_dir_all(host.join("plugins"))?;
    fs::write(host.join("plugins/authorized_keys"), "from-plugin\n")?;
    let ssh = home.path().join(".ssh");
    fs::create_dir(&ssh)?;
    fs::write(ssh.join("authorized_keys"), "original\n")?;

    let sandbox = sandbox_dir(home.path(), ".agent");
    fs::create_dir_all(&sandbox)?;
    symlink(&ssh, sandbox.join("plugins"))?;
    engine().sync_agent_config(home.path(), &claude_like())?;

    assert_eq!(read(&ssh.join("authorized_keys"))?, "original\n");
    assert!(fs::symlink_metadata(sandbox.join("plugins"))?.is_dir());
    assert_eq!(read(&sandbox.join("plugins/authorized_keys"))?, "from-plugin\n");
    Ok(())
}
