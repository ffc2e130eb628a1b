//! Process execution seam for docker CLI calls.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tracing::trace;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, -1 when terminated by a signal
    pub code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a process that exited 0
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output of a process that exited with `code`
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Check if the process succeeded (exit code 0)
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout followed by stderr, trimmed
    #[must_use]
    pub fn combined(&self) -> String {
        let joined = if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        };
        joined.trim().to_string()
    }
}

/// Runs external programs
///
/// `Ok` with a non-zero code means the program ran and failed; `Err` means
/// it could not be run at all (missing binary, permission denied).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Runner backed by `tokio::process`
///
/// Children are killed when the returned future is dropped, so a caller's
/// timeout or cancellation also ends the docker process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        trace!(program, args = args.len(), "Spawning process");
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output() {
        assert_eq!(CommandOutput::ok("out\n").combined(), "out");
        assert_eq!(CommandOutput::failed(1, " err ").combined(), "err");
        let both = CommandOutput {
            code: 1,
            stdout: "out".to_string(),
            stderr: "err\n".to_string(),
        };
        assert_eq!(both.combined(), "out\nerr");
        assert!(!both.success());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let result = SystemRunner
            .run("agent-deck-definitely-not-a-binary", &[])
            .await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_is_captured() -> io::Result<()> {
        let out = SystemRunner
            .run("sh", &["-c".to_string(), "echo hi; exit 3".to_string()])
            .await?;
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout, "hi\n");
        Ok(())
    }
}
