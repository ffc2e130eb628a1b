//! Platform credential extraction into sandbox directories.
//!
//! On macOS some tools keep their OAuth tokens in the Keychain rather than
//! in their config directory, so the sync engine materializes them as a
//! plaintext file that the container can read. Elsewhere the credentials are
//! already plain files and get copied with the rest of the config.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::debug;

use super::error::CredentialError;
use super::fsutil::write_private_file;

/// Materializes a stored credential as a file
#[cfg_attr(test, mockall::automock)]
pub trait CredentialExtractor: Send + Sync {
    /// Write the secret stored under `service` to `dest`
    ///
    /// A missing entry is not an error; nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried or `dest` cannot be written.
    fn extract(&self, service: &str, dest: &Path) -> Result<(), CredentialError>;
}

/// Extractor for platforms without a credential store
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExtractor;

impl CredentialExtractor for NoopExtractor {
    fn extract(&self, _service: &str, _dest: &Path) -> Result<(), CredentialError> {
        Ok(())
    }
}

/// Reads generic passwords with the macOS `security` tool
#[derive(Debug, Clone)]
pub struct KeychainExtractor {
    program: PathBuf,
}

impl Default for KeychainExtractor {
    fn default() -> Self {
        Self {
            program: PathBuf::from("security"),
        }
    }
}

impl KeychainExtractor {
    /// Use a different `security` binary
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl CredentialExtractor for KeychainExtractor {
    fn extract(&self, service: &str, dest: &Path) -> Result<(), CredentialError> {
        let output = Command::new(&self.program)
            .args(["find-generic-password", "-s", service, "-w"])
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CredentialError::Spawn {
                service: service.to_string(),
                source,
            })?;

        // Only stdout is the secret. Stderr is inspected here and never
        // returned, since it may echo keychain contents.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("could not be found") || stderr.contains("SecKeychainSearchCopyNext")
            {
                debug!(service, "No keychain entry; tool may use API key auth");
                return Ok(());
            }
            return Err(CredentialError::Keychain {
                service: service.to_string(),
                code: output.status.code().unwrap_or(-1),
            });
        }

        let password = String::from_utf8_lossy(&output.stdout);
        let password = password.trim();
        if password.is_empty() {
            return Ok(());
        }

        write_private_file(dest, password.as_bytes()).map_err(|source| CredentialError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
        debug!(service, path = %dest.display(), "Extracted keychain credential");
        Ok(())
    }
}

/// Extractor for the running OS: Keychain on macOS, no-op elsewhere
#[must_use]
pub fn platform_extractor() -> Arc<dyn CredentialExtractor> {
    if std::env::consts::OS == "macos" {
        Arc::new(KeychainExtractor::default())
    } else {
        Arc::new(NoopExtractor)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn fake_security(dir: &Path, body: &str) -> std::io::Result<PathBuf> {
        let path = dir.join("security");
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    #[test]
    #[serial]
    fn test_extracts_trimmed_password() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let program = fake_security(
            dir.path(),
            r#"[ "$1 $2 $3 $4" = "find-generic-password -s svc -w" ] || exit 2
echo '{"accessToken":"tok"}'"#,
        )?;
        let dest = dir.path().join(".credentials.json");

        KeychainExtractor::with_program(program).extract("svc", &dest)?;
        assert_eq!(fs::read_to_string(&dest)?, r#"{"accessToken":"tok"}"#);
        assert_eq!(fs::metadata(&dest)?.permissions().mode() & 0o777, 0o600);
        Ok(())
    }

    #[test]
    #[serial]
    fn test_missing_entry_is_not_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let program = fake_security(
            dir.path(),
            "echo 'security: SecKeychainSearchCopyNext: The specified item could not be found in the keychain.' >&2; exit 44",
        )?;
        let dest = dir.path().join("cred");

        KeychainExtractor::with_program(program).extract("svc", &dest)?;
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    #[serial]
    fn test_empty_password_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let program = fake_security(dir.path(), "echo '   '")?;
        let dest = dir.path().join("cred");

        KeychainExtractor::with_program(program).extract("svc", &dest)?;
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    #[serial]
    fn test_failure_does_not_leak_stderr() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let program = fake_security(dir.path(), "echo 'leaked-secret-material' >&2; exit 36")?;
        let dest = dir.path().join("cred");

        let Err(err) = KeychainExtractor::with_program(program).extract("svc", &dest) else {
            panic!("locked keychain reported success");
        };
        assert!(matches!(err, CredentialError::Keychain { code: 36, .. }));
        assert!(!err.to_string().contains("leaked-secret-material"));
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let err = KeychainExtractor::with_program("/nonexistent/security")
            .extract("svc", Path::new("/nonexistent/cred"));
        assert!(matches!(err, Err(CredentialError::Spawn { .. })));
    }

    #[test]
    fn test_noop_extractor() {
        assert!(NoopExtractor.extract("svc", Path::new("/nonexistent/cred")).is_ok());
    }
}
