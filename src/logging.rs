//! Tracing setup with secret redaction.
//!
//! Docker CLI output and environment flags can carry credentials, so the
//! installed writer scrubs token-shaped text before it reaches the terminal.

// lazy_regex! validates patterns at compile time and initializes on first use
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Anthropic-style API and OAuth tokens
static RE_ANTHROPIC_TOKEN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"sk-ant-[A-Za-z0-9_\-]+");

/// JSON token fields, as found in `.credentials.json`
static RE_JSON_TOKEN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r#"("(?:accessToken|refreshToken|access_token|refresh_token)"\s*:\s*")[^"]*(")"#);

/// `KEY=VALUE` pairs whose key names a credential
static RE_SECRET_ASSIGNMENT: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"(?i)\b([A-Z0-9_]*(?:TOKEN|KEY|SECRET|PASSWORD)[A-Z0-9_]*=)[^\s'&]+"
);

/// Mask credential-looking substrings
#[must_use]
pub fn redact(input: &str) -> String {
    let output = RE_ANTHROPIC_TOKEN.replace_all(input, "[MASKED]");
    let output = RE_JSON_TOKEN.replace_all(&output, "${1}[MASKED]${2}");
    RE_SECRET_ASSIGNMENT
        .replace_all(&output, "${1}[MASKED]")
        .into_owned()
}

struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&s).as_bytes())?;
        // Report the original length; the redacted text may differ in size.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
}

impl<'a, F, W> MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write + 'a,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `default_filter`.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber is
/// already installed.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer().with_writer(RedactingMakeWriter {
                make_inner: io::stderr,
            }),
        )
        .try_init()?;

    Ok(())
}
