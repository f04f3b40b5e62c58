//! Logging setup with secret redaction.
//!
//! Provider API keys arrive through the environment and must never reach
//! log output. The subscriber writes through a redacting writer that
//! replaces the value of any env var whose name ends in `_KEY` or `_TOKEN`
//! with `[REDACTED]`.

use std::io;
use std::sync::Arc;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Call once, early in `main`.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingMakeWriter::new(
            io::stdout,
            secret_values_from_env(),
        ))
        .init();
}

/// Values that must not appear in log output.
fn secret_values_from_env() -> Vec<String> {
    std::env::vars()
        .filter(|(name, value)| is_secret_name(name) && !value.is_empty())
        .map(|(_, value)| value)
        .collect()
}

fn is_secret_name(name: &str) -> bool {
    name.ends_with("_KEY") || name.ends_with("_TOKEN")
}

/// Replaces every occurrence of a secret in `text` with `[REDACTED]`.
pub fn redact(text: &str, secrets: &[String]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if out.contains(secret.as_str()) {
            out = out.replace(secret.as_str(), "[REDACTED]");
        }
    }
    out
}

/// `MakeWriter` wrapper applying [`redact`] to every line.
pub struct RedactingMakeWriter<M> {
    inner: M,
    secrets: Arc<Vec<String>>,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M, secrets: Vec<String>) -> Self {
        Self {
            inner,
            secrets: Arc::new(secrets),
        }
    }
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for RedactingMakeWriter<M> {
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: self.inner.make_writer(),
            secrets: Arc::clone(&self.secrets),
        }
    }
}

pub struct RedactingWriter<W> {
    inner: W,
    secrets: Arc<Vec<String>>,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let redacted = redact(&text, &self.secrets);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
