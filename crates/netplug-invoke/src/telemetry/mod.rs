//! Log plumbing for invoker events and plugin diagnostics.
//!
//! The library only emits `tracing` events. Embedding programs build a
//! subscriber from their [`Config`] with [`subscriber`] and install it
//! however suits them: globally, or scoped with
//! [`tracing::subscriber::with_default`]. Plugin stderr can be routed into
//! the same stream through [`plugin_stderr_sink`], one event per line.

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};

use netplug_config::{Config, LogFormat};
use tracing::{Subscriber, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter};

use crate::exec::StderrSink;

/// Target of events carrying plugin stderr lines.
pub const PLUGIN_STDERR_TARGET: &str = "netplug_invoke::plugin_stderr";

/// A subscriber ready to be installed or scoped.
pub type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Errors encountered while building a subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter {
        /// The rejected expression.
        filter: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Builds a subscriber writing to `writer` in the configured format.
///
/// Colour codes are never emitted; use [`stderr_subscriber`] for terminal
/// output.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `log_filter` does not parse.
///
/// # Examples
///
/// ```rust
/// use netplug_config::Config;
/// use netplug_invoke::telemetry;
///
/// # fn main() -> Result<(), netplug_invoke::telemetry::TelemetryError> {
/// let subscriber = telemetry::subscriber(&Config::default(), std::io::sink)?;
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!("scoped to this closure");
/// });
/// # Ok(())
/// # }
/// ```
pub fn subscriber<W>(config: &Config, writer: W) -> Result<BoxedSubscriber, TelemetryError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    build(config, writer, false)
}

/// Builds a subscriber writing to stderr.
///
/// Text formats are coloured when stderr is a terminal; JSON never is.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `log_filter` does not parse.
pub fn stderr_subscriber(config: &Config) -> Result<BoxedSubscriber, TelemetryError> {
    let ansi = !config.log_format().is_structured() && io::stderr().is_terminal();
    build(config, io::stderr, ansi)
}

fn build<W>(config: &Config, writer: W, ansi: bool) -> Result<BoxedSubscriber, TelemetryError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
        filter: config.log_filter().to_owned(),
        reason: error.to_string(),
    })?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    Ok(match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
        LogFormat::Full => Box::new(builder.finish()),
    })
}

/// A stderr sink that logs each line the plugin writes.
///
/// Lines are emitted at `info` under [`PLUGIN_STDERR_TARGET`] with the
/// plugin's name attached. A trailing partial line is emitted when the sink
/// is dropped.
///
/// ```rust
/// use netplug_invoke::exec::RawExec;
/// use netplug_invoke::telemetry::plugin_stderr_sink;
///
/// let exec = RawExec::new().with_stderr(plugin_stderr_sink("bridge"));
/// # drop(exec);
/// ```
#[must_use]
pub fn plugin_stderr_sink(plugin: impl Into<String>) -> StderrSink {
    Arc::new(Mutex::new(StderrLines {
        plugin: plugin.into(),
        pending: Vec::new(),
    }))
}

struct StderrLines {
    plugin: String,
    pending: Vec<u8>,
}

impl StderrLines {
    fn emit(&self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim_end_matches('\r');
        if !trimmed.is_empty() {
            info!(target: PLUGIN_STDERR_TARGET, plugin = %self.plugin, "{trimmed}");
        }
    }
}

impl Write for StderrLines {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            self.emit(line.strip_suffix(b"\n").unwrap_or(line.as_slice()));
        }
        Ok(buf.len())
    }

    // Chunks may end mid-line; lines are only emitted once complete.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for StderrLines {
    fn drop(&mut self) {
        let rest = std::mem::take(&mut self.pending);
        self.emit(&rest);
    }
}
