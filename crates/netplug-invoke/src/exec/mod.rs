//! Process execution as the transport for plugin calls.
//!
//! [`RawExec`] spawns the plugin, feeds the configuration bytes to its stdin,
//! captures stdout and stderr on helper threads, and waits for the process
//! while polling the [`InvokeContext`]. A zero exit status returns stdout
//! verbatim. Any other status is decoded into a [`PluginFailure`]: an error
//! envelope on stdout first, then stderr text, then the bare exit status.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::args::RECOGNISED_KEYS;
use crate::context::{ContextState, InvokeContext};
use crate::envelope;
use crate::error::{InvokeError, PluginFailure};

/// Tracing target for plugin process operations.
const EXEC_TARGET: &str = "netplug_invoke::exec";

/// Interval between exit and cancellation checks.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Read buffer size for the stderr forwarder.
const STDERR_CHUNK: usize = 4096;

/// Destination for plugin stderr shared between invocations.
pub type StderrSink = Arc<Mutex<dyn Write + Send>>;

/// A single synchronous call into a plugin executable.
///
/// [`RawExec`] is the production implementation. Tests substitute a mock to
/// exercise probing and negotiation without spawning processes.
#[cfg_attr(test, mockall::automock)]
pub trait Exec {
    /// Runs the plugin and returns its stdout on success.
    ///
    /// `env` entries override the inherited environment; inherited protocol
    /// variables are removed first.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Failure`] when the plugin cannot be launched or
    /// exits non-zero, [`InvokeError::Cancelled`] or
    /// [`InvokeError::TimedOut`] when the context ends first, and
    /// [`InvokeError::Io`] when the pipes to a running plugin fail.
    fn exec_plugin(
        &self,
        ctx: &InvokeContext,
        plugin_path: &Path,
        stdin: &[u8],
        env: &[(String, String)],
    ) -> Result<Vec<u8>, InvokeError>;
}

/// Executes plugins as child processes.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use std::sync::{Arc, Mutex};
/// use netplug_invoke::context::InvokeContext;
/// use netplug_invoke::exec::{Exec, RawExec};
///
/// let stderr = Arc::new(Mutex::new(Vec::<u8>::new()));
/// let exec = RawExec::new().with_stderr(stderr.clone());
/// let env = vec![("CNI_COMMAND".to_owned(), "VERSION".to_owned())];
/// let stdout = exec.exec_plugin(
///     &InvokeContext::background(),
///     Path::new("/opt/cni/bin/bridge"),
///     b"",
///     &env,
/// );
/// ```
#[derive(Clone, Default)]
pub struct RawExec {
    stderr: Option<StderrSink>,
}

impl fmt::Debug for RawExec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawExec")
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

impl RawExec {
    /// Creates an executor that captures stderr without forwarding it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards every stderr chunk to `sink` as it is read.
    #[must_use]
    pub fn with_stderr(mut self, sink: StderrSink) -> Self {
        self.stderr = Some(sink);
        self
    }
}

impl Exec for RawExec {
    fn exec_plugin(
        &self,
        ctx: &InvokeContext,
        plugin_path: &Path,
        stdin: &[u8],
        env: &[(String, String)],
    ) -> Result<Vec<u8>, InvokeError> {
        let mut command = build_command(plugin_path, env);

        debug!(
            target: EXEC_TARGET,
            plugin = %plugin_path.display(),
            stdin_bytes = stdin.len(),
            "spawning plugin process"
        );

        let mut child = command.spawn().map_err(|source| PluginFailure::Launch {
            path: plugin_path.to_path_buf(),
            source: Arc::new(source),
        })?;

        let sink = self.stderr.as_ref();
        let (waited, written, stdout, stderr) = thread::scope(|scope| {
            let stdin_pipe = child.stdin.take();
            let stdout_pipe = child.stdout.take();
            let stderr_pipe = child.stderr.take();

            let writer = scope.spawn(move || write_stdin(stdin_pipe, stdin));
            let stdout_reader = scope.spawn(move || read_stdout(stdout_pipe));
            // Sinks that log must reach the caller's subscriber.
            let dispatch = tracing::dispatcher::get_default(Clone::clone);
            let stderr_reader = scope.spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || forward_stderr(stderr_pipe, sink))
            });

            let group = child.id();
            let waited = wait_for_exit(ctx, plugin_path, &mut child).and_then(|status| {
                // Descendants of the plugin may still hold the pipes open.
                wait_for_pipes(ctx, plugin_path, group, || {
                    writer.is_finished()
                        && stdout_reader.is_finished()
                        && stderr_reader.is_finished()
                })?;
                Ok(status)
            });
            (
                waited,
                join_pipe(writer),
                join_pipe(stdout_reader),
                join_pipe(stderr_reader),
            )
        });

        let status = waited?;
        let io_error = |source: io::Error| InvokeError::Io {
            path: plugin_path.to_path_buf(),
            source: Arc::new(source),
        };
        let stdout = stdout.map_err(io_error)?;
        let stderr = stderr.map_err(io_error)?;

        debug!(
            target: EXEC_TARGET,
            plugin = %plugin_path.display(),
            status = %describe_status(status),
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "plugin process exited"
        );

        if !status.success() {
            return Err(decode_failure(status, &stdout, &stderr).into());
        }
        written.map_err(io_error)?;
        Ok(stdout)
    }
}

fn build_command(plugin_path: &Path, env: &[(String, String)]) -> Command {
    let mut command = Command::new(plugin_path);
    for key in RECOGNISED_KEYS {
        command.env_remove(key);
    }
    command
        .envs(env.iter().map(|(key, value)| (key, value)))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group so termination also reaches delegates the
        // plugin spawned.
        command.process_group(0);
    }

    command
}

/// Writes the configuration and closes stdin.
fn write_stdin(pipe: Option<ChildStdin>, payload: &[u8]) -> io::Result<()> {
    let Some(mut stdin) = pipe else {
        return Ok(());
    };
    match stdin.write_all(payload) {
        // The plugin is free to exit without reading its input.
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn read_stdout(pipe: Option<ChildStdout>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut stdout) = pipe {
        stdout.read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}

/// Captures stderr, copying each chunk to the sink exactly once.
fn forward_stderr(pipe: Option<ChildStderr>, sink: Option<&StderrSink>) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let Some(mut stderr) = pipe else {
        return Ok(captured);
    };
    let mut chunk = [0_u8; STDERR_CHUNK];
    loop {
        let read = match stderr.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        let bytes = chunk.get(..read).unwrap_or_default();
        captured.extend_from_slice(bytes);
        if let Some(target) = sink {
            forward_chunk(target, bytes);
        }
    }
    Ok(captured)
}

fn forward_chunk(sink: &StderrSink, bytes: &[u8]) {
    let Ok(mut writer) = sink.lock() else {
        warn!(target: EXEC_TARGET, "stderr sink is poisoned; dropping plugin output");
        return;
    };
    if let Err(error) = writer.write_all(bytes).and_then(|()| writer.flush()) {
        warn!(
            target: EXEC_TARGET,
            %error,
            "failed to forward plugin stderr"
        );
    }
}

fn join_pipe<T>(handle: ScopedJoinHandle<'_, io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("plugin pipe thread panicked")))
}

/// Waits for the child to exit, killing it if the context ends first.
fn wait_for_exit(
    ctx: &InvokeContext,
    plugin_path: &Path,
    child: &mut Child,
) -> Result<ExitStatus, InvokeError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(source) => {
                terminate(child);
                return Err(InvokeError::Io {
                    path: plugin_path.to_path_buf(),
                    source: Arc::new(source),
                });
            }
        }
        if let Some(error) = context_ended(ctx, plugin_path) {
            terminate(child);
            return Err(error);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Waits for the pipe threads after the plugin has exited.
///
/// Processes the plugin left behind keep its pipes open; if the context ends
/// first they are killed through the plugin's process group.
fn wait_for_pipes(
    ctx: &InvokeContext,
    plugin_path: &Path,
    group: u32,
    finished: impl Fn() -> bool,
) -> Result<(), InvokeError> {
    while !finished() {
        if let Some(error) = context_ended(ctx, plugin_path) {
            kill_group(group);
            return Err(error);
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}

/// Returns the error for an ended context, logging the reason.
fn context_ended(ctx: &InvokeContext, plugin_path: &Path) -> Option<InvokeError> {
    match ctx.state() {
        ContextState::Live => None,
        ContextState::Cancelled => {
            warn!(
                target: EXEC_TARGET,
                plugin = %plugin_path.display(),
                "invocation cancelled, killing plugin"
            );
            Some(InvokeError::Cancelled {
                path: plugin_path.to_path_buf(),
            })
        }
        ContextState::Expired { timeout } => {
            warn!(
                target: EXEC_TARGET,
                plugin = %plugin_path.display(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "plugin timed out, killing process"
            );
            Some(InvokeError::TimedOut {
                path: plugin_path.to_path_buf(),
                timeout,
            })
        }
    }
}

/// Kills the plugin and its process group, then reaps it.
fn terminate(child: &mut Child) {
    kill_group(child.id());
    drop(child.kill());
    drop(child.wait());
}

/// Sends `SIGKILL` to the process group led by `leader`.
#[cfg(unix)]
fn kill_group(leader: u32) {
    if let Ok(pid) = libc::pid_t::try_from(leader) {
        // SAFETY: `kill(2)` is memory-safe for any pid. The group id equals
        // the plugin's pid; see `build_command`.
        unsafe { libc::kill(-pid, libc::SIGKILL) };
    }
}

/// Without process groups only the direct child can be killed.
#[cfg(not(unix))]
const fn kill_group(_leader: u32) {}

/// Picks the failure for a non-zero exit.
fn decode_failure(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> PluginFailure {
    if let Some(failure) = envelope::decode(stdout) {
        return failure;
    }
    if !stderr.is_empty() {
        return PluginFailure::Stderr {
            text: String::from_utf8_lossy(stderr).into_owned(),
        };
    }
    PluginFailure::OpaqueExit {
        status: describe_status(status),
        stdout: String::from_utf8_lossy(stdout).into_owned(),
    }
}

/// Formats an exit status as `exit status N` or `signal: N`.
fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal: {signal}");
        }
    }
    status.to_string()
}
