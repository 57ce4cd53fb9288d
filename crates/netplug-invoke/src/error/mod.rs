//! Errors surfaced by plugin invocation.
//!
//! [`PluginFailure`] is the closed set of ways a plugin process can fail.
//! [`InvokeError`] adds the failures of the exec layer itself (cancellation,
//! deadlines and pipe plumbing). [`InvokerError`] is what the
//! [`PluginInvoker`](crate::invoker::PluginInvoker) facade returns. I/O errors
//! are wrapped in `Arc` so every error stays `Clone`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::args::RequestError;
use crate::envelope::ErrorCode;
use crate::find::FindError;
use crate::version::{NegotiationError, ProbeError};

/// Ways a plugin invocation can fail, in decreasing order of precedence.
///
/// A structured envelope on stdout always wins, then stderr text, then the
/// bare exit status.
#[derive(Debug, Clone, Error)]
pub enum PluginFailure {
    /// The plugin reported a structured error envelope on stdout.
    #[error("{}", plugin_message(.message, .details))]
    Plugin {
        /// Numeric code from the envelope.
        code: ErrorCode,
        /// Primary message.
        message: String,
        /// Free-form details, empty when absent.
        details: String,
    },

    /// The plugin exited non-zero without an envelope but wrote to stderr.
    #[error("netplugin failed: {text:?}")]
    Stderr {
        /// Everything the plugin wrote to stderr.
        text: String,
    },

    /// The plugin exited non-zero without an envelope or any stderr output.
    #[error("{}", opaque_message(.status, .stdout))]
    OpaqueExit {
        /// Exit status description, e.g. `exit status 1`.
        status: String,
        /// Unrecognised stdout text, empty when the plugin printed nothing.
        stdout: String,
    },

    /// The executable could not be started.
    #[error("failed to launch plugin {}: {source}", .path.display())]
    Launch {
        /// Path that was executed.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl PluginFailure {
    /// Returns the envelope code when the plugin reported one.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Plugin { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn plugin_message(message: &str, details: &str) -> String {
    if details.is_empty() {
        message.to_owned()
    } else {
        format!("{message}; {details}")
    }
}

fn opaque_message(status: &str, stdout: &str) -> String {
    if stdout.is_empty() {
        format!("netplugin failed with no error message: {status}")
    } else {
        format!("netplugin failed with unrecognised output {stdout:?}: {status}")
    }
}

/// Errors returned by an [`Exec`](crate::exec::Exec) implementation.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    /// The plugin ran and failed, or could not be launched.
    #[error(transparent)]
    Failure(#[from] PluginFailure),

    /// The invocation context was cancelled before the plugin exited.
    #[error("invocation of plugin {} was cancelled", .path.display())]
    Cancelled {
        /// Plugin that was terminated.
        path: PathBuf,
    },

    /// The invocation deadline passed before the plugin exited.
    #[error("plugin {} did not exit within {}ms", .path.display(), .timeout.as_millis())]
    TimedOut {
        /// Plugin that was terminated.
        path: PathBuf,
        /// Deadline configured on the context.
        timeout: Duration,
    },

    /// Communicating with a running plugin failed.
    #[error("I/O error communicating with plugin {}: {source}", .path.display())]
    Io {
        /// Plugin being executed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl InvokeError {
    /// Returns the plugin failure, if this error is one.
    #[must_use]
    pub const fn failure(&self) -> Option<&PluginFailure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Errors raised by the [`PluginInvoker`](crate::invoker::PluginInvoker).
#[derive(Debug, Error)]
pub enum InvokerError {
    /// The request could not be rendered into environment variables.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// The plugin executable could not be located.
    #[error(transparent)]
    Find(#[from] FindError),
    /// Running the plugin failed.
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    /// Asking the plugin for its versions failed.
    #[error(transparent)]
    Probe(#[from] ProbeError),
    /// No protocol version is acceptable to both sides.
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
}
