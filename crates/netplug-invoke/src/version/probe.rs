//! Asking a plugin which protocol versions it supports.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::{PluginInfo, VersionDecodeError, VersionSet};
use crate::args::{InvocationRequest, Operation, RequestError};
use crate::context::InvokeContext;
use crate::envelope::ErrorCode;
use crate::error::{InvokeError, PluginFailure};
use crate::exec::Exec;

const PROBE_TARGET: &str = "netplug_invoke::version";

/// Marker plugins print when they do not recognise the operation.
const UNKNOWN_COMMAND: &str = "unknown CNI_COMMAND";

/// Failures while probing a plugin's versions.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The plugin does not implement the VERSION operation.
    #[error("plugin {} does not support version probing: {source}", .path.display())]
    Unsupported {
        /// Plugin that was probed.
        path: PathBuf,
        /// The failure that identified the plugin as too old.
        #[source]
        source: PluginFailure,
    },
    /// The VERSION invocation failed for another reason.
    #[error("failed to probe plugin {} for its versions: {source}", .path.display())]
    Invoke {
        /// Plugin that was probed.
        path: PathBuf,
        /// Underlying invocation error.
        #[source]
        source: InvokeError,
    },
    /// The plugin answered with an unreadable report.
    #[error("plugin {} returned an unreadable version report: {source}", .path.display())]
    Decode {
        /// Plugin that was probed.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: VersionDecodeError,
    },
    /// The VERSION request could not be rendered.
    #[error(transparent)]
    Request(#[from] RequestError),
}

impl ProbeError {
    /// Returns `true` when the plugin definitely lacks version probing.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Runs the VERSION operation and decodes the plugin's version set.
///
/// The plugin receives an empty stdin and no namespace, interface or
/// container id.
///
/// # Errors
///
/// Returns [`ProbeError::Unsupported`] when the plugin rejects the operation
/// as unknown, so callers can fall back to a default set, and other
/// [`ProbeError`] variants for every other failure.
pub fn probe_versions<E: Exec + ?Sized>(
    exec: &E,
    ctx: &InvokeContext,
    plugin_path: &Path,
) -> Result<VersionSet, ProbeError> {
    let env = InvocationRequest::new(Operation::Version).to_env()?;

    debug!(
        target: PROBE_TARGET,
        plugin = %plugin_path.display(),
        "probing plugin versions"
    );

    let stdout = exec
        .exec_plugin(ctx, plugin_path, b"", &env)
        .map_err(|error| classify(plugin_path, error))?;

    let versions = PluginInfo::decode(&stdout).map_err(|source| ProbeError::Decode {
        path: plugin_path.to_path_buf(),
        source,
    })?;

    debug!(
        target: PROBE_TARGET,
        plugin = %plugin_path.display(),
        %versions,
        "plugin reported versions"
    );
    Ok(versions)
}

/// Probes, substituting `default` when the plugin predates version probing.
///
/// # Errors
///
/// Returns every [`ProbeError`] except [`ProbeError::Unsupported`].
pub fn probe_or_default<E: Exec + ?Sized>(
    exec: &E,
    ctx: &InvokeContext,
    plugin_path: &Path,
    default: &VersionSet,
) -> Result<VersionSet, ProbeError> {
    match probe_versions(exec, ctx, plugin_path) {
        Err(error) if error.is_unsupported() => {
            debug!(
                target: PROBE_TARGET,
                plugin = %plugin_path.display(),
                %default,
                "plugin lacks version probing; assuming default"
            );
            Ok(default.clone())
        }
        other => other,
    }
}

fn classify(plugin_path: &Path, error: InvokeError) -> ProbeError {
    match error {
        InvokeError::Failure(failure) if rejects_operation(&failure) => ProbeError::Unsupported {
            path: plugin_path.to_path_buf(),
            source: failure,
        },
        other => ProbeError::Invoke {
            path: plugin_path.to_path_buf(),
            source: other,
        },
    }
}

fn rejects_operation(failure: &PluginFailure) -> bool {
    match failure {
        PluginFailure::Plugin { code, message, .. } => {
            message.contains(UNKNOWN_COMMAND)
                || (*code == ErrorCode::InvalidEnvironmentVariables
                    && message.contains(Operation::Version.to_string().as_str()))
        }
        PluginFailure::Stderr { text } => text.contains(UNKNOWN_COMMAND),
        PluginFailure::OpaqueExit { .. } | PluginFailure::Launch { .. } => false,
    }
}
