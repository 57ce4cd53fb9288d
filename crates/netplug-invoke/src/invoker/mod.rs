//! High-level entry point tying invocation, lookup and negotiation together.
//!
//! A [`PluginInvoker`] owns an [`Exec`] transport together with the caller's
//! supported protocol versions, the fallback assumed for plugins that
//! cannot report theirs, and the directories searched when a request names
//! none of its own. Every operation takes an explicit
//! [`InvokeContext`]; [`PluginInvoker::context`] builds one carrying the
//! configured default timeout.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use netplug_config::Config;
use tracing::{debug, info};

use crate::args::InvocationRequest;
use crate::context::InvokeContext;
use crate::error::InvokerError;
use crate::exec::Exec;
use crate::find::find_in_path;
use crate::version::{self, Negotiator, VersionSet};

const INVOKER_TARGET: &str = "netplug_invoke::invoker";

/// Runs plugins and negotiates protocol versions with them.
///
/// # Example
///
/// ```no_run
/// use std::borrow::Cow;
/// use std::path::{Path, PathBuf};
///
/// use netplug_config::Config;
/// use netplug_invoke::args::{InvocationRequest, Operation};
/// use netplug_invoke::exec::RawExec;
/// use netplug_invoke::invoker::PluginInvoker;
///
/// # fn main() -> Result<(), netplug_invoke::error::InvokerError> {
/// let invoker = PluginInvoker::from_config(RawExec::new(), &Config::default());
/// let request = InvocationRequest::new(Operation::Add)
///     .with_container_id("abc123")
///     .with_net_namespace("/var/run/netns/abc123")
///     .with_if_name("eth0")
///     .with_path_search(["/opt/cni/bin"])
///     .with_config(br#"{"cniVersion":"1.0.0","name":"net","type":"bridge"}"#.to_vec());
/// let result = invoker.find_and_invoke(&invoker.context(), "bridge", &request)?;
/// # drop(result);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PluginInvoker<E> {
    exec: E,
    caller_versions: VersionSet,
    negotiator: Negotiator,
    plugin_dirs: Vec<PathBuf>,
    timeout: Option<Duration>,
}

impl<E> PluginInvoker<E> {
    /// Creates an invoker without a default timeout.
    #[must_use]
    pub const fn new(exec: E, caller_versions: VersionSet, negotiator: Negotiator) -> Self {
        Self {
            exec,
            caller_versions,
            negotiator,
            plugin_dirs: Vec::new(),
            timeout: None,
        }
    }

    /// Creates an invoker from the configured versions, plugin directories
    /// and timeout.
    #[must_use]
    pub fn from_config(exec: E, config: &Config) -> Self {
        Self::new(
            exec,
            VersionSet::from(config.supported_versions()),
            Negotiator::from_config(config),
        )
        .with_plugin_dirs(config.plugin_dirs().iter().cloned())
        .with_timeout(config.invoke_timeout())
    }

    /// Sets the directories used for requests without a search path.
    #[must_use]
    pub fn with_plugin_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.plugin_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the timeout applied by [`PluginInvoker::context`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// A fresh context carrying the default timeout, if any.
    #[must_use]
    pub fn context(&self) -> InvokeContext {
        InvokeContext::background().with_optional_timeout(self.timeout)
    }

    /// The transport used to run plugins.
    #[must_use]
    pub const fn exec(&self) -> &E {
        &self.exec
    }

    /// Versions the caller understands, least preferred first.
    #[must_use]
    pub const fn caller_versions(&self) -> &VersionSet {
        &self.caller_versions
    }

    /// Directories searched when a request carries no search path.
    #[must_use]
    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// The negotiator holding the plugin default set.
    #[must_use]
    pub const fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }
}

impl<E: Exec> PluginInvoker<E> {
    /// Runs the plugin at `plugin_path` and returns its stdout.
    ///
    /// # Errors
    ///
    /// Returns [`InvokerError::Request`] when the request cannot be rendered
    /// and [`InvokerError::Invoke`] when the plugin fails.
    pub fn invoke(
        &self,
        ctx: &InvokeContext,
        plugin_path: &Path,
        request: &InvocationRequest,
    ) -> Result<Vec<u8>, InvokerError> {
        let env = request.to_env()?;
        debug!(
            target: INVOKER_TARGET,
            plugin = %plugin_path.display(),
            operation = %request.operation(),
            container = request.container_id(),
            "invoking plugin"
        );
        let stdout = self
            .exec
            .exec_plugin(ctx, plugin_path, request.config(), &env)?;
        Ok(stdout)
    }

    /// Resolves `name` through the request's search path, then invokes it.
    ///
    /// A request without a search path uses the invoker's plugin
    /// directories, both for the lookup and as the plugin's `CNI_PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`InvokerError::Find`] when the plugin cannot be located, or
    /// any error from [`PluginInvoker::invoke`].
    pub fn find_and_invoke(
        &self,
        ctx: &InvokeContext,
        name: &str,
        request: &InvocationRequest,
    ) -> Result<Vec<u8>, InvokerError> {
        let effective = if request.path_search().is_empty() {
            Cow::Owned(request.clone().with_path_search(self.plugin_dirs.iter().cloned()))
        } else {
            Cow::Borrowed(request)
        };
        let plugin_path = find_in_path(name, effective.path_search())?;
        self.invoke(ctx, &plugin_path, &effective)
    }

    /// Asks the plugin which protocol versions it supports.
    ///
    /// # Errors
    ///
    /// Returns [`InvokerError::Probe`] for any probing failure, including
    /// plugins that do not implement the VERSION operation.
    pub fn probe_versions(
        &self,
        ctx: &InvokeContext,
        plugin_path: &Path,
    ) -> Result<VersionSet, InvokerError> {
        Ok(version::probe_versions(&self.exec, ctx, plugin_path)?)
    }

    /// Probes the plugin and picks the version both sides prefer.
    ///
    /// Plugins that do not implement VERSION are assumed to support the
    /// negotiator's default set.
    ///
    /// # Errors
    ///
    /// Returns [`InvokerError::Probe`] when probing fails for another reason
    /// and [`InvokerError::Negotiation`] when no version is shared.
    pub fn negotiate(&self, ctx: &InvokeContext, plugin_path: &Path) -> Result<String, InvokerError> {
        let reported =
            version::probe_or_default(&self.exec, ctx, plugin_path, &VersionSet::default())?;
        let chosen = self.negotiator.negotiate(&self.caller_versions, &reported)?;
        info!(
            target: INVOKER_TARGET,
            plugin = %plugin_path.display(),
            version = %chosen,
            "negotiated protocol version"
        );
        Ok(chosen)
    }

    /// Negotiates a version, records it on the request, then invokes.
    ///
    /// # Errors
    ///
    /// Returns any error from [`PluginInvoker::negotiate`] or
    /// [`PluginInvoker::invoke`].
    pub fn invoke_negotiated(
        &self,
        ctx: &InvokeContext,
        plugin_path: &Path,
        request: InvocationRequest,
    ) -> Result<Vec<u8>, InvokerError> {
        let chosen = self.negotiate(ctx, plugin_path)?;
        let negotiated = request.with_protocol_version(chosen);
        self.invoke(ctx, plugin_path, &negotiated)
    }
}
