//! Invocation requests and their rendering into plugin environment variables.
//!
//! Everything a plugin needs besides its configuration travels in the
//! environment. [`InvocationRequest::to_env`] produces the complete set of
//! protocol variables; the exec layer strips any inherited copies of
//! [`RECOGNISED_KEYS`] before applying them so a caller's own environment can
//! never leak into a plugin.

use std::env;
use std::path::{Path, PathBuf};

use strum::{Display, EnumString};
use thiserror::Error;

/// Operation verb.
pub const ENV_COMMAND: &str = "CNI_COMMAND";
/// Container identifier.
pub const ENV_CONTAINER_ID: &str = "CNI_CONTAINERID";
/// Network namespace path; omitted when the request has none.
pub const ENV_NETNS: &str = "CNI_NETNS";
/// `;`-separated `KEY=VALUE` plugin arguments.
pub const ENV_ARGS: &str = "CNI_ARGS";
/// Interface name inside the container.
pub const ENV_IFNAME: &str = "CNI_IFNAME";
/// Directories searched by the plugin for delegate binaries.
pub const ENV_PATH: &str = "CNI_PATH";
/// Protocol version chosen by negotiation; omitted when unknown.
pub const ENV_VERSION: &str = "CNI_VERSION";

/// Every environment variable owned by the protocol.
pub const RECOGNISED_KEYS: &[&str] = &[
    ENV_COMMAND,
    ENV_CONTAINER_ID,
    ENV_NETNS,
    ENV_ARGS,
    ENV_IFNAME,
    ENV_PATH,
    ENV_VERSION,
];

/// Operation requested of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Operation {
    /// Attach the container to the network.
    Add,
    /// Detach the container from the network.
    Del,
    /// Verify an earlier attachment is still in place.
    Check,
    /// Report the protocol versions the plugin supports.
    Version,
    /// Remove resources no longer referenced by any attachment.
    Gc,
    /// Report whether the plugin is ready to service requests.
    Status,
}

/// Errors raised while rendering a request into environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A plugin argument key was empty or contained `=` or `;`.
    #[error("plugin argument key {key:?} must be non-empty and free of '=' and ';'")]
    InvalidArgKey {
        /// Offending key.
        key: String,
    },
    /// A plugin argument value contained `;`.
    #[error("plugin argument {key:?} has a value containing ';'")]
    InvalidArgValue {
        /// Key whose value was rejected.
        key: String,
    },
    /// A search directory contained the platform path-list separator.
    #[error("search directory {path:?} cannot be joined into a path list")]
    UnjoinablePath {
        /// Offending directory.
        path: PathBuf,
    },
    /// A namespace path or search directory is not valid UTF-8.
    #[error("{variable} path {path:?} is not valid UTF-8")]
    NonUnicodePath {
        /// Variable the path was destined for.
        variable: &'static str,
        /// Offending path.
        path: PathBuf,
    },
}

/// A single plugin invocation.
///
/// Built once and not mutated afterwards; every `with_*` method consumes the
/// request and returns the updated value.
///
/// # Example
///
/// ```
/// use netplug_invoke::args::{InvocationRequest, Operation};
///
/// let request = InvocationRequest::new(Operation::Add)
///     .with_container_id("some-container-id")
///     .with_net_namespace("/some/netns/path")
///     .with_if_name("eth0")
///     .with_arg("IgnoreUnknown", "1")
///     .with_config(br#"{"cniVersion":"1.0.0","name":"net"}"#.to_vec());
///
/// let env = request.to_env().expect("renderable");
/// assert!(env.contains(&("CNI_COMMAND".to_owned(), "ADD".to_owned())));
/// assert!(env.contains(&("CNI_ARGS".to_owned(), "IgnoreUnknown=1".to_owned())));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    operation: Operation,
    container_id: String,
    net_namespace: Option<PathBuf>,
    if_name: String,
    plugin_args: Vec<(String, String)>,
    path_search: Vec<PathBuf>,
    protocol_version: Option<String>,
    config: Vec<u8>,
}

impl InvocationRequest {
    /// Creates an empty request for the operation.
    #[must_use]
    pub const fn new(operation: Operation) -> Self {
        Self {
            operation,
            container_id: String::new(),
            net_namespace: None,
            if_name: String::new(),
            plugin_args: Vec::new(),
            path_search: Vec::new(),
            protocol_version: None,
            config: Vec::new(),
        }
    }

    /// Sets the container identifier.
    #[must_use]
    pub fn with_container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = container_id.into();
        self
    }

    /// Sets the network namespace path.
    #[must_use]
    pub fn with_net_namespace(mut self, path: impl Into<PathBuf>) -> Self {
        self.net_namespace = Some(path.into());
        self
    }

    /// Sets the interface name.
    #[must_use]
    pub fn with_if_name(mut self, if_name: impl Into<String>) -> Self {
        self.if_name = if_name.into();
        self
    }

    /// Appends a plugin argument; order is preserved on the wire.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.plugin_args.push((key.into(), value.into()));
        self
    }

    /// Replaces the delegate search path.
    #[must_use]
    pub fn with_path_search<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.path_search = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Pins the protocol version.
    #[must_use]
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = Some(version.into());
        self
    }

    /// Sets the configuration bytes written to the plugin's stdin.
    #[must_use]
    pub fn with_config(mut self, config: impl Into<Vec<u8>>) -> Self {
        self.config = config.into();
        self
    }

    /// Returns the operation.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the container identifier.
    #[must_use]
    pub const fn container_id(&self) -> &str {
        self.container_id.as_str()
    }

    /// Returns the network namespace path, if any.
    #[must_use]
    pub fn net_namespace(&self) -> Option<&Path> {
        self.net_namespace.as_deref()
    }

    /// Returns the interface name.
    #[must_use]
    pub const fn if_name(&self) -> &str {
        self.if_name.as_str()
    }

    /// Returns the plugin arguments in insertion order.
    #[must_use]
    pub fn plugin_args(&self) -> &[(String, String)] {
        &self.plugin_args
    }

    /// Returns the delegate search path.
    #[must_use]
    pub fn path_search(&self) -> &[PathBuf] {
        &self.path_search
    }

    /// Returns the pinned protocol version, if any.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Returns the configuration bytes.
    #[must_use]
    pub fn config(&self) -> &[u8] {
        &self.config
    }

    /// Renders the protocol environment variables for this request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when a plugin argument cannot be encoded, a
    /// search directory cannot be joined into a path list, or a path is not
    /// valid UTF-8.
    pub fn to_env(&self) -> Result<Vec<(String, String)>, RequestError> {
        let mut env = vec![
            (ENV_COMMAND.to_owned(), self.operation.to_string()),
            (ENV_CONTAINER_ID.to_owned(), self.container_id.clone()),
        ];
        if let Some(netns) = &self.net_namespace {
            env.push((ENV_NETNS.to_owned(), unicode_path(ENV_NETNS, netns)?.to_owned()));
        }
        env.push((ENV_ARGS.to_owned(), encode_args(&self.plugin_args)?));
        env.push((ENV_IFNAME.to_owned(), self.if_name.clone()));
        env.push((ENV_PATH.to_owned(), join_search_path(&self.path_search)?));
        if let Some(version) = &self.protocol_version {
            env.push((ENV_VERSION.to_owned(), version.clone()));
        }
        Ok(env)
    }
}

fn encode_args(args: &[(String, String)]) -> Result<String, RequestError> {
    let mut pairs = Vec::with_capacity(args.len());
    for (key, value) in args {
        if key.is_empty() || key.contains(['=', ';']) {
            return Err(RequestError::InvalidArgKey { key: key.clone() });
        }
        if value.contains(';') {
            return Err(RequestError::InvalidArgValue { key: key.clone() });
        }
        pairs.push(format!("{key}={value}"));
    }
    Ok(pairs.join(";"))
}

fn unicode_path<'a>(variable: &'static str, path: &'a Path) -> Result<&'a str, RequestError> {
    path.to_str().ok_or_else(|| RequestError::NonUnicodePath {
        variable,
        path: path.to_path_buf(),
    })
}

fn join_search_path(dirs: &[PathBuf]) -> Result<String, RequestError> {
    for dir in dirs {
        unicode_path(ENV_PATH, dir)?;
    }
    let joined = env::join_paths(dirs).map_err(|_| RequestError::UnjoinablePath {
        path: first_unjoinable(dirs),
    })?;
    joined
        .into_string()
        .map_err(|raw| RequestError::NonUnicodePath {
            variable: ENV_PATH,
            path: PathBuf::from(raw),
        })
}

fn first_unjoinable(dirs: &[PathBuf]) -> PathBuf {
    dirs.iter()
        .find(|dir| env::join_paths([dir.as_path()]).is_err())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
