//! Shared configuration for callers of the network plugin invoker.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! `.netplug.toml` file (or the file named by `--config-path` /
//! `NETPLUG_CONFIG_PATH`), then `NETPLUG_*` environment variables, then
//! command-line style arguments.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod defaults;
mod logging;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_PLUGIN_DIR, DEFAULT_PLUGIN_VERSION, DEFAULT_SUPPORTED_VERSIONS,
    default_invoke_timeout_secs, default_log_filter, default_log_filter_string,
    default_log_format, default_plugin_dirs, default_plugin_version,
    default_supported_versions,
};
pub use logging::LogFormat;

/// Configuration consumed by the invoker and its telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "NETPLUG")]
pub struct Config {
    /// `tracing` filter directive, e.g. `info` or `netplug_invoke=debug`.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log events.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Directories searched, in order, for plugin executables.
    #[ortho_config(default = defaults::default_plugin_dirs())]
    pub plugin_dirs: Vec<Utf8PathBuf>,
    /// Protocol versions the caller can decode, least preferred first.
    #[ortho_config(default = defaults::default_supported_versions())]
    pub supported_versions: Vec<String>,
    /// Version assumed when a plugin cannot report its own.
    #[ortho_config(default = defaults::default_plugin_version())]
    pub plugin_default_version: String,
    /// Deadline applied to each invocation; `0` waits indefinitely.
    #[ortho_config(default = defaults::default_invoke_timeout_secs())]
    pub invoke_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            plugin_dirs: default_plugin_dirs(),
            supported_versions: default_supported_versions(),
            plugin_default_version: default_plugin_version(),
            invoke_timeout_secs: default_invoke_timeout_secs(),
        }
    }
}

impl Config {
    /// Log filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Plugin search directories.
    #[must_use]
    pub fn plugin_dirs(&self) -> &[Utf8PathBuf] {
        &self.plugin_dirs
    }

    /// The caller's version set, least preferred first.
    #[must_use]
    pub fn supported_versions(&self) -> &[String] {
        &self.supported_versions
    }

    /// Version assumed for plugins without version probing.
    #[must_use]
    pub const fn plugin_default_version(&self) -> &str {
        self.plugin_default_version.as_str()
    }

    /// Per-invocation deadline, if any.
    #[must_use]
    pub const fn invoke_timeout(&self) -> Option<Duration> {
        match self.invoke_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Checks the invariants the invoker relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the version set is empty, contains blank
    /// entries, or when the plugin default version is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supported_versions.is_empty() {
            return Err(ConfigError::NoSupportedVersions);
        }
        if let Some(position) = self
            .supported_versions
            .iter()
            .position(|version| version.trim().is_empty())
        {
            return Err(ConfigError::BlankVersion { position });
        }
        if self.plugin_default_version.trim().is_empty() {
            return Err(ConfigError::BlankPluginDefault);
        }
        Ok(())
    }

    /// Loads configuration from every layer and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Load`] when a layer cannot be parsed and
    /// [`LoadError::Invalid`] when the merged values fail [`Config::validate`].
    pub fn load_validated() -> Result<Self, LoadError> {
        let config = Self::load().map_err(LoadError::Load)?;
        config.validate()?;
        Ok(config)
    }
}

/// Invariant violations detected by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `supported_versions` was empty.
    #[error("at least one supported protocol version must be configured")]
    NoSupportedVersions,
    /// An entry of `supported_versions` was blank.
    #[error("supported protocol version at position {position} is blank")]
    BlankVersion {
        /// Zero-based index of the offending entry.
        position: usize,
    },
    /// `plugin_default_version` was blank.
    #[error("the plugin default version must not be blank")]
    BlankPluginDefault,
}

/// Errors raised by [`Config::load_validated`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// A configuration layer could not be read or merged.
    #[error("failed to load configuration: {0}")]
    Load(#[source] Arc<OrthoError>),
    /// The merged configuration is unusable.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}
