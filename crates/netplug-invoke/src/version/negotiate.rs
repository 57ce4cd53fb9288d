//! Selecting one protocol version acceptable to caller and plugin.

use netplug_config::Config;
use thiserror::Error;

use super::VersionSet;

/// Negotiation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    /// The two version sets share no member.
    #[error("no protocol version supported by both caller {caller} and plugin {plugin}")]
    NoSupportedVersion {
        /// The caller's set, verbatim.
        caller: VersionSet,
        /// The plugin's set, verbatim.
        plugin: VersionSet,
    },
}

/// Picks the caller's most preferred version that the plugin also supports.
///
/// The caller's ordering is authoritative because the caller decodes the
/// result. An empty `plugin` set shares nothing with the caller; use
/// [`Negotiator`] to substitute a default for plugins that cannot report
/// their versions.
///
/// # Errors
///
/// Returns [`NegotiationError::NoSupportedVersion`] when the sets are
/// disjoint.
///
/// # Example
///
/// ```
/// use netplug_invoke::version::{VersionSet, negotiate};
///
/// let caller = VersionSet::new(["v1", "v2", "v3"]);
/// let plugin = VersionSet::new(["v2", "v3", "v4"]);
/// assert_eq!(negotiate(&caller, &plugin).as_deref(), Ok("v3"));
/// ```
pub fn negotiate(caller: &VersionSet, plugin: &VersionSet) -> Result<String, NegotiationError> {
    caller
        .iter()
        .rev()
        .find(|version| plugin.contains(version))
        .map(ToOwned::to_owned)
        .ok_or_else(|| NegotiationError::NoSupportedVersion {
            caller: caller.clone(),
            plugin: plugin.clone(),
        })
}

/// Negotiates with a fallback for plugins that report no versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiator {
    plugin_default: VersionSet,
}

impl Negotiator {
    /// Uses `plugin_default` whenever a plugin reports an empty set.
    #[must_use]
    pub const fn new(plugin_default: VersionSet) -> Self {
        Self { plugin_default }
    }

    /// Builds a negotiator from the configured plugin default version.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(VersionSet::single(config.plugin_default_version()))
    }

    /// The set assumed for plugins that report nothing.
    #[must_use]
    pub const fn plugin_default(&self) -> &VersionSet {
        &self.plugin_default
    }

    /// Negotiates, substituting the plugin default for an empty `plugin`.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError::NoSupportedVersion`] when the caller's set
    /// and the effective plugin set are disjoint.
    pub fn negotiate(
        &self,
        caller: &VersionSet,
        plugin: &VersionSet,
    ) -> Result<String, NegotiationError> {
        if plugin.is_empty() {
            return negotiate(caller, &self.plugin_default);
        }
        negotiate(caller, plugin)
    }
}
