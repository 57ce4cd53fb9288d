//! Protocol version sets, probing and negotiation.
//!
//! A [`VersionSet`] lists version strings in order of preference, least
//! preferred first, the way plugins report `supportedVersions`. Versions are
//! compared as opaque strings; there is no semantic version arithmetic.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod negotiate;
mod probe;

pub use negotiate::{NegotiationError, Negotiator, negotiate};
pub use probe::{ProbeError, probe_or_default, probe_versions};

/// Versions claimed by one party, least preferred first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionSet(Vec<String>);

impl VersionSet {
    /// Creates a set from versions ordered least to most preferred.
    #[must_use]
    pub fn new<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(versions.into_iter().map(Into::into).collect())
    }

    /// A set holding exactly one version.
    #[must_use]
    pub fn single(version: impl Into<String>) -> Self {
        Self(vec![version.into()])
    }

    /// Returns `true` when `version` is a member.
    #[must_use]
    pub fn contains(&self, version: &str) -> bool {
        self.0.iter().any(|candidate| candidate == version)
    }

    /// Returns the most preferred version.
    #[must_use]
    pub fn preferred(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Iterates from least to most preferred.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns `true` when the set has no members.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of members.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the members as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for VersionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<&[String]> for VersionSet {
    fn from(versions: &[String]) -> Self {
        Self(versions.to_vec())
    }
}

impl fmt::Display for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Versions a legacy `0.2.0` plugin supports without listing them.
const LEGACY_VERSIONS: &[&str] = &["0.1.0", "0.2.0"];

/// A plugin's reply to the VERSION operation.
///
/// ```json
/// { "cniVersion": "1.0.0", "supportedVersions": ["0.4.0", "1.0.0"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    #[serde(rename = "cniVersion", default)]
    version: String,
    #[serde(rename = "supportedVersions", default)]
    supported: Vec<String>,
}

impl PluginInfo {
    /// Creates a report for a plugin answering with `version`.
    #[must_use]
    pub fn new(version: impl Into<String>, supported: VersionSet) -> Self {
        Self {
            version: version.into(),
            supported: supported.0,
        }
    }

    /// Version the plugin used to answer.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Decodes a VERSION reply into the plugin's version set.
    ///
    /// Plugins answering `0.2.0` without `supportedVersions` predate the
    /// field and are taken to support `0.1.0` and `0.2.0`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionDecodeError`] for malformed JSON, a missing
    /// `cniVersion`, or a missing `supportedVersions` from a newer plugin.
    pub fn decode(bytes: &[u8]) -> Result<VersionSet, VersionDecodeError> {
        let info: Self = serde_json::from_slice(bytes).map_err(VersionDecodeError::Json)?;
        if info.version.is_empty() {
            return Err(VersionDecodeError::MissingField("cniVersion"));
        }
        if !info.supported.is_empty() {
            return Ok(VersionSet(info.supported));
        }
        if info.version == "0.2.0" {
            return Ok(VersionSet::new(LEGACY_VERSIONS.iter().copied()));
        }
        Err(VersionDecodeError::MissingField("supportedVersions"))
    }
}

/// Errors raised while decoding a VERSION reply.
#[derive(Debug, Error)]
pub enum VersionDecodeError {
    /// The reply was not valid JSON of the expected shape.
    #[error("decoding version info: {0}")]
    Json(#[source] serde_json::Error),
    /// A required field was absent.
    #[error("decoding version info: missing field {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests;
