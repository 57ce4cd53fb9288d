//! Structured error envelope exchanged on a failed invocation.
//!
//! A well-behaved plugin that fails prints a single JSON object to stdout:
//!
//! ```json
//! { "code": 7, "msg": "invalid network config", "details": "missing bridge" }
//! ```
//!
//! Only `msg` is mandatory. A missing or `null` `code` decodes as
//! [`ErrorCode::Unknown`] and a missing or `null` `details` as the empty
//! string; unrecognised fields are ignored. Anything that is not a JSON object carrying a non-empty string
//! `msg` is not an envelope.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PluginFailure;

/// Numeric error codes with a protocol-defined meaning.
///
/// Codes outside the well-known set round-trip through [`ErrorCode::Other`].
/// Codes compare by wire value, so `Other(4)` equals
/// [`ErrorCode::InvalidEnvironmentVariables`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum ErrorCode {
    /// No code was supplied, or the plugin reported `0`.
    #[default]
    Unknown,
    /// The plugin cannot speak the requested protocol version.
    IncompatibleVersion,
    /// The configuration contains a field the plugin does not support.
    UnsupportedField,
    /// The container does not exist or is unknown to the plugin.
    UnknownContainer,
    /// Required environment variables were missing or malformed.
    InvalidEnvironmentVariables,
    /// An I/O operation inside the plugin failed.
    IoFailure,
    /// The plugin could not decode its input.
    DecodingFailure,
    /// The network configuration was rejected.
    InvalidNetworkConfig,
    /// A transient condition; the caller may retry later.
    TryAgainLater,
    /// An internal plugin error.
    Internal,
    /// A plugin-specific code.
    Other(u32),
}

impl ErrorCode {
    /// Returns the wire value of the code.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::IncompatibleVersion => 1,
            Self::UnsupportedField => 2,
            Self::UnknownContainer => 3,
            Self::InvalidEnvironmentVariables => 4,
            Self::IoFailure => 5,
            Self::DecodingFailure => 6,
            Self::InvalidNetworkConfig => 7,
            Self::TryAgainLater => 11,
            Self::Internal => 999,
            Self::Other(code) => code,
        }
    }
}

impl PartialEq for ErrorCode {
    fn eq(&self, other: &Self) -> bool {
        self.as_u32() == other.as_u32()
    }
}

impl Eq for ErrorCode {}

impl Hash for ErrorCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_u32().hash(state);
    }
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::IncompatibleVersion,
            2 => Self::UnsupportedField,
            3 => Self::UnknownContainer,
            4 => Self::InvalidEnvironmentVariables,
            5 => Self::IoFailure,
            6 => Self::DecodingFailure,
            7 => Self::InvalidNetworkConfig,
            11 => Self::TryAgainLater,
            999 => Self::Internal,
            other => Self::Other(other),
        }
    }
}

impl From<ErrorCode> for u32 {
    fn from(code: ErrorCode) -> Self {
        code.as_u32()
    }
}

/// The JSON object a failing plugin writes to stdout.
///
/// # Example
///
/// ```
/// use netplug_invoke::envelope::{self, Envelope, ErrorCode};
///
/// let original = Envelope::new(ErrorCode::TryAgainLater, "busy").with_details("lock held");
/// let bytes = envelope::encode(&original).expect("encode");
/// assert_eq!(Envelope::from_slice(&bytes), Some(original));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(
        rename = "cniVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    version: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    code: ErrorCode,
    msg: String,
    #[serde(default, deserialize_with = "null_as_default")]
    details: String,
}

impl Envelope {
    /// Creates an envelope without details.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            version: None,
            code,
            msg: message.into(),
            details: String::new(),
        }
    }

    /// Attaches free-form details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Records the protocol version the plugin answered with.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the primary message.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.msg.as_str()
    }

    /// Returns the details text, empty when absent.
    #[must_use]
    pub const fn details(&self) -> &str {
        self.details.as_str()
    }

    /// Returns the protocol version, if the plugin supplied one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Parses an envelope, returning `None` for anything that is not one.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
        // Derived struct impls also accept arrays; only objects qualify.
        if !value.is_object() {
            return None;
        }
        serde_json::from_value::<Self>(value)
            .ok()
            .filter(|envelope| !envelope.msg.is_empty())
    }

    /// Converts the envelope into the failure surfaced to callers.
    #[must_use]
    pub fn into_failure(self) -> PluginFailure {
        PluginFailure::Plugin {
            code: self.code,
            message: self.msg,
            details: self.details,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes stdout bytes into a [`PluginFailure::Plugin`].
///
/// Returns `None` when the bytes are not a structurally valid envelope.
#[must_use]
pub fn decode(bytes: &[u8]) -> Option<PluginFailure> {
    Envelope::from_slice(bytes).map(Envelope::into_failure)
}

/// Serialises an envelope the way a plugin prints it.
///
/// # Errors
///
/// Returns the underlying `serde_json` error if serialisation fails.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(envelope)
}
