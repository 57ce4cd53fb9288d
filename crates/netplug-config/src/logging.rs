use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log events are rendered.
///
/// Parsed case-insensitively from `json`, `compact` or `full`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per event, for log collectors.
    #[default]
    Json,
    /// Abbreviated single-line text.
    Compact,
    /// Single-line text with every span and field spelled out.
    Full,
}

impl LogFormat {
    /// Returns `true` for machine-readable output.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}
