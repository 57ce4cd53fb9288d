use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Directory conventionally holding network plugin executables.
pub const DEFAULT_PLUGIN_DIR: &str = "/opt/cni/bin";

/// Version assumed for plugins that cannot report their own versions.
pub const DEFAULT_PLUGIN_VERSION: &str = "0.1.0";

/// Protocol revisions the caller can decode, least preferred first.
pub const DEFAULT_SUPPORTED_VERSIONS: &[&str] = &[
    "0.1.0", "0.2.0", "0.3.0", "0.3.1", "0.4.0", "1.0.0", "1.1.0",
];

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Directories searched for plugin executables when none are configured.
#[must_use]
pub fn default_plugin_dirs() -> Vec<Utf8PathBuf> {
    vec![Utf8PathBuf::from(DEFAULT_PLUGIN_DIR)]
}

/// The caller's supported protocol versions, least preferred first.
#[must_use]
pub fn default_supported_versions() -> Vec<String> {
    DEFAULT_SUPPORTED_VERSIONS
        .iter()
        .map(|version| (*version).to_owned())
        .collect()
}

/// Version assumed for plugins that predate version probing.
#[must_use]
pub fn default_plugin_version() -> String {
    DEFAULT_PLUGIN_VERSION.to_owned()
}

/// Per-invocation deadline in seconds; zero disables the deadline.
#[must_use]
pub const fn default_invoke_timeout_secs() -> u64 {
    0
}
