//! Unit tests for version sets, probing and negotiation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::context::InvokeContext;
use crate::envelope::ErrorCode;
use crate::error::{InvokeError, PluginFailure};
use crate::exec::MockExec;

fn set(versions: &[&str]) -> VersionSet {
    VersionSet::new(versions.iter().copied())
}

fn replying(result: Result<Vec<u8>, InvokeError>) -> MockExec {
    let mut exec = MockExec::new();
    exec.expect_exec_plugin()
        .times(1)
        .return_once(move |_, _, _, _| result);
    exec
}

fn plugin_error(code: ErrorCode, message: &str) -> InvokeError {
    InvokeError::Failure(PluginFailure::Plugin {
        code,
        message: message.into(),
        details: String::new(),
    })
}

// ---------------------------------------------------------------------------
// VersionSet
// ---------------------------------------------------------------------------

#[test]
fn version_set_prefers_its_last_entry() {
    let versions = set(&["0.3.1", "0.4.0", "1.0.0"]);
    assert_eq!(versions.preferred(), Some("1.0.0"));
    assert!(versions.contains("0.4.0"));
    assert!(!versions.contains("0.4"));
    assert_eq!(versions.to_string(), "[0.3.1, 0.4.0, 1.0.0]");
}

#[test]
fn version_set_serialises_as_a_plain_array() {
    let json = serde_json::to_string(&set(&["0.1.0", "0.2.0"])).expect("serialise");
    assert_eq!(json, r#"["0.1.0","0.2.0"]"#);
}

// ---------------------------------------------------------------------------
// PluginInfo decoding
// ---------------------------------------------------------------------------

#[test]
fn decodes_supported_versions_in_order() {
    let versions = PluginInfo::decode(
        br#"{"cniVersion":"1.0.0","supportedVersions":["0.4.0","1.0.0"],"extra":true}"#,
    )
    .expect("decode");
    assert_eq!(versions, set(&["0.4.0", "1.0.0"]));
}

#[test]
fn legacy_reply_implies_early_versions() {
    let versions = PluginInfo::decode(br#"{"cniVersion":"0.2.0"}"#).expect("decode");
    assert_eq!(versions, set(&["0.1.0", "0.2.0"]));
}

#[rstest]
#[case::missing_version(br#"{"supportedVersions":["1.0.0"]}"#.as_slice(), "cniVersion")]
#[case::missing_supported(br#"{"cniVersion":"1.0.0"}"#.as_slice(), "supportedVersions")]
fn incomplete_replies_name_the_missing_field(#[case] bytes: &[u8], #[case] field: &str) {
    let error = PluginInfo::decode(bytes).expect_err("should fail");
    assert!(
        matches!(error, VersionDecodeError::MissingField(name) if name == field),
        "unexpected error: {error}"
    );
}

#[test]
fn malformed_reply_is_a_json_error() {
    let error = PluginInfo::decode(b"not json").expect_err("should fail");
    assert!(matches!(error, VersionDecodeError::Json(_)));
}

#[test]
fn plugin_info_round_trips_through_json() {
    let info = PluginInfo::new("1.1.0", set(&["1.0.0", "1.1.0"]));
    let bytes = serde_json::to_vec(&info).expect("serialise");
    assert_eq!(info.version(), "1.1.0");
    assert_eq!(
        PluginInfo::decode(&bytes).expect("decode"),
        set(&["1.0.0", "1.1.0"])
    );
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

#[test]
fn picks_the_callers_most_preferred_shared_version() {
    let chosen = negotiate(&set(&["v1", "v2", "v3"]), &set(&["v2", "v3", "v4"]));
    assert_eq!(chosen.as_deref(), Ok("v3"));
}

#[test]
fn caller_ordering_wins_over_plugin_ordering() {
    let chosen = negotiate(&set(&["v3", "v2"]), &set(&["v2", "v3"]));
    assert_eq!(chosen.as_deref(), Ok("v2"));
}

#[test]
fn disjoint_sets_fail_naming_both() {
    let error = negotiate(&set(&["v1"]), &set(&["v9"])).expect_err("should fail");
    let message = error.to_string();
    assert!(message.contains("[v1]"), "caller set missing: {message}");
    assert!(message.contains("[v9]"), "plugin set missing: {message}");
    assert_eq!(
        error,
        NegotiationError::NoSupportedVersion {
            caller: set(&["v1"]),
            plugin: set(&["v9"]),
        }
    );
}

#[test]
fn bare_negotiation_rejects_an_empty_plugin_set() {
    assert!(negotiate(&set(&["v1"]), &VersionSet::default()).is_err());
}

#[rstest]
#[case::default_shared(&["0.1.0", "0.4.0"], "0.1.0", Some("0.1.0"))]
#[case::default_unknown_to_caller(&["0.4.0", "1.0.0"], "0.1.0", None)]
fn empty_plugin_set_assumes_the_default(
    #[case] caller: &[&str],
    #[case] default: &str,
    #[case] expected: Option<&str>,
) {
    let negotiator = Negotiator::new(VersionSet::single(default));
    let chosen = negotiator.negotiate(&set(caller), &VersionSet::default());
    assert_eq!(chosen.ok().as_deref(), expected);
}

#[test]
fn non_empty_plugin_set_ignores_the_default() {
    let negotiator = Negotiator::new(VersionSet::single("0.1.0"));
    let chosen = negotiator.negotiate(&set(&["0.1.0", "1.0.0"]), &set(&["1.0.0"]));
    assert_eq!(chosen.as_deref(), Ok("1.0.0"));
}

#[test]
fn negotiator_reads_the_configured_default() {
    let config = netplug_config::Config {
        plugin_default_version: "0.3.1".into(),
        ..netplug_config::Config::default()
    };
    let negotiator = Negotiator::from_config(&config);
    assert_eq!(negotiator.plugin_default(), &VersionSet::single("0.3.1"));
}

// ---------------------------------------------------------------------------
// Probing
// ---------------------------------------------------------------------------

#[test]
fn probe_sends_the_version_operation_with_empty_stdin() {
    let mut exec = MockExec::new();
    exec.expect_exec_plugin()
        .withf(|_, path, stdin, env| {
            path == Path::new("/opt/cni/bin/bridge")
                && stdin.is_empty()
                && env.contains(&("CNI_COMMAND".to_owned(), "VERSION".to_owned()))
                && !env.iter().any(|(key, _)| key == "CNI_NETNS")
        })
        .times(1)
        .return_once(|_, _, _, _| {
            Ok(br#"{"cniVersion":"1.0.0","supportedVersions":["0.4.0","1.0.0"]}"#.to_vec())
        });

    let versions = probe_versions(
        &exec,
        &InvokeContext::background(),
        Path::new("/opt/cni/bin/bridge"),
    )
    .expect("probe");
    assert_eq!(versions, set(&["0.4.0", "1.0.0"]));
}

#[rstest]
#[case::envelope(plugin_error(ErrorCode::Unknown, "unknown CNI_COMMAND: VERSION"))]
#[case::env_code(plugin_error(
    ErrorCode::InvalidEnvironmentVariables,
    "unsupported command VERSION"
))]
#[case::stderr(InvokeError::Failure(PluginFailure::Stderr {
    text: "unknown CNI_COMMAND: VERSION\n".into()
}))]
fn unrecognised_operation_is_unsupported(#[case] failure: InvokeError) {
    let exec = replying(Err(failure));
    let error = probe_versions(&exec, &InvokeContext::background(), Path::new("/old"))
        .expect_err("probe fails");
    assert!(error.is_unsupported(), "unexpected error: {error}");
}

#[rstest]
#[case::other_envelope(plugin_error(ErrorCode::IoFailure, "disk full"))]
#[case::opaque(InvokeError::Failure(PluginFailure::OpaqueExit {
    status: "exit status 1".into(),
    stdout: String::new(),
}))]
#[case::launch(InvokeError::Failure(PluginFailure::Launch {
    path: PathBuf::from("/missing"),
    source: Arc::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
}))]
#[case::cancelled(InvokeError::Cancelled { path: PathBuf::from("/slow") })]
fn other_failures_are_generic(#[case] failure: InvokeError) {
    let exec = replying(Err(failure));
    let error = probe_versions(&exec, &InvokeContext::background(), Path::new("/plugin"))
        .expect_err("probe fails");
    assert!(
        matches!(error, ProbeError::Invoke { .. }),
        "unexpected error: {error}"
    );
}

#[test]
fn undecodable_reply_is_a_decode_error() {
    let exec = replying(Ok(br#"{"supportedVersions":[]}"#.to_vec()));
    let error = probe_versions(&exec, &InvokeContext::background(), Path::new("/plugin"))
        .expect_err("probe fails");
    assert!(matches!(error, ProbeError::Decode { .. }));
}

#[test]
fn probe_or_default_falls_back_for_old_plugins() {
    let exec = replying(Err(plugin_error(
        ErrorCode::Unknown,
        "unknown CNI_COMMAND: VERSION",
    )));
    let default = VersionSet::single("0.1.0");
    let versions = probe_or_default(
        &exec,
        &InvokeContext::background(),
        Path::new("/old"),
        &default,
    )
    .expect("fallback");
    assert_eq!(versions, default);
}

#[test]
fn probe_or_default_keeps_generic_failures() {
    let exec = replying(Err(plugin_error(ErrorCode::Internal, "boom")));
    let outcome = probe_or_default(
        &exec,
        &InvokeContext::background(),
        Path::new("/plugin"),
        &VersionSet::single("0.1.0"),
    );
    assert!(matches!(outcome, Err(ProbeError::Invoke { .. })));
}
