//! Unit tests for request rendering.

use std::str::FromStr;

use rstest::{fixture, rstest};

use super::*;

fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

#[fixture]
fn add_request() -> InvocationRequest {
    InvocationRequest::new(Operation::Add)
        .with_container_id("some-container-id")
        .with_net_namespace("/some/netns/path")
        .with_if_name("some-eth0")
        .with_path_search(["/some/bin/path"])
}

#[rstest]
fn renders_every_protocol_variable(add_request: InvocationRequest) {
    let env = add_request.to_env().expect("env");
    assert_eq!(lookup(&env, ENV_COMMAND), Some("ADD"));
    assert_eq!(lookup(&env, ENV_CONTAINER_ID), Some("some-container-id"));
    assert_eq!(lookup(&env, ENV_NETNS), Some("/some/netns/path"));
    assert_eq!(lookup(&env, ENV_IFNAME), Some("some-eth0"));
    assert_eq!(lookup(&env, ENV_PATH), Some("/some/bin/path"));
    assert_eq!(lookup(&env, ENV_ARGS), Some(""));
    assert_eq!(lookup(&env, ENV_VERSION), None);
}

#[test]
fn absent_namespace_is_omitted() {
    let env = InvocationRequest::new(Operation::Version)
        .to_env()
        .expect("env");
    assert_eq!(lookup(&env, ENV_NETNS), None);
    assert_eq!(lookup(&env, ENV_COMMAND), Some("VERSION"));
}

#[rstest]
fn pinned_version_is_exported(add_request: InvocationRequest) {
    let env = add_request
        .with_protocol_version("1.0.0")
        .to_env()
        .expect("env");
    assert_eq!(lookup(&env, ENV_VERSION), Some("1.0.0"));
}

#[rstest]
fn plugin_args_keep_their_order(add_request: InvocationRequest) {
    let env = add_request
        .with_arg("K8S_POD_NAME", "web")
        .with_arg("IgnoreUnknown", "1")
        .with_arg("DEBUG", "/tmp/debug=1")
        .to_env()
        .expect("env");
    assert_eq!(
        lookup(&env, ENV_ARGS),
        Some("K8S_POD_NAME=web;IgnoreUnknown=1;DEBUG=/tmp/debug=1")
    );
}

#[rstest]
#[case::empty_key("", "v")]
#[case::equals_in_key("A=B", "v")]
#[case::semicolon_in_key("A;B", "v")]
fn malformed_arg_keys_are_rejected(#[case] key: &str, #[case] value: &str) {
    let error = InvocationRequest::new(Operation::Add)
        .with_arg(key, value)
        .to_env()
        .expect_err("should reject");
    assert!(matches!(error, RequestError::InvalidArgKey { .. }));
}

#[test]
fn semicolon_in_value_is_rejected() {
    let error = InvocationRequest::new(Operation::Add)
        .with_arg("KEY", "a;b")
        .to_env()
        .expect_err("should reject");
    assert_eq!(
        error,
        RequestError::InvalidArgValue {
            key: "KEY".into()
        }
    );
}

#[cfg(unix)]
#[test]
fn search_path_uses_the_platform_separator() {
    let env = InvocationRequest::new(Operation::Add)
        .with_path_search(["/opt/cni/bin", "/usr/libexec/cni"])
        .to_env()
        .expect("env");
    assert_eq!(lookup(&env, ENV_PATH), Some("/opt/cni/bin:/usr/libexec/cni"));
}

#[cfg(unix)]
#[test]
fn search_directory_containing_separator_is_rejected() {
    let error = InvocationRequest::new(Operation::Add)
        .with_path_search(["/opt/cni/bin", "/weird:dir"])
        .to_env()
        .expect_err("should reject");
    assert_eq!(
        error,
        RequestError::UnjoinablePath {
            path: PathBuf::from("/weird:dir")
        }
    );
}

#[cfg(unix)]
#[test]
fn non_unicode_namespace_is_rejected() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let netns = PathBuf::from(OsStr::from_bytes(b"/var/run/netns/\xff"));
    let error = InvocationRequest::new(Operation::Add)
        .with_net_namespace(netns.clone())
        .to_env()
        .expect_err("should reject");
    assert_eq!(
        error,
        RequestError::NonUnicodePath {
            variable: ENV_NETNS,
            path: netns
        }
    );
}

#[cfg(unix)]
#[test]
fn non_unicode_search_directory_is_rejected() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = PathBuf::from(OsStr::from_bytes(b"/opt/\xfe\xff/bin"));
    let error = InvocationRequest::new(Operation::Add)
        .with_path_search([PathBuf::from("/opt/cni/bin"), dir.clone()])
        .to_env()
        .expect_err("should reject");
    assert_eq!(
        error,
        RequestError::NonUnicodePath {
            variable: ENV_PATH,
            path: dir
        }
    );
}

#[rstest]
#[case::add(Operation::Add, "ADD")]
#[case::del(Operation::Del, "DEL")]
#[case::check(Operation::Check, "CHECK")]
#[case::version(Operation::Version, "VERSION")]
#[case::gc(Operation::Gc, "GC")]
#[case::status(Operation::Status, "STATUS")]
fn operations_render_as_upper_case_verbs(#[case] operation: Operation, #[case] verb: &str) {
    assert_eq!(operation.to_string(), verb);
    assert_eq!(Operation::from_str(&verb.to_ascii_lowercase()), Ok(operation));
}

#[test]
fn config_bytes_are_kept_verbatim() {
    let request = InvocationRequest::new(Operation::Add).with_config(b"  \x00raw\n".to_vec());
    assert_eq!(request.config(), b"  \x00raw\n");
}
