//! Crate-level integration and BDD tests.

#[cfg(unix)]
pub(crate) mod support;

#[cfg(unix)]
mod end_to_end {
    use std::path::PathBuf;

    use netplug_config::Config;

    use super::support::PluginDir;
    use crate::args::{InvocationRequest, Operation};
    use crate::error::{InvokeError, InvokerError, PluginFailure};
    use crate::exec::RawExec;
    use crate::invoker::PluginInvoker;

    /// Answers VERSION with a fixed report and echoes the negotiated version
    /// for every other operation.
    const VERSIONED_PLUGIN: &str = r#"
if [ "$CNI_COMMAND" = "VERSION" ]; then
  echo '{"cniVersion":"1.0.0","supportedVersions":["0.4.0","1.0.0"]}'
  exit 0
fi
cat > /dev/null
printf '{"cniVersion":"%s","command":"%s"}' "$CNI_VERSION" "$CNI_COMMAND""#;

    /// Predates version probing.
    const OLD_PLUGIN: &str = r#"
if [ "$CNI_COMMAND" = "VERSION" ]; then
  echo "unknown CNI_COMMAND: VERSION" >&2
  exit 1
fi
printf '{"cniVersion":"%s"}' "$CNI_VERSION""#;

    fn invoker() -> PluginInvoker<RawExec> {
        PluginInvoker::from_config(RawExec::new(), &Config::default())
    }

    fn add_request(search: PathBuf) -> InvocationRequest {
        InvocationRequest::new(Operation::Add)
            .with_container_id("abc123")
            .with_if_name("eth0")
            .with_path_search([search])
            .with_config(br#"{"name":"net","type":"bridge"}"#.to_vec())
    }

    #[test]
    fn negotiates_and_invokes_a_real_plugin() {
        let plugins = PluginDir::new();
        let path = plugins.script("bridge", VERSIONED_PLUGIN);
        let invoker = invoker();

        let stdout = invoker
            .invoke_negotiated(
                &invoker.context(),
                &path,
                add_request(plugins.path().to_path_buf()),
            )
            .expect("invoke");
        assert_eq!(stdout, br#"{"cniVersion":"1.0.0","command":"ADD"}"#);
    }

    #[test]
    fn old_plugins_receive_the_default_version() {
        let plugins = PluginDir::new();
        let path = plugins.script("legacy", OLD_PLUGIN);
        let invoker = invoker();

        let stdout = invoker
            .invoke_negotiated(
                &invoker.context(),
                &path,
                add_request(plugins.path().to_path_buf()),
            )
            .expect("invoke");
        assert_eq!(stdout, br#"{"cniVersion":"0.1.0"}"#);
    }

    #[test]
    fn finds_plugins_on_the_request_search_path() {
        let plugins = PluginDir::new();
        plugins.script("bridge", VERSIONED_PLUGIN);
        let invoker = invoker();

        let stdout = invoker
            .find_and_invoke(
                &invoker.context(),
                "bridge",
                &add_request(plugins.path().to_path_buf()),
            )
            .expect("invoke");
        assert_eq!(stdout, br#"{"cniVersion":"","command":"ADD"}"#);
    }

    #[test]
    fn launch_failures_reach_the_caller() {
        let plugins = PluginDir::new();
        let path = plugins.inert("bridge");
        let invoker = invoker();

        let error = invoker
            .invoke(
                &invoker.context(),
                &path,
                &add_request(plugins.path().to_path_buf()),
            )
            .expect_err("not executable");
        assert!(
            matches!(
                error,
                InvokerError::Invoke(InvokeError::Failure(PluginFailure::Launch { .. }))
            ),
            "got {error}"
        );
    }
}
