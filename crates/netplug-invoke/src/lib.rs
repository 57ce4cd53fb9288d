//! Invocation protocol for network plugins.
//!
//! A network plugin is an external executable configured entirely through
//! environment variables and a JSON document on stdin. It answers with an
//! opaque result on stdout when it succeeds, and with a non-zero exit status
//! and optionally an error envelope when it fails.
//!
//! This crate provides the caller's side of that contract:
//!
//! - [`args`] renders an [`InvocationRequest`] into protocol variables.
//! - [`exec`] runs one plugin process through [`RawExec`], honouring
//!   cancellation and deadlines from an [`InvokeContext`], and decodes
//!   failures into a [`PluginFailure`].
//! - [`envelope`] encodes and decodes the plugin error envelope.
//! - [`version`] probes plugins for their supported protocol versions and
//!   negotiates a version both sides accept.
//! - [`find`] locates plugins in a list of search directories.
//! - [`invoker`] ties the above together in [`PluginInvoker`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use netplug_invoke::{InvocationRequest, InvokeContext, Operation, PluginInvoker, RawExec};
//! use netplug_config::Config;
//!
//! # fn main() -> Result<(), netplug_invoke::InvokerError> {
//! let invoker = PluginInvoker::from_config(RawExec::new(), &Config::default());
//! let plugin = Path::new("/opt/cni/bin/bridge");
//! let request = InvocationRequest::new(Operation::Add)
//!     .with_container_id("abc123")
//!     .with_net_namespace("/var/run/netns/abc123")
//!     .with_if_name("eth0")
//!     .with_config(br#"{"cniVersion":"1.0.0","name":"net","type":"bridge"}"#.to_vec());
//!
//! let result = invoker.invoke_negotiated(&InvokeContext::background(), plugin, request)?;
//! # drop(result);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod context;
pub mod envelope;
pub mod error;
pub mod exec;
pub mod find;
pub mod invoker;
pub mod telemetry;
pub mod version;

#[cfg(test)]
mod tests;

pub use self::args::{InvocationRequest, Operation, RequestError};
pub use self::context::{CancelToken, ContextState, InvokeContext};
pub use self::envelope::{Envelope, ErrorCode};
pub use self::error::{InvokeError, InvokerError, PluginFailure};
pub use self::exec::{Exec, RawExec, StderrSink};
pub use self::find::{FindError, find_in_path};
pub use self::invoker::PluginInvoker;
pub use self::version::{
    NegotiationError, Negotiator, PluginInfo, ProbeError, VersionSet, negotiate,
};
