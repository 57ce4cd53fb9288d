//! Cancellation and deadlines for a single invocation.
//!
//! The exec layer polls [`InvokeContext::state`] while waiting for a plugin
//! to exit and kills the plugin as soon as the context stops being live.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A shareable cancellation flag.
///
/// Clones observe the same flag, so one clone can be handed to another
/// thread and cancelled there.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every invocation watching this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`CancelToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Whether an invocation may keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Neither cancelled nor past its deadline.
    Live,
    /// The token was cancelled.
    Cancelled,
    /// The deadline passed.
    Expired {
        /// The timeout the deadline was derived from.
        timeout: Duration,
    },
}

/// Context threaded through every invocation.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use netplug_invoke::context::{CancelToken, ContextState, InvokeContext};
///
/// let token = CancelToken::new();
/// let ctx = InvokeContext::background()
///     .with_token(token.clone())
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(ctx.state(), ContextState::Live);
/// token.cancel();
/// assert_eq!(ctx.state(), ContextState::Cancelled);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InvokeContext {
    token: CancelToken,
    deadline: Option<(Instant, Duration)>,
}

impl InvokeContext {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Watches the given token.
    #[must_use]
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    /// Sets a deadline `timeout` from now.
    ///
    /// A timeout too large to represent leaves the context without a
    /// deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now()
            .checked_add(timeout)
            .map(|deadline| (deadline, timeout));
        self
    }

    /// Applies an optional timeout, as read from configuration.
    #[must_use]
    pub fn with_optional_timeout(self, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(limit) => self.with_timeout(limit),
            None => self,
        }
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Returns the timeout the deadline was derived from, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        match self.deadline {
            Some((_, timeout)) => Some(timeout),
            None => None,
        }
    }

    /// Reports whether the invocation may continue.
    ///
    /// Cancellation is reported in preference to expiry.
    #[must_use]
    pub fn state(&self) -> ContextState {
        if self.token.is_cancelled() {
            return ContextState::Cancelled;
        }
        match self.deadline {
            Some((deadline, timeout)) if Instant::now() >= deadline => {
                ContextState::Expired { timeout }
            }
            _ => ContextState::Live,
        }
    }
}
