//! Start/stop hooks attached to constructed components.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::time::Instant;

use crate::container::BoxError;
use crate::lifecycle::supervisor::Supervisor;

pub(crate) type HookFn =
    Box<dyn FnOnce(HookContext) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Context handed to every hook invocation.
#[derive(Clone)]
pub struct HookContext {
    deadline: Option<Instant>,
    supervisor: Supervisor,
}

impl HookContext {
    pub(crate) fn new(deadline: Option<Instant>, supervisor: Supervisor) -> Self {
        Self {
            deadline,
            supervisor,
        }
    }

    /// Instant after which the coordinator stops waiting for this hook.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Handle for launching background work whose failure must be observed.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }
}

/// A named pair of optional start/stop callbacks.
///
/// Each callback is consumed when it runs, so a hook can never fire twice.
pub struct Hook {
    name: String,
    pub(crate) on_start: Option<HookFn>,
    pub(crate) on_stop: Option<HookFn>,
}

impl Hook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_start: None,
            on_stop: None,
        }
    }

    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_start = Some(Box::new(move |ctx| f(ctx).boxed()));
        self
    }

    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_stop = Some(Box::new(move |ctx| f(ctx).boxed()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}
