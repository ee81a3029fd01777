//! Lifecycle coordinator: ordered start, reverse stop.
//!
//! # State Machine
//! ```text
//! Constructed → Starting → Running → Stopping → Stopped
//!                   │                               ▲
//!                   └── start hook fails ───────────┘
//!                       (reverse stop of started hooks)
//! ```
//!
//! # Design Decisions
//! - Hooks run one at a time, never concurrently
//! - Start hooks are bounded per call by the optional start timeout
//! - All stop hooks share one graceful-shutdown deadline
//! - Stop is best-effort and total: a failing hook never blocks the next one

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::container::BoxError;
use crate::lifecycle::hook::{Hook, HookContext, HookFn};
use crate::lifecycle::supervisor::{Supervisor, TaskExit, TaskFailure};

/// Default bound for the whole stop phase.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Phase of the process lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Constructed => "constructed",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why a single hook call did not succeed.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(BoxError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// A hook that failed while stopping.
#[derive(Debug)]
pub struct HookFailure {
    pub hook: String,
    pub error: HookError,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.hook, self.error)
    }
}

/// Errors surfaced by lifecycle transitions.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A start hook failed; already-started hooks were stopped.
    #[error("start hook {hook} failed: {error}")]
    StartFailure {
        hook: String,
        #[source]
        error: HookError,
    },

    /// One or more stop hooks failed. Every hook was still given its turn.
    #[error("{} stop hook(s) failed: {}", .failures.len(), join_failures(.failures))]
    StopFailure { failures: Vec<HookFailure> },

    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

fn join_failures(failures: &[HookFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Runs start hooks in order and stop hooks in reverse.
pub struct Lifecycle {
    hooks: Vec<Hook>,
    /// Number of leading hooks whose start completed.
    started: usize,
    state: LifecycleState,
    start_timeout: Option<Duration>,
    stop_timeout: Duration,
    supervisor: Supervisor,
    exits: mpsc::UnboundedReceiver<TaskExit>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (supervisor, exits) = Supervisor::channel();
        Self {
            hooks: Vec::new(),
            started: 0,
            state: LifecycleState::Constructed,
            start_timeout: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            supervisor,
            exits,
        }
    }

    /// Bound each start hook call. `None` waits indefinitely.
    pub fn set_start_timeout(&mut self, timeout: Option<Duration>) {
        self.start_timeout = timeout;
    }

    /// Bound the whole stop phase.
    pub fn set_stop_timeout(&mut self, timeout: Duration) {
        self.stop_timeout = timeout;
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    pub fn append(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(Hook::name)
    }

    pub fn supervisor(&self) -> Supervisor {
        self.supervisor.clone()
    }

    /// Run every start hook in order.
    ///
    /// On the first failure the remaining hooks are skipped, the hooks that
    /// already started are stopped in reverse order and the coordinator ends
    /// in `Stopped`.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Constructed {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to: LifecycleState::Starting,
            });
        }
        self.state = LifecycleState::Starting;
        tracing::info!(hooks = self.hooks.len(), "Lifecycle starting");

        for index in 0..self.hooks.len() {
            let name = self.hooks[index].name().to_string();
            if let Some(on_start) = self.hooks[index].on_start.take() {
                tracing::debug!(hook = %name, "Running start hook");
                let deadline = self.start_timeout.map(|timeout| Instant::now() + timeout);
                let ctx = HookContext::new(deadline, self.supervisor.clone());

                if let Err(error) = run_bounded(on_start, ctx, self.start_timeout).await {
                    tracing::error!(hook = %name, error = %error, "Start hook failed, rolling back");
                    self.state = LifecycleState::Stopping;
                    let failures = self.stop_started().await;
                    for failure in &failures {
                        tracing::warn!(hook = %failure.hook, error = %failure.error, "Rollback stop hook failed");
                    }
                    self.state = LifecycleState::Stopped;
                    return Err(LifecycleError::StartFailure { hook: name, error });
                }
            }
            self.started = index + 1;
        }

        self.state = LifecycleState::Running;
        tracing::info!("Lifecycle running");
        Ok(())
    }

    /// Run the stop hooks of every started hook in reverse order.
    ///
    /// Calling `stop` again, or before `start`, is a no-op.
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Stopped => return Ok(()),
            LifecycleState::Constructed => {
                self.state = LifecycleState::Stopped;
                return Ok(());
            }
            LifecycleState::Running => {}
            other => {
                return Err(LifecycleError::InvalidTransition {
                    from: other,
                    to: LifecycleState::Stopping,
                })
            }
        }

        self.state = LifecycleState::Stopping;
        tracing::info!(
            hooks = self.started,
            timeout = ?self.stop_timeout,
            "Lifecycle stopping"
        );

        let failures = self.stop_started().await;
        self.state = LifecycleState::Stopped;

        if failures.is_empty() {
            tracing::info!("Lifecycle stopped");
            Ok(())
        } else {
            for failure in &failures {
                tracing::error!(hook = %failure.hook, error = %failure.error, "Stop hook failed");
            }
            Err(LifecycleError::StopFailure { failures })
        }
    }

    /// Wait for the next supervised task to fail.
    ///
    /// Tasks that finish successfully are skipped. Returns `None` only if the
    /// channel closes, which cannot happen while this coordinator holds its
    /// own supervisor handle.
    pub async fn task_failure(&mut self) -> Option<TaskFailure> {
        while let Some(exit) = self.exits.recv().await {
            if let Err(error) = exit.result {
                return Some(TaskFailure {
                    task: exit.name,
                    error,
                });
            }
        }
        None
    }

    async fn stop_started(&mut self) -> Vec<HookFailure> {
        let deadline = Instant::now() + self.stop_timeout;
        let mut failures = Vec::new();

        while self.started > 0 {
            self.started -= 1;
            let hook = &mut self.hooks[self.started];
            let Some(on_stop) = hook.on_stop.take() else {
                continue;
            };
            let name = hook.name().to_string();
            tracing::debug!(hook = %name, "Running stop hook");

            let ctx = HookContext::new(Some(deadline), self.supervisor.clone());
            let result = match tokio::time::timeout_at(deadline, on_stop(ctx)).await {
                Ok(result) => result.map_err(HookError::Failed),
                Err(_) => Err(HookError::TimedOut(self.stop_timeout)),
            };
            if let Err(error) = result {
                failures.push(HookFailure { hook: name, error });
            }
        }

        failures
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state)
            .field("hooks", &self.hooks)
            .field("started", &self.started)
            .finish()
    }
}

async fn run_bounded(
    hook: HookFn,
    ctx: HookContext,
    timeout: Option<Duration>,
) -> Result<(), HookError> {
    let deadline = ctx.deadline();
    let call = hook(ctx);
    match (deadline, timeout) {
        (Some(deadline), Some(timeout)) => match tokio::time::timeout_at(deadline, call).await {
            Ok(result) => result.map_err(HookError::Failed),
            Err(_) => Err(HookError::TimedOut(timeout)),
        },
        _ => call.await.map_err(HookError::Failed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording_hook(name: &str, log: &Log) -> Hook {
        let (start_log, stop_log) = (log.clone(), log.clone());
        let (start_name, stop_name) = (format!("{name}-start"), format!("{name}-stop"));
        Hook::new(name)
            .on_start(move |_| async move {
                start_log.lock().unwrap().push(start_name);
                Ok(())
            })
            .on_stop(move |_| async move {
                stop_log.lock().unwrap().push(stop_name);
                Ok(())
            })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_start_in_order_stop_in_reverse() {
        let log = Log::default();
        let mut lifecycle = Lifecycle::new();
        for name in ["a", "b", "c", "d"] {
            lifecycle.append(recording_hook(name, &log));
        }

        lifecycle.start().await.unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Running);
        assert_eq!(entries(&log), ["a-start", "b-start", "c-start", "d-start"]);

        lifecycle.stop().await.unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        assert_eq!(
            entries(&log)[4..],
            ["d-stop", "c-stop", "b-stop", "a-stop"]
        );
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back_started_hooks() {
        let log = Log::default();
        let mut lifecycle = Lifecycle::new();
        lifecycle.append(recording_hook("a", &log));
        lifecycle.append(recording_hook("b", &log));
        let (fail_log, never_log) = (log.clone(), log.clone());
        lifecycle.append(
            Hook::new("c")
                .on_start(move |_| async move {
                    fail_log.lock().unwrap().push("c-start".into());
                    Err::<(), BoxError>("refused".into())
                })
                .on_stop(move |_| async move {
                    never_log.lock().unwrap().push("c-stop".into());
                    Ok(())
                }),
        );
        lifecycle.append(recording_hook("d", &log));

        let err = lifecycle.start().await.unwrap_err();
        match err {
            LifecycleError::StartFailure { hook, .. } => assert_eq!(hook, "c"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        assert_eq!(
            entries(&log),
            ["a-start", "b-start", "c-start", "b-stop", "a-stop"]
        );

        // Already stopped by the rollback.
        lifecycle.stop().await.unwrap();
        assert_eq!(entries(&log).len(), 5);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let log = Log::default();
        let mut lifecycle = Lifecycle::new();
        lifecycle.append(recording_hook("a", &log));
        lifecycle.append(recording_hook("b", &log));

        lifecycle.start().await.unwrap();
        lifecycle.stop().await.unwrap();
        lifecycle.stop().await.unwrap();

        assert_eq!(entries(&log), ["a-start", "b-start", "b-stop", "a-stop"]);
    }

    #[tokio::test]
    async fn test_stop_before_start_runs_nothing() {
        let log = Log::default();
        let mut lifecycle = Lifecycle::new();
        lifecycle.append(recording_hook("a", &log));

        lifecycle.stop().await.unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        assert!(entries(&log).is_empty());

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_stop_failures_do_not_block_remaining_hooks() {
        let log = Log::default();
        let mut lifecycle = Lifecycle::new();
        lifecycle.set_stop_timeout(Duration::from_millis(100));
        lifecycle.append(recording_hook("a", &log));
        lifecycle.append(
            Hook::new("failing").on_stop(|_| async { Err::<(), BoxError>("boom".into()) }),
        );
        lifecycle.append(
            Hook::new("hanging").on_stop(|_| std::future::pending::<Result<(), BoxError>>()),
        );
        lifecycle.append(recording_hook("d", &log));

        lifecycle.start().await.unwrap();
        let err = lifecycle.stop().await.unwrap_err();

        let LifecycleError::StopFailure { failures } = err else {
            panic!("expected stop failure");
        };
        let names: Vec<_> = failures.iter().map(|f| f.hook.as_str()).collect();
        assert_eq!(names, ["hanging", "failing"]);
        assert!(matches!(failures[0].error, HookError::TimedOut(_)));
        assert_eq!(entries(&log), ["a-start", "d-start", "d-stop", "a-stop"]);
    }

    #[tokio::test]
    async fn test_start_timeout_aborts_start() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.set_start_timeout(Some(Duration::from_millis(50)));
        lifecycle.append(
            Hook::new("slow").on_start(|_| std::future::pending::<Result<(), BoxError>>()),
        );

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::StartFailure {
                error: HookError::TimedOut(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_supervised_task_failure_is_observed() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.append(Hook::new("worker").on_start(|ctx| async move {
            ctx.supervisor().spawn("ok-task", async { Ok(()) });
            ctx.supervisor()
                .spawn("bad-task", async { Err::<(), BoxError>("listener closed".into()) });
            Ok(())
        }));

        lifecycle.start().await.unwrap();
        let failure = lifecycle.task_failure().await.unwrap();
        assert_eq!(failure.task, "bad-task");
        assert_eq!(failure.error.to_string(), "listener closed");
    }
}
