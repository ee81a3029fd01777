//! Process runner: start, block, stop.
//!
//! # Data Flow
//! ```text
//! Container ─▶ start hooks ─▶ wait for ─┬─ termination signal
//!                                       └─ supervised task failure
//!                                    ─▶ stop hooks (grace period) ─▶ exit
//! ```

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::container::{BoxError, Container};
use crate::lifecycle::coordinator::{HookError, LifecycleError};
use crate::lifecycle::signals::Signal;

/// Extra time granted on top of the grace period before teardown is
/// abandoned.
const FORCE_MARGIN: Duration = Duration::from_secs(1);

/// Why a run ended in failure.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("startup failed: {0}")]
    Start(#[source] LifecycleError),

    #[error("background task {task} failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: BoxError,
    },

    #[error("command failed: {0}")]
    Job(#[source] BoxError),

    /// Teardown did not finish within the grace period.
    #[error("shutdown exceeded grace period of {grace:?}")]
    ForcedExit { grace: Duration },
}

impl RunError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Why the process left the running state.
#[derive(Debug)]
enum Trigger {
    Signal(Signal),
    TaskFailed { task: String, error: BoxError },
}

/// Drives a resolved container through its lifecycle.
pub struct Runner;

impl Runner {
    /// Start every hook, block until `shutdown` resolves or a supervised task
    /// fails, then stop every started hook within the grace period.
    pub async fn run<S>(mut container: Container, shutdown: S) -> Result<(), RunError>
    where
        S: Future<Output = Signal>,
    {
        let lifecycle = container.lifecycle_mut();
        lifecycle.start().await.map_err(RunError::Start)?;

        let trigger = tokio::select! {
            signal = shutdown => Trigger::Signal(signal),
            failure = lifecycle.task_failure() => match failure {
                Some(failure) => Trigger::TaskFailed {
                    task: failure.task,
                    error: failure.error,
                },
                None => Trigger::Signal(Signal::Terminate),
            },
        };

        match &trigger {
            Trigger::Signal(signal) => tracing::info!(%signal, "Shutdown requested"),
            Trigger::TaskFailed { task, error } => {
                tracing::error!(task = %task, error = %error, "Background task failed, shutting down")
            }
        }

        Self::stop(&mut container).await?;

        match trigger {
            Trigger::Signal(_) => Ok(()),
            Trigger::TaskFailed { task, error } => Err(RunError::TaskFailed {
                task,
                source: error,
            }),
        }
    }

    /// Start every hook, run one command, then stop.
    ///
    /// Used for one-shot commands that need the same wiring as the server.
    pub async fn execute<T, F, Fut>(mut container: Container, job: F) -> Result<T, RunError>
    where
        F: FnOnce(&Container) -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        container
            .lifecycle_mut()
            .start()
            .await
            .map_err(RunError::Start)?;

        let result = job(&container).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Command failed");
        }

        Self::stop(&mut container).await?;
        result.map_err(RunError::Job)
    }

    async fn stop(container: &mut Container) -> Result<(), RunError> {
        let lifecycle = container.lifecycle_mut();
        let grace = lifecycle.stop_timeout();

        match tokio::time::timeout(grace + FORCE_MARGIN, lifecycle.stop()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(LifecycleError::StopFailure { failures })) => {
                let timed_out = failures
                    .iter()
                    .any(|failure| matches!(failure.error, HookError::TimedOut(_)));
                if timed_out {
                    tracing::error!(?grace, "Shutdown exceeded grace period, forcing exit");
                    Err(RunError::ForcedExit { grace })
                } else {
                    // Failures were already logged per hook.
                    Ok(())
                }
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Shutdown failed");
                Ok(())
            }
            Err(_) => {
                tracing::error!(?grace, "Shutdown exceeded grace period, forcing exit");
                Err(RunError::ForcedExit { grace })
            }
        }
    }
}
