//! Supervised background tasks.
//!
//! Start hooks must return promptly, so long-running work (a server loop) is
//! spawned through the [`Supervisor`]. When such a task ends, its result is
//! sent back to the lifecycle coordinator instead of being dropped or turned
//! into a process abort.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::container::{panic_message, BoxError};

/// Result of a supervised task that has finished.
#[derive(Debug)]
pub struct TaskExit {
    pub name: String,
    pub result: Result<(), BoxError>,
}

/// A supervised task that ended with an error.
#[derive(Debug)]
pub struct TaskFailure {
    pub task: String,
    pub error: BoxError,
}

/// Spawns tasks whose completion is reported to the coordinator.
#[derive(Clone, Debug)]
pub struct Supervisor {
    exits: mpsc::UnboundedSender<TaskExit>,
}

impl Supervisor {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<TaskExit>) {
        let (exits, rx) = mpsc::unbounded_channel();
        (Self { exits }, rx)
    }

    /// Spawn `task` on the runtime under the current span.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        let exits = self.exits.clone();

        tokio::spawn(
            async move {
                let result = match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(BoxError::from(format!(
                        "task panicked: {}",
                        panic_message(payload.as_ref())
                    ))),
                };
                match &result {
                    Ok(()) => tracing::debug!(task = %name, "Supervised task finished"),
                    Err(e) => tracing::error!(task = %name, error = %e, "Supervised task failed"),
                }
                let _ = exits.send(TaskExit { name, result });
            }
            .in_current_span(),
        )
    }
}
