//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT or SIGTERM (Ctrl+C elsewhere)
//! - Report which one arrived so the runner can log it
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be installed is logged and never fires;
//!   the other one still does

use std::fmt;

/// Termination request received from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => f.write_str("SIGINT"),
            Signal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Resolve on the first termination signal.
#[cfg(unix)]
pub async fn termination() -> Signal {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            None
        }
    };

    let sigterm = async {
        match terminate.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = interrupt() => Signal::Interrupt,
        _ = sigterm => Signal::Terminate,
    }
}

/// Resolve on the first termination signal.
#[cfg(not(unix))]
pub async fn termination() -> Signal {
    interrupt().await;
    Signal::Interrupt
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install SIGINT handler");
        std::future::pending::<()>().await;
    }
}
