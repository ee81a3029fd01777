//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Hooks (hook.rs):
//!     Attached by providers while the container is resolved
//!
//! Coordinator (coordinator.rs):
//!     start → hooks in construction order
//!     stop  → started hooks in reverse, one shared deadline
//!
//! Supervisor (supervisor.rs):
//!     Background work spawned by start hooks → exit reported on a channel
//!
//! Runner (runner.rs):
//!     start → wait for signal or task failure → stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown requested
//! ```
//!
//! # Design Decisions
//! - Ordered startup: dependencies start before their consumers
//! - Ordered shutdown: exact reverse of startup
//! - Shutdown has timeout: forced exit after deadline

pub mod coordinator;
pub mod hook;
pub mod runner;
pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use coordinator::{HookError, HookFailure, Lifecycle, LifecycleError, LifecycleState};
pub use hook::{Hook, HookContext};
pub use runner::{RunError, Runner};
pub use shutdown::Shutdown;
pub use signals::Signal;
pub use supervisor::{Supervisor, TaskFailure};
