//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events under the service root span)
//!     → rotation.rs (size-rotated JSON log file)
//!     → trace.rs (spans exported over OTLP/HTTP)
//!     → metrics.rs (request counters and latency histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, file)
//!     → Trace collector (OTLP)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every request span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod rotation;
pub mod trace;

pub use logging::{LoggingError, Telemetry};
pub use metrics::Metrics;
pub use trace::TraceExport;
