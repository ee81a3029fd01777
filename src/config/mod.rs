//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: APP_NAME, HTTP_ADDR, DB_DSN, ...)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → injected as Arc<AppConfig> into any provider that asks for it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_overrides, load_config, ConfigError};
pub use schema::{
    AppConfig, DatabaseConfig, HttpConfig, LifecycleConfig, LogFormat, LoggingConfig,
    MetricsConfig, RedisConfig, TracingConfig,
};
pub use validation::{validate_config, ValidationError};
