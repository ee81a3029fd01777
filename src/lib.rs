//! Service skeleton built around a dependency-injection container.
//!
//! Feature modules register providers into a [`ProviderRegistry`]; the
//! resolver constructs every component once, in dependency order, and the
//! [`Lifecycle`] starts and stops them around the process's lifetime.

// Composition core
pub mod container;
pub mod lifecycle;

// Ambient stack
pub mod config;
pub mod observability;

// Infrastructure
pub mod cache;
pub mod db;
pub mod http;

// Features and tooling
pub mod app;
pub mod domain;
pub mod id;
pub mod migrate;
pub mod seed;

pub use config::AppConfig;
pub use container::{resolve, Container, ProviderRegistry};
pub use lifecycle::{Lifecycle, Runner};
