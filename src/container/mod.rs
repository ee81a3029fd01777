//! Dependency-injection container.
//!
//! # Data Flow
//! ```text
//! Feature modules ─▶ ProviderRegistry ─▶ resolve(registry, config) ─▶ Container
//!                    (bookkeeping only)   (validate, sort, construct)   (singletons
//!                                                                        + Lifecycle)
//! ```
//!
//! # Design Decisions
//! - Components are keyed by `TypeId`; each type has at most one producer
//! - Inputs are declared by the constructor's argument type, so requirements
//!   are known before anything is built
//! - Capability groups are bound to an interface type through [`Capability`]
//!   and consumed by exactly one aggregator

mod error;
mod inject;
mod key;
mod registry;
mod resolver;

pub use error::{BoxError, ContainerError};
pub(crate) use error::panic_message;
pub use inject::{Dependency, Group, Inject, Scope};
pub use key::{Capability, GroupId, Requirement, TypeKey};
pub use registry::{ProvideContext, ProviderRegistry};
pub use resolver::{resolve, Container};
