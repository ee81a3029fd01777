//! Type keys and capability group keys.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a component type in the registration table.
///
/// Equality and hashing use the `TypeId` only; the name is kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Untyped identity of a group: its name plus the bound interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId {
    pub name: &'static str,
    pub member: TypeKey,
}

impl GroupId {
    pub fn of<M: ?Sized + Capability>() -> Self {
        Self {
            name: M::GROUP,
            member: TypeKey::of::<M>(),
        }
    }
}

/// Binds a capability interface to the name of its group.
///
/// Implemented once, next to the interface:
///
/// ```ignore
/// impl Capability for dyn RouteRegistrar {
///     const GROUP: &'static str = "routes";
/// }
/// ```
///
/// Contributors and the aggregator then refer to the group through the
/// interface type alone.
pub trait Capability: Send + Sync + 'static {
    const GROUP: &'static str;
}

/// A single declared input of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// One instance of the keyed type.
    Component(TypeKey),
    /// Every member of a capability group.
    Group(GroupId),
}
