//! Dependency declarations and the values injected into providers.
//!
//! A provider's input is `()`, a single `Arc<T>` or `Group<M>`, or a tuple of
//! those. The same type both declares the requirements (read before anything
//! is constructed) and fetches the resolved values.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::container::error::ContainerError;
use crate::container::key::{Capability, GroupId, Requirement, TypeKey};

pub(crate) type Instance = Box<dyn Any + Send + Sync>;

/// Read-only view of everything resolved so far.
pub struct Scope<'a> {
    pub(crate) instances: &'a HashMap<TypeKey, Instance>,
    pub(crate) members: &'a HashMap<GroupId, Vec<Instance>>,
    pub(crate) requester: &'a str,
}

impl Scope<'_> {
    fn component<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let key = TypeKey::of::<T>();
        self.instances
            .get(&key)
            .and_then(|instance| instance.downcast_ref::<Arc<T>>())
            .cloned()
            .ok_or_else(|| ContainerError::MissingProvider {
                type_name: key.name(),
                required_by: self.requester.to_string(),
            })
    }

    fn group<M: ?Sized + Capability>(&self) -> Group<M> {
        let id = GroupId::of::<M>();
        let members: Vec<Arc<M>> = self
            .members
            .get(&id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|member| member.downcast_ref::<Arc<M>>().cloned())
                    .collect()
            })
            .unwrap_or_default();
        Group {
            name: id.name,
            members: members.into(),
        }
    }
}

/// One injectable input.
pub trait Dependency: Sized + Send + 'static {
    fn requirement() -> Requirement;
    fn fetch(scope: &Scope<'_>) -> Result<Self, ContainerError>;
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Arc<T> {
    fn requirement() -> Requirement {
        Requirement::Component(TypeKey::of::<T>())
    }

    fn fetch(scope: &Scope<'_>) -> Result<Self, ContainerError> {
        scope.component::<T>()
    }
}

/// The full, ordered membership of a capability group.
///
/// The view is frozen when the consuming provider is constructed.
pub struct Group<M: ?Sized> {
    name: &'static str,
    members: Arc<[Arc<M>]>,
}

impl<M: ?Sized> Group<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<M>> {
        self.members.iter()
    }
}

impl<M: ?Sized> Clone for Group<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            members: Arc::clone(&self.members),
        }
    }
}

impl<M: ?Sized> fmt::Debug for Group<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("len", &self.members.len())
            .finish()
    }
}

impl<'a, M: ?Sized> IntoIterator for &'a Group<M> {
    type Item = &'a Arc<M>;
    type IntoIter = std::slice::Iter<'a, Arc<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl<M: ?Sized + Capability> Dependency for Group<M> {
    fn requirement() -> Requirement {
        Requirement::Group(GroupId::of::<M>())
    }

    fn fetch(scope: &Scope<'_>) -> Result<Self, ContainerError> {
        Ok(scope.group::<M>())
    }
}

/// The complete input of a provider.
pub trait Inject: Sized + 'static {
    fn requirements() -> Vec<Requirement>;
    fn fetch(scope: &Scope<'_>) -> Result<Self, ContainerError>;
}

impl Inject for () {
    fn requirements() -> Vec<Requirement> {
        Vec::new()
    }

    fn fetch(_scope: &Scope<'_>) -> Result<Self, ContainerError> {
        Ok(())
    }
}

impl<T: ?Sized + Send + Sync + 'static> Inject for Arc<T> {
    fn requirements() -> Vec<Requirement> {
        vec![<Self as Dependency>::requirement()]
    }

    fn fetch(scope: &Scope<'_>) -> Result<Self, ContainerError> {
        <Self as Dependency>::fetch(scope)
    }
}

impl<M: ?Sized + Capability> Inject for Group<M> {
    fn requirements() -> Vec<Requirement> {
        vec![<Self as Dependency>::requirement()]
    }

    fn fetch(scope: &Scope<'_>) -> Result<Self, ContainerError> {
        <Self as Dependency>::fetch(scope)
    }
}

macro_rules! impl_inject_tuple {
    ($($dep:ident),+) => {
        impl<$($dep: Dependency),+> Inject for ($($dep,)+) {
            fn requirements() -> Vec<Requirement> {
                vec![$($dep::requirement()),+]
            }

            fn fetch(scope: &Scope<'_>) -> Result<Self, ContainerError> {
                Ok(($($dep::fetch(scope)?,)+))
            }
        }
    };
}

impl_inject_tuple!(A);
impl_inject_tuple!(A, B);
impl_inject_tuple!(A, B, C);
impl_inject_tuple!(A, B, C, D);
impl_inject_tuple!(A, B, C, D, E);
impl_inject_tuple!(A, B, C, D, E, F);
impl_inject_tuple!(A, B, C, D, E, F, G);
impl_inject_tuple!(A, B, C, D, E, F, G, H);
